mod config;
mod database;
mod error;
mod films;
mod friends;
mod handlers;
mod model;
mod users;
mod validation;

use actix_web::{middleware::Logger, web, App, HttpServer};
use crate::config::AppConfig;
use log::info;
use std::io;

#[actix_rt::main]
async fn main() -> io::Result<()> {
    let cfg = AppConfig::load().map_err(io::Error::other)?;

    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(&cfg.log.level))
        .init();

    let db = web::Data::new(database::open(&cfg.storage).map_err(io::Error::other)?);

    let address = cfg.server.address();
    info!("Listening on {}", address);
    HttpServer::new(move || {
        App::new()
            .wrap(Logger::default())
            .app_data(db.clone())
            .configure(handlers::configure)
    })
    .bind(address)?
    .run()
    .await
}
