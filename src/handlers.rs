use crate::error::AppError;
use crate::model::{Film, User};
use crate::{films, friends, users};
use actix_web::{web, HttpResponse};
use serde::Deserialize;

type Db = web::Data<sled::Db>;
type Reply = Result<HttpResponse, AppError>;

fn bad_request<E: std::fmt::Display>(err: E) -> actix_web::Error {
    AppError::Validation(err.to_string()).into()
}

pub fn configure(cfg: &mut web::ServiceConfig) {
    cfg.app_data(web::JsonConfig::default().error_handler(|err, _| bad_request(err)))
        .app_data(web::PathConfig::default().error_handler(|err, _| bad_request(err)))
        .app_data(web::QueryConfig::default().error_handler(|err, _| bad_request(err)))
        // literal segments go before `{id}`
        .service(
            web::resource("/films")
                .route(web::get().to(all_films))
                .route(web::post().to(create_film))
                .route(web::put().to(update_film)),
        )
        .route("/films/popular", web::get().to(popular_films))
        .route("/films/{id}", web::get().to(get_film))
        .service(
            web::resource("/films/{id}/like/{user_id}")
                .route(web::put().to(like_film))
                .route(web::delete().to(unlike_film)),
        )
        .service(
            web::resource("/users")
                .route(web::get().to(all_users))
                .route(web::post().to(create_user))
                .route(web::put().to(update_user)),
        )
        .route("/users/friendship-statuses", web::get().to(friendship_statuses))
        .route("/users/{id}", web::get().to(get_user))
        .route("/users/{id}/friends", web::get().to(friends_of))
        .route("/users/{id}/friends/pending", web::get().to(pending_friends))
        .route(
            "/users/{id}/friends/common/{other_id}",
            web::get().to(common_friends),
        )
        .service(
            web::resource("/users/{id}/friends/{friend_id}")
                .route(web::put().to(add_friend))
                .route(web::delete().to(remove_friend)),
        )
        .route(
            "/users/{id}/friends/{friend_id}/confirm",
            web::put().to(confirm_friend),
        )
        .route("/genres", web::get().to(all_genres))
        .route("/genres/{id}", web::get().to(get_genre))
        .route("/mpa", web::get().to(all_mpa))
        .route("/mpa/{id}", web::get().to(get_mpa));
}

async fn all_films(db: Db) -> Reply {
    Ok(HttpResponse::Ok().json(films::all(db.get_ref())?))
}

async fn create_film(db: Db, film: web::Json<Film>) -> Reply {
    Ok(HttpResponse::Ok().json(films::create(db.get_ref(), film.into_inner())?))
}

async fn update_film(db: Db, film: web::Json<Film>) -> Reply {
    Ok(HttpResponse::Ok().json(films::update(db.get_ref(), film.into_inner())?))
}

async fn get_film(db: Db, id: web::Path<u64>) -> Reply {
    Ok(HttpResponse::Ok().json(films::find(db.get_ref(), id.into_inner())?))
}

#[derive(Deserialize)]
struct PopularParams {
    #[serde(default = "default_count")]
    count: usize,
}

fn default_count() -> usize {
    films::DEFAULT_POPULAR_COUNT
}

async fn popular_films(db: Db, params: web::Query<PopularParams>) -> Reply {
    Ok(HttpResponse::Ok().json(films::popular(db.get_ref(), params.count)?))
}

async fn like_film(db: Db, path: web::Path<(u64, u64)>) -> Reply {
    let (film_id, user_id) = path.into_inner();
    films::like(db.get_ref(), film_id, user_id)?;
    Ok(HttpResponse::Ok().finish())
}

async fn unlike_film(db: Db, path: web::Path<(u64, u64)>) -> Reply {
    let (film_id, user_id) = path.into_inner();
    films::unlike(db.get_ref(), film_id, user_id)?;
    Ok(HttpResponse::Ok().finish())
}

async fn all_users(db: Db) -> Reply {
    Ok(HttpResponse::Ok().json(users::all(db.get_ref())?))
}

async fn create_user(db: Db, user: web::Json<User>) -> Reply {
    Ok(HttpResponse::Ok().json(users::create(db.get_ref(), user.into_inner())?))
}

async fn update_user(db: Db, user: web::Json<User>) -> Reply {
    Ok(HttpResponse::Ok().json(users::update(db.get_ref(), user.into_inner())?))
}

async fn get_user(db: Db, id: web::Path<u64>) -> Reply {
    Ok(HttpResponse::Ok().json(users::find(db.get_ref(), id.into_inner())?))
}

async fn friendship_statuses() -> Reply {
    Ok(HttpResponse::Ok().json(friends::statuses()))
}

async fn add_friend(db: Db, path: web::Path<(u64, u64)>) -> Reply {
    let (id, friend_id) = path.into_inner();
    friends::send_request(db.get_ref(), id, friend_id)?;
    Ok(HttpResponse::Ok().finish())
}

async fn confirm_friend(db: Db, path: web::Path<(u64, u64)>) -> Reply {
    let (id, friend_id) = path.into_inner();
    friends::confirm(db.get_ref(), id, friend_id)?;
    Ok(HttpResponse::Ok().finish())
}

async fn remove_friend(db: Db, path: web::Path<(u64, u64)>) -> Reply {
    let (id, friend_id) = path.into_inner();
    friends::remove(db.get_ref(), id, friend_id)?;
    Ok(HttpResponse::Ok().finish())
}

async fn friends_of(db: Db, id: web::Path<u64>) -> Reply {
    Ok(HttpResponse::Ok().json(friends::confirmed(db.get_ref(), id.into_inner())?))
}

async fn pending_friends(db: Db, id: web::Path<u64>) -> Reply {
    Ok(HttpResponse::Ok().json(friends::pending(db.get_ref(), id.into_inner())?))
}

async fn common_friends(db: Db, path: web::Path<(u64, u64)>) -> Reply {
    let (id, other_id) = path.into_inner();
    Ok(HttpResponse::Ok().json(friends::common(db.get_ref(), id, other_id)?))
}

async fn all_genres(db: Db) -> Reply {
    Ok(HttpResponse::Ok().json(films::genres(db.get_ref())?))
}

async fn get_genre(db: Db, id: web::Path<u64>) -> Reply {
    Ok(HttpResponse::Ok().json(films::genre(db.get_ref(), id.into_inner())?))
}

async fn all_mpa(db: Db) -> Reply {
    Ok(HttpResponse::Ok().json(films::mpa_ratings(db.get_ref())?))
}

async fn get_mpa(db: Db, id: web::Path<u64>) -> Reply {
    Ok(HttpResponse::Ok().json(films::mpa_rating(db.get_ref(), id.into_inner())?))
}
