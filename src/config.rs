use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;

const DEFAULT_FILE: &str = "filmorate";

#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub log: LogConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Selects the single store backend for the process.
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    pub path: String,
    /// Use a throwaway in-memory database instead of `path`.
    pub temporary: bool,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    pub level: String,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        Self::from_file(DEFAULT_FILE)
    }

    /// Reads `name` (any format `config` understands, optional) and then
    /// `FILMORATE__SECTION__KEY` environment overrides.
    pub fn from_file(name: &str) -> Result<Self, ConfigError> {
        Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8080_i64)?
            .set_default("storage.path", "filmorate.db")?
            .set_default("storage.temporary", false)?
            .set_default("log.level", "filmorate=debug,actix_web=info")?
            .add_source(File::with_name(name).required(false))
            .add_source(
                Environment::with_prefix("FILMORATE")
                    .prefix_separator("__")
                    .separator("__"),
            )
            .build()?
            .try_deserialize()
    }
}
