//! Connection settings and pool construction for the sea-orm store.

use std::time::Duration;

use sea_orm::{ConnectOptions, Database, DatabaseConnection, DbErr};
use serde::Deserialize;
use thiserror::Error;

/// Shared connection pool alias.
pub type DbPool = DatabaseConnection;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://taskboard.db?mode=rwc";

#[derive(Debug, Error)]
pub enum DbError {
    #[error("database url missing (set {0})")]
    MissingUrl(String),
    #[error("failed to connect: {0}")]
    Connect(#[from] DbErr),
}

pub type DbResult<T> = Result<T, DbError>;

/// Settings for the connection pool. Deserializable so they can come from a
/// config file; the url is otherwise read from the environment.
#[derive(Clone, Debug, Deserialize)]
pub struct DatabaseSettings {
    #[serde(default = "default_url_key")]
    env_key: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_connect_timeout_secs")]
    pub connect_timeout_secs: u64,
    #[serde(default)]
    pub sql_logging: bool,
}

fn default_url_key() -> String {
    "DATABASE_URL".to_string()
}

fn default_max_connections() -> u32 {
    10
}

fn default_connect_timeout_secs() -> u64 {
    8
}

impl Default for DatabaseSettings {
    fn default() -> Self {
        Self {
            env_key: default_url_key(),
            url: None,
            max_connections: default_max_connections(),
            connect_timeout_secs: default_connect_timeout_secs(),
            sql_logging: false,
        }
    }
}

impl DatabaseSettings {
    pub fn new(env_key: impl Into<String>) -> Self {
        Self {
            env_key: env_key.into(),
            ..Self::default()
        }
    }

    pub fn from_env() -> Self {
        Self::default()
    }

    /// Pin the url instead of reading it from the environment.
    pub fn with_url(mut self, url: impl Into<String>) -> Self {
        self.url = Some(url.into());
        self
    }

    pub fn database_url(&self) -> DbResult<String> {
        if let Some(url) = &self.url {
            return Ok(url.clone());
        }
        std::env::var(&self.env_key).map_err(|_| DbError::MissingUrl(self.env_key.clone()))
    }

    /// Like [`database_url`](Self::database_url) but falls back to the local
    /// SQLite file.
    pub fn database_url_or_default(&self) -> String {
        self.database_url()
            .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string())
    }

    pub fn connect_options(&self, url: String) -> ConnectOptions {
        let mut options = ConnectOptions::new(url);
        options
            .max_connections(self.max_connections)
            .connect_timeout(Duration::from_secs(self.connect_timeout_secs))
            .sqlx_logging(self.sql_logging);
        options
    }
}

/// Open a pool using the configured url, or the local SQLite default.
pub async fn connect(settings: &DatabaseSettings) -> DbResult<DbPool> {
    let url = settings.database_url_or_default();
    tracing::debug!(max_connections = settings.max_connections, "connecting to database");
    let pool = Database::connect(settings.connect_options(url)).await?;
    Ok(pool)
}
