use std::path::Path;

use anyhow::{Context, Result};
use platform_db::DatabaseSettings;
use platform_obs::ObsConfig;
use serde::Deserialize;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseSettings,
    pub auto_migrate: bool,
    pub obs: ObsConfig,
}

/// JSON file named by `TASKBOARD_CONFIG`. Environment variables win over it.
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct FileConfig {
    database: Option<DatabaseSettings>,
    auto_migrate: Option<bool>,
}

impl FileConfig {
    fn read(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config {}", path.display()))?;
        serde_json::from_str(&raw).with_context(|| format!("parsing config {}", path.display()))
    }
}

impl AppConfig {
    /// Reads the process environment. `.env` is loaded by the caller first.
    pub fn load() -> Result<Self> {
        let file = match std::env::var("TASKBOARD_CONFIG") {
            Ok(path) => FileConfig::read(Path::new(&path))?,
            Err(_) => FileConfig::default(),
        };
        Self::layered(file)
    }

    fn layered(file: FileConfig) -> Result<Self> {
        let mut database = file.database.unwrap_or_else(DatabaseSettings::from_env);
        if let Some(max) = env_parsed::<u32>("DATABASE_MAX_CONNECTIONS")? {
            database.max_connections = max;
        }
        if let Some(secs) = env_parsed::<u64>("DATABASE_CONNECT_TIMEOUT_SECS")? {
            database.connect_timeout_secs = secs;
        }
        if let Some(logging) = env_flag("DATABASE_SQL_LOGGING") {
            database.sql_logging = logging;
        }

        Ok(Self {
            database,
            auto_migrate: env_flag("TASKBOARD_AUTO_MIGRATE")
                .or(file.auto_migrate)
                .unwrap_or(false),
            obs: ObsConfig::from_env(),
        })
    }
}

fn env_flag(key: &str) -> Option<bool> {
    std::env::var(key).ok().map(|val| parse_flag(&val))
}

fn parse_flag(val: &str) -> bool {
    matches!(val.trim().to_lowercase().as_str(), "1" | "true" | "yes" | "on")
}

fn env_parsed<T>(key: &str) -> Result<Option<T>>
where
    T: std::str::FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .with_context(|| format!("invalid {key}")),
        Err(_) => Ok(None),
    }
}
