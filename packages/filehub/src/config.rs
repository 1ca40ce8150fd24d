use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use tracing::Level;

pub use common::config::StorageAppConfig;

#[derive(Debug, Deserialize, Clone)]
pub struct DatabaseConfig {
    /// Connection URL. Default: "sqlite://filehub.db?mode=rwc".
    #[serde(default = "default_database_url")]
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
    /// Seconds to wait for a pooled connection. Default: 8.
    #[serde(default = "default_acquire_timeout_secs")]
    pub acquire_timeout_secs: u64,
    #[serde(default)]
    pub sqlx_logging: bool,
}

fn default_database_url() -> String {
    "sqlite://filehub.db?mode=rwc".into()
}
fn default_max_connections() -> u32 {
    20
}
fn default_min_connections() -> u32 {
    1
}
fn default_acquire_timeout_secs() -> u64 {
    8
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
            max_connections: default_max_connections(),
            min_connections: default_min_connections(),
            acquire_timeout_secs: default_acquire_timeout_secs(),
            sqlx_logging: false,
        }
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct LogConfig {
    /// Max level for the fmt subscriber: trace, debug, info, warn or error.
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl LogConfig {
    /// The configured level. A misspelled name is a configuration error.
    pub fn max_level(&self) -> Result<Level, ConfigError> {
        self.level.trim().parse().map_err(|_| {
            ConfigError::Message(format!(
                "invalid log.level {:?}: expected trace, debug, info, warn or error",
                self.level
            ))
        })
    }
}

#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub storage: StorageAppConfig,
    #[serde(default)]
    pub log: LogConfig,
}

impl AppConfig {
    pub fn load() -> Result<Self, ConfigError> {
        let config_path =
            std::env::var("FILEHUB_CONFIG").unwrap_or_else(|_| "config/config".to_string());

        let config: Self = Self::builder(&config_path)?.build()?.try_deserialize()?;
        config.log.max_level()?;
        Ok(config)
    }

    fn builder(
        config_path: &str,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        Ok(Config::builder()
            .set_default("database.url", default_database_url())?
            .set_default("storage.root", "./storage")?
            .set_default("log.level", default_log_level())?
            // Load from config/config.toml
            .add_source(File::with_name(config_path).required(false))
            // Override from environment (e.g., FILEHUB__DATABASE__URL)
            .add_source(Environment::with_prefix("FILEHUB").separator("__")))
    }
}
