//! API configuration module.
//!
//! Loaded in layers, later ones winning:
//! 1. Defaults in code
//! 2. Optional `tally.toml` in the working directory
//! 3. Environment variables with the `TALLY_` prefix

use std::collections::HashMap;
use std::time::Duration;

use config::{Environment, File};
use serde::Deserialize;
use tally_db::DbConfig;

/// Used when no secret is configured. Startup logs a warning.
pub const DEV_JWT_SECRET: &str = "tally-dev-secret-change-in-production";

/// API server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    /// Bind address (`TALLY_HOST`)
    pub host: String,

    /// HTTP port (`TALLY_PORT`)
    pub port: u16,

    /// SQLite database file (`TALLY_DATABASE_PATH`)
    pub database_path: String,

    /// Pool size (`TALLY_DATABASE_MAX_CONNECTIONS`)
    pub database_max_connections: u32,

    /// HS256 key for bearer tokens (`TALLY_JWT_SECRET`)
    pub jwt_secret: String,

    /// Upper bound on one checkout, commit included (`TALLY_CHECKOUT_TIMEOUT_MS`)
    pub checkout_timeout_ms: u64,
}

impl ApiConfig {
    /// Load configuration from `tally.toml` (if present) and the environment.
    pub fn load() -> Result<Self, ConfigError> {
        Self::build(None)
    }

    /// Same layering, with an explicit environment map instead of the
    /// process environment.
    pub fn from_env_map(vars: HashMap<String, String>) -> Result<Self, ConfigError> {
        Self::build(Some(vars))
    }

    fn build(vars: Option<HashMap<String, String>>) -> Result<Self, ConfigError> {
        let config: ApiConfig = config::Config::builder()
            .set_default("host", "0.0.0.0")?
            .set_default("port", 8080)?
            .set_default("database_path", "./tally.db")?
            .set_default("database_max_connections", 8)?
            .set_default("jwt_secret", DEV_JWT_SECRET)?
            .set_default("checkout_timeout_ms", 5000)?
            .add_source(File::with_name("tally").required(false))
            .add_source(
                Environment::with_prefix("TALLY")
                    .try_parsing(true)
                    .source(vars),
            )
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.port == 0 {
            return Err(ConfigError::InvalidValue("port".to_string()));
        }
        if self.database_path.trim().is_empty() {
            return Err(ConfigError::MissingRequired("database_path".to_string()));
        }
        if self.database_max_connections == 0 {
            return Err(ConfigError::InvalidValue("database_max_connections".to_string()));
        }
        if self.jwt_secret.is_empty() {
            return Err(ConfigError::MissingRequired("jwt_secret".to_string()));
        }
        if self.checkout_timeout_ms == 0 {
            return Err(ConfigError::InvalidValue("checkout_timeout_ms".to_string()));
        }
        Ok(())
    }

    pub fn checkout_timeout(&self) -> Duration {
        Duration::from_millis(self.checkout_timeout_ms)
    }

    pub fn db_config(&self) -> DbConfig {
        DbConfig::new(&self.database_path).max_connections(self.database_max_connections)
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.jwt_secret == DEV_JWT_SECRET
    }
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid value for {0}")]
    InvalidValue(String),

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
