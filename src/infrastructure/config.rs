//! Configuration infrastructure
//!
//! Layered loading with the `config` crate: built-in defaults, then an
//! optional configuration file, then `FAMLY_SYNC_*` environment variables
//! (nested keys separated by `__`, e.g. `FAMLY_SYNC_SYNC__FAMLY_MAX_DAYS_BACK=5`).

#![allow(clippy::derivable_impls)]

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::domain::events::SourceSystem;

/// Default values for every configurable setting
pub mod defaults {
    pub const APP_DIR_NAME: &str = "famly-sync";
    pub const DATABASE_FILE_NAME: &str = "events.db";
    pub const DATABASE_MAX_CONNECTIONS: u32 = 5;

    pub const FAMLY_MAX_DAYS_BACK: u32 = 7;
    pub const BABY_CONNECT_MAX_DAYS_BACK: u32 = 14;
    pub const TRIMMED_RUN_DEFAULT_DAYS_BACK: u32 = 1;
    pub const SYNC_PROGRESS_NAME: &str = "sync";
    /// Hard ceiling for any configured scrape range
    pub const DAYS_BACK_CEILING: u32 = 31;

    pub const LOG_LEVEL: &str = "info";
    pub const LOG_JSON_FORMAT: bool = false;
    pub const LOG_CONSOLE_OUTPUT: bool = true;
    pub const LOG_FILE_OUTPUT: bool = false;
    pub const LOG_FILE_NAME: &str = "famly-sync.log";

    pub const ENV_PREFIX: &str = "FAMLY_SYNC";
    pub const DEFAULT_CONFIG_FILE: &str = "config/default";
}

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to load config: {source}")]
    FileLoad {
        #[from]
        source: config::ConfigError,
    },

    #[error("Configuration validation failed: {message}")]
    Validation { message: String },
}

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub sync: SyncConfig,
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// sqlx connection URL, e.g. `sqlite:/var/lib/famly-sync/events.db`
    pub url: String,
    pub max_connections: u32,
}

/// Reconciliation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Upper bound for `days_back` on Famly scrapes (inclusive)
    pub famly_max_days_back: u32,
    /// Upper bound for `days_back` on Baby Connect scrapes (inclusive)
    pub baby_connect_max_days_back: u32,
    /// `days_back` used by a trimmed run when the caller gives none
    pub trimmed_run_default_days_back: u32,
    /// Progress entry name used by replay runs
    pub progress_name: String,
}

impl SyncConfig {
    #[must_use]
    pub const fn max_days_back(&self, system: SourceSystem) -> u32 {
        match system {
            SourceSystem::Famly => self.famly_max_days_back,
            SourceSystem::BabyConnect => self.baby_connect_max_days_back,
        }
    }
}

/// Logging configuration settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "error", "warn", "info", "debug", "trace"
    pub level: String,

    /// Enable JSON formatted logs (file output only)
    pub json_format: bool,

    pub console_output: bool,

    pub file_output: bool,

    /// Directory for the log file; defaults to `<data_dir>/famly-sync/logs`
    pub log_dir: Option<PathBuf>,

    pub file_name: String,

    /// Module-specific log level filters (e.g., "sqlx": "warn")
    pub module_filters: HashMap<String, String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        let url = AppConfig::data_dir().map_or_else(
            || format!("sqlite:{}", defaults::DATABASE_FILE_NAME),
            |dir| format!("sqlite:{}", dir.join(defaults::DATABASE_FILE_NAME).display()),
        );
        Self {
            url,
            max_connections: defaults::DATABASE_MAX_CONNECTIONS,
        }
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            famly_max_days_back: defaults::FAMLY_MAX_DAYS_BACK,
            baby_connect_max_days_back: defaults::BABY_CONNECT_MAX_DAYS_BACK,
            trimmed_run_default_days_back: defaults::TRIMMED_RUN_DEFAULT_DAYS_BACK,
            progress_name: defaults::SYNC_PROGRESS_NAME.to_string(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: defaults::LOG_LEVEL.to_string(),
            json_format: defaults::LOG_JSON_FORMAT,
            console_output: defaults::LOG_CONSOLE_OUTPUT,
            file_output: defaults::LOG_FILE_OUTPUT,
            log_dir: None,
            file_name: defaults::LOG_FILE_NAME.to_string(),
            module_filters: {
                let mut filters = HashMap::new();
                filters.insert("sqlx".to_string(), "warn".to_string());
                filters.insert("hyper".to_string(), "warn".to_string());
                filters
            },
        }
    }
}

impl AppConfig {
    /// Per-user configuration directory, e.g. `~/.config/famly-sync`
    pub fn config_dir() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(defaults::APP_DIR_NAME))
    }

    /// Per-user data directory holding the database and logs
    pub fn data_dir() -> Option<PathBuf> {
        dirs::data_dir().map(|dir| dir.join(defaults::APP_DIR_NAME))
    }

    /// Load configuration: defaults, then `path` (or `config/default` if it
    /// exists), then environment overrides
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = config::Config::builder()
            .add_source(config::Config::try_from(&Self::default())?);

        builder = match path {
            Some(path) => {
                info!("Loading configuration from {:?}", path);
                builder.add_source(config::File::from(path))
            }
            None => builder.add_source(
                config::File::with_name(defaults::DEFAULT_CONFIG_FILE).required(false),
            ),
        };

        let settings = builder
            .add_source(
                config::Environment::with_prefix(defaults::ENV_PREFIX)
                    .prefix_separator("_")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = settings.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// 설정값 유효성 검증
    pub fn validate(&self) -> Result<(), ConfigError> {
        for system in SourceSystem::ALL {
            let max = self.sync.max_days_back(system);
            if max == 0 {
                return Err(ConfigError::Validation {
                    message: format!("{system} max_days_back must be greater than 0"),
                });
            }
            if max > defaults::DAYS_BACK_CEILING {
                return Err(ConfigError::Validation {
                    message: format!(
                        "{system} max_days_back {max} exceeds ceiling {}",
                        defaults::DAYS_BACK_CEILING
                    ),
                });
            }
        }

        if self.sync.trimmed_run_default_days_back > self.sync.famly_max_days_back {
            return Err(ConfigError::Validation {
                message: "trimmed_run_default_days_back cannot exceed famly_max_days_back".to_string(),
            });
        }

        if self.sync.progress_name.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "progress_name must not be empty".to_string(),
            });
        }

        if self.database.url.trim().is_empty() {
            return Err(ConfigError::Validation {
                message: "database.url must not be empty".to_string(),
            });
        }

        if self.database.max_connections == 0 {
            return Err(ConfigError::Validation {
                message: "database.max_connections must be greater than 0".to_string(),
            });
        }

        Ok(())
    }
}
