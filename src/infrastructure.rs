//! Infrastructure layer for database connections, configuration and logging
//!
//! This module provides the SQLite record store, layered configuration
//! loading and tracing subscriber setup.

pub mod database_connection;
pub mod event_repository;
pub mod unavailable;
pub mod config;  // Layered configuration loading
pub mod logging;  // Logging infrastructure

// Re-export commonly used items
pub use database_connection::DatabaseConnection;
pub use event_repository::SqliteEventRepository;
pub use unavailable::{UnavailableDriver, UnavailableWriter};
pub use config::{AppConfig, ConfigError};
pub use logging::{init_logging, init_logging_with_config, log_system_info};
