// Database connection and pool management
// This module handles SQLite database connections using sqlx

use sqlx::{SqlitePool, sqlite::SqlitePoolOptions};
use anyhow::Result;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

use crate::infrastructure::config::DatabaseConfig;

pub struct DatabaseConnection {
    pool: SqlitePool,
}

fn is_memory_url(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

impl DatabaseConnection {
    pub async fn new(database_url: &str) -> Result<Self> {
        Self::with_max_connections(database_url, 10).await
    }

    pub async fn from_config(config: &DatabaseConfig) -> Result<Self> {
        Self::with_max_connections(&config.url, config.max_connections).await
    }

    pub async fn with_max_connections(database_url: &str, max_connections: u32) -> Result<Self> {
        let mut options = SqlitePoolOptions::new();
        // Every pooled connection to an in-memory URL opens its own empty database
        let max_connections = if is_memory_url(database_url) {
            options = options
                .idle_timeout(None::<Duration>)
                .max_lifetime(None::<Duration>);
            1
        } else {
            Self::ensure_database_file(database_url).await?;
            max_connections.max(1)
        };

        let pool = options
            .max_connections(max_connections)
            .connect(database_url)
            .await?;

        debug!("Connected to {} (max_connections={})", database_url, max_connections);
        Ok(Self { pool })
    }

    // Create database file directory if it doesn't exist
    async fn ensure_database_file(database_url: &str) -> Result<()> {
        let db_path = database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");
        let db_path = db_path.split('?').next().unwrap_or(db_path);
        let path = Path::new(db_path);

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        if !tokio::fs::try_exists(path).await? {
            tokio::fs::File::create(path).await?;
        }
        Ok(())
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub async fn migrate(&self) -> Result<()> {
        let create_events_sql = r#"
            CREATE TABLE IF NOT EXISTS events (
                source_system TEXT NOT NULL,
                id INTEGER NOT NULL,
                created_at TEXT NOT NULL,
                payload TEXT NOT NULL DEFAULT 'null',
                ingested_at TEXT NOT NULL,
                PRIMARY KEY (source_system, id)
            )
        "#;

        let create_indexes_sql = r#"
            CREATE INDEX IF NOT EXISTS idx_events_source_created_at ON events (source_system, created_at)
        "#;

        sqlx::query(create_events_sql).execute(&self.pool).await?;
        sqlx::query(create_indexes_sql).execute(&self.pool).await?;

        Ok(())
    }
}
