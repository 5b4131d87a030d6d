//! Application state shared with the command layer
//!
//! `AppState` bundles the engine with the configuration it was built from.
//! The engine owns the process-wide tracker and gate, so every command that
//! receives the same `AppState` observes the same progress and contends on
//! the same gate.

use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;

use crate::application::reconciliation_engine::ReconciliationEngine;
use crate::domain::repositories::{IngestionDriver, TargetWriter};
use crate::infrastructure::config::AppConfig;
use crate::infrastructure::{DatabaseConnection, SqliteEventRepository};

#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<ReconciliationEngine>,
    pub config: Arc<AppConfig>,
}

impl AppState {
    pub fn new(engine: Arc<ReconciliationEngine>, config: AppConfig) -> Self {
        Self {
            engine,
            config: Arc::new(config),
        }
    }

    /// Open and migrate the configured record store, then wire the engine
    /// over it with the given drivers.
    pub async fn initialize(
        config: AppConfig,
        famly: Arc<dyn IngestionDriver>,
        baby_connect: Arc<dyn IngestionDriver>,
        writer: Arc<dyn TargetWriter>,
    ) -> Result<Self> {
        let database = DatabaseConnection::from_config(&config.database)
            .await
            .with_context(|| format!("Failed to open record store at {}", config.database.url))?;
        database.migrate().await.context("Failed to migrate record store")?;
        info!("Record store ready at {}", config.database.url);

        let repository = Arc::new(SqliteEventRepository::new(database.pool().clone()));
        let engine = ReconciliationEngine::new(repository, famly, baby_connect, writer, config.sync.clone());
        Ok(Self::new(Arc::new(engine), config))
    }
}
