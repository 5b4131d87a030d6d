//! Test utilities for famly-sync
//!
//! Scripted ingestion drivers and target writers that record what they were
//! asked to do, plus a [`TestContext`] wiring an engine over a fresh
//! in-memory SQLite store. Each test gets its own isolated state.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use tokio::sync::Notify;

use crate::application::{ProgressTracker, ReconciliationEngine, SyncGate};
use crate::domain::events::{Event, EventId, ScrapeWindow, SourceSystem};
use crate::domain::repositories::{EventRepository, IngestionDriver, TargetWriter};
use crate::infrastructure::config::SyncConfig;
use crate::infrastructure::{DatabaseConnection, SqliteEventRepository};

/// Deterministic timestamp for a seeded event
pub fn event_time(id: EventId) -> DateTime<Utc> {
    // 2024-01-01T00:00:00Z
    DateTime::from_timestamp(1_704_067_200, 0).unwrap_or_default() + Duration::minutes(id)
}

pub fn sample_event(system: SourceSystem, id: EventId) -> Event {
    Event::new(id, system, event_time(id)).with_payload(serde_json::json!({ "id": id }))
}

/// Ingestion driver returning a fixed batch, or failing
pub struct ScriptedDriver {
    system: SourceSystem,
    events: Mutex<Vec<Event>>,
    failure: Mutex<Option<String>>,
    windows: Mutex<Vec<ScrapeWindow>>,
}

impl ScriptedDriver {
    pub fn new(system: SourceSystem) -> Self {
        Self {
            system,
            events: Mutex::new(Vec::new()),
            failure: Mutex::new(None),
            windows: Mutex::new(Vec::new()),
        }
    }

    /// Events returned by every subsequent scrape
    pub fn set_events(&self, events: Vec<Event>) {
        *self.events.lock().unwrap_or_else(PoisonError::into_inner) = events;
    }

    pub fn set_ids(&self, ids: &[EventId]) {
        self.set_events(ids.iter().map(|&id| sample_event(self.system, id)).collect());
    }

    pub fn fail_with(&self, message: &str) {
        *self.failure.lock().unwrap_or_else(PoisonError::into_inner) = Some(message.to_string());
    }

    pub fn calls(&self) -> usize {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn windows(&self) -> Vec<ScrapeWindow> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }
}

#[async_trait]
impl IngestionDriver for ScriptedDriver {
    fn system(&self) -> SourceSystem {
        self.system
    }

    async fn scrape(&self, window: &ScrapeWindow) -> Result<Vec<Event>> {
        self.windows.lock().unwrap_or_else(PoisonError::into_inner).push(*window);
        if let Some(message) = self.failure.lock().unwrap_or_else(PoisonError::into_inner).clone() {
            return Err(anyhow!(message));
        }
        Ok(self.events.lock().unwrap_or_else(PoisonError::into_inner).clone())
    }
}

/// Target writer recording created ids in call order
#[derive(Default)]
pub struct RecordingWriter {
    created: Mutex<Vec<EventId>>,
    attempts: AtomicUsize,
    fail_on: Mutex<Option<EventId>>,
    hold: Mutex<Option<Arc<WriterHold>>>,
}

/// Parks the first write until released, so a test can observe a run mid-flight
#[derive(Default)]
pub struct WriterHold {
    entered: Notify,
    release: Notify,
}

impl WriterHold {
    pub async fn wait_until_entered(&self) {
        self.entered.notified().await;
    }

    pub fn release(&self) {
        self.release.notify_one();
    }
}

impl RecordingWriter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fail_on(&self, id: EventId) {
        *self.fail_on.lock().unwrap_or_else(PoisonError::into_inner) = Some(id);
    }

    pub fn hold_first_write(&self) -> Arc<WriterHold> {
        let hold = Arc::new(WriterHold::default());
        *self.hold.lock().unwrap_or_else(PoisonError::into_inner) = Some(Arc::clone(&hold));
        hold
    }

    pub fn created(&self) -> Vec<EventId> {
        self.created.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TargetWriter for RecordingWriter {
    async fn create_entry(&self, event: &Event) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        let hold = self.hold.lock().unwrap_or_else(PoisonError::into_inner).take();
        if let Some(hold) = hold {
            hold.entered.notify_one();
            hold.release.notified().await;
        }

        if *self.fail_on.lock().unwrap_or_else(PoisonError::into_inner) == Some(event.id) {
            return Err(anyhow!("Baby Connect rejected event {}", event.id));
        }
        self.created.lock().unwrap_or_else(PoisonError::into_inner).push(event.id);
        Ok(())
    }
}

/// Complete test context with store, doubles and engine initialized
pub struct TestContext {
    pub database: DatabaseConnection,
    pub repository: Arc<SqliteEventRepository>,
    pub famly: Arc<ScriptedDriver>,
    pub baby_connect: Arc<ScriptedDriver>,
    pub writer: Arc<RecordingWriter>,
    pub tracker: Arc<ProgressTracker>,
    pub gate: Arc<SyncGate>,
    pub engine: Arc<ReconciliationEngine>,
}

impl TestContext {
    pub async fn new() -> Result<Self> {
        Self::with_config(SyncConfig::default()).await
    }

    pub async fn with_config(config: SyncConfig) -> Result<Self> {
        let database = DatabaseConnection::new("sqlite::memory:").await?;
        database.migrate().await?;

        let repository = Arc::new(SqliteEventRepository::new(database.pool().clone()));
        let famly = Arc::new(ScriptedDriver::new(SourceSystem::Famly));
        let baby_connect = Arc::new(ScriptedDriver::new(SourceSystem::BabyConnect));
        let writer = Arc::new(RecordingWriter::new());
        let tracker = Arc::new(ProgressTracker::new());
        let gate = Arc::new(SyncGate::new());

        let engine = Arc::new(
            ReconciliationEngine::new(
                repository.clone(),
                famly.clone(),
                baby_connect.clone(),
                writer.clone(),
                config,
            )
            .with_tracker(tracker.clone())
            .with_gate(gate.clone()),
        );

        Ok(Self {
            database,
            repository,
            famly,
            baby_connect,
            writer,
            tracker,
            gate,
            engine,
        })
    }

    /// Store events with the given ids directly, bypassing the drivers
    pub async fn seed(&self, system: SourceSystem, ids: &[EventId]) -> Result<()> {
        let events: Vec<Event> = ids.iter().map(|&id| sample_event(system, id)).collect();
        self.repository.upsert(&events).await?;
        Ok(())
    }
}
