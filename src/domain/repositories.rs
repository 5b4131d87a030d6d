//! Collaborator interfaces consumed by the reconciliation engine
//!
//! Contains trait definitions for the record store and the two ingestion
//! drivers. Implementations live in the infrastructure layer (store) or are
//! provided by the embedding application (scrapers and writers).

use async_trait::async_trait;
use anyhow::Result;
use chrono::{DateTime, Utc};
use std::collections::BTreeSet;
use crate::domain::events::{Event, EventId, ScrapeWindow, SourceSystem};

/// Durable keyed storage of ingested events
#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Maximum `created_at` among events tagged with `system`. Pure read.
    async fn latest_timestamp(&self, system: SourceSystem) -> Result<Option<DateTime<Utc>>>;

    /// All identifiers known for `system`, ascending.
    async fn list_ids(&self, system: SourceSystem) -> Result<BTreeSet<EventId>>;

    /// Idempotently persist a batch; an already stored `(system, id)` is overwritten.
    async fn upsert(&self, events: &[Event]) -> Result<u64>;

    async fn find_event(&self, system: SourceSystem, id: EventId) -> Result<Option<Event>>;
}

/// Scrape client for one external system
#[async_trait]
pub trait IngestionDriver: Send + Sync {
    fn system(&self) -> SourceSystem;

    async fn scrape(&self, window: &ScrapeWindow) -> Result<Vec<Event>>;
}

/// Write client creating entries in the target system
#[async_trait]
pub trait TargetWriter: Send + Sync {
    async fn create_entry(&self, event: &Event) -> Result<()>;
}
