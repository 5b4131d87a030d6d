//! Placeholder collaborators for processes that only read the record store
//!
//! Every call fails with a "not configured" error, which the engine surfaces
//! as an upstream ingestion or replay failure.

use anyhow::{Result, bail};
use async_trait::async_trait;

use crate::domain::events::{Event, ScrapeWindow, SourceSystem};
use crate::domain::repositories::{IngestionDriver, TargetWriter};

#[derive(Debug, Clone, Copy)]
pub struct UnavailableDriver {
    system: SourceSystem,
}

impl UnavailableDriver {
    pub const fn new(system: SourceSystem) -> Self {
        Self { system }
    }
}

#[async_trait]
impl IngestionDriver for UnavailableDriver {
    fn system(&self) -> SourceSystem {
        self.system
    }

    async fn scrape(&self, _window: &ScrapeWindow) -> Result<Vec<Event>> {
        bail!("no {} scraper is configured for this process", self.system.display_name())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct UnavailableWriter;

#[async_trait]
impl TargetWriter for UnavailableWriter {
    async fn create_entry(&self, event: &Event) -> Result<()> {
        bail!("no Baby Connect writer is configured; event {} not created", event.id)
    }
}
