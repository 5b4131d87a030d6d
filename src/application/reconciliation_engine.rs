//! Reconciliation engine: ingest, diff and replay
//!
//! The engine pulls events from either system into the record store, computes
//! the Famly ids absent from Baby Connect, and replays them into Baby Connect
//! one by one in ascending order. Replay runs under the [`SyncGate`] and
//! reports through the [`ProgressTracker`]; the first failed write stops the
//! batch.

use std::collections::BTreeSet;
use std::sync::Arc;

use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use crate::application::dto::{
    CreateEntriesResult, ReplayOutcome, ScrapeSummary, StatusReport, SyncMissingResult,
    SyncStubResult, TrimmedRunReport,
};
use crate::application::errors::{RunStage, SyncError, TrimmedRunError};
use crate::application::progress_tracker::{ProgressSnapshot, ProgressTracker};
use crate::application::sync_gate::{SyncGate, SyncGateGuard};
use crate::domain::events::{EventId, ScrapeWindow, SourceSystem};
use crate::domain::repositories::{EventRepository, IngestionDriver, TargetWriter};
use crate::infrastructure::config::SyncConfig;

const SELECTED_ENTRIES_MESSAGE: &str = "Syncing selected entries...";
const MISSING_ENTRIES_MESSAGE: &str = "Syncing missing entries...";

/// Ids present under the source tag but absent under the target tag, ascending
pub fn missing_ids(source: &BTreeSet<EventId>, target: &BTreeSet<EventId>) -> Vec<EventId> {
    source.difference(target).copied().collect()
}

/// Drop repeated ids, keeping the first occurrence of each
fn dedup_preserving_order(ids: Vec<EventId>) -> Vec<EventId> {
    let mut seen = BTreeSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

pub struct ReconciliationEngine {
    repository: Arc<dyn EventRepository>,
    famly: Arc<dyn IngestionDriver>,
    baby_connect: Arc<dyn IngestionDriver>,
    writer: Arc<dyn TargetWriter>,
    tracker: Arc<ProgressTracker>,
    gate: Arc<SyncGate>,
    config: SyncConfig,
}

impl ReconciliationEngine {
    pub fn new(
        repository: Arc<dyn EventRepository>,
        famly: Arc<dyn IngestionDriver>,
        baby_connect: Arc<dyn IngestionDriver>,
        writer: Arc<dyn TargetWriter>,
        config: SyncConfig,
    ) -> Self {
        Self {
            repository,
            famly,
            baby_connect,
            writer,
            tracker: Arc::new(ProgressTracker::new()),
            gate: Arc::new(SyncGate::new()),
            config,
        }
    }

    #[must_use]
    pub fn with_tracker(mut self, tracker: Arc<ProgressTracker>) -> Self {
        self.tracker = tracker;
        self
    }

    #[must_use]
    pub fn with_gate(mut self, gate: Arc<SyncGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn tracker(&self) -> &Arc<ProgressTracker> {
        &self.tracker
    }

    pub fn gate(&self) -> &Arc<SyncGate> {
        &self.gate
    }

    pub const fn config(&self) -> &SyncConfig {
        &self.config
    }

    fn driver(&self, system: SourceSystem) -> &Arc<dyn IngestionDriver> {
        match system {
            SourceSystem::Famly => &self.famly,
            SourceSystem::BabyConnect => &self.baby_connect,
        }
    }

    fn progress_name(&self) -> &str {
        &self.config.progress_name
    }

    /// Validate `days_back` against the ceiling configured for `system`
    pub fn check_days_back(&self, system: SourceSystem, days_back: i64) -> Result<u32, SyncError> {
        let max = self.config.max_days_back(system);
        u32::try_from(days_back)
            .ok()
            .filter(|days| *days <= max)
            .ok_or_else(|| {
                SyncError::validation(format!(
                    "days_back must be between 0 and {max} for {system}, got {days_back}"
                ))
            })
    }

    // ------------------------------------------------------------------
    // Ingest
    // ------------------------------------------------------------------

    /// Scrape `days_back` previous days (0 = today only) and persist the
    /// result. Out-of-range input is rejected before any driver call.
    #[instrument(name = "ingest", skip(self), fields(run_id = %Uuid::new_v4()))]
    pub async fn ingest(&self, system: SourceSystem, days_back: i64) -> Result<u64, SyncError> {
        let days_back = self.check_days_back(system, days_back)?;
        let window = ScrapeWindow::ending_now(days_back);
        let name = system.progress_name();

        self.tracker.start(name, 1);
        self.tracker.set_message(
            name,
            format!("Scraping {} (days_back={})...", system.display_name(), days_back),
        );

        match self.scrape_and_store(system, &window).await {
            Ok(count) => {
                self.tracker.advance(name, 1);
                self.tracker.set_message(name, format!("Stored {count} {} events", system.display_name()));
                self.tracker.finish(name);
                info!("Ingested {} {} events (days_back={})", count, system, days_back);
                Ok(count)
            }
            Err(err) => {
                error!("{} ingestion failed: {}", system, err);
                self.tracker.fail(name, err.to_string());
                Err(err)
            }
        }
    }

    async fn scrape_and_store(&self, system: SourceSystem, window: &ScrapeWindow) -> Result<u64, SyncError> {
        let events = self
            .driver(system)
            .scrape(window)
            .await
            .map_err(|err| SyncError::ingestion(system, &err))?;

        if let Some(foreign) = events.iter().find(|event| event.source_system != system) {
            return Err(SyncError::UpstreamIngestion {
                system,
                detail: format!(
                    "driver returned event {} tagged {}",
                    foreign.id, foreign.source_system
                ),
            });
        }

        self.repository.upsert(&events).await?;
        Ok(events.len() as u64)
    }

    pub async fn scrape_source(&self, days_back: i64) -> Result<ScrapeSummary, SyncError> {
        let scraped = self.ingest(SourceSystem::Famly, days_back).await?;
        let days_back = self.check_days_back(SourceSystem::Famly, days_back)?;
        Ok(ScrapeSummary::new(scraped, days_back))
    }

    pub async fn scrape_target(&self, days_back: i64) -> Result<ScrapeSummary, SyncError> {
        let scraped = self.ingest(SourceSystem::BabyConnect, days_back).await?;
        let days_back = self.check_days_back(SourceSystem::BabyConnect, days_back)?;
        Ok(ScrapeSummary::new(scraped, days_back))
    }

    // ------------------------------------------------------------------
    // Diff
    // ------------------------------------------------------------------

    /// Famly ids absent from Baby Connect, ascending. Pure read; no gate.
    pub async fn compute_missing(&self) -> Result<Vec<EventId>, SyncError> {
        let source = self.repository.list_ids(SourceSystem::Famly).await?;
        let target = self.repository.list_ids(SourceSystem::BabyConnect).await?;
        let missing = missing_ids(&source, &target);
        debug!(
            "Computed {} missing events ({} famly, {} baby_connect)",
            missing.len(),
            source.len(),
            target.len()
        );
        Ok(missing)
    }

    // ------------------------------------------------------------------
    // Replay
    // ------------------------------------------------------------------

    /// Create the given Famly events in Baby Connect, in input order.
    ///
    /// Requires the sync gate. Stops at the first failed write, records it on
    /// the progress entry and returns the failure. The caller clears the
    /// progress entry once it has read the final state.
    pub async fn replay_missing(
        &self,
        _gate: &SyncGateGuard<'_>,
        ids: &[EventId],
        message: &str,
    ) -> Result<ReplayOutcome, SyncError> {
        debug_assert!(self.gate.is_held());
        if ids.is_empty() {
            return Err(SyncError::validation("no event ids to replay"));
        }

        let name = self.progress_name();
        let total = ids.len() as u64;
        self.tracker.start(name, total);
        self.tracker.set_message(name, message);

        for (completed, &id) in (0_u64..).zip(ids) {
            if let Err(detail) = self.create_entry(id).await {
                let err = SyncError::Replay {
                    event_id: id,
                    completed,
                    total,
                    detail,
                };
                error!("Replay stopped: {}", err);
                self.tracker.fail(name, err.to_string());
                return Err(err);
            }
            self.tracker.advance(name, 1);
        }

        self.tracker.finish(name);
        info!("Created {} Baby Connect entries", total);
        Ok(ReplayOutcome {
            created: total,
            synced_event_ids: ids.to_vec(),
        })
    }

    async fn create_entry(&self, id: EventId) -> Result<(), String> {
        let event = self
            .repository
            .find_event(SourceSystem::Famly, id)
            .await
            .map_err(|err| format!("{err:#}"))?
            .ok_or_else(|| format!("event {id} is not stored for famly"))?;

        self.writer
            .create_entry(&event)
            .await
            .map_err(|err| format!("{err:#}"))
    }

    fn acquire_gate(&self) -> Result<SyncGateGuard<'_>, SyncError> {
        self.gate.try_lock().ok_or_else(|| {
            warn!("Sync requested while another sync holds the gate");
            SyncError::Conflict
        })
    }

    /// Replay an explicit list of Famly ids under the gate
    #[instrument(name = "create_entries", skip(self, ids), fields(run_id = %Uuid::new_v4(), requested = ids.len()))]
    pub async fn create_entries(&self, ids: Vec<EventId>) -> Result<CreateEntriesResult, SyncError> {
        let ids = dedup_preserving_order(ids);
        if ids.is_empty() {
            return Err(SyncError::validation("event_ids must not be empty"));
        }

        let gate = self.acquire_gate()?;
        let _clear = self.tracker.clear_on_drop(self.progress_name());
        info!("Creating {} Baby Connect entries", ids.len());

        self.replay_missing(&gate, &ids, SELECTED_ENTRIES_MESSAGE)
            .await
            .map(CreateEntriesResult::from)
    }

    /// Compute missing ids and replay them under the gate.
    ///
    /// With nothing missing the gate is released immediately and the call
    /// returns `created: 0` with an empty id list.
    #[instrument(name = "sync_missing", skip(self), fields(run_id = %Uuid::new_v4()))]
    pub async fn sync_missing(&self) -> Result<SyncMissingResult, SyncError> {
        let gate = self.acquire_gate()?;

        let missing = self.compute_missing().await?;
        if missing.is_empty() {
            drop(gate);
            info!("No missing events to sync");
            return Ok(SyncMissingResult::nothing_missing());
        }

        let _clear = self.tracker.clear_on_drop(self.progress_name());
        info!("Syncing {} missing events", missing.len());
        let outcome = self.replay_missing(&gate, &missing, MISSING_ENTRIES_MESSAGE).await?;
        Ok(SyncMissingResult::replayed(missing, outcome))
    }

    /// Famly scrape, diff, then replay of whatever is missing
    #[instrument(name = "run_trimmed", skip(self), fields(run_id = %Uuid::new_v4()))]
    pub async fn run_trimmed(&self, days_back: Option<i64>) -> Result<TrimmedRunReport, TrimmedRunError> {
        let days_back = days_back.unwrap_or_else(|| i64::from(self.config.trimmed_run_default_days_back));
        info!("Trimmed sync run requested (days_back={})", days_back);

        let validated_days = self
            .check_days_back(SourceSystem::Famly, days_back)
            .map_err(|err| TrimmedRunError::new(RunStage::Scrape, err))?;
        let scraped = self
            .ingest(SourceSystem::Famly, days_back)
            .await
            .map_err(|err| TrimmedRunError::new(RunStage::Scrape, err))?;

        let missing = self
            .compute_missing()
            .await
            .map_err(|err| TrimmedRunError::new(RunStage::ComputeMissing, err))?;

        let mut report = TrimmedRunReport::scraped(scraped, validated_days, missing.clone());
        if missing.is_empty() {
            return Ok(report);
        }

        let gate = self
            .acquire_gate()
            .map_err(|err| TrimmedRunError::new(RunStage::Replay, err))?;
        let _clear = self.tracker.clear_on_drop(self.progress_name());
        let outcome = self
            .replay_missing(&gate, &missing, MISSING_ENTRIES_MESSAGE)
            .await
            .map_err(|err| TrimmedRunError::new(RunStage::Replay, err))?;
        report.apply(outcome);
        Ok(report)
    }

    // ------------------------------------------------------------------
    // Read side
    // ------------------------------------------------------------------

    pub fn progress(&self) -> ProgressSnapshot {
        self.tracker.snapshot()
    }

    async fn latest_or_none(&self, system: SourceSystem) -> Option<chrono::DateTime<chrono::Utc>> {
        self.repository
            .latest_timestamp(system)
            .await
            .map_err(|err| warn!("Could not read latest {} timestamp: {:#}", system, err))
            .ok()
            .flatten()
    }

    /// Aggregate status; never fails, store errors degrade to absent timestamps
    pub async fn status(&self) -> StatusReport {
        let progress = self.tracker.snapshot();
        let sync_in_progress = progress.values().any(|entry| entry.is_running());
        let famly_last = self.latest_or_none(SourceSystem::Famly).await;
        let baby_connect_last = self.latest_or_none(SourceSystem::BabyConnect).await;

        StatusReport {
            last_sync_at: baby_connect_last.or(famly_last),
            famly_last_scrape_at: famly_last,
            baby_connect_last_scrape_at: baby_connect_last,
            sync_in_progress,
            sync_status: (if sync_in_progress { "running" } else { "idle" }).to_string(),
            progress,
        }
    }

    /// Report what a sync would do without taking the gate
    pub async fn sync_stub(&self) -> SyncStubResult {
        let pending = match self.compute_missing().await {
            Ok(missing) => Some(missing.len() as u64),
            Err(err) => {
                warn!("Sync stub could not compute missing events: {}", err);
                None
            }
        };
        SyncStubResult::new(pending)
    }
}
