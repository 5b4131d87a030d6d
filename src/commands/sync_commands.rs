use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::application::dto::{
    CreateEntriesResult, ScrapeSummary, StatusReport, SyncMissingResult, SyncStubResult,
    TrimmedRunReport,
};
use crate::application::errors::{SyncError, TrimmedRunError};
use crate::application::progress_tracker::ProgressSnapshot;
use crate::application::AppState;
use crate::domain::events::EventId;

/// Boundary error: an HTTP-equivalent status code plus a detail string
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
#[error("{status}: {detail}")]
pub struct CommandError {
    pub status: u16,
    pub detail: String,
}

impl From<SyncError> for CommandError {
    fn from(err: SyncError) -> Self {
        let status = err.status_code();
        if status >= 500 {
            warn!("Command failed: {}", err);
        }
        Self { status, detail: err.to_string() }
    }
}

impl From<TrimmedRunError> for CommandError {
    fn from(err: TrimmedRunError) -> Self {
        warn!("Trimmed run failed in {:?} stage: {}", err.stage, err);
        Self {
            status: err.status_code(),
            detail: err.to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ScrapeRequest {
    pub days_back: i64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RunRequest {
    #[serde(default)]
    pub days_back: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CreateEntriesRequest {
    pub event_ids: Vec<EventId>,
}

pub async fn get_status(state: &AppState) -> Result<StatusReport, CommandError> {
    Ok(state.engine.status().await)
}

pub async fn get_progress(state: &AppState) -> Result<ProgressSnapshot, CommandError> {
    Ok(state.engine.progress())
}

pub async fn scrape_famly(state: &AppState, request: ScrapeRequest) -> Result<ScrapeSummary, CommandError> {
    Ok(state.engine.scrape_source(request.days_back).await?)
}

pub async fn scrape_baby_connect(
    state: &AppState,
    request: ScrapeRequest,
) -> Result<ScrapeSummary, CommandError> {
    Ok(state.engine.scrape_target(request.days_back).await?)
}

pub async fn sync_stub(state: &AppState) -> Result<SyncStubResult, CommandError> {
    Ok(state.engine.sync_stub().await)
}

pub async fn create_entries(
    state: &AppState,
    request: CreateEntriesRequest,
) -> Result<CreateEntriesResult, CommandError> {
    info!("create_entries requested for {} ids", request.event_ids.len());
    Ok(state.engine.create_entries(request.event_ids).await?)
}

pub async fn sync_missing(state: &AppState) -> Result<SyncMissingResult, CommandError> {
    Ok(state.engine.sync_missing().await?)
}

/// Status view for Home Assistant; same aggregate as [`get_status`]
pub async fn homeassistant_status(state: &AppState) -> Result<StatusReport, CommandError> {
    get_status(state).await
}

/// Trimmed run for Home Assistant: Famly scrape, diff, replay
pub async fn homeassistant_run(state: &AppState, request: RunRequest) -> Result<TrimmedRunReport, CommandError> {
    Ok(state.engine.run_trimmed(request.days_back).await?)
}
