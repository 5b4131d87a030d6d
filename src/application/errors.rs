//! Error types for engine operations
//!
//! Each variant maps deterministically to a response class through
//! [`SyncError::status_code`], so the boundary layer never inspects messages.

use thiserror::Error;

use crate::domain::events::{EventId, SourceSystem};

#[derive(Error, Debug)]
pub enum SyncError {
    /// Input rejected before any I/O
    #[error("{message}")]
    Validation { message: String },

    /// The sync gate is already held; no work was performed
    #[error("Sync already in progress. Please wait for it to finish.")]
    Conflict,

    #[error("{} scrape failed: {detail}", .system.display_name())]
    UpstreamIngestion { system: SourceSystem, detail: String },

    /// Target write failed partway through a batch
    #[error("Failed to create entry for event {event_id} ({completed}/{total} created): {detail}")]
    Replay {
        event_id: EventId,
        completed: u64,
        total: u64,
        detail: String,
    },

    #[error("Record store error: {0}")]
    Storage(#[from] anyhow::Error),
}

impl SyncError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation { message: message.into() }
    }

    pub fn ingestion(system: SourceSystem, err: &anyhow::Error) -> Self {
        Self::UpstreamIngestion {
            system,
            detail: format!("{err:#}"),
        }
    }

    /// HTTP-equivalent status code for this failure
    #[must_use]
    pub const fn status_code(&self) -> u16 {
        match self {
            Self::Validation { .. } => 400,
            Self::Conflict => 409,
            Self::UpstreamIngestion { .. } | Self::Replay { .. } | Self::Storage(_) => 500,
        }
    }

    #[must_use]
    pub const fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict)
    }
}

/// Stage of a trimmed run
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStage {
    Scrape,
    ComputeMissing,
    Replay,
}

impl RunStage {
    const fn failure_prefix(self) -> &'static str {
        match self {
            Self::Scrape => "Famly scrape failed",
            Self::ComputeMissing => "Failed to determine missing events",
            Self::Replay => "Syncing missing events failed",
        }
    }
}

/// Failure of a trimmed run, tagged with the stage that failed
#[derive(Error, Debug)]
#[error("{}: {}", .stage.failure_prefix(), .source.detail())]
pub struct TrimmedRunError {
    pub stage: RunStage,
    #[source]
    pub source: SyncError,
}

impl TrimmedRunError {
    pub const fn new(stage: RunStage, source: SyncError) -> Self {
        Self { stage, source }
    }

    #[must_use]
    pub const fn status_code(&self) -> u16 {
        self.source.status_code()
    }
}

impl SyncError {
    /// Message without the per-system prefix, for stage-prefixed reports
    fn detail(&self) -> String {
        match self {
            Self::UpstreamIngestion { detail, .. } => detail.clone(),
            other => other.to_string(),
        }
    }
}
