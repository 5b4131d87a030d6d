//! Application layer - Engine, coordination primitives and DTOs
//!
//! This module contains the reconciliation engine together with the progress
//! tracker and sync gate it coordinates through, plus the response and error
//! types handed to the command layer.

pub mod dto;
pub mod errors;
pub mod progress_tracker;
pub mod reconciliation_engine;
pub mod state;
pub mod sync_gate;

// Re-export commonly used items
pub use dto::{
    CreateEntriesResult, ReplayOutcome, ScrapeSummary, StatusReport, SyncMissingResult,
    SyncStubResult, TrimmedRunReport,
};
pub use errors::{RunStage, SyncError, TrimmedRunError};
pub use progress_tracker::{ProgressClearGuard, ProgressSnapshot, ProgressTracker};
pub use reconciliation_engine::ReconciliationEngine;
pub use state::AppState;
pub use sync_gate::{SyncGate, SyncGateGuard};
