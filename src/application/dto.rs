//! Data Transfer Objects returned by engine operations
//!
//! Success responses always carry `status: "ok"` plus the relevant counts and
//! ids, so a caller can tell "ran with nothing to do" from "ran and did work".

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::application::progress_tracker::ProgressSnapshot;
use crate::domain::events::EventId;

pub const STATUS_OK: &str = "ok";

fn ok() -> String {
    STATUS_OK.to_string()
}

/// Outcome of a fully successful replay
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ReplayOutcome {
    pub created: u64,
    pub synced_event_ids: Vec<EventId>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatusReport {
    pub last_sync_at: Option<DateTime<Utc>>,
    pub famly_last_scrape_at: Option<DateTime<Utc>>,
    pub baby_connect_last_scrape_at: Option<DateTime<Utc>>,
    pub sync_in_progress: bool,
    /// "running" or "idle"
    pub sync_status: String,
    pub progress: ProgressSnapshot,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ScrapeSummary {
    pub status: String,
    pub scraped_count: u64,
    pub days_back: u32,
}

impl ScrapeSummary {
    pub fn new(scraped_count: u64, days_back: u32) -> Self {
        Self { status: ok(), scraped_count, days_back }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateEntriesResult {
    pub status: String,
    pub created: u64,
    pub synced_event_ids: Vec<EventId>,
}

impl From<ReplayOutcome> for CreateEntriesResult {
    fn from(outcome: ReplayOutcome) -> Self {
        Self {
            status: ok(),
            created: outcome.created,
            synced_event_ids: outcome.synced_event_ids,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncMissingResult {
    pub status: String,
    pub created: u64,
    pub missing_event_ids: Vec<EventId>,
    #[serde(default)]
    pub synced_event_ids: Vec<EventId>,
}

impl SyncMissingResult {
    pub fn nothing_missing() -> Self {
        Self {
            status: ok(),
            created: 0,
            missing_event_ids: Vec::new(),
            synced_event_ids: Vec::new(),
        }
    }

    pub fn replayed(missing_event_ids: Vec<EventId>, outcome: ReplayOutcome) -> Self {
        Self {
            status: ok(),
            created: outcome.created,
            missing_event_ids,
            synced_event_ids: outcome.synced_event_ids,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TrimmedRunReport {
    pub status: String,
    pub scraped_count: u64,
    pub days_back: u32,
    pub missing_event_ids: Vec<EventId>,
    pub synced_event_ids: Vec<EventId>,
    pub created: u64,
}

impl TrimmedRunReport {
    pub fn scraped(scraped_count: u64, days_back: u32, missing_event_ids: Vec<EventId>) -> Self {
        Self {
            status: ok(),
            scraped_count,
            days_back,
            missing_event_ids,
            synced_event_ids: Vec::new(),
            created: 0,
        }
    }

    pub fn apply(&mut self, outcome: ReplayOutcome) {
        self.created = outcome.created;
        self.synced_event_ids = outcome.synced_event_ids;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct SyncStubResult {
    pub status: String,
    pub message: String,
    /// Missing-event count; absent when it could not be computed.
    pub pending_count: Option<u64>,
}

impl SyncStubResult {
    pub fn new(pending_count: Option<u64>) -> Self {
        let message = match pending_count {
            Some(0) => "Nothing to sync".to_string(),
            Some(n) => format!("{n} event(s) pending; use sync/missing to replay them"),
            None => "Pending count unavailable".to_string(),
        };
        Self { status: ok(), message, pending_count }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_sync_missing_serializes_with_ok_status() {
        let json = serde_json::to_value(SyncMissingResult::nothing_missing()).unwrap();
        assert_eq!(json["status"], "ok");
        assert_eq!(json["created"], 0);
        assert_eq!(json["missing_event_ids"], serde_json::json!([]));
    }

    #[test]
    fn trimmed_report_takes_replay_outcome() {
        let mut report = TrimmedRunReport::scraped(5, 1, vec![3, 4]);
        report.apply(ReplayOutcome { created: 2, synced_event_ids: vec![3, 4] });
        assert_eq!(report.created, 2);
        assert_eq!(report.synced_event_ids, vec![3, 4]);
        assert_eq!(report.status, STATUS_OK);
    }

    #[test]
    fn stub_message_reflects_pending_count() {
        assert_eq!(SyncStubResult::new(Some(0)).message, "Nothing to sync");
        assert!(SyncStubResult::new(Some(3)).message.starts_with("3 event(s)"));
        assert!(SyncStubResult::new(None).pending_count.is_none());
    }
}
