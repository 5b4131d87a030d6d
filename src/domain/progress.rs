//! Progress state of named long-running operations

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Execution state of one named operation
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum ProgressStatus {
    Idle,
    Running,
    Succeeded,
    Failed,
}

impl ProgressStatus {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Running => "running",
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
        }
    }

    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed)
    }
}

/// Point-in-time state of one named operation
///
/// Readers only ever hold copies of this; the tracker owns the live value.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ProgressEntry {
    pub name: String,
    pub status: ProgressStatus,
    pub total: u64,
    /// Always `<= total`.
    pub current: u64,
    pub message: Option<String>,
    /// Present only in the `failed` state.
    pub error: Option<String>,
    pub updated_at: DateTime<Utc>,
}

impl ProgressEntry {
    pub fn running(name: impl Into<String>, total: u64) -> Self {
        Self {
            name: name.into(),
            status: ProgressStatus::Running,
            total,
            current: 0,
            message: None,
            error: None,
            updated_at: Utc::now(),
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.status == ProgressStatus::Running
    }

    /// Completion in percent, 0.0 to 100.0
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn percentage(&self) -> f64 {
        if self.total == 0 {
            return if self.status == ProgressStatus::Succeeded { 100.0 } else { 0.0 };
        }
        (self.current as f64 / self.total as f64) * 100.0
    }
}
