//! In-memory registry of named operations and their progress
//!
//! Every mutating call is infallible by construction: an operation on an
//! absent or non-running entry is a silent no-op, so progress bookkeeping can
//! never abort the operation it is reporting on. Readers get owned copies
//! through [`ProgressTracker::snapshot`].

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::{debug, trace};

use crate::domain::progress::{ProgressEntry, ProgressStatus};

/// Immutable point-in-time copy of all entries, keyed by name
pub type ProgressSnapshot = HashMap<String, ProgressEntry>;

#[derive(Debug, Default)]
pub struct ProgressTracker {
    entries: RwLock<HashMap<String, ProgressEntry>>,
}

impl ProgressTracker {
    pub fn new() -> Self {
        Self::default()
    }

    // Mutations never leave an entry half-written, so a poisoned map is still consistent.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, ProgressEntry>> {
        self.entries.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, ProgressEntry>> {
        self.entries.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Create or replace the entry for `name` in the running state
    pub fn start(&self, name: &str, total: u64) {
        debug!("Progress '{}' started (total={})", name, total);
        self.write().insert(name.to_string(), ProgressEntry::running(name, total));
    }

    pub fn set_message(&self, name: &str, text: impl Into<String>) {
        if let Some(entry) = self.write().get_mut(name) {
            entry.message = Some(text.into());
            entry.updated_at = Utc::now();
        }
    }

    /// Increment `current` by `delta`, clamped to `total`
    pub fn advance(&self, name: &str, delta: u64) {
        let mut entries = self.write();
        let Some(entry) = entries.get_mut(name) else {
            return;
        };
        if !entry.is_running() {
            return;
        }
        entry.current = entry.current.saturating_add(delta).min(entry.total);
        entry.updated_at = Utc::now();
        trace!("Progress '{}' advanced to {}/{}", name, entry.current, entry.total);
    }

    pub fn finish(&self, name: &str) {
        let mut entries = self.write();
        if let Some(entry) = entries.get_mut(name).filter(|e| e.is_running()) {
            entry.status = ProgressStatus::Succeeded;
            entry.updated_at = Utc::now();
            debug!("Progress '{}' succeeded ({}/{})", name, entry.current, entry.total);
        }
    }

    pub fn fail(&self, name: &str, error_detail: impl Into<String>) {
        let mut entries = self.write();
        if let Some(entry) = entries.get_mut(name).filter(|e| e.is_running()) {
            entry.status = ProgressStatus::Failed;
            entry.error = Some(error_detail.into());
            entry.updated_at = Utc::now();
            debug!("Progress '{}' failed at {}/{}", name, entry.current, entry.total);
        }
    }

    /// Remove the entry for `name` regardless of its state
    pub fn clear(&self, name: &str) {
        if self.write().remove(name).is_some() {
            debug!("Progress '{}' cleared", name);
        }
    }

    pub fn get(&self, name: &str) -> Option<ProgressEntry> {
        self.read().get(name).cloned()
    }

    pub fn snapshot(&self) -> ProgressSnapshot {
        self.read().clone()
    }

    /// True iff any entry is currently running
    pub fn any_running(&self) -> bool {
        self.read().values().any(ProgressEntry::is_running)
    }

    /// Clear the entry for `name` when the returned guard drops
    pub fn clear_on_drop<'a>(&'a self, name: &'a str) -> ProgressClearGuard<'a> {
        ProgressClearGuard { tracker: self, name }
    }
}

#[derive(Debug)]
#[must_use = "the entry is cleared as soon as the guard is dropped"]
pub struct ProgressClearGuard<'a> {
    tracker: &'a ProgressTracker,
    name: &'a str,
}

impl Drop for ProgressClearGuard<'_> {
    fn drop(&mut self) {
        self.tracker.clear(self.name);
    }
}
