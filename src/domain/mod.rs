//! Domain module - Core types and collaborator interfaces
//!
//! This module contains the event and progress value types plus the traits
//! the reconciliation engine consumes (record store, scrapers, target writer).

pub mod events;
pub mod progress;
pub mod repositories;

// Re-export commonly used items
pub use events::{Event, EventId, ScrapeWindow, SourceSystem};
pub use progress::{ProgressEntry, ProgressStatus};
pub use repositories::{EventRepository, IngestionDriver, TargetWriter};
