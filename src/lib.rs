//! famly-sync - Famly to Baby Connect event reconciliation
//!
//! Ingests events from both systems into a SQLite record store, computes the
//! Famly events Baby Connect has not seen yet, and replays them one at a time
//! under a single-flight gate while publishing progress for observers.

// Module declarations
pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod commands;

// Scripted collaborators and engine wiring for tests and benches
pub mod test_utils;

pub use application::{AppState, ReconciliationEngine};
pub use commands::CommandError;
