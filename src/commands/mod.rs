//! Command layer - request boundary over the reconciliation engine
//!
//! One async function per operation. Each takes the shared [`AppState`] and
//! returns either a serialisable response or a [`CommandError`] carrying an
//! HTTP-equivalent status code.
//!
//! [`AppState`]: crate::application::AppState
//! [`CommandError`]: sync_commands::CommandError

pub mod sync_commands;

// Re-export all commands
pub use sync_commands::*;
