//! State module for tracking crawl progress
//!
//! This module provides the per-URL frontier state and the outcome ledger for
//! one crawl run.
//!
//! # Components
//!
//! - `EntryState`: Where a URL is in its lifecycle (pending, in-flight, visited)
//! - `Ledger`: Successes, failures and artifacts recorded by task completions

mod entry_state;
mod ledger;

// Re-export main types
pub use entry_state::EntryState;
pub use ledger::{Artifact, FailureRecord, Ledger};
