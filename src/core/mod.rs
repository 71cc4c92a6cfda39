//! Core pipeline for the monitored account.
//!
//! This module contains:
//! - Classification of raw posts into normalized event records
//! - The append-only event log
//! - Windowed aggregation (top interactor, hourly activity, mentions)

pub mod aggregate;
pub mod classify;
pub mod store;

// Re-export commonly used types
pub use aggregate::{
    histogram, summarize, top_interactor, Activity, HourBucket, InteractionTotals,
    InteractorWindow, Tally, TimelineSummary, Window,
};
pub use classify::{classify, EventKind, EventRecord};
pub use store::{EventStore, EventWriter, ScanError, StoreError};
