//! Bot of the Day - watches one social account and names its busiest interactor.
//!
//! The library records every post in the live activity around a monitored
//! account (its own posts, and other accounts retweeting, quoting or replying
//! to it) into an append-only event log. Reports read that log back, pick the
//! account that interacted most over the last day, and summarize both
//! timelines as hourly activity and mention counts.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────┐
//! │                        Bot of the Day                        │
//! ├──────────────────────────────────────────────────────────────┤
//! │  ┌────────────┐   ┌────────────┐   ┌────────────┐            │
//! │  │  Platform  │──▶│  Consumer  │──▶│ Event Log  │            │
//! │  │  (stream)  │   │ (classify) │   │  (append)  │            │
//! │  └────────────┘   └────────────┘   └────────────┘            │
//! │        │                                 │                   │
//! │        │ timelines                       ▼ scan              │
//! │        │                          ┌────────────┐             │
//! │        └─────────────────────────▶│ Aggregator │             │
//! │                                   └────────────┘             │
//! │                                          │                   │
//! │                                          ▼                   │
//! │                                   ┌────────────┐             │
//! │                                   │   Report   │──▶ CSV, post│
//! │                                   └────────────┘             │
//! └──────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use botoftheday::{core::EventStore, core::InteractorWindow, core::top_interactor};
//!
//! let store = EventStore::for_account("./data".as_ref(), "watched");
//! let records = store.records().expect("event log is readable");
//! let top = top_interactor(&records, &InteractorWindow::default(), "watched", chrono::Utc::now());
//! println!("{top:?}");
//! ```

pub mod config;
pub mod core;
pub mod ingest;
pub mod platform;
pub mod report;
pub mod stats;

// Re-export key types at crate root for convenience
pub use config::{Config, ConfigError, Credentials};
pub use core::{EventKind, EventRecord, EventStore, TimelineSummary};
pub use ingest::StreamConsumer;
pub use platform::{PlatformApi, PlatformError, ReplayPlatform};
pub use report::{PublishOutcome, Report, ReportDriver, ReportError};
pub use stats::{IngestStats, SharedStats};

#[cfg(feature = "http")]
pub use platform::HttpPlatform;

/// Library version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
