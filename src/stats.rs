//! Ingestion statistics.
//!
//! Counts what the stream consumer has recorded, per event kind, and how many
//! non-post messages it passed over. Counters are atomic so the consumer
//! thread and the main thread can share one instance.

use crate::core::classify::EventKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Live counters for one stream session, optionally carried across sessions.
#[derive(Debug)]
pub struct IngestStats {
    originals: AtomicU64,
    retweets: AtomicU64,
    quotes: AtomicU64,
    replies: AtomicU64,
    /// Stream messages that were not posts
    ignored: AtomicU64,
    session_start: DateTime<Utc>,
    persist_path: Option<PathBuf>,
}

impl IngestStats {
    pub fn new() -> Self {
        Self {
            originals: AtomicU64::new(0),
            retweets: AtomicU64::new(0),
            quotes: AtomicU64::new(0),
            replies: AtomicU64::new(0),
            ignored: AtomicU64::new(0),
            session_start: Utc::now(),
            persist_path: None,
        }
    }

    /// Create statistics that start from, and save back to, `path`.
    pub fn with_persistence(path: PathBuf) -> Self {
        let mut stats = Self::new();
        stats.persist_path = Some(path);

        if let Err(e) = stats.load() {
            tracing::warn!("could not load previous ingestion stats: {e}");
        }

        stats
    }

    fn counter(&self, kind: EventKind) -> &AtomicU64 {
        match kind {
            EventKind::Original => &self.originals,
            EventKind::Retweet => &self.retweets,
            EventKind::Quote => &self.quotes,
            EventKind::Reply => &self.replies,
        }
    }

    /// Record one appended event.
    pub fn record_event(&self, kind: EventKind) {
        self.counter(kind).fetch_add(1, Ordering::Relaxed);
    }

    /// Record one stream message that was not a post.
    pub fn record_ignored(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            originals: self.originals.load(Ordering::Relaxed),
            retweets: self.retweets.load(Ordering::Relaxed),
            quotes: self.quotes.load(Ordering::Relaxed),
            replies: self.replies.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            session_start: self.session_start,
            session_duration_secs: (Utc::now() - self.session_start).num_seconds().max(0) as u64,
        }
    }

    /// Summary for display at the end of a session.
    pub fn summary(&self) -> String {
        let s = self.snapshot();
        format!(
            "Ingestion Statistics:\n\
             - Events recorded: {}\n\
             -   original posts: {}\n\
             -   retweets: {}\n\
             -   quotes: {}\n\
             -   replies: {}\n\
             - Other stream messages: {}\n\
             - Session duration: {} seconds",
            s.recorded(),
            s.originals,
            s.retweets,
            s.quotes,
            s.replies,
            s.ignored,
            s.session_duration_secs
        )
    }

    /// Save counters to disk.
    pub fn save(&self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }

            let s = self.snapshot();
            let persisted = PersistedStats {
                originals: s.originals,
                retweets: s.retweets,
                quotes: s.quotes,
                replies: s.replies,
                ignored: s.ignored,
                last_updated: Utc::now(),
            };
            let json = serde_json::to_string_pretty(&persisted).map_err(std::io::Error::other)?;
            std::fs::write(path, json)?;
        }
        Ok(())
    }

    fn load(&mut self) -> Result<(), std::io::Error> {
        if let Some(ref path) = self.persist_path {
            if path.exists() {
                let persisted = load_persisted(path)?;
                self.originals.store(persisted.originals, Ordering::Relaxed);
                self.retweets.store(persisted.retweets, Ordering::Relaxed);
                self.quotes.store(persisted.quotes, Ordering::Relaxed);
                self.replies.store(persisted.replies, Ordering::Relaxed);
                self.ignored.store(persisted.ignored, Ordering::Relaxed);
            }
        }
        Ok(())
    }
}

impl Default for IngestStats {
    fn default() -> Self {
        Self::new()
    }
}

/// Point-in-time copy of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub originals: u64,
    pub retweets: u64,
    pub quotes: u64,
    pub replies: u64,
    pub ignored: u64,
    pub session_start: DateTime<Utc>,
    pub session_duration_secs: u64,
}

impl StatsSnapshot {
    pub fn recorded(&self) -> u64 {
        self.originals + self.retweets + self.quotes + self.replies
    }
}

/// On-disk form of the counters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistedStats {
    pub originals: u64,
    pub retweets: u64,
    pub quotes: u64,
    pub replies: u64,
    pub ignored: u64,
    pub last_updated: DateTime<Utc>,
}

/// Read persisted counters without starting a session.
pub fn load_persisted(path: &std::path::Path) -> Result<PersistedStats, std::io::Error> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(std::io::Error::other)
}

/// Thread-safe shared statistics.
pub type SharedStats = Arc<IngestStats>;
