//! Stream consumer.
//!
//! Drains the platform's message channel on its own thread, classifies each
//! post and appends it to the event log in arrival order. Between receives it
//! checks a shared running flag, which the signal handler clears.

use crate::core::classify::{classify, EventRecord};
use crate::core::store::{EventWriter, StoreError};
use crate::platform::types::StreamMessage;
use crate::stats::SharedStats;
use crossbeam_channel::{Receiver, RecvTimeoutError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

/// How long a receive waits before re-checking the running flag.
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Why consumption stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConsumeOutcome {
    /// The running flag was cleared
    Cancelled,
    /// The producer dropped its end of the channel
    ChannelClosed,
}

/// Result of a consumer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConsumeReport {
    pub outcome: ConsumeOutcome,
    /// Records appended during this run
    pub appended: u64,
}

/// Single consumer of the live stream for one account.
pub struct StreamConsumer {
    writer: EventWriter,
    stats: SharedStats,
    running: Arc<AtomicBool>,
    poll_interval: Duration,
}

impl StreamConsumer {
    pub fn new(writer: EventWriter, stats: SharedStats, running: Arc<AtomicBool>) -> Self {
        Self {
            writer,
            stats,
            running,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }

    pub fn with_poll_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    /// Handle one message. Returns the appended record for posts.
    pub fn handle(&mut self, message: StreamMessage) -> Result<Option<EventRecord>, StoreError> {
        match message {
            StreamMessage::Tweet(tweet) => {
                let record = classify(&tweet);
                self.writer.append(&record)?;
                self.stats.record_event(record.kind);
                Ok(Some(record))
            }
            StreamMessage::Other(value) => {
                tracing::debug!(payload = %value, "ignoring non-post stream message");
                self.stats.record_ignored();
                Ok(None)
            }
        }
    }

    /// Consume until the channel closes or the running flag is cleared.
    ///
    /// `on_record` sees every appended record, after it is on disk. An append
    /// failure stops consumption and is returned.
    pub fn consume<F>(
        &mut self,
        receiver: &Receiver<StreamMessage>,
        mut on_record: F,
    ) -> Result<ConsumeReport, StoreError>
    where
        F: FnMut(&EventRecord),
    {
        let mut appended = 0;

        while self.running.load(Ordering::SeqCst) {
            match receiver.recv_timeout(self.poll_interval) {
                Ok(message) => {
                    if let Some(record) = self.handle(message)? {
                        appended += 1;
                        on_record(&record);
                    }
                }
                Err(RecvTimeoutError::Timeout) => continue,
                Err(RecvTimeoutError::Disconnected) => {
                    tracing::info!(appended, "stream channel closed");
                    return Ok(ConsumeReport {
                        outcome: ConsumeOutcome::ChannelClosed,
                        appended,
                    });
                }
            }
        }

        // Whatever is still queued in the channel is dropped.
        tracing::info!(
            appended,
            pending = receiver.len(),
            "stream consumer cancelled"
        );
        Ok(ConsumeReport {
            outcome: ConsumeOutcome::Cancelled,
            appended,
        })
    }

    /// Run [`consume`](Self::consume) on a dedicated thread.
    pub fn spawn<F>(
        mut self,
        receiver: Receiver<StreamMessage>,
        on_record: F,
    ) -> std::io::Result<JoinHandle<Result<ConsumeReport, StoreError>>>
    where
        F: FnMut(&EventRecord) + Send + 'static,
    {
        thread::Builder::new()
            .name("stream-consumer".to_string())
            .spawn(move || self.consume(&receiver, on_record))
    }
}

/// Tab-separated echo of a record, as printed while streaming.
pub fn echo_line(record: &EventRecord) -> String {
    let timestamp = record
        .timestamp
        .as_ref()
        .map(crate::core::classify::format_timestamp)
        .unwrap_or_default();
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}",
        record.kind, timestamp, record.actor, record.source_client, record.location, record.text
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classify::EventKind;
    use crate::core::store::EventStore;
    use crate::platform::types::{Tweet, User};
    use crate::stats::IngestStats;
    use crossbeam_channel::unbounded;

    fn post(screen_name: &str, text: &str) -> StreamMessage {
        StreamMessage::Tweet(Tweet {
            created_at: "Wed Oct 10 20:19:24 +0000 2018".to_string(),
            text: text.to_string(),
            source: "web".to_string(),
            user: User {
                id_str: "1".to_string(),
                screen_name: screen_name.to_string(),
                location: None,
            },
            ..Default::default()
        })
    }

    fn consumer(store: &EventStore, running: Arc<AtomicBool>) -> (StreamConsumer, SharedStats) {
        let stats: SharedStats = Arc::new(IngestStats::new());
        let consumer = StreamConsumer::new(store.open_writer().unwrap(), stats.clone(), running)
            .with_poll_interval(Duration::from_millis(10));
        (consumer, stats)
    }

    #[test]
    fn test_appends_in_channel_order_until_closed() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::for_account(dir.path(), "watched");
        let (mut consumer, stats) = consumer(&store, Arc::new(AtomicBool::new(true)));

        let (sender, receiver) = unbounded();
        sender.send(post("alice", "one")).unwrap();
        sender
            .send(StreamMessage::Other(serde_json::json!({"limit": {"track": 1}})))
            .unwrap();
        sender.send(post("bob", "two")).unwrap();
        sender.send(post("carol", "three")).unwrap();
        drop(sender);

        let mut echoed = Vec::new();
        let report = consumer
            .consume(&receiver, |r| echoed.push(r.actor.clone()))
            .unwrap();

        assert_eq!(report.outcome, ConsumeOutcome::ChannelClosed);
        assert_eq!(report.appended, 3);
        assert_eq!(echoed, vec!["alice", "bob", "carol"]);

        let stored: Vec<String> = store
            .records()
            .unwrap()
            .into_iter()
            .map(|r| r.text)
            .collect();
        assert_eq!(stored, vec!["one", "two", "three"]);

        let s = stats.snapshot();
        assert_eq!(s.originals, 3);
        assert_eq!(s.ignored, 1);
    }

    #[test]
    fn test_cleared_flag_stops_without_draining() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::for_account(dir.path(), "watched");
        let (mut consumer, _) = consumer(&store, Arc::new(AtomicBool::new(false)));

        let (sender, receiver) = unbounded();
        sender.send(post("alice", "queued")).unwrap();

        let report = consumer.consume(&receiver, |_| {}).unwrap();
        assert_eq!(report.outcome, ConsumeOutcome::Cancelled);
        assert_eq!(report.appended, 0);
        assert!(store.records().unwrap().is_empty());
    }

    #[test]
    fn test_spawned_consumer_stops_on_cancel() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::for_account(dir.path(), "watched");
        let running = Arc::new(AtomicBool::new(true));
        let (consumer, _) = consumer(&store, running.clone());

        let (sender, receiver) = unbounded();
        let (seen_tx, seen_rx) = unbounded();
        let handle = consumer
            .spawn(receiver, move |r| {
                let _ = seen_tx.send(r.kind);
            })
            .unwrap();

        let mut reply = match post("bob", "re") {
            StreamMessage::Tweet(t) => t,
            StreamMessage::Other(_) => unreachable!(),
        };
        reply.in_reply_to_user_id_str = Some("1".to_string());
        sender.send(StreamMessage::Tweet(reply)).unwrap();

        assert_eq!(
            seen_rx.recv_timeout(Duration::from_secs(5)).unwrap(),
            EventKind::Reply
        );

        running.store(false, Ordering::SeqCst);
        let report = handle.join().unwrap().unwrap();
        assert_eq!(report.outcome, ConsumeOutcome::Cancelled);
        assert_eq!(report.appended, 1);

        // The producer is still alive; the consumer left on the flag alone.
        drop(sender);
    }

    #[test]
    fn test_echo_line_is_tab_separated() {
        let record = EventRecord {
            kind: EventKind::Quote,
            timestamp: None,
            actor: "alice".to_string(),
            source_client: "web".to_string(),
            location: "here".to_string(),
            text: "hi".to_string(),
        };
        assert_eq!(echo_line(&record), "QT\t\talice\tweb\there\thi");
    }
}
