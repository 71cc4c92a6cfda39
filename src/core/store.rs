//! Append-only event log for one monitored account.
//!
//! Each record is one line of six double-quoted, comma-separated fields:
//! kind, timestamp, actor, source, location, text. A header row is written
//! when the file is created. There is no escaping; fields are sanitized
//! before they get here.

use crate::core::classify::{format_timestamp, parse_timestamp, EventKind, EventRecord};
use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Header row of a freshly created log. The `locaion` spelling is kept for
/// compatibility with existing logs and readers.
pub const LOG_HEADER: &str = "event,created_at,screen_name,source,locaion,text";

const FIELD_COUNT: usize = 6;

/// Errors raised by the event store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("event log {path:?} is unavailable: {source}")]
    Unavailable { path: PathBuf, source: io::Error },
    #[error("failed to append to {path:?}: {source}")]
    Append { path: PathBuf, source: io::Error },
}

/// A single line that could not be turned back into a record.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScanError {
    #[error("line {line}: expected 6 quoted fields")]
    Malformed { line: usize },
    #[error("line {line}: unknown event kind {code:?}")]
    UnknownKind { line: usize, code: String },
    #[error("line {line}: incomplete trailing record")]
    Truncated { line: usize },
    #[error("line {line}: read failed: {message}")]
    Read { line: usize, message: String },
}

/// Location of the event log for one account.
#[derive(Debug, Clone)]
pub struct EventStore {
    path: PathBuf,
}

impl EventStore {
    /// The log for `account` inside `output_dir`.
    pub fn for_account(output_dir: &Path, account: &str) -> Self {
        Self {
            path: output_dir.join(format!("{account}.tsv")),
        }
    }

    /// A log at an explicit path.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn exists(&self) -> bool {
        self.path.exists()
    }

    /// Open the log for appending, creating it with a header row if needed.
    ///
    /// Only one writer per log may be open at a time.
    pub fn open_writer(&self) -> Result<EventWriter, StoreError> {
        let unavailable = |source| StoreError::Unavailable {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(unavailable)?;
            }
        }

        let writer = match OpenOptions::new()
            .append(true)
            .create_new(true)
            .open(&self.path)
        {
            Ok(file) => {
                let mut writer = EventWriter {
                    file,
                    path: self.path.clone(),
                };
                writer.write_line(LOG_HEADER)?;
                tracing::info!(path = ?self.path, "created event log");
                writer
            }
            Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
                let mut file = OpenOptions::new()
                    .read(true)
                    .append(true)
                    .open(&self.path)
                    .map_err(unavailable)?;
                let torn = ends_mid_line(&mut file).map_err(unavailable)?;
                let mut writer = EventWriter {
                    file,
                    path: self.path.clone(),
                };
                if torn {
                    // Terminate the partial line so the next record starts clean.
                    tracing::warn!(path = ?self.path, "event log ends mid-line, closing it off");
                    writer.write_raw(b"\n")?;
                }
                writer
            }
            Err(e) => return Err(unavailable(e)),
        };
        Ok(writer)
    }

    /// Read the log from the start.
    ///
    /// Every call reopens the file. Lines that cannot be parsed come out as
    /// `Err` items and the scan carries on with the next line.
    pub fn scan(&self) -> Result<Scan, StoreError> {
        let file = File::open(&self.path).map_err(|source| StoreError::Unavailable {
            path: self.path.clone(),
            source,
        })?;
        Ok(Scan {
            reader: BufReader::new(file),
            line: 0,
            done: false,
        })
    }

    /// All records that parse, in log order. Bad lines are logged and skipped.
    pub fn records(&self) -> Result<Vec<EventRecord>, StoreError> {
        Ok(self
            .scan()?
            .filter_map(|item| match item {
                Ok(record) => Some(record),
                Err(e) => {
                    tracing::warn!(path = ?self.path, "skipping log line: {e}");
                    None
                }
            })
            .collect())
    }
}

/// Open append handle on an event log.
#[derive(Debug)]
pub struct EventWriter {
    file: File,
    path: PathBuf,
}

impl EventWriter {
    /// Append one record and sync it to disk before returning.
    pub fn append(&mut self, record: &EventRecord) -> Result<(), StoreError> {
        self.write_line(&encode_record(record))
    }

    fn write_line(&mut self, line: &str) -> Result<(), StoreError> {
        let mut buf = String::with_capacity(line.len() + 1);
        buf.push_str(line);
        buf.push('\n');

        // One write per line keeps concurrent readers from seeing interleaving.
        self.write_raw(buf.as_bytes())
    }

    fn write_raw(&mut self, bytes: &[u8]) -> Result<(), StoreError> {
        self.file
            .write_all(bytes)
            .and_then(|_| self.file.sync_data())
            .map_err(|source| StoreError::Append {
                path: self.path.clone(),
                source,
            })
    }
}

/// Whether a non-empty file lacks a final newline.
fn ends_mid_line(file: &mut File) -> io::Result<bool> {
    if file.metadata()?.len() == 0 {
        return Ok(false);
    }
    let mut last = [0u8; 1];
    file.seek(SeekFrom::End(-1))?;
    file.read_exact(&mut last)?;
    Ok(last[0] != b'\n')
}

/// Lazy iterator over the records of a log.
pub struct Scan {
    reader: BufReader<File>,
    line: usize,
    done: bool,
}

impl Iterator for Scan {
    type Item = Result<EventRecord, ScanError>;

    fn next(&mut self) -> Option<Self::Item> {
        let mut buf = Vec::new();
        loop {
            if self.done {
                return None;
            }
            buf.clear();
            let read = match self.reader.read_until(b'\n', &mut buf) {
                Ok(read) => read,
                Err(e) => {
                    self.done = true;
                    return Some(Err(ScanError::Read {
                        line: self.line + 1,
                        message: e.to_string(),
                    }));
                }
            };
            if read == 0 {
                self.done = true;
                return None;
            }
            self.line += 1;

            // A writer may still be in the middle of this line.
            if buf.last() != Some(&b'\n') {
                self.done = true;
                return Some(Err(ScanError::Truncated { line: self.line }));
            }

            let text = String::from_utf8_lossy(&buf);
            let text = text.trim_end_matches(['\n', '\r']);
            if text.is_empty() || (self.line == 1 && text == LOG_HEADER) {
                continue;
            }
            return Some(decode_record(text, self.line));
        }
    }
}

/// Render a record as one log line, without the newline.
pub fn encode_record(record: &EventRecord) -> String {
    let timestamp = record
        .timestamp
        .as_ref()
        .map(format_timestamp)
        .unwrap_or_default();
    let fields = [
        record.kind.code(),
        timestamp.as_str(),
        record.actor.as_str(),
        record.source_client.as_str(),
        record.location.as_str(),
        record.text.as_str(),
    ];
    fields
        .iter()
        .map(|field| format!("\"{field}\""))
        .collect::<Vec<_>>()
        .join(",")
}

/// Parse one log line. `line` is only used for error reporting.
pub fn decode_record(text: &str, line: usize) -> Result<EventRecord, ScanError> {
    let inner = text
        .strip_prefix('"')
        .and_then(|rest| rest.strip_suffix('"'))
        .ok_or(ScanError::Malformed { line })?;

    let fields: Vec<&str> = inner.split("\",\"").collect();
    if fields.len() != FIELD_COUNT {
        return Err(ScanError::Malformed { line });
    }

    let kind = EventKind::from_code(fields[0]).ok_or_else(|| ScanError::UnknownKind {
        line,
        code: fields[0].to_string(),
    })?;

    Ok(EventRecord {
        kind,
        timestamp: parse_timestamp(fields[1]),
        actor: fields[2].to_string(),
        source_client: fields[3].to_string(),
        location: fields[4].to_string(),
        text: fields[5].to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::classify::sanitize_field;
    use chrono::{TimeZone, Utc};

    fn record(kind: EventKind, actor: &str, text: &str) -> EventRecord {
        EventRecord {
            kind,
            timestamp: Some(Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap()),
            actor: actor.to_string(),
            source_client: "Web App".to_string(),
            location: "Athens, Greece".to_string(),
            text: sanitize_field(text),
        }
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::for_account(dir.path(), "watched");

        store.open_writer().unwrap();
        let mut writer = store.open_writer().unwrap();
        writer
            .append(&record(EventKind::Retweet, "alice", "hi"))
            .unwrap();

        let content = std::fs::read_to_string(store.path()).unwrap();
        assert_eq!(content.matches(LOG_HEADER).count(), 1);
        assert!(content.starts_with(LOG_HEADER));
        assert_eq!(content.lines().count(), 2);
    }

    #[test]
    fn test_append_then_scan_round_trips_sanitized_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::for_account(dir.path(), "watched");
        let input = record(EventKind::Reply, "bob", "first\nsecond, \"third\"");

        store.open_writer().unwrap().append(&input).unwrap();

        let scanned: Vec<_> = store.scan().unwrap().collect();
        assert_eq!(scanned.len(), 1);
        let output = scanned[0].as_ref().unwrap();
        assert_eq!(output, &input);
        assert_eq!(output.text, "first second, third");
    }

    #[test]
    fn test_scan_is_restartable() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::for_account(dir.path(), "watched");
        let mut writer = store.open_writer().unwrap();
        writer
            .append(&record(EventKind::Original, "a", "1"))
            .unwrap();

        assert_eq!(store.records().unwrap().len(), 1);
        writer
            .append(&record(EventKind::Original, "b", "2"))
            .unwrap();
        assert_eq!(store.records().unwrap().len(), 2);
    }

    #[test]
    fn test_malformed_lines_do_not_stop_scan() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.tsv");
        let good = encode_record(&record(EventKind::Quote, "carol", "ok"));
        let content = format!(
            "{LOG_HEADER}\n{good}\n\"RT\",\"only two\"\n\"ZZ\",\"\",\"x\",\"\",\"\",\"\"\n{good}\n"
        );
        std::fs::write(&path, content).unwrap();

        let items: Vec<_> = EventStore::at(&path).scan().unwrap().collect();
        assert_eq!(items.len(), 4);
        assert!(items[0].is_ok());
        assert_eq!(items[1], Err(ScanError::Malformed { line: 3 }));
        assert!(matches!(items[2], Err(ScanError::UnknownKind { line: 4, .. })));
        assert!(items[3].is_ok());
    }

    #[test]
    fn test_unparsable_timestamp_keeps_record() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.tsv");
        std::fs::write(
            &path,
            "\"RT\",\"not a date\",\"alice\",\"web\",\"\",\"text\"\n",
        )
        .unwrap();

        let records = EventStore::at(&path).records().unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].actor, "alice");
        assert!(records[0].timestamp.is_none());
    }

    #[test]
    fn test_partial_trailing_line_is_reported_not_fatal() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("log.tsv");
        let good = encode_record(&record(EventKind::Retweet, "alice", "done"));
        std::fs::write(&path, format!("{good}\n\"RT\",\"Tue Mar")).unwrap();

        let items: Vec<_> = EventStore::at(&path).scan().unwrap().collect();
        assert_eq!(items.len(), 2);
        assert!(items[0].is_ok());
        assert_eq!(items[1], Err(ScanError::Truncated { line: 2 }));
    }

    #[test]
    fn test_reopen_after_torn_tail_keeps_new_records() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::for_account(dir.path(), "watched");
        store
            .open_writer()
            .unwrap()
            .append(&record(EventKind::Retweet, "alice", "first"))
            .unwrap();

        let mut file = OpenOptions::new().append(true).open(store.path()).unwrap();
        file.write_all(b"\"RT\",\"Tue Mar").unwrap();
        drop(file);

        store
            .open_writer()
            .unwrap()
            .append(&record(EventKind::Reply, "bob", "second"))
            .unwrap();

        let items: Vec<_> = store.scan().unwrap().collect();
        assert_eq!(items.len(), 3);
        assert_eq!(items[1], Err(ScanError::Malformed { line: 3 }));

        let actors: Vec<String> = store.records().unwrap().into_iter().map(|r| r.actor).collect();
        assert_eq!(actors, vec!["alice", "bob"]);
    }

    #[test]
    fn test_reopen_complete_log_adds_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::for_account(dir.path(), "watched");
        store.open_writer().unwrap();
        let before = std::fs::read_to_string(store.path()).unwrap();

        store.open_writer().unwrap();
        assert_eq!(std::fs::read_to_string(store.path()).unwrap(), before);
    }

    #[test]
    fn test_missing_log_is_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let store = EventStore::for_account(dir.path(), "nobody");
        assert!(matches!(
            store.scan(),
            Err(StoreError::Unavailable { .. })
        ));
    }

    #[test]
    fn test_missing_timestamp_encodes_as_empty_field() {
        let mut r = record(EventKind::Original, "dave", "x");
        r.timestamp = None;
        let line = encode_record(&r);
        assert!(line.starts_with("\"TW\",\"\",\"dave\""));
        assert_eq!(decode_record(&line, 1).unwrap(), r);
    }
}
