//! Classification and normalization of raw posts.
//!
//! Turns a platform [`Tweet`] into an [`EventRecord`] that is safe to store
//! one-per-line: control characters become spaces and quote marks are
//! removed, since the log format has no escaping.

use crate::platform::types::Tweet;
use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Layout of platform timestamps, e.g. `Wed Oct 10 20:19:24 +0000 2018`.
pub const TIMESTAMP_FORMAT: &str = "%a %b %d %H:%M:%S %z %Y";

/// How a post relates to other posts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EventKind {
    Original,
    Retweet,
    Quote,
    Reply,
}

impl EventKind {
    /// Two-letter code used in the event log.
    pub fn code(self) -> &'static str {
        match self {
            EventKind::Original => "TW",
            EventKind::Retweet => "RT",
            EventKind::Quote => "QT",
            EventKind::Reply => "RP",
        }
    }

    /// Decode a log code.
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "TW" => Some(EventKind::Original),
            "RT" => Some(EventKind::Retweet),
            "QT" => Some(EventKind::Quote),
            "RP" => Some(EventKind::Reply),
            _ => None,
        }
    }

    /// Whether this kind counts as an interaction with another account.
    pub fn is_interaction(self) -> bool {
        !matches!(self, EventKind::Original)
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// One normalized event, as stored in the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    pub kind: EventKind,
    /// `None` when the platform timestamp could not be parsed
    pub timestamp: Option<DateTime<Utc>>,
    /// Handle of the author
    pub actor: String,
    /// Posting client with markup removed
    pub source_client: String,
    pub location: String,
    pub text: String,
}

fn anchor_re() -> &'static Regex {
    static ANCHOR_RE: OnceLock<Regex> = OnceLock::new();
    ANCHOR_RE.get_or_init(|| Regex::new(r"</?a(?:\s+[^>]+)?>").expect("valid anchor regex"))
}

/// Replace each carriage return, newline and tab with a space.
pub fn collapse_controls(value: &str) -> String {
    value.replace(['\r', '\n', '\t'], " ")
}

/// Make a free-text field safe for the quoted, unescaped log format.
///
/// Idempotent: sanitizing a sanitized value returns it unchanged.
pub fn sanitize_field(value: &str) -> String {
    collapse_controls(value).replace('"', "")
}

/// Strip anchor tags from a posting-client string, then sanitize it.
pub fn strip_markup(source: &str) -> String {
    sanitize_field(&anchor_re().replace_all(source, ""))
}

/// Parse a platform timestamp. Unparsable input yields `None`.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_str(value.trim(), TIMESTAMP_FORMAT)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

/// Render a timestamp in the platform layout, UTC.
pub fn format_timestamp(timestamp: &DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Decide the kind of a post. Reply beats quote beats retweet.
pub fn kind_of(tweet: &Tweet) -> EventKind {
    if tweet.is_reply() {
        EventKind::Reply
    } else if tweet.quoted_status.is_some() {
        EventKind::Quote
    } else if tweet.retweeted_status.is_some() {
        EventKind::Retweet
    } else {
        EventKind::Original
    }
}

/// Normalize a raw post into a storable record. Never fails.
pub fn classify(tweet: &Tweet) -> EventRecord {
    EventRecord {
        kind: kind_of(tweet),
        timestamp: parse_timestamp(&tweet.created_at),
        actor: sanitize_field(&tweet.user.screen_name),
        source_client: strip_markup(&tweet.source),
        location: sanitize_field(tweet.user.location.as_deref().unwrap_or_default()),
        text: sanitize_field(&tweet.text),
    }
}
