//! Windowed aggregation over recorded events and fetched timelines.
//!
//! Two questions get answered here:
//! - who interacted most with the monitored account inside a trailing window
//!   ([`top_interactor`]), and
//! - how an account's activity spreads over the hours of the day and whom it
//!   reposts, quotes and answers ([`summarize`]).
//!
//! Nothing is cached between runs; every call rescans its input. Input order
//! is not trusted to be chronological.

use crate::core::classify::{parse_timestamp, EventKind, EventRecord};
use crate::platform::types::Tweet;
use chrono::{DateTime, FixedOffset, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

const MILLIS_PER_DAY: f64 = 86_400_000.0;

/// A trailing window ending at "now".
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Window {
    /// Length of the window in fractional days
    pub cutoff_days: f64,
}

impl Window {
    pub fn days(cutoff_days: f64) -> Self {
        Self { cutoff_days }
    }

    /// Whether `timestamp` lies inside the window ending at `now`.
    ///
    /// Missing timestamps are treated as too old. Timestamps after `now` are
    /// inside.
    pub fn contains(&self, timestamp: Option<DateTime<Utc>>, now: DateTime<Utc>) -> bool {
        match timestamp {
            Some(t) => {
                let diff_days = (t - now).num_milliseconds() as f64 / MILLIS_PER_DAY;
                diff_days > -self.cutoff_days
            }
            None => false,
        }
    }
}

/// Parameters of one top-interactor call site.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct InteractorWindow {
    pub cutoff_days: f64,
    /// Leave the monitored account itself out of the running
    pub exclude_self: bool,
}

impl InteractorWindow {
    pub fn window(&self) -> Window {
        Window::days(self.cutoff_days)
    }
}

impl Default for InteractorWindow {
    fn default() -> Self {
        Self {
            cutoff_days: 1.0,
            exclude_self: true,
        }
    }
}

/// One account being reposted, quoted or answered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Interaction {
    pub kind: EventKind,
    pub target: String,
}

/// The aggregator's view of a single post.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Activity {
    pub timestamp: Option<DateTime<Utc>>,
    pub interactions: Vec<Interaction>,
}

impl From<&EventRecord> for Activity {
    /// A logged event is an interaction by its author with the monitored account.
    fn from(record: &EventRecord) -> Self {
        let interactions = if record.kind.is_interaction() {
            vec![Interaction {
                kind: record.kind,
                target: record.actor.clone(),
            }]
        } else {
            Vec::new()
        };
        Self {
            timestamp: record.timestamp,
            interactions,
        }
    }
}

impl From<&Tweet> for Activity {
    /// A timeline post may repost, answer and quote at once; each counts.
    fn from(tweet: &Tweet) -> Self {
        let mut interactions = Vec::new();
        if let Some(ref original) = tweet.retweeted_status {
            interactions.push(Interaction {
                kind: EventKind::Retweet,
                target: original.user.screen_name.clone(),
            });
        }
        if let Some(target) = tweet.reply_target() {
            interactions.push(Interaction {
                kind: EventKind::Reply,
                target: target.to_string(),
            });
        }
        if let Some(ref quoted) = tweet.quoted_status {
            interactions.push(Interaction {
                kind: EventKind::Quote,
                target: quoted.user.screen_name.clone(),
            });
        }
        Self {
            timestamp: parse_timestamp(&tweet.created_at),
            interactions,
        }
    }
}

/// Counts keyed by name, remembering the order names were first seen.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tally {
    entries: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

impl Tally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one occurrence of `key`.
    pub fn add(&mut self, key: &str) {
        match self.index.get(key) {
            Some(&i) => self.entries[i].1 += 1,
            None => {
                self.index.insert(key.to_string(), self.entries.len());
                self.entries.push((key.to_string(), 1));
            }
        }
    }

    pub fn get(&self, key: &str) -> u64 {
        self.index.get(key).map(|&i| self.entries[i].1).unwrap_or(0)
    }

    /// Entries in first-seen order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), *v))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, v)| v).sum()
    }

    /// Pick the entry with the highest count.
    ///
    /// Walks entries in first-seen order and takes any count greater than or
    /// equal to the best so far, so the last of several equal counts wins.
    /// `exclude` is compared case-insensitively.
    pub fn leader(&self, exclude: Option<&str>) -> Option<&str> {
        let mut best: Option<(&str, u64)> = None;
        for (key, count) in self.iter() {
            if exclude.is_some_and(|ex| ex.eq_ignore_ascii_case(key)) {
                continue;
            }
            if best.map_or(true, |(_, max)| count >= max) {
                best = Some((key, count));
            }
        }
        best.map(|(key, _)| key)
    }
}

/// Count in-window records per actor.
pub fn actor_tally<'a, I>(records: I, window: &Window, now: DateTime<Utc>) -> Tally
where
    I: IntoIterator<Item = &'a EventRecord>,
{
    let mut tally = Tally::new();
    for record in records {
        if window.contains(record.timestamp, now) {
            tally.add(&record.actor);
        }
    }
    tally
}

/// The actor with the most in-window records, or `None` when nobody qualifies.
pub fn top_interactor<'a, I>(
    records: I,
    site: &InteractorWindow,
    monitored: &str,
    now: DateTime<Utc>,
) -> Option<String>
where
    I: IntoIterator<Item = &'a EventRecord>,
{
    let tally = actor_tally(records, &site.window(), now);
    let exclude = site.exclude_self.then_some(monitored);
    tally.leader(exclude).map(str::to_string)
}

/// Activity count for one hour-of-day label.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HourBucket {
    /// 12-hour clock label such as `3 PM`
    pub label: String,
    pub count: u64,
}

/// Label of the hour `timestamp` falls in, after shifting by `offset`.
pub fn hour_label(timestamp: &DateTime<Utc>, offset: &FixedOffset) -> String {
    timestamp.with_timezone(offset).format("%-I %p").to_string()
}

/// Hour-of-day histogram of in-window activity, oldest bucket first.
///
/// Buckets are keyed by label only, so a window longer than a day folds the
/// same hour of two days into one bucket. Buckets are ordered by the newest
/// timestamp they hold.
pub fn histogram<'a, I>(
    activities: I,
    window: &Window,
    now: DateTime<Utc>,
    offset: &FixedOffset,
) -> Vec<HourBucket>
where
    I: IntoIterator<Item = &'a Activity>,
{
    let mut buckets: Vec<(HourBucket, DateTime<Utc>)> = Vec::new();
    let mut index: HashMap<String, usize> = HashMap::new();

    for activity in activities {
        let Some(timestamp) = activity.timestamp.filter(|t| window.contains(Some(*t), now)) else {
            continue;
        };
        let label = hour_label(&timestamp, offset);
        match index.get(&label) {
            Some(&i) => {
                let (bucket, newest) = &mut buckets[i];
                bucket.count += 1;
                if timestamp > *newest {
                    *newest = timestamp;
                }
            }
            None => {
                index.insert(label.clone(), buckets.len());
                buckets.push((HourBucket { label, count: 1 }, timestamp));
            }
        }
    }

    // Newest first, then flipped for display.
    buckets.sort_by(|a, b| b.1.cmp(&a.1));
    buckets.reverse();
    buckets.into_iter().map(|(bucket, _)| bucket).collect()
}

/// Totals of each interaction kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InteractionTotals {
    pub retweets: u64,
    pub replies: u64,
    pub quotes: u64,
}

impl InteractionTotals {
    pub fn total(&self) -> u64 {
        self.retweets + self.replies + self.quotes
    }
}

/// Everything the report needs to know about one account's window.
#[derive(Debug, Clone, Default)]
pub struct TimelineSummary {
    pub account: String,
    /// Hourly activity, oldest first
    pub activity: Vec<HourBucket>,
    pub totals: InteractionTotals,
    /// How often each account was reposted, answered or quoted
    pub mentions: Tally,
}

impl TimelineSummary {
    /// An empty summary, used when nothing could be fetched.
    pub fn empty(account: &str) -> Self {
        Self {
            account: account.to_string(),
            ..Self::default()
        }
    }

    /// Number of in-window posts.
    pub fn activity_total(&self) -> u64 {
        self.activity.iter().map(|b| b.count).sum()
    }

    /// Mentioned accounts with at least `min_count` mentions, most first.
    pub fn top_mentions(&self, min_count: u64) -> Vec<(String, u64)> {
        let mut mentions: Vec<(String, u64)> = self
            .mentions
            .iter()
            .filter(|(_, count)| *count >= min_count)
            .map(|(name, count)| (name.to_string(), count))
            .collect();
        mentions.sort_by(|a, b| b.1.cmp(&a.1));
        mentions
    }
}

/// Build the hourly series, interaction totals and mention tallies for one
/// account over the same window.
pub fn summarize(
    account: &str,
    activities: &[Activity],
    window: &Window,
    now: DateTime<Utc>,
    offset: &FixedOffset,
) -> TimelineSummary {
    let mut totals = InteractionTotals::default();
    let mut mentions = Tally::new();

    for activity in activities {
        if !window.contains(activity.timestamp, now) {
            continue;
        }
        for interaction in &activity.interactions {
            match interaction.kind {
                EventKind::Retweet => totals.retweets += 1,
                EventKind::Reply => totals.replies += 1,
                EventKind::Quote => totals.quotes += 1,
                EventKind::Original => continue,
            }
            mentions.add(&interaction.target);
        }
    }

    TimelineSummary {
        account: account.to_string(),
        activity: histogram(activities, window, now, offset),
        totals,
        mentions,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::types::User;
    use chrono::{Duration, TimeZone};

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    fn record(kind: EventKind, actor: &str, timestamp: Option<DateTime<Utc>>) -> EventRecord {
        EventRecord {
            kind,
            timestamp,
            actor: actor.to_string(),
            source_client: String::new(),
            location: String::new(),
            text: String::new(),
        }
    }

    fn ago(hours: i64) -> Option<DateTime<Utc>> {
        Some(now() - Duration::hours(hours))
    }

    fn utc_plus(hours: i32) -> FixedOffset {
        FixedOffset::east_opt(hours * 3600).unwrap()
    }

    #[test]
    fn test_window_membership() {
        let window = Window::days(1.0);
        assert!(window.contains(ago(23), now()));
        assert!(!window.contains(ago(24), now()));
        assert!(!window.contains(ago(25), now()));
        assert!(window.contains(Some(now() + Duration::hours(1)), now()));
        assert!(!window.contains(None, now()));

        let wider = Window::days(1.1);
        assert!(wider.contains(ago(26), now()));
        assert!(!wider.contains(ago(27), now()));
    }

    #[test]
    fn test_top_interactor_empty_input() {
        let records: Vec<EventRecord> = Vec::new();
        assert_eq!(
            top_interactor(&records, &InteractorWindow::default(), "watched", now()),
            None
        );
    }

    #[test]
    fn test_top_interactor_majority() {
        let t0 = now() - Duration::hours(5);
        let records = vec![
            record(EventKind::Retweet, "alice", Some(t0)),
            record(EventKind::Reply, "bob", Some(t0 + Duration::hours(1))),
            record(EventKind::Retweet, "alice", Some(t0 + Duration::hours(2))),
        ];
        assert_eq!(
            top_interactor(&records, &InteractorWindow::default(), "watched", now()),
            Some("alice".to_string())
        );
    }

    #[test]
    fn test_equal_counts_go_to_last_seen() {
        let mut records = Vec::new();
        for _ in 0..3 {
            records.push(record(EventKind::Retweet, "A", ago(1)));
        }
        for _ in 0..3 {
            records.push(record(EventKind::Retweet, "B", ago(1)));
        }
        assert_eq!(
            top_interactor(&records, &InteractorWindow::default(), "watched", now()),
            Some("B".to_string())
        );
    }

    #[test]
    fn test_self_exclusion_is_per_call_site() {
        let records = vec![
            record(EventKind::Original, "watched", ago(1)),
            record(EventKind::Original, "watched", ago(2)),
            record(EventKind::Retweet, "alice", ago(3)),
        ];

        let excluding = InteractorWindow {
            cutoff_days: 1.0,
            exclude_self: true,
        };
        assert_eq!(
            top_interactor(&records, &excluding, "WATCHED", now()),
            Some("alice".to_string())
        );

        let including = InteractorWindow {
            cutoff_days: 1.3,
            exclude_self: false,
        };
        assert_eq!(
            top_interactor(&records, &including, "watched", now()),
            Some("watched".to_string())
        );
    }

    #[test]
    fn test_only_self_yields_none() {
        let records = vec![record(EventKind::Original, "watched", ago(1))];
        assert_eq!(
            top_interactor(&records, &InteractorWindow::default(), "watched", now()),
            None
        );
    }

    #[test]
    fn test_out_of_window_and_unparsable_records_are_ignored() {
        let records = vec![
            record(EventKind::Retweet, "old", ago(30)),
            record(EventKind::Retweet, "old", ago(40)),
            record(EventKind::Retweet, "broken", None),
            record(EventKind::Retweet, "broken", None),
            record(EventKind::Retweet, "fresh", ago(2)),
        ];
        let tally = actor_tally(&records, &Window::days(1.0), now());
        assert_eq!(tally.len(), 1);
        assert_eq!(tally.get("fresh"), 1);
        assert_eq!(
            top_interactor(&records, &InteractorWindow::default(), "watched", now()),
            Some("fresh".to_string())
        );
    }

    #[test]
    fn test_hour_label_applies_offset() {
        let t = Utc.with_ymd_and_hms(2024, 6, 1, 12, 30, 0).unwrap();
        assert_eq!(hour_label(&t, &utc_plus(3)), "3 PM");
        assert_eq!(hour_label(&t, &utc_plus(0)), "12 PM");
        assert_eq!(hour_label(&t, &utc_plus(-12)), "12 AM");
    }

    #[test]
    fn test_histogram_counts_and_order() {
        // Newest first, as a timeline arrives.
        let activities: Vec<Activity> = [1, 1, 2, 4, 4, 4, 30]
            .iter()
            .map(|&h| Activity {
                timestamp: ago(h),
                interactions: Vec::new(),
            })
            .chain(std::iter::once(Activity {
                timestamp: None,
                interactions: Vec::new(),
            }))
            .collect();

        let buckets = histogram(&activities, &Window::days(1.0), now(), &utc_plus(3));
        let labels: Vec<&str> = buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["11 AM", "1 PM", "2 PM"]);
        assert_eq!(
            buckets.iter().map(|b| b.count).collect::<Vec<_>>(),
            vec![3, 1, 2]
        );

        let in_window = activities
            .iter()
            .filter(|a| Window::days(1.0).contains(a.timestamp, now()))
            .count() as u64;
        assert_eq!(buckets.iter().map(|b| b.count).sum::<u64>(), in_window);
    }

    #[test]
    fn test_histogram_tolerates_unsorted_input() {
        let activities: Vec<Activity> = [4, 1, 2, 1]
            .iter()
            .map(|&h| Activity {
                timestamp: ago(h),
                interactions: Vec::new(),
            })
            .collect();
        let buckets = histogram(&activities, &Window::days(1.0), now(), &utc_plus(0));
        let labels: Vec<&str> = buckets.iter().map(|b| b.label.as_str()).collect();
        assert_eq!(labels, vec!["8 AM", "10 AM", "11 AM"]);
    }

    #[test]
    fn test_histogram_empty() {
        let activities: Vec<Activity> = Vec::new();
        assert!(histogram(&activities, &Window::days(1.0), now(), &utc_plus(3)).is_empty());
    }

    fn post(screen_name: &str, hours_ago: i64) -> Tweet {
        Tweet {
            created_at: crate::core::classify::format_timestamp(&ago(hours_ago).unwrap()),
            text: "x".to_string(),
            user: User {
                screen_name: screen_name.to_string(),
                ..Default::default()
            },
            ..Default::default()
        }
    }

    #[test]
    fn test_summarize_tallies_each_interaction() {
        let mut combo = post("suspect", 1);
        combo.retweeted_status = Some(Box::new(post("alice", 5)));
        combo.quoted_status = Some(Box::new(post("bob", 5)));
        combo.in_reply_to_user_id_str = Some("9".to_string());
        combo.in_reply_to_screen_name = Some("alice".to_string());

        let mut rt = post("suspect", 2);
        rt.retweeted_status = Some(Box::new(post("carol", 8)));

        let mut stale = post("suspect", 40);
        stale.retweeted_status = Some(Box::new(post("carol", 41)));

        let timeline = vec![combo, rt, post("suspect", 3), stale];
        let activities: Vec<Activity> = timeline.iter().map(Activity::from).collect();
        let summary = summarize(
            "suspect",
            &activities,
            &Window::days(1.1),
            now(),
            &utc_plus(3),
        );

        assert_eq!(summary.totals.retweets, 2);
        assert_eq!(summary.totals.replies, 1);
        assert_eq!(summary.totals.quotes, 1);
        assert_eq!(summary.mentions.get("alice"), 2);
        assert_eq!(summary.mentions.get("carol"), 1);
        assert_eq!(summary.activity_total(), 3);

        assert_eq!(summary.top_mentions(2), vec![("alice".to_string(), 2)]);
        assert_eq!(summary.top_mentions(1).len(), 3);
    }

    #[test]
    fn test_activity_from_record() {
        let rt = Activity::from(&record(EventKind::Retweet, "alice", ago(1)));
        assert_eq!(
            rt.interactions,
            vec![Interaction {
                kind: EventKind::Retweet,
                target: "alice".to_string()
            }]
        );
        let own = Activity::from(&record(EventKind::Original, "watched", ago(1)));
        assert!(own.interactions.is_empty());
    }
}
