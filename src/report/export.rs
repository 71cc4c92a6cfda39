//! CSV exports of the aggregated series.
//!
//! Two files per summarized account and day: the hourly activity series and
//! the mention tallies. These are what an external renderer turns into images.

use crate::core::aggregate::TimelineSummary;
use chrono::NaiveDate;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

/// Which side of the report a summary describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    /// The monitored account
    Source,
    /// Its top interactor
    Target,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::Source => "source",
            Role::Target => "target",
        }
    }
}

/// Files written for one summary.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportPaths {
    pub role: Role,
    pub activity: PathBuf,
    pub mentions: PathBuf,
}

fn dated_name(account: &str, series: &str, role: Role, date: NaiveDate) -> String {
    format!(
        "{account}-{series}-{}-{}.csv",
        role.as_str(),
        date.format("%Y-%m-%d")
    )
}

/// `<dir>/<account>-activity-<role>-<date>.csv`
pub fn activity_path(dir: &Path, account: &str, role: Role, date: NaiveDate) -> PathBuf {
    dir.join(dated_name(account, "activity", role, date))
}

/// `<dir>/<account>-mentions-<role>-<date>.csv`
pub fn mentions_path(dir: &Path, account: &str, role: Role, date: NaiveDate) -> PathBuf {
    dir.join(dated_name(account, "mentions", role, date))
}

/// Activity series as CSV, oldest hour first.
pub fn activity_csv(summary: &TimelineSummary) -> String {
    let mut out = String::from("bot,created_at,count\n");
    for bucket in &summary.activity {
        let _ = writeln!(out, "{},{},{}", summary.account, bucket.label, bucket.count);
    }
    out
}

/// Mention tallies as CSV, in the order accounts were first mentioned.
pub fn mentions_csv(summary: &TimelineSummary) -> String {
    let mut out = String::from("bot,user,count\n");
    for (user, count) in summary.mentions.iter() {
        let _ = writeln!(out, "{},{},{}", summary.account, user, count);
    }
    out
}

/// Write both exports for `summary`, replacing files from an earlier run.
///
/// `account` is the monitored account, which names the files regardless of
/// role.
pub fn write_summary(
    dir: &Path,
    account: &str,
    role: Role,
    summary: &TimelineSummary,
    date: NaiveDate,
) -> std::io::Result<ExportPaths> {
    std::fs::create_dir_all(dir)?;

    let activity = activity_path(dir, account, role, date);
    std::fs::write(&activity, activity_csv(summary))?;

    let mentions = mentions_path(dir, account, role, date);
    std::fs::write(&mentions, mentions_csv(summary))?;

    Ok(ExportPaths {
        role,
        activity,
        mentions,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::aggregate::{HourBucket, Tally};

    fn summary() -> TimelineSummary {
        let mut mentions = Tally::new();
        mentions.add("alice");
        mentions.add("bob");
        mentions.add("alice");
        TimelineSummary {
            account: "suspect".to_string(),
            activity: vec![
                HourBucket {
                    label: "11 AM".to_string(),
                    count: 3,
                },
                HourBucket {
                    label: "2 PM".to_string(),
                    count: 1,
                },
            ],
            mentions,
            ..Default::default()
        }
    }

    #[test]
    fn test_csv_bodies() {
        assert_eq!(
            activity_csv(&summary()),
            "bot,created_at,count\nsuspect,11 AM,3\nsuspect,2 PM,1\n"
        );
        assert_eq!(
            mentions_csv(&summary()),
            "bot,user,count\nsuspect,alice,2\nsuspect,bob,1\n"
        );
    }

    #[test]
    fn test_write_summary_names_and_overwrites() {
        let dir = tempfile::tempdir().unwrap();
        let date = NaiveDate::from_ymd_opt(2024, 6, 1).unwrap();

        std::fs::write(
            dir.path().join("watched-activity-target-2024-06-01.csv"),
            "stale",
        )
        .unwrap();

        let paths = write_summary(dir.path(), "watched", Role::Target, &summary(), date).unwrap();
        assert!(paths
            .activity
            .ends_with("watched-activity-target-2024-06-01.csv"));
        assert!(paths
            .mentions
            .ends_with("watched-mentions-target-2024-06-01.csv"));
        assert_eq!(
            std::fs::read_to_string(&paths.activity).unwrap(),
            activity_csv(&summary())
        );
    }
}
