//! Report driver.
//!
//! Finds the account interacting most with the monitored account, summarizes
//! both timelines, writes the CSV series and, for `post`, publishes the
//! rendered charts.

use super::export::{self, ExportPaths, Role};
use super::render::{RenderedArtifacts, ReportRenderer};
use super::ReportError;
use crate::config::Config;
use crate::core::aggregate::{self, Activity, InteractorWindow, TimelineSummary, Window};
use crate::core::store::EventStore;
use crate::platform::{MediaId, PlatformApi, PlatformError};
use chrono::{DateTime, FixedOffset, NaiveDate, Utc};

/// Which command the top interactor is picked for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallSite {
    List,
    Post,
}

/// Aggregated result of one report run.
#[derive(Debug, Clone)]
pub struct Report {
    /// The monitored account
    pub account: String,
    pub top_interactor: Option<String>,
    pub source: TimelineSummary,
    /// Summary of the top interactor, when there is one
    pub target: Option<TimelineSummary>,
    pub generated_at: DateTime<Utc>,
    /// Calendar day of `generated_at` at the configured offset
    pub date: NaiveDate,
}

impl Report {
    /// Summaries in export order.
    pub fn summaries(&self) -> impl Iterator<Item = (Role, &TimelineSummary)> {
        std::iter::once((Role::Source, &self.source))
            .chain(self.target.iter().map(|t| (Role::Target, t)))
    }
}

/// What `post` did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublishOutcome {
    Published {
        caption: String,
        media: Vec<MediaId>,
    },
    /// No account qualified as top interactor
    NothingToPublish,
}

/// Status text published alongside the charts.
pub fn caption(top_interactor: &str, account: &str) -> String {
    format!("Bot Spotted @{top_interactor} @{account} #BotOfTheDay #spam @TwitterSupport")
}

/// Runs reports for one monitored account.
pub struct ReportDriver<'a> {
    config: &'a Config,
    account: &'a str,
    api: &'a dyn PlatformApi,
    store: EventStore,
    offset: FixedOffset,
}

impl<'a> ReportDriver<'a> {
    pub fn new(
        config: &'a Config,
        account: &'a str,
        api: &'a dyn PlatformApi,
    ) -> Result<Self, ReportError> {
        Ok(Self {
            config,
            account,
            api,
            store: EventStore::for_account(&config.output_path, account),
            offset: config.utc_offset()?,
        })
    }

    pub fn store(&self) -> &EventStore {
        &self.store
    }

    fn site(&self, site: CallSite) -> &InteractorWindow {
        match site {
            CallSite::List => &self.config.windows.list,
            CallSite::Post => &self.config.windows.post,
        }
    }

    /// Top interactor over the event log, using the window of `site`.
    ///
    /// A missing or unreadable log is an error; lines that fail to parse are
    /// skipped.
    pub fn find_top_interactor(
        &self,
        site: CallSite,
        now: DateTime<Utc>,
    ) -> Result<Option<String>, ReportError> {
        let records = self.store.records()?;
        let top = aggregate::top_interactor(&records, self.site(site), self.account, now);
        tracing::info!(
            account = self.account,
            records = records.len(),
            top = ?top,
            "scanned event log"
        );
        Ok(top)
    }

    /// Summary of `screen_name`'s recent timeline.
    ///
    /// A failed fetch is logged and yields an empty summary so the rest of
    /// the report can still be produced. Rejected credentials are returned.
    pub fn summarize_account(
        &self,
        screen_name: &str,
        now: DateTime<Utc>,
    ) -> Result<TimelineSummary, ReportError> {
        let timeline = match self
            .api
            .user_timeline(screen_name, self.config.timeline_count)
        {
            Ok(timeline) => timeline,
            Err(e @ PlatformError::Auth(_)) => return Err(e.into()),
            Err(e) => {
                tracing::warn!(account = screen_name, "timeline fetch failed: {e}");
                return Ok(TimelineSummary::empty(screen_name));
            }
        };

        let activities: Vec<Activity> = timeline.iter().map(Activity::from).collect();
        let window = Window::days(self.config.windows.timeline_days);
        Ok(aggregate::summarize(
            screen_name,
            &activities,
            &window,
            now,
            &self.offset,
        ))
    }

    /// Aggregate everything a report needs.
    ///
    /// Credentials are checked first; a rejection aborts the report before
    /// the log is read.
    pub fn build(&self, site: CallSite, now: DateTime<Utc>) -> Result<Report, ReportError> {
        self.api.verify_credentials()?;

        let top_interactor = self.find_top_interactor(site, now)?;
        let source = self.summarize_account(self.account, now)?;
        let target = top_interactor
            .as_deref()
            .map(|top| self.summarize_account(top, now))
            .transpose()?;

        Ok(Report {
            account: self.account.to_string(),
            top_interactor,
            source,
            target,
            generated_at: now,
            date: now.with_timezone(&self.offset).date_naive(),
        })
    }

    /// Write the CSV series of every summary in `report`.
    pub fn export(&self, report: &Report) -> Result<Vec<ExportPaths>, ReportError> {
        let dir = &self.config.output_path;
        report
            .summaries()
            .map(|(role, summary)| {
                export::write_summary(dir, &report.account, role, summary, report.date).map_err(
                    |source| ReportError::Export {
                        dir: dir.clone(),
                        source,
                    },
                )
            })
            .collect()
    }

    /// Build and export a report for the `list` command.
    pub fn list(&self, now: DateTime<Utc>) -> Result<(Report, Vec<ExportPaths>), ReportError> {
        let report = self.build(CallSite::List, now)?;
        let exports = self.export(&report)?;
        Ok((report, exports))
    }

    /// Build, export, render and publish a report.
    ///
    /// Nothing is uploaded unless every artifact is on disk.
    pub fn post(
        &self,
        renderer: &dyn ReportRenderer,
        now: DateTime<Utc>,
    ) -> Result<(Report, PublishOutcome), ReportError> {
        let report = self.build(CallSite::Post, now)?;
        let Some(top) = report.top_interactor.clone() else {
            tracing::info!(account = self.account, "no top interactor, nothing to publish");
            return Ok((report, PublishOutcome::NothingToPublish));
        };

        let exports = self.export(&report)?;
        let artifacts = renderer.render(&report, &exports)?;
        let images = read_artifacts(&artifacts)?;

        let mut media = Vec::with_capacity(images.len());
        for bytes in &images {
            media.push(self.api.upload_media(bytes)?);
        }

        let caption = caption(&top, &report.account);
        self.api.post_status(&caption, &media)?;
        tracing::info!(account = self.account, top = %top, media = media.len(), "report published");

        Ok((report, PublishOutcome::Published { caption, media }))
    }
}

fn read_artifacts(artifacts: &RenderedArtifacts) -> Result<Vec<Vec<u8>>, ReportError> {
    artifacts
        .paths()
        .into_iter()
        .map(|path| {
            std::fs::read(path).map_err(|source| ReportError::Artifact {
                path: path.to_path_buf(),
                source,
            })
        })
        .collect()
}
