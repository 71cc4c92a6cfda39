//! Boundary to the chart renderer.
//!
//! Drawing the charts is someone else's job. The driver only needs to know
//! where the finished images are, and that they exist before anything gets
//! published.

use super::driver::Report;
use super::export::ExportPaths;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Images produced for one report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedArtifacts {
    pub activity: PathBuf,
    pub mentions: PathBuf,
}

impl RenderedArtifacts {
    pub fn paths(&self) -> [&Path; 2] {
        [&self.activity, &self.mentions]
    }
}

#[derive(Debug, Error)]
pub enum RenderError {
    #[error("report artifact {0:?} has not been rendered")]
    Missing(PathBuf),
}

/// Turns aggregated series into images on disk.
pub trait ReportRenderer {
    /// Produce the activity and mentions images for `report`.
    ///
    /// `exports` lists the CSV series already written for it. Returned paths
    /// must point at complete files.
    fn render(
        &self,
        report: &Report,
        exports: &[ExportPaths],
    ) -> Result<RenderedArtifacts, RenderError>;
}

/// Renderer for images drawn ahead of time by an external tool.
///
/// Expects `<dir>/<account>-activity-<date>.png` and
/// `<dir>/<account>-mentions-<date>.png`, account in lower case.
#[derive(Debug, Clone)]
pub struct PrerenderedArtifacts {
    dir: PathBuf,
}

impl PrerenderedArtifacts {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Where the images for `report` are expected.
    pub fn expected(&self, report: &Report) -> RenderedArtifacts {
        let account = report.account.to_lowercase();
        let date = report.date.format("%Y-%m-%d");
        RenderedArtifacts {
            activity: self.dir.join(format!("{account}-activity-{date}.png")),
            mentions: self.dir.join(format!("{account}-mentions-{date}.png")),
        }
    }
}

impl ReportRenderer for PrerenderedArtifacts {
    fn render(
        &self,
        report: &Report,
        _exports: &[ExportPaths],
    ) -> Result<RenderedArtifacts, RenderError> {
        let artifacts = self.expected(report);
        for path in artifacts.paths() {
            if !path.is_file() {
                return Err(RenderError::Missing(path.to_path_buf()));
            }
        }
        Ok(artifacts)
    }
}
