//! Daily report: who interacts most with the monitored account, and what
//! both timelines looked like over the last day.

pub mod driver;
pub mod export;
pub mod render;

pub use driver::{caption, CallSite, PublishOutcome, Report, ReportDriver};
pub use export::{ExportPaths, Role};
pub use render::{PrerenderedArtifacts, RenderError, RenderedArtifacts, ReportRenderer};

use crate::config::ConfigError;
use crate::core::store::StoreError;
use crate::platform::PlatformError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that abort a report run.
#[derive(Debug, Error)]
pub enum ReportError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Platform(#[from] PlatformError),
    #[error(transparent)]
    Render(#[from] RenderError),
    #[error("failed to write report exports under {dir:?}: {source}")]
    Export {
        dir: PathBuf,
        source: std::io::Error,
    },
    #[error("failed to read report artifact {path:?}: {source}")]
    Artifact {
        path: PathBuf,
        source: std::io::Error,
    },
}
