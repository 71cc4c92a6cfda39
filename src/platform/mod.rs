//! Boundary to the social platform.
//!
//! The pipeline never talks to the network directly. Everything it needs
//! from the platform (credential checks, user lookups, timelines, the live
//! stream, media upload and posting) goes through [`PlatformApi`].

pub mod replay;
pub mod types;

#[cfg(feature = "http")]
pub mod http;

pub use replay::ReplayPlatform;
pub use types::{MediaId, StreamMessage, Tweet, User};

#[cfg(feature = "http")]
pub use http::HttpPlatform;

use crossbeam_channel::Receiver;
use thiserror::Error;

/// Errors surfaced by a platform backend.
#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("authentication rejected: {0}")]
    Auth(String),
    #[error("network error: {0}")]
    Network(String),
    #[error("platform returned {status}: {message}")]
    Server { status: u16, message: String },
    #[error("could not decode platform response: {0}")]
    Decode(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Operations the pipeline needs from the platform.
pub trait PlatformApi {
    /// Check that the configured credentials are accepted.
    fn verify_credentials(&self) -> Result<(), PlatformError>;

    /// Resolve a handle to the full user record.
    fn lookup_user(&self, screen_name: &str) -> Result<User, PlatformError>;

    /// Fetch up to `count` of the most recent posts of an account, newest first,
    /// replies and reposts included.
    fn user_timeline(&self, screen_name: &str, count: u32) -> Result<Vec<Tweet>, PlatformError>;

    /// Start following the activity around `user_id`.
    ///
    /// Messages arrive on the returned unbounded channel in delivery order. The
    /// channel disconnects when the backend stops producing.
    fn open_stream(&self, user_id: &str) -> Result<Receiver<StreamMessage>, PlatformError>;

    /// Upload an image and return its media id.
    fn upload_media(&self, bytes: &[u8]) -> Result<MediaId, PlatformError>;

    /// Publish a status with the given media attached.
    fn post_status(&self, text: &str, media: &[MediaId]) -> Result<(), PlatformError>;
}

/// Diagnostic shown when the platform rejects the configured tokens.
pub const AUTH_REMEDIATION: &str =
    "Bad Authorization Tokens. Please refer to https://apps.twitter.com/ for your Access Tokens.";
