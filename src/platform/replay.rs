//! Offline platform backend that replays recorded payloads from disk.
//!
//! Directory layout:
//!
//! ```text
//! <root>/stream.jsonl                 one raw stream message per line
//! <root>/users.json                   optional array of users
//! <root>/timelines/<screen_name>.json array of posts, newest first
//! <root>/outbox/                      uploaded media and posted statuses
//! ```
//!
//! This lets `stream`, `list` and `post` run end to end without network
//! access, and gives the tests a real backend to drive.

use super::types::{MediaId, StreamMessage, Tweet, User};
use super::{PlatformApi, PlatformError};
use crossbeam_channel::{unbounded, Receiver};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::thread;

/// A status written to the outbox by [`ReplayPlatform::post_status`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostedStatus {
    pub text: String,
    pub media_ids: Vec<String>,
}

/// Platform backend reading from a replay directory.
#[derive(Debug)]
pub struct ReplayPlatform {
    root: PathBuf,
    next_media_id: AtomicU64,
}

impl ReplayPlatform {
    /// Create a backend over `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            next_media_id: AtomicU64::new(1),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn stream_path(&self) -> PathBuf {
        self.root.join("stream.jsonl")
    }

    fn timeline_path(&self, screen_name: &str) -> PathBuf {
        self.root
            .join("timelines")
            .join(format!("{screen_name}.json"))
    }

    fn outbox(&self) -> Result<PathBuf, PlatformError> {
        let dir = self.root.join("outbox");
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    fn read_timeline(&self, screen_name: &str) -> Result<Vec<Tweet>, PlatformError> {
        let path = self.timeline_path(screen_name);
        if !path.exists() {
            return Err(PlatformError::NotFound(format!(
                "no recorded timeline for @{screen_name}"
            )));
        }
        let content = fs::read_to_string(&path)?;
        serde_json::from_str(&content).map_err(|e| PlatformError::Decode(e.to_string()))
    }

    /// Statuses published so far, oldest first.
    pub fn posted_statuses(&self) -> Result<Vec<PostedStatus>, PlatformError> {
        let path = self.root.join("outbox").join("statuses.jsonl");
        if !path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&path)?;
        content
            .lines()
            .filter(|line| !line.trim().is_empty())
            .map(|line| {
                serde_json::from_str(line).map_err(|e| PlatformError::Decode(e.to_string()))
            })
            .collect()
    }
}

impl PlatformApi for ReplayPlatform {
    fn verify_credentials(&self) -> Result<(), PlatformError> {
        if self.root.is_dir() {
            Ok(())
        } else {
            Err(PlatformError::NotFound(format!(
                "replay directory {:?} does not exist",
                self.root
            )))
        }
    }

    fn lookup_user(&self, screen_name: &str) -> Result<User, PlatformError> {
        let users_path = self.root.join("users.json");
        if users_path.exists() {
            let content = fs::read_to_string(&users_path)?;
            let users: Vec<User> =
                serde_json::from_str(&content).map_err(|e| PlatformError::Decode(e.to_string()))?;
            if let Some(user) = users
                .into_iter()
                .find(|u| u.screen_name.eq_ignore_ascii_case(screen_name))
            {
                return Ok(user);
            }
        }

        // Fall back to the author of a recorded timeline.
        if let Ok(timeline) = self.read_timeline(screen_name) {
            if let Some(tweet) = timeline.into_iter().next() {
                return Ok(tweet.user);
            }
        }

        Err(PlatformError::NotFound(format!("unknown user @{screen_name}")))
    }

    fn user_timeline(&self, screen_name: &str, count: u32) -> Result<Vec<Tweet>, PlatformError> {
        let mut timeline = self.read_timeline(screen_name)?;
        timeline.truncate(count as usize);
        Ok(timeline)
    }

    fn open_stream(&self, user_id: &str) -> Result<Receiver<StreamMessage>, PlatformError> {
        let path = self.stream_path();
        let file = fs::File::open(&path).map_err(|e| {
            PlatformError::NotFound(format!("cannot open replay stream {path:?}: {e}"))
        })?;
        tracing::info!(follow = user_id, path = ?path, "replaying recorded stream");

        let (sender, receiver) = unbounded();
        thread::Builder::new()
            .name("replay-stream".to_string())
            .spawn(move || {
                for (line_no, line) in BufReader::new(file).lines().enumerate() {
                    let line = match line {
                        Ok(line) => line,
                        Err(e) => {
                            tracing::warn!("replay stream read failed: {e}");
                            break;
                        }
                    };
                    if line.trim().is_empty() {
                        continue;
                    }
                    match StreamMessage::from_json(&line) {
                        Ok(message) => {
                            if sender.send(message).is_err() {
                                break;
                            }
                        }
                        Err(e) => {
                            tracing::warn!(line = line_no + 1, "undecodable stream message: {e}")
                        }
                    }
                }
            })?;

        Ok(receiver)
    }

    fn upload_media(&self, bytes: &[u8]) -> Result<MediaId, PlatformError> {
        let id = self.next_media_id.fetch_add(1, Ordering::SeqCst);
        let path = self.outbox()?.join(format!("media-{id}.png"));
        fs::write(path, bytes)?;
        Ok(MediaId(id.to_string()))
    }

    fn post_status(&self, text: &str, media: &[MediaId]) -> Result<(), PlatformError> {
        let status = PostedStatus {
            text: text.to_string(),
            media_ids: media.iter().map(|m| m.0.clone()).collect(),
        };
        let line =
            serde_json::to_string(&status).map_err(|e| PlatformError::Decode(e.to_string()))?;

        let mut file = fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(self.outbox()?.join("statuses.jsonl"))?;
        writeln!(file, "{line}")?;
        Ok(())
    }
}
