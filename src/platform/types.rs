//! Raw platform payloads.
//!
//! These mirror the JSON shapes the platform sends for posts and users. Only
//! the fields the pipeline reads are declared; everything else is ignored on
//! deserialization.

use serde::{Deserialize, Serialize};

/// An account as described by the platform.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    /// Numeric id, as a string
    #[serde(default)]
    pub id_str: String,
    /// Handle without the leading `@`
    pub screen_name: String,
    /// Free-text profile location
    #[serde(default)]
    pub location: Option<String>,
}

/// A post as delivered by the stream or a timeline fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tweet {
    /// Creation time in the platform's Ruby date layout
    #[serde(default)]
    pub created_at: String,
    #[serde(default)]
    pub text: String,
    /// Posting client, usually wrapped in an HTML anchor
    #[serde(default)]
    pub source: String,
    pub user: User,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub retweeted_status: Option<Box<Tweet>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub quoted_status: Option<Box<Tweet>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to_user_id_str: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub in_reply_to_screen_name: Option<String>,
}

impl Tweet {
    /// Whether the post answers another account.
    pub fn is_reply(&self) -> bool {
        self.in_reply_to_user_id_str
            .as_deref()
            .is_some_and(|id| !id.is_empty())
    }

    /// The handle this post replies to, if any.
    pub fn reply_target(&self) -> Option<&str> {
        self.in_reply_to_screen_name
            .as_deref()
            .filter(|name| !name.is_empty())
    }
}

/// One message read off the live stream.
///
/// Posts are the only kind the pipeline records. Every other control or
/// notice message lands in `Other` and is counted, nothing more.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamMessage {
    Tweet(Tweet),
    Other(serde_json::Value),
}

impl StreamMessage {
    /// Decode one newline-delimited stream payload.
    pub fn from_json(line: &str) -> Result<Self, serde_json::Error> {
        let value: serde_json::Value = serde_json::from_str(line)?;
        Ok(Self::from_value(value))
    }

    /// Sort an already-parsed JSON value into a post or something else.
    pub fn from_value(value: serde_json::Value) -> Self {
        let looks_like_post = value.get("user").is_some() && value.get("text").is_some();
        if looks_like_post {
            match serde_json::from_value::<Tweet>(value.clone()) {
                Ok(tweet) => return StreamMessage::Tweet(tweet),
                Err(e) => {
                    tracing::warn!(payload = %value, "post-shaped message did not decode: {e}");
                    return StreamMessage::Other(value);
                }
            }
        }
        StreamMessage::Other(value)
    }
}

/// Identifier handed back by a media upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaId(pub String);

impl std::fmt::Display for MediaId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}
