//! Configuration for the bot.
//!
//! Settings live in a JSON file under the user's config directory and can be
//! overridden from the command line. Platform credentials are kept apart in a
//! YAML document holding one set for streaming and one for everything else.

use crate::core::aggregate::InteractorWindow;
use chrono::FixedOffset;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Main configuration, built once at startup and passed by reference.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory holding the event log and report artifacts
    pub output_path: PathBuf,

    /// Path to the YAML credentials document
    pub credentials_path: PathBuf,

    /// Handle of the monitored account
    pub account: Option<String>,

    /// Shift applied to timestamps before they are bucketed by hour
    pub utc_offset_hours: i32,

    /// Number of posts requested per timeline fetch
    pub timeline_count: u32,

    /// Trailing windows used by each aggregation call site
    pub windows: WindowSettings,

    /// Platform endpoint bases
    pub api: ApiEndpoints,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            output_path: PathBuf::from("./data"),
            credentials_path: PathBuf::from("./conf/bot.yaml"),
            account: None,
            utc_offset_hours: 3,
            timeline_count: 200,
            windows: WindowSettings::default(),
            api: ApiEndpoints::default(),
        }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&Self::config_path())
    }

    /// Load configuration from `path`, falling back to defaults when the file
    /// does not exist.
    pub fn load_from(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Save configuration to `path`.
    pub fn save_to(&self, path: &Path) -> Result<(), ConfigError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }

    /// Get the path to the configuration file.
    pub fn config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("botoftheday")
            .join("config.json")
    }

    /// The monitored account, which every command needs.
    pub fn require_account(&self) -> Result<&str, ConfigError> {
        self.account
            .as_deref()
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .ok_or(ConfigError::MissingAccount)
    }

    /// The configured UTC offset as a chrono offset.
    pub fn utc_offset(&self) -> Result<FixedOffset, ConfigError> {
        self.utc_offset_hours
            .checked_mul(3600)
            .and_then(FixedOffset::east_opt)
            .ok_or_else(|| {
                ConfigError::Invalid(format!(
                    "utc_offset_hours {} is out of range",
                    self.utc_offset_hours
                ))
            })
    }

    /// Ensure the output directory exists.
    pub fn ensure_directories(&self) -> Result<(), ConfigError> {
        std::fs::create_dir_all(&self.output_path)?;
        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        self.utc_offset()?;
        for (name, days) in [
            ("windows.list", self.windows.list.cutoff_days),
            ("windows.post", self.windows.post.cutoff_days),
            ("windows.timeline_days", self.windows.timeline_days),
        ] {
            if !(days.is_finite() && days > 0.0) {
                return Err(ConfigError::Invalid(format!(
                    "{name} must be a positive number of days, got {days}"
                )));
            }
        }
        Ok(())
    }
}

/// Windows for each aggregation call site.
///
/// `list` and `post` pick the top interactor from the event log; they are
/// tuned separately and may differ in length and in whether the monitored
/// account can win. `timeline_days` bounds the per-account timeline summaries.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowSettings {
    pub list: InteractorWindow,
    pub post: InteractorWindow,
    pub timeline_days: f64,
}

impl Default for WindowSettings {
    fn default() -> Self {
        Self {
            list: InteractorWindow::default(),
            post: InteractorWindow::default(),
            timeline_days: 1.1,
        }
    }
}

/// Base URLs of the platform endpoints.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiEndpoints {
    pub rest_base: String,
    pub stream_base: String,
    pub upload_base: String,
}

impl Default for ApiEndpoints {
    fn default() -> Self {
        Self {
            rest_base: "https://api.twitter.com/1.1".to_string(),
            stream_base: "https://stream.twitter.com/1.1".to_string(),
            upload_base: "https://upload.twitter.com/1.1".to_string(),
        }
    }
}

/// One set of platform application and access tokens.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct CredentialSet {
    pub consumer_key: String,
    pub consumer_secret: String,
    pub access_token: String,
    pub access_token_secret: String,
}

/// The credentials document.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Credentials {
    /// Used by the live stream
    pub stream: CredentialSet,
    /// Used for lookups, timelines and posting
    pub list: CredentialSet,
}

impl Credentials {
    /// Read and parse the credentials document at `path`.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            ConfigError::Credentials(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::parse(&content)
    }

    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        serde_yaml::from_str(content).map_err(|e| ConfigError::Credentials(e.to_string()))
    }
}

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
    #[error("no monitored account configured; pass --user or set \"account\" in the config file")]
    MissingAccount,
    #[error("Credentials error: {0}")]
    Credentials(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.output_path, PathBuf::from("./data"));
        assert_eq!(config.utc_offset_hours, 3);
        assert_eq!(config.timeline_count, 200);
        assert_eq!(config.windows.list.cutoff_days, 1.0);
        assert!(config.windows.post.exclude_self);
        assert_eq!(config.windows.timeline_days, 1.1);
        assert!(matches!(
            config.require_account(),
            Err(ConfigError::MissingAccount)
        ));
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(
            &path,
            r#"{"account":"watched","windows":{"post":{"cutoff_days":1.3,"exclude_self":false}}}"#,
        )
        .unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.require_account().unwrap(), "watched");
        assert_eq!(config.windows.post.cutoff_days, 1.3);
        assert!(!config.windows.post.exclude_self);
        assert_eq!(config.windows.list, InteractorWindow::default());
        assert_eq!(config.timeline_count, 200);
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");
        let config = Config {
            account: Some("watched".to_string()),
            utc_offset_hours: -5,
            ..Config::default()
        };
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded.account.as_deref(), Some("watched"));
        assert_eq!(loaded.utc_offset().unwrap().local_minus_utc(), -5 * 3600);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");

        std::fs::write(&path, r#"{"utc_offset_hours":40}"#).unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Invalid(_))
        ));

        std::fs::write(&path, r#"{"utc_offset_hours":1000000}"#).unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Invalid(_))
        ));

        std::fs::write(&path, r#"{"windows":{"timeline_days":0}}"#).unwrap();
        assert!(matches!(
            Config::load_from(&path),
            Err(ConfigError::Invalid(_))
        ));

        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(Config::load_from(&path), Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_blank_account_is_missing() {
        let config = Config {
            account: Some("  ".to_string()),
            ..Config::default()
        };
        assert!(config.require_account().is_err());
    }

    #[test]
    fn test_credentials_parsing() {
        let yaml = r#"
stream:
  consumer-key: ck1
  consumer-secret: cs1
  access-token: at1
  access-token-secret: ats1
list:
  consumer-key: ck2
  consumer-secret: cs2
  access-token: at2
  access-token-secret: ats2
"#;
        let creds = Credentials::parse(yaml).unwrap();
        assert_eq!(creds.stream.access_token, "at1");
        assert_eq!(creds.list.consumer_key, "ck2");

        assert!(Credentials::parse("stream: {}").is_err());
        assert!(Credentials::load(Path::new("/nonexistent/bot.yaml")).is_err());
    }
}
