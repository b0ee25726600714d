//! Configuration types for media-relay

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::{path::PathBuf, time::Duration};

/// Default ceiling for fetched media: 50 MiB, the Bot API upload limit
pub const DEFAULT_MAX_SIZE_BYTES: u64 = 50 * 1024 * 1024;

/// Cookie file picked up from the working directory when none is configured
const DEFAULT_COOKIE_FILE: &str = "cookies.txt";

/// Telegram Bot API settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TelegramConfig {
    /// Bot token issued by @BotFather
    #[serde(default)]
    pub bot_token: String,

    /// Bot API base URL (default: "https://api.telegram.org")
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Long-poll timeout passed to getUpdates (default: 30 seconds)
    #[serde(default = "default_poll_timeout", with = "duration_serde")]
    pub poll_timeout: Duration,

    /// Timeout for ordinary requests (default: 30 seconds)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub request_timeout: Duration,

    /// Timeout for media uploads (default: 120 seconds)
    #[serde(default = "default_upload_timeout", with = "duration_serde")]
    pub upload_timeout: Duration,
}

impl Default for TelegramConfig {
    fn default() -> Self {
        Self {
            bot_token: String::new(),
            api_url: default_api_url(),
            poll_timeout: default_poll_timeout(),
            request_timeout: default_request_timeout(),
            upload_timeout: default_upload_timeout(),
        }
    }
}

/// Fetch engine settings (yt-dlp)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetchConfig {
    /// Directory fetched artifacts are written to (default: "./work")
    #[serde(default = "default_work_dir")]
    pub work_dir: PathBuf,

    /// Maximum artifact size in bytes (default: 50 MiB)
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,

    /// yt-dlp format selector (default: "best[ext=mp4]/best")
    #[serde(default = "default_preferred_format")]
    pub preferred_format: String,

    /// User agent presented to media hosts
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Netscape-format cookie file for sites that need a signed-in session
    #[serde(default)]
    pub cookie_file: Option<PathBuf>,

    /// Path to the yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub ytdlp_path: Option<PathBuf>,

    /// Whether to search PATH for yt-dlp if no explicit path is set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            work_dir: default_work_dir(),
            max_size_bytes: default_max_size_bytes(),
            preferred_format: default_preferred_format(),
            user_agent: default_user_agent(),
            cookie_file: None,
            ytdlp_path: None,
            search_path: true,
        }
    }
}

/// Job pipeline settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Number of fetches that may run at once (default: 4)
    #[serde(default = "default_workers")]
    pub workers: usize,

    /// Minimum time between two progress edits of one status message (default: 2.0 seconds)
    #[serde(default = "default_progress_interval", with = "duration_serde")]
    pub progress_interval: Duration,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            workers: default_workers(),
            progress_interval: default_progress_interval(),
        }
    }
}

/// Main configuration
///
/// - [`telegram`](TelegramConfig) — Bot API credentials and timeouts
/// - [`fetch`](FetchConfig) — yt-dlp location, limits, and cookies
/// - [`relay`](RelayConfig) — worker capacity and progress throttling
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Telegram Bot API settings
    #[serde(default)]
    pub telegram: TelegramConfig,

    /// Fetch engine settings
    #[serde(default)]
    pub fetch: FetchConfig,

    /// Job pipeline settings
    #[serde(default)]
    pub relay: RelayConfig,
}

impl Config {
    /// Build a configuration from process environment variables
    ///
    /// | Variable | Field |
    /// |---|---|
    /// | `BOT_TOKEN` | `telegram.bot_token` |
    /// | `TELEGRAM_API_URL` | `telegram.api_url` |
    /// | `RELAY_WORK_DIR` | `fetch.work_dir` |
    /// | `RELAY_MAX_SIZE_BYTES` | `fetch.max_size_bytes` |
    /// | `RELAY_COOKIE_FILE` | `fetch.cookie_file` |
    /// | `YTDLP_PATH` | `fetch.ytdlp_path` |
    /// | `RELAY_WORKERS` | `relay.workers` |
    /// | `RELAY_PROGRESS_INTERVAL_SECS` | `relay.progress_interval` |
    ///
    /// Unset variables keep their defaults. When `RELAY_COOKIE_FILE` is unset,
    /// `cookies.txt` in the working directory is used if it exists.
    pub fn from_env() -> Result<Self> {
        let mut config = Self::from_lookup(|key| std::env::var(key).ok())?;
        if config.fetch.cookie_file.is_none() {
            let fallback = PathBuf::from(DEFAULT_COOKIE_FILE);
            if fallback.is_file() {
                config.fetch.cookie_file = Some(fallback);
            }
        }
        Ok(config)
    }

    /// Build a configuration from an arbitrary key lookup
    ///
    /// Used by [`Config::from_env`]; takes a closure so callers can supply
    /// values without touching the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Config::default();

        if let Some(token) = lookup("BOT_TOKEN") {
            config.telegram.bot_token = token;
        }
        if let Some(url) = lookup("TELEGRAM_API_URL") {
            config.telegram.api_url = url;
        }
        if let Some(dir) = lookup("RELAY_WORK_DIR") {
            config.fetch.work_dir = PathBuf::from(dir);
        }
        if let Some(raw) = lookup("RELAY_MAX_SIZE_BYTES") {
            config.fetch.max_size_bytes = parse_value("RELAY_MAX_SIZE_BYTES", &raw)?;
        }
        if let Some(path) = lookup("RELAY_COOKIE_FILE") {
            config.fetch.cookie_file = Some(PathBuf::from(path));
        }
        if let Some(path) = lookup("YTDLP_PATH") {
            config.fetch.ytdlp_path = Some(PathBuf::from(path));
        }
        if let Some(raw) = lookup("RELAY_WORKERS") {
            config.relay.workers = parse_value("RELAY_WORKERS", &raw)?;
        }
        if let Some(raw) = lookup("RELAY_PROGRESS_INTERVAL_SECS") {
            let secs: f64 = parse_value("RELAY_PROGRESS_INTERVAL_SECS", &raw)?;
            config.relay.progress_interval =
                Duration::try_from_secs_f64(secs).map_err(|e| Error::Config {
                    message: format!("invalid progress interval {}: {}", raw, e),
                    key: Some("RELAY_PROGRESS_INTERVAL_SECS".to_string()),
                })?;
        }

        Ok(config)
    }

    /// Check settings that would otherwise fail later at runtime
    pub fn validate(&self) -> Result<()> {
        if self.telegram.bot_token.trim().is_empty() {
            return Err(Error::Config {
                message: "bot token is empty".to_string(),
                key: Some("BOT_TOKEN".to_string()),
            });
        }
        if self.relay.workers == 0 {
            return Err(Error::Config {
                message: "at least one worker is required".to_string(),
                key: Some("RELAY_WORKERS".to_string()),
            });
        }
        if self.fetch.max_size_bytes == 0 {
            return Err(Error::Config {
                message: "maximum media size must be greater than zero".to_string(),
                key: Some("RELAY_MAX_SIZE_BYTES".to_string()),
            });
        }
        Ok(())
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.trim().parse().map_err(|e: T::Err| Error::Config {
        message: format!("invalid value {:?}: {}", raw, e),
        key: Some(key.to_string()),
    })
}

fn default_api_url() -> String {
    "https://api.telegram.org".to_string()
}

fn default_poll_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_upload_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_work_dir() -> PathBuf {
    PathBuf::from("./work")
}

fn default_max_size_bytes() -> u64 {
    DEFAULT_MAX_SIZE_BYTES
}

fn default_preferred_format() -> String {
    "best[ext=mp4]/best".to_string()
}

fn default_user_agent() -> String {
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36".to_string()
}

fn default_true() -> bool {
    true
}

fn default_workers() -> usize {
    4
}

fn default_progress_interval() -> Duration {
    Duration::from_secs(2)
}

// Duration as fractional seconds
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(serde::de::Error::custom)
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_match_documented_values() {
        let config = Config::default();
        assert_eq!(config.fetch.max_size_bytes, 50 * 1024 * 1024);
        assert_eq!(config.relay.workers, 4);
        assert_eq!(config.relay.progress_interval, Duration::from_secs(2));
        assert_eq!(config.fetch.preferred_format, "best[ext=mp4]/best");
        assert!(config.fetch.cookie_file.is_none());
        assert!(config.fetch.search_path);
        assert_eq!(config.telegram.upload_timeout, Duration::from_secs(120));
    }

    #[test]
    fn lookup_overrides_defaults() {
        let config = Config::from_lookup(lookup_from(&[
            ("BOT_TOKEN", "123:abc"),
            ("RELAY_WORKERS", "2"),
            ("RELAY_PROGRESS_INTERVAL_SECS", "0.5"),
            ("RELAY_MAX_SIZE_BYTES", "1048576"),
            ("RELAY_COOKIE_FILE", "/etc/relay/cookies.txt"),
            ("RELAY_WORK_DIR", "/var/tmp/relay"),
        ]))
        .unwrap();

        assert_eq!(config.telegram.bot_token, "123:abc");
        assert_eq!(config.relay.workers, 2);
        assert_eq!(config.relay.progress_interval, Duration::from_millis(500));
        assert_eq!(config.fetch.max_size_bytes, 1_048_576);
        assert_eq!(
            config.fetch.cookie_file,
            Some(PathBuf::from("/etc/relay/cookies.txt"))
        );
        assert_eq!(config.fetch.work_dir, PathBuf::from("/var/tmp/relay"));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn malformed_number_reports_the_offending_key() {
        let err = Config::from_lookup(lookup_from(&[("RELAY_WORKERS", "four")])).unwrap_err();
        match err {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("RELAY_WORKERS")),
            other => panic!("expected Config error, got {other:?}"),
        }

        let err = Config::from_lookup(lookup_from(&[("RELAY_PROGRESS_INTERVAL_SECS", "-1")]))
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn validate_rejects_missing_token_and_zero_workers() {
        let config = Config::default();
        match config.validate().unwrap_err() {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("BOT_TOKEN")),
            other => panic!("expected Config error, got {other:?}"),
        }

        let mut config = Config::default();
        config.telegram.bot_token = "t".into();
        config.relay.workers = 0;
        match config.validate().unwrap_err() {
            Error::Config { key, .. } => assert_eq!(key.as_deref(), Some("RELAY_WORKERS")),
            other => panic!("expected Config error, got {other:?}"),
        }
    }

    #[test]
    fn duration_serde_uses_fractional_seconds() {
        let relay = RelayConfig {
            workers: 1,
            progress_interval: Duration::from_millis(2500),
        };
        let json = serde_json::to_value(&relay).unwrap();
        assert_eq!(json["progress_interval"], 2.5);

        let restored: RelayConfig = serde_json::from_str(r#"{"progress_interval":0.25}"#).unwrap();
        assert_eq!(restored.progress_interval, Duration::from_millis(250));
        assert_eq!(restored.workers, 4);
    }

    #[test]
    fn config_default_survives_json_round_trip() {
        let original = Config::default();
        let json = serde_json::to_string(&original).unwrap();
        let restored: Config = serde_json::from_str(&json).unwrap();
        assert_eq!(restored.fetch.max_size_bytes, original.fetch.max_size_bytes);
        assert_eq!(restored.relay.progress_interval, original.relay.progress_interval);
        assert_eq!(restored.telegram.api_url, original.telegram.api_url);
    }

    #[test]
    fn empty_json_object_yields_defaults() {
        let config: Config = serde_json::from_str("{}").unwrap();
        assert_eq!(config.relay.workers, 4);
        assert_eq!(config.telegram.poll_timeout, Duration::from_secs(30));
    }
}
