//! Error types for media-relay
//!
//! Two layers live here:
//! - [`Error`], the crate-wide error returned by fallible operations
//! - [`FailureCategory`] and [`JobFailure`], the user-facing taxonomy a job ends with
//!
//! Every job failure carries the raw detail for operator logs. Only
//! [`FailureCategory::UploadFailure`] surfaces that detail to the requester.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::{JobId, JobState};

/// Result type alias for media-relay operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for media-relay
#[derive(Debug, Error)]
pub enum Error {
    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "BOT_TOKEN")
        key: Option<String>,
    },

    /// Submitted input is not a supported absolute URL
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// A job was asked to move backwards or skip a state
    #[error("job {id} cannot move from {from:?} to {to:?}")]
    InvalidTransition {
        /// The job that rejected the transition
        id: JobId,
        /// The state the job is in
        from: JobState,
        /// The state that was requested
        to: JobState,
    },

    /// The Telegram Bot API answered with `ok: false`
    #[error("telegram error {code}: {description}")]
    Telegram {
        /// Telegram error code (HTTP-like, e.g. 400)
        code: i64,
        /// Description returned by the API
        description: String,
    },

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Shutdown in progress - not accepting new jobs
    #[error("shutdown in progress: not accepting new jobs")]
    ShuttingDown,
}

impl Error {
    /// The failure category a job would end with if this error terminated it
    pub fn category(&self) -> FailureCategory {
        match self {
            Error::InvalidInput(_) => FailureCategory::InvalidInput,
            _ => FailureCategory::Internal,
        }
    }

    /// Whether this is a Telegram "message is not modified" answer
    ///
    /// Telegram rejects edits that would not change the text. For a status
    /// message that is the same outcome as a successful edit.
    pub fn is_not_modified(&self) -> bool {
        matches!(
            self,
            Error::Telegram { code: 400, description } if description.contains("message is not modified")
        )
    }
}

/// Why a job ended in `Failed`
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureCategory {
    /// URL failed the scheme check, nothing was fetched
    InvalidInput,
    /// The source requires a signed-in session
    AuthRequired,
    /// The media is larger than the configured ceiling
    SizeLimitExceeded,
    /// The engine reported success but no artifact exists on disk
    NotFound,
    /// Uploading the fetched artifact failed
    UploadFailure,
    /// Anything else
    Internal,
}

impl FailureCategory {
    /// Machine-readable code used in logs and events
    pub fn code(&self) -> &'static str {
        match self {
            FailureCategory::InvalidInput => "invalid_input",
            FailureCategory::AuthRequired => "auth_required",
            FailureCategory::SizeLimitExceeded => "size_limit_exceeded",
            FailureCategory::NotFound => "not_found",
            FailureCategory::UploadFailure => "upload_failure",
            FailureCategory::Internal => "internal",
        }
    }

    /// Short text shown to the requester
    ///
    /// `detail` is only used for [`FailureCategory::UploadFailure`];
    /// `max_size_bytes` is only used for [`FailureCategory::SizeLimitExceeded`].
    pub fn user_message(&self, detail: &str, max_size_bytes: u64) -> String {
        match self {
            FailureCategory::InvalidInput => "❌ Invalid URL.".to_string(),
            FailureCategory::AuthRequired => {
                "❌ Sign-in required. Ask the admin to refresh the stored cookies.".to_string()
            }
            FailureCategory::SizeLimitExceeded => {
                format!("❌ Media is too large (>{}).", megabytes(max_size_bytes))
            }
            FailureCategory::UploadFailure => format!("❌ Upload failed: {}", detail),
            FailureCategory::NotFound | FailureCategory::Internal => {
                "❌ Download failed (link valid? geo-blocked?)".to_string()
            }
        }
    }
}

/// Size ceiling as shown to users: whole MiB when exact, one decimal otherwise
fn megabytes(bytes: u64) -> String {
    const MIB: u64 = 1024 * 1024;
    if bytes % MIB == 0 {
        format!("{}MB", bytes / MIB)
    } else {
        format!("{:.1}MB", bytes as f64 / MIB as f64)
    }
}

impl std::fmt::Display for FailureCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Terminal failure of a job: category plus the raw underlying detail
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct JobFailure {
    /// Classified category
    pub category: FailureCategory,
    /// Raw detail for operator logs
    pub detail: String,
}

impl JobFailure {
    /// Create a failure with the given category and detail
    pub fn new(category: FailureCategory, detail: impl Into<String>) -> Self {
        Self {
            category,
            detail: detail.into(),
        }
    }

    /// Text shown to the requester for this failure
    pub fn user_message(&self, max_size_bytes: u64) -> String {
        self.category.user_message(&self.detail, max_size_bytes)
    }
}

impl std::fmt::Display for JobFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.category, self.detail)
    }
}
