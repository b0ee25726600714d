//! Traits and types for the fetch engine seam

use std::path::PathBuf;

use thiserror::Error;
use url::Url;

use crate::config::FetchConfig;
use crate::types::{JobId, ProgressUpdate};

/// Limits and client settings applied to one fetch
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchConstraints {
    /// Reject media larger than this
    pub max_size_bytes: u64,
    /// Engine format selector
    pub preferred_format: String,
    /// User agent presented to the media host
    pub user_agent: String,
    /// Cookie file for signed-in sessions
    pub cookie_file: Option<PathBuf>,
}

impl From<&FetchConfig> for FetchConstraints {
    fn from(config: &FetchConfig) -> Self {
        Self {
            max_size_bytes: config.max_size_bytes,
            preferred_format: config.preferred_format.clone(),
            user_agent: config.user_agent.clone(),
            cookie_file: config.cookie_file.clone(),
        }
    }
}

/// Everything a worker needs to run one fetch
///
/// An owned value: workers never see the job itself.
#[derive(Clone, Debug)]
pub struct FetchRequest {
    /// Job the fetch belongs to (for logging)
    pub job_id: JobId,
    /// Source URL
    pub url: Url,
    /// Output template, e.g. `/work/media_7.%(ext)s`
    pub output_template: PathBuf,
    /// Size, format, and client settings
    pub constraints: FetchConstraints,
}

/// What the engine reports on success
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct FetchedMedia {
    /// Where the engine says it wrote the file; verified separately
    pub artifact_hint: Option<PathBuf>,
    /// Media title from the engine's metadata
    pub title: Option<String>,
}

/// Unstructured failure text from the engine
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{message}")]
pub struct FetchError {
    /// Error text as the engine reported it
    pub message: String,
}

impl FetchError {
    /// Wrap an engine message
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// A blocking media retrieval engine
///
/// `fetch` runs on a worker thread and may block for minutes. It calls
/// `on_progress` zero or more times and returns exactly once.
///
/// # Examples
///
/// ```no_run
/// use media_relay::fetch::{FetchEngine, YtDlpEngine};
///
/// let engine = YtDlpEngine::from_path().expect("yt-dlp not found in PATH");
/// println!("using {}", engine.name());
/// ```
pub trait FetchEngine: Send + Sync {
    /// Retrieve the media described by `request`
    fn fetch(
        &self,
        request: &FetchRequest,
        on_progress: &mut dyn FnMut(ProgressUpdate),
    ) -> Result<FetchedMedia, FetchError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
