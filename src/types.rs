//! Core types for media-relay

use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::error::FailureCategory;

/// Unique identifier for a job
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub u64);

impl JobId {
    /// Create a new JobId
    pub fn new(id: u64) -> Self {
        Self(id)
    }

    /// Get the inner u64 value
    pub fn get(&self) -> u64 {
        self.0
    }
}

impl From<u64> for JobId {
    fn from(id: u64) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::str::FromStr for JobId {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(s.parse()?))
    }
}

/// Job lifecycle state
///
/// `Pending → Fetching → {Delivering → {Succeeded, Failed}, Failed}`.
/// A job that cannot open its status message fails straight from `Pending`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobState {
    /// Accepted, status message not yet created
    Pending,
    /// Running on a worker slot (or waiting for one)
    Fetching,
    /// Artifact on disk, upload in progress
    Delivering,
    /// Uploaded and cleaned up
    Succeeded,
    /// Ended with a [`crate::JobFailure`]
    Failed,
}

impl JobState {
    /// `Succeeded` or `Failed`
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Succeeded | JobState::Failed)
    }

    /// Whether moving from `self` to `next` is a legal forward step
    pub fn can_transition_to(&self, next: JobState) -> bool {
        matches!(
            (self, next),
            (JobState::Pending, JobState::Fetching)
                | (JobState::Pending, JobState::Failed)
                | (JobState::Fetching, JobState::Delivering)
                | (JobState::Fetching, JobState::Failed)
                | (JobState::Delivering, JobState::Succeeded)
                | (JobState::Delivering, JobState::Failed)
        )
    }
}

/// Telegram message identifier
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MessageId(pub i64);

/// Handle of the single status message a job edits in place
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct StatusHandle {
    /// Chat the status message lives in
    pub chat_id: i64,
    /// The status message itself
    pub message_id: MessageId,
}

/// Where status and result messages for a job go
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Requester {
    /// Chat (private chat, group, or channel) that sent the request
    pub chat_id: i64,
    /// Message carrying the URL; results are posted as replies to it
    pub reply_to: MessageId,
}

/// Chat action shown while the bot works
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatAction {
    /// "typing…"
    Typing,
    /// "sending video…"
    UploadVideo,
}

impl ChatAction {
    /// Value of the Bot API `action` parameter
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatAction::Typing => "typing",
            ChatAction::UploadVideo => "upload_video",
        }
    }
}

/// One progress report from the fetch engine
///
/// Labels are pre-formatted by the engine ("1.20MiB/s", "00:13").
/// `observed_at` is stamped where the event was produced, so throttling
/// does not depend on how long the event waited in the bridge.
#[derive(Clone, Debug, PartialEq)]
pub struct ProgressUpdate {
    /// Completion percentage, if the engine knows the total size
    pub percent: Option<f32>,
    /// Estimated time remaining
    pub eta: String,
    /// Current transfer speed
    pub speed: String,
    /// When the engine reported this progress
    pub observed_at: Instant,
}

impl ProgressUpdate {
    /// Create an update stamped with the current instant
    pub fn new(percent: Option<f32>, eta: impl Into<String>, speed: impl Into<String>) -> Self {
        Self {
            percent,
            eta: eta.into(),
            speed: speed.into(),
            observed_at: Instant::now(),
        }
    }

    /// Status message text for this update
    pub fn status_text(&self) -> String {
        let percent = match self.percent {
            Some(p) => format!("{:.1}%", p),
            None => "?".to_string(),
        };
        format!(
            "⬇️ Downloading: {}\n🚀 Speed: {}\n⏳ ETA: {}",
            percent, self.speed, self.eta
        )
    }
}

/// Job lifecycle event
///
/// Broadcast to every subscriber of [`crate::Coordinator::subscribe`].
/// Terminal events are sent after the job's cleanup has finished.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Job accepted and queued for its status message
    Accepted {
        /// Job ID
        id: JobId,
        /// Source URL
        url: String,
    },
    /// Job handed to the worker pool
    Fetching {
        /// Job ID
        id: JobId,
    },
    /// A progress edit was sent
    Progress {
        /// Job ID
        id: JobId,
        /// Completion percentage if known
        percent: Option<f32>,
    },
    /// Fetch finished, upload started
    Delivering {
        /// Job ID
        id: JobId,
        /// Media title
        title: String,
    },
    /// Media delivered and artifact removed
    Succeeded {
        /// Job ID
        id: JobId,
    },
    /// Job failed
    Failed {
        /// Job ID
        id: JobId,
        /// Failure category
        category: FailureCategory,
        /// Raw failure detail
        detail: String,
    },
}

impl Event {
    /// The job this event belongs to
    pub fn job_id(&self) -> JobId {
        match self {
            Event::Accepted { id, .. }
            | Event::Fetching { id }
            | Event::Progress { id, .. }
            | Event::Delivering { id, .. }
            | Event::Succeeded { id }
            | Event::Failed { id, .. } => *id,
        }
    }

    /// Whether this is a `Succeeded` or `Failed` event
    pub fn is_terminal(&self) -> bool {
        matches!(self, Event::Succeeded { .. } | Event::Failed { .. })
    }
}
