//! The job entity: immutable request facts plus lifecycle state.

use std::path::PathBuf;
use std::time::Instant;

use url::Url;

use crate::error::{Error, JobFailure, Result};
use crate::types::{JobId, JobState, Requester, StatusHandle};

/// One in-flight request to fetch and deliver a media artifact
///
/// Owned by the coordinator loop; nothing else holds a `Job`.
#[derive(Debug)]
pub struct Job {
    /// Unique per job; also names the artifact
    pub id: JobId,
    /// Validated http(s) source
    pub source_url: Url,
    /// Where status and result messages go
    pub requester: Requester,
    /// The job's status message, once created
    pub status_handle: Option<StatusHandle>,
    /// Fetched file, until released
    pub artifact_path: Option<PathBuf>,
    /// Media title from fetch metadata
    pub title: Option<String>,
    /// Observation time of the last progress update that produced an edit
    pub last_progress_emit_at: Option<Instant>,
    state: JobState,
    failure: Option<JobFailure>,
}

impl Job {
    /// Create a job in `Pending`
    pub fn new(id: JobId, source_url: Url, requester: Requester) -> Self {
        Self {
            id,
            source_url,
            requester,
            status_handle: None,
            artifact_path: None,
            title: None,
            last_progress_emit_at: None,
            state: JobState::Pending,
            failure: None,
        }
    }

    /// Current lifecycle state
    pub fn state(&self) -> JobState {
        self.state
    }

    /// Failure details, set only in `Failed`
    pub fn failure(&self) -> Option<&JobFailure> {
        self.failure.as_ref()
    }

    /// Move forward to `next`
    ///
    /// Use [`Job::fail`] to enter `Failed`, so the failure is always recorded.
    pub fn advance(&mut self, next: JobState) -> Result<()> {
        if next == JobState::Failed || !self.state.can_transition_to(next) {
            return Err(Error::InvalidTransition {
                id: self.id,
                from: self.state,
                to: next,
            });
        }
        tracing::debug!(job_id = self.id.0, from = ?self.state, to = ?next, "job state change");
        self.state = next;
        Ok(())
    }

    /// Enter `Failed`, recording why
    pub fn fail(&mut self, failure: JobFailure) -> Result<()> {
        if !self.state.can_transition_to(JobState::Failed) {
            return Err(Error::InvalidTransition {
                id: self.id,
                from: self.state,
                to: JobState::Failed,
            });
        }
        tracing::debug!(job_id = self.id.0, from = ?self.state, category = %failure.category, "job failed");
        self.state = JobState::Failed;
        self.failure = Some(failure);
        Ok(())
    }

    /// Title used for the upload status and caption
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("Video")
    }
}
