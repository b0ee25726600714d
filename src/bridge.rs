//! Progress bridge between worker threads and the coordinator loop.
//!
//! Workers never touch job state. They post immutable [`BridgeEvent`]s on an
//! unbounded channel whose sender is safe to use from any thread, and the
//! coordinator consumes them on its own turn.

use std::path::PathBuf;
use std::time::{Duration, Instant};

use tokio::sync::mpsc;

use crate::error::{FailureCategory, JobFailure};
use crate::types::{JobId, ProgressUpdate};

/// A fetch that finished with a verified artifact on disk
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchedArtifact {
    /// Verified artifact path
    pub path: PathBuf,
    /// Title reported by the engine
    pub title: Option<String>,
}

/// Terminal outcome of one fetch
pub type FetchOutcome = Result<FetchedArtifact, JobFailure>;

/// Message posted from a worker to the coordinator
#[derive(Debug)]
pub(crate) enum BridgeEvent {
    /// Engine progress tick
    Progress { id: JobId, update: ProgressUpdate },
    /// Fetch finished; sent exactly once per dispatched job
    Completed { id: JobId, outcome: FetchOutcome },
}

/// Sending half of the bridge, cloned into every dispatch
#[derive(Clone, Debug)]
pub(crate) struct ProgressBridge {
    tx: mpsc::UnboundedSender<BridgeEvent>,
}

impl ProgressBridge {
    /// Create a bridge and the receiver the coordinator reads from
    pub(crate) fn channel() -> (Self, mpsc::UnboundedReceiver<BridgeEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Per-job sink handed to the worker pool
    pub(crate) fn sink(&self, id: JobId) -> ProgressSink {
        ProgressSink {
            id,
            tx: Some(self.tx.clone()),
        }
    }
}

/// Worker-side handle for one job's progress and completion
///
/// `complete` consumes the sink. A sink dropped without completing (a worker
/// task torn down mid-flight) reports an `Internal` failure instead, so the
/// coordinator always hears back exactly once.
#[derive(Debug)]
pub(crate) struct ProgressSink {
    id: JobId,
    tx: Option<mpsc::UnboundedSender<BridgeEvent>>,
}

impl ProgressSink {
    /// Job this sink reports for
    pub(crate) fn job_id(&self) -> JobId {
        self.id
    }

    /// Cloneable progress handle for the thread running the fetch
    pub(crate) fn reporter(&self) -> ProgressReporter {
        ProgressReporter {
            id: self.id,
            tx: self.tx.clone(),
        }
    }

    /// Post the terminal outcome
    pub(crate) fn complete(mut self, outcome: FetchOutcome) {
        self.send_completion(outcome);
    }

    fn send_completion(&mut self, outcome: FetchOutcome) {
        if let Some(tx) = self.tx.take() {
            tx.send(BridgeEvent::Completed {
                id: self.id,
                outcome,
            })
            .ok();
        }
    }
}

impl Drop for ProgressSink {
    fn drop(&mut self) {
        if self.tx.is_some() {
            tracing::warn!(job_id = self.id.0, "fetch sink dropped before completion");
            self.send_completion(Err(JobFailure::new(
                FailureCategory::Internal,
                "worker stopped before the fetch completed",
            )));
        }
    }
}

/// Progress half of a [`ProgressSink`], safe to move onto a blocking thread
#[derive(Clone, Debug)]
pub(crate) struct ProgressReporter {
    id: JobId,
    tx: Option<mpsc::UnboundedSender<BridgeEvent>>,
}

impl ProgressReporter {
    /// Post a progress tick; callable from any thread
    pub(crate) fn report(&self, update: ProgressUpdate) {
        if let Some(tx) = &self.tx {
            // A closed channel means the coordinator is gone; nothing left to inform.
            tx.send(BridgeEvent::Progress {
                id: self.id,
                update,
            })
            .ok();
        }
    }
}

/// Minimum-interval filter for progress edits
///
/// The first update of a job is always admitted; after that, an update is
/// admitted only once `interval` has passed since the last admitted one.
/// Everything in between is dropped, since only the latest progress matters.
#[derive(Clone, Copy, Debug)]
pub struct ProgressThrottle {
    interval: Duration,
}

impl ProgressThrottle {
    /// Throttle with the given minimum interval
    pub fn new(interval: Duration) -> Self {
        Self { interval }
    }

    /// Whether an update observed at `now` should produce an edit
    pub fn admits(&self, last_emit: Option<Instant>, now: Instant) -> bool {
        match last_emit {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        }
    }
}
