//! Job coordinator: the single authority over job state.
//!
//! [`Coordinator`] is a cheap, cloneable handle. Behind it runs one event loop
//! task that owns every [`Job`](crate::Job), dispatches fetches to the
//! [`WorkerPool`], consumes progress posted through the progress bridge, and
//! queues each job's notifier calls on a per-job outbox so they run strictly
//! in order without ever blocking the loop.
//!
//! # Lifecycle of a job
//!
//! 1. [`Coordinator::submit`] validates the URL and posts the job
//! 2. The status message is created ("found link"), the job enters `Fetching`
//!    and is dispatched to the worker pool
//! 3. Progress edits are sent at most once per configured interval
//! 4. On success the job enters `Delivering`, the media is uploaded, the
//!    status message is deleted and the artifact removed
//! 5. On failure the status message is edited to a category-specific text
//!    and any partial artifact is removed

mod event_loop;
mod outbox;

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use url::Url;

use crate::artifacts::ArtifactStore;
use crate::bridge::ProgressThrottle;
use crate::config::Config;
use crate::error::{Error, JobFailure, Result};
use crate::fetch::{FetchConstraints, FetchEngine};
use crate::notify::Notifier;
use crate::types::{Event, JobId, Requester};
use crate::worker_pool::WorkerPool;
use event_loop::{Command, EventLoop, LoopSettings};

/// Capacity of the broadcast channel behind [`Coordinator::subscribe`]
const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// How a job ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum JobOutcome {
    /// Media delivered, status message deleted
    Succeeded,
    /// Job failed; the status message shows the failure
    Failed(JobFailure),
}

/// Handle to an accepted job
///
/// Dropping it does not affect the job.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    done: oneshot::Receiver<JobOutcome>,
}

impl JobHandle {
    /// The job's ID
    pub fn id(&self) -> JobId {
        self.id
    }

    /// Wait until the job has finished, cleanup included
    ///
    /// Fails with [`Error::ShuttingDown`] if the coordinator stopped before
    /// the job ran.
    pub async fn wait(self) -> Result<JobOutcome> {
        self.done.await.map_err(|_| Error::ShuttingDown)
    }
}

/// Handle to the coordinator loop (cloneable)
#[derive(Clone)]
pub struct Coordinator {
    inbox: mpsc::UnboundedSender<Command>,
    event_tx: broadcast::Sender<Event>,
    next_id: Arc<AtomicU64>,
    accepting: Arc<AtomicBool>,
    stopped: CancellationToken,
}

impl Coordinator {
    /// Start the coordinator loop
    ///
    /// Must be called from within a tokio runtime. Artifacts go to
    /// `config.fetch.work_dir`, which should already exist (see
    /// [`ArtifactStore::prepare`]).
    pub fn start(config: &Config, engine: Arc<dyn FetchEngine>, notifier: Arc<dyn Notifier>) -> Self {
        let artifacts = ArtifactStore::new(&config.fetch.work_dir);
        let (event_tx, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let (inbox, inbox_rx) = mpsc::unbounded_channel();
        let stopped = CancellationToken::new();

        tracing::debug!(
            engine = engine.name(),
            notifier = notifier.name(),
            work_dir = ?config.fetch.work_dir,
            "starting coordinator"
        );

        let settings = LoopSettings {
            pool: WorkerPool::new(engine, artifacts.clone(), config.relay.workers),
            artifacts,
            notifier,
            throttle: ProgressThrottle::new(config.relay.progress_interval),
            constraints: FetchConstraints::from(&config.fetch),
            max_size_bytes: config.fetch.max_size_bytes,
            event_tx: event_tx.clone(),
        };
        EventLoop::spawn(settings, inbox_rx, stopped.clone());

        Self {
            inbox,
            event_tx,
            next_id: Arc::new(AtomicU64::new(1)),
            accepting: Arc::new(AtomicBool::new(true)),
            stopped,
        }
    }

    /// Accept a URL for fetching and delivery
    ///
    /// Returns as soon as the job is queued. Input that is not an absolute
    /// http(s) URL is rejected with [`Error::InvalidInput`] before anything
    /// is dispatched.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidInput`] for unsupported input
    /// - [`Error::ShuttingDown`] after [`Coordinator::shutdown`]
    pub fn submit(&self, source_url: &str, requester: Requester) -> Result<JobHandle> {
        let url = validate_url(source_url)?;
        if !self.accepting.load(Ordering::SeqCst) {
            return Err(Error::ShuttingDown);
        }

        let id = JobId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let (done, done_rx) = oneshot::channel();
        self.inbox
            .send(Command::Submit {
                id,
                url,
                requester,
                done,
            })
            .map_err(|_| Error::ShuttingDown)?;

        Ok(JobHandle { id, done: done_rx })
    }

    /// Subscribe to job lifecycle events
    ///
    /// Only events sent after subscribing are received.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Whether new jobs are accepted
    pub fn is_accepting(&self) -> bool {
        self.accepting.load(Ordering::SeqCst) && !self.stopped.is_cancelled()
    }

    /// Stop accepting jobs and wait for in-flight ones to finish
    pub async fn shutdown(&self) {
        tracing::info!("coordinator shutdown requested");
        self.accepting.store(false, Ordering::SeqCst);
        self.inbox.send(Command::Shutdown).ok();
        self.stopped.cancelled().await;
    }
}

/// Parse and check a submitted URL
///
/// Accepts absolute `http`/`https` URLs with a host; surrounding whitespace
/// is ignored.
pub fn validate_url(input: &str) -> Result<Url> {
    let input = input.trim();
    let url = Url::parse(input)
        .map_err(|e| Error::InvalidInput(format!("{:?} is not an absolute URL: {}", input, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidInput(format!(
            "unsupported scheme {:?}",
            url.scheme()
        )));
    }
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::InvalidInput(format!("{:?} has no host", input)));
    }
    Ok(url)
}
