//! Worker pool: bounded slots running blocking fetches off the coordinator.

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{Semaphore, mpsc};

use crate::artifacts::{ArtifactPattern, ArtifactStore};
use crate::bridge::{FetchOutcome, FetchedArtifact, ProgressSink};
use crate::error::{FailureCategory, JobFailure};
use crate::fetch::{FetchEngine, FetchRequest};

/// One queued fetch
struct Dispatch {
    request: FetchRequest,
    pattern: ArtifactPattern,
    sink: ProgressSink,
}

/// Bounded set of execution slots for [`FetchEngine::fetch`]
///
/// Dispatches join a single queue. One dispatcher task takes them in order,
/// waits for a free slot, and only then spawns the fetch, so slots are
/// granted strictly first-in first-out. Each fetch runs on tokio's blocking
/// thread pool, verifies the artifact, and completes its sink exactly once.
#[derive(Clone)]
pub struct WorkerPool {
    queue: mpsc::UnboundedSender<Dispatch>,
    slots: Arc<Semaphore>,
    capacity: usize,
}

impl WorkerPool {
    /// Create a pool with `capacity` slots (at least one)
    ///
    /// Must be called from within a tokio runtime; the dispatcher task lives
    /// until every clone of the pool is dropped.
    pub fn new(engine: Arc<dyn FetchEngine>, artifacts: ArtifactStore, capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let slots = Arc::new(Semaphore::new(capacity));
        let (queue, queue_rx) = mpsc::unbounded_channel();
        tokio::spawn(run_dispatcher(
            engine,
            artifacts,
            Arc::clone(&slots),
            queue_rx,
        ));
        Self {
            queue,
            slots,
            capacity,
        }
    }

    /// Number of slots
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Slots currently running a fetch
    pub fn in_flight(&self) -> usize {
        self.capacity
            .saturating_sub(self.slots.available_permits())
    }

    /// Queue a fetch; returns immediately
    ///
    /// The queue position is taken here, synchronously, so the order of
    /// `dispatch` calls is the order fetches start in.
    pub(crate) fn dispatch(&self, request: FetchRequest, pattern: ArtifactPattern, sink: ProgressSink) {
        let dispatch = Dispatch {
            request,
            pattern,
            sink,
        };
        if let Err(mpsc::error::SendError(rejected)) = self.queue.send(dispatch) {
            // Dropping the sink reports an Internal failure for the job
            tracing::warn!(job_id = rejected.sink.job_id().0, "worker pool stopped before dispatch");
        }
    }
}

async fn run_dispatcher(
    engine: Arc<dyn FetchEngine>,
    artifacts: ArtifactStore,
    slots: Arc<Semaphore>,
    mut queue: mpsc::UnboundedReceiver<Dispatch>,
) {
    while let Some(Dispatch {
        request,
        pattern,
        sink,
    }) = queue.recv().await
    {
        let permit = match Arc::clone(&slots).acquire_owned().await {
            Ok(p) => p,
            Err(_) => {
                tracing::warn!(job_id = sink.job_id().0, "worker pool closed before dispatch");
                sink.complete(Err(JobFailure::new(
                    FailureCategory::Internal,
                    "worker pool closed",
                )));
                continue;
            }
        };

        let engine = Arc::clone(&engine);
        let artifacts = artifacts.clone();
        tokio::spawn(async move {
            let outcome = run_fetch(engine, &artifacts, request, &pattern, &sink).await;
            drop(permit);
            sink.complete(outcome);
        });
    }
    tracing::debug!("worker pool dispatcher stopped");
}

async fn run_fetch(
    engine: Arc<dyn FetchEngine>,
    artifacts: &ArtifactStore,
    request: FetchRequest,
    pattern: &ArtifactPattern,
    sink: &ProgressSink,
) -> FetchOutcome {
    let id = request.job_id;
    let reporter = sink.reporter();
    let started = Instant::now();
    tracing::info!(job_id = id.0, engine = engine.name(), url = %request.url, "fetch started");

    let result = tokio::task::spawn_blocking(move || {
        engine.fetch(&request, &mut |update| reporter.report(update))
    })
    .await;

    let elapsed_ms = started.elapsed().as_millis() as u64;
    match result {
        Ok(Ok(media)) => {
            tracing::info!(job_id = id.0, elapsed_ms, hint = ?media.artifact_hint, "fetch reported success");
            let path = artifacts.verify_produced(pattern).await?;
            Ok(FetchedArtifact {
                path,
                title: media.title,
            })
        }
        Ok(Err(error)) => {
            tracing::warn!(job_id = id.0, elapsed_ms, error = %error, "fetch failed");
            Err(JobFailure::from(error))
        }
        Err(join_error) => {
            let detail = if join_error.is_panic() {
                format!("fetch engine panicked: {}", panic_message(join_error.into_panic()))
            } else {
                format!("fetch task did not finish: {}", join_error)
            };
            tracing::error!(job_id = id.0, elapsed_ms, %detail, "fetch aborted");
            Err(JobFailure::new(FailureCategory::Internal, detail))
        }
    }
}

fn panic_message(payload: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_string()
    }
}
