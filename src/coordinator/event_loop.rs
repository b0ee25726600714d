//! The coordinator loop: sole owner of job state.
//!
//! It reacts to three inputs (submitted jobs, bridged worker events, and
//! outbox reports) and never awaits network or disk I/O itself. Side effects
//! are queued on each job's [`Outbox`].

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio_util::sync::CancellationToken;
use url::Url;

use super::JobOutcome;
use super::outbox::{Outbox, OutboxOp, OutboxReport};
use crate::artifacts::{ArtifactPattern, ArtifactStore};
use crate::bridge::{BridgeEvent, FetchOutcome, ProgressBridge, ProgressThrottle};
use crate::error::{FailureCategory, JobFailure};
use crate::fetch::{FetchConstraints, FetchRequest};
use crate::job::Job;
use crate::notify::Notifier;
use crate::types::{ChatAction, Event, JobId, JobState, ProgressUpdate, Requester, StatusHandle};
use crate::worker_pool::WorkerPool;

/// First status text, sent before the fetch starts
pub(crate) const FOUND_LINK_TEXT: &str = "🔍 Found link! Initializing download...";

/// Request from a [`super::Coordinator`] handle
#[derive(Debug)]
pub(crate) enum Command {
    Submit {
        id: JobId,
        url: Url,
        requester: Requester,
        done: oneshot::Sender<JobOutcome>,
    },
    Shutdown,
}

/// Everything the loop needs, built by [`super::Coordinator::start`]
pub(crate) struct LoopSettings {
    pub(crate) pool: WorkerPool,
    pub(crate) artifacts: ArtifactStore,
    pub(crate) notifier: Arc<dyn Notifier>,
    pub(crate) throttle: ProgressThrottle,
    pub(crate) constraints: FetchConstraints,
    pub(crate) max_size_bytes: u64,
    pub(crate) event_tx: broadcast::Sender<Event>,
}

/// Receivers the loop selects over besides its inbox
pub(crate) struct LoopInputs {
    bridge_rx: mpsc::UnboundedReceiver<BridgeEvent>,
    reports_rx: mpsc::UnboundedReceiver<OutboxReport>,
}

struct JobEntry {
    job: Job,
    pattern: ArtifactPattern,
    outbox: Option<Outbox>,
    done: Option<oneshot::Sender<JobOutcome>>,
}

impl JobEntry {
    fn push(&self, op: OutboxOp) {
        match &self.outbox {
            Some(outbox) => outbox.push(op),
            None => tracing::warn!(job_id = self.job.id.0, ?op, "outbox already closed"),
        }
    }

    /// No more side effects for this job; the outbox drains and retires it
    fn close(&mut self) {
        self.outbox = None;
    }
}

pub(crate) struct EventLoop {
    jobs: HashMap<JobId, JobEntry>,
    pool: WorkerPool,
    artifacts: ArtifactStore,
    notifier: Arc<dyn Notifier>,
    bridge: ProgressBridge,
    throttle: ProgressThrottle,
    constraints: FetchConstraints,
    max_size_bytes: u64,
    event_tx: broadcast::Sender<Event>,
    reports_tx: mpsc::UnboundedSender<OutboxReport>,
    shutting_down: bool,
}

impl EventLoop {
    pub(crate) fn new(settings: LoopSettings) -> (Self, LoopInputs) {
        let (bridge, bridge_rx) = ProgressBridge::channel();
        let (reports_tx, reports_rx) = mpsc::unbounded_channel();
        let event_loop = Self {
            jobs: HashMap::new(),
            pool: settings.pool,
            artifacts: settings.artifacts,
            notifier: settings.notifier,
            bridge,
            throttle: settings.throttle,
            constraints: settings.constraints,
            max_size_bytes: settings.max_size_bytes,
            event_tx: settings.event_tx,
            reports_tx,
            shutting_down: false,
        };
        (
            event_loop,
            LoopInputs {
                bridge_rx,
                reports_rx,
            },
        )
    }

    /// Spawn the loop; `stopped` is cancelled once it exits
    pub(crate) fn spawn(
        settings: LoopSettings,
        inbox: mpsc::UnboundedReceiver<Command>,
        stopped: CancellationToken,
    ) -> tokio::task::JoinHandle<()> {
        let (event_loop, inputs) = Self::new(settings);
        tokio::spawn(async move {
            let _stopped = stopped.drop_guard();
            event_loop.run(inbox, inputs).await;
        })
    }

    async fn run(mut self, mut inbox: mpsc::UnboundedReceiver<Command>, inputs: LoopInputs) {
        let LoopInputs {
            mut bridge_rx,
            mut reports_rx,
        } = inputs;
        let mut inbox_open = true;
        tracing::info!(workers = self.pool.capacity(), "coordinator started");

        loop {
            tokio::select! {
                biased;
                Some(report) = reports_rx.recv() => self.on_outbox_report(report),
                Some(event) = bridge_rx.recv() => match event {
                    BridgeEvent::Progress { id, update } => self.on_progress(id, update),
                    BridgeEvent::Completed { id, outcome } => self.on_fetch_complete(id, outcome),
                },
                command = inbox.recv(), if inbox_open => match command {
                    Some(Command::Submit { id, url, requester, done }) => {
                        self.on_submit(id, url, requester, done)
                    }
                    Some(Command::Shutdown) => self.begin_shutdown(),
                    None => {
                        inbox_open = false;
                        self.begin_shutdown();
                    }
                },
                else => break,
            }

            if self.shutting_down && self.jobs.is_empty() {
                break;
            }
        }

        tracing::info!("coordinator stopped");
    }

    fn begin_shutdown(&mut self) {
        if !self.shutting_down {
            tracing::info!(active_jobs = self.jobs.len(), "coordinator draining");
        }
        self.shutting_down = true;
    }

    fn on_submit(&mut self, id: JobId, url: Url, requester: Requester, done: oneshot::Sender<JobOutcome>) {
        if self.shutting_down {
            tracing::warn!(job_id = id.0, "job submitted during shutdown, dropping");
            return;
        }

        tracing::info!(job_id = id.0, url = %url, chat_id = requester.chat_id, "job accepted");
        let outbox = Outbox::spawn(
            id,
            requester,
            Arc::clone(&self.notifier),
            self.artifacts.clone(),
            self.reports_tx.clone(),
        );
        let pattern = self.artifacts.derive_name(id);
        // Ids restart with the process; files left by an earlier run must not pass verification
        outbox.push(OutboxOp::ReleaseMatching(pattern.clone()));
        outbox.push(OutboxOp::SendStatus(FOUND_LINK_TEXT.to_string()));
        outbox.push(OutboxOp::ChatAction(ChatAction::Typing));

        emit(
            &self.event_tx,
            Event::Accepted {
                id,
                url: url.to_string(),
            },
        );
        self.jobs.insert(
            id,
            JobEntry {
                job: Job::new(id, url, requester),
                pattern,
                outbox: Some(outbox),
                done: Some(done),
            },
        );
    }

    fn on_outbox_report(&mut self, report: OutboxReport) {
        match report {
            OutboxReport::StatusCreated { id, handle } => self.on_status_created(id, handle),
            OutboxReport::StatusFailed { id, error } => self.on_status_failed(id, error),
            OutboxReport::UploadFinished { id, result } => self.on_upload_finished(id, result),
            OutboxReport::Retired { id } => self.on_retired(id),
        }
    }

    fn on_status_created(&mut self, id: JobId, handle: StatusHandle) {
        let Some(entry) = self.jobs.get_mut(&id) else {
            return;
        };
        entry.job.status_handle = Some(handle);
        if let Err(e) = entry.job.advance(JobState::Fetching) {
            tracing::error!(job_id = id.0, error = %e, "cannot start fetch");
            return;
        }

        let request = FetchRequest {
            job_id: id,
            url: entry.job.source_url.clone(),
            output_template: entry.pattern.output_template(),
            constraints: self.constraints.clone(),
        };
        self.pool
            .dispatch(request, entry.pattern.clone(), self.bridge.sink(id));
        emit(&self.event_tx, Event::Fetching { id });
    }

    fn on_status_failed(&mut self, id: JobId, error: String) {
        let Some(entry) = self.jobs.get_mut(&id) else {
            return;
        };
        let failure = JobFailure::new(
            FailureCategory::Internal,
            format!("status message not created: {}", error),
        );
        tracing::error!(job_id = id.0, detail = %failure.detail, "job failed before fetch");
        if let Err(e) = entry.job.fail(failure) {
            tracing::error!(job_id = id.0, error = %e, "cannot fail job");
        }
        entry.close();
    }

    /// Progress tick from a worker, admitted only while `Fetching`
    fn on_progress(&mut self, id: JobId, update: ProgressUpdate) {
        let Some(entry) = self.jobs.get_mut(&id) else {
            tracing::trace!(job_id = id.0, "progress for unknown job");
            return;
        };
        if entry.job.state() != JobState::Fetching {
            tracing::debug!(job_id = id.0, state = ?entry.job.state(), "discarding stale progress");
            return;
        }
        if !self
            .throttle
            .admits(entry.job.last_progress_emit_at, update.observed_at)
        {
            return;
        }

        entry.job.last_progress_emit_at = Some(update.observed_at);
        entry.push(OutboxOp::EditStatus(update.status_text()));
        emit(
            &self.event_tx,
            Event::Progress {
                id,
                percent: update.percent,
            },
        );
    }

    fn on_fetch_complete(&mut self, id: JobId, outcome: FetchOutcome) {
        let Some(entry) = self.jobs.get_mut(&id) else {
            tracing::warn!(job_id = id.0, "completion for unknown job");
            return;
        };

        match outcome {
            Ok(artifact) => {
                entry.job.artifact_path = Some(artifact.path.clone());
                entry.job.title = artifact.title;
                if let Err(e) = entry.job.advance(JobState::Delivering) {
                    tracing::error!(job_id = id.0, error = %e, "cannot deliver artifact");
                    if let Some(path) = entry.job.artifact_path.take() {
                        entry.push(OutboxOp::Release(path));
                    }
                    entry.close();
                    return;
                }

                let title = entry.job.display_title().to_string();
                tracing::info!(job_id = id.0, path = ?artifact.path, %title, "fetch complete, uploading");
                entry.push(OutboxOp::EditStatus(format!(
                    "✅ Download complete!\n⬆️ Uploading: {}...",
                    title
                )));
                entry.push(OutboxOp::ChatAction(ChatAction::UploadVideo));
                entry.push(OutboxOp::Upload {
                    path: artifact.path,
                    caption: format!("🎥 {}", title),
                });
                emit(&self.event_tx, Event::Delivering { id, title });
            }
            Err(failure) => {
                tracing::error!(
                    job_id = id.0,
                    url = %entry.job.source_url,
                    category = %failure.category,
                    detail = %failure.detail,
                    "fetch failed"
                );
                let text = failure.user_message(self.max_size_bytes);
                if let Err(e) = entry.job.fail(failure) {
                    tracing::error!(job_id = id.0, error = %e, "cannot fail job");
                }
                entry.push(OutboxOp::EditStatus(text));
                entry.push(OutboxOp::ReleaseMatching(entry.pattern.clone()));
                entry.close();
            }
        }
    }

    fn on_upload_finished(&mut self, id: JobId, result: Result<(), String>) {
        let Some(entry) = self.jobs.get_mut(&id) else {
            return;
        };

        match result {
            Ok(()) => match entry.job.advance(JobState::Succeeded) {
                Ok(()) => entry.push(OutboxOp::DeleteStatus),
                Err(e) => tracing::error!(job_id = id.0, error = %e, "cannot complete job"),
            },
            Err(detail) => {
                tracing::error!(job_id = id.0, %detail, "upload failed");
                let failure = JobFailure::new(FailureCategory::UploadFailure, detail);
                entry.push(OutboxOp::EditStatus(failure.user_message(self.max_size_bytes)));
                if let Err(e) = entry.job.fail(failure) {
                    tracing::error!(job_id = id.0, error = %e, "cannot fail job");
                }
            }
        }

        if let Some(path) = entry.job.artifact_path.take() {
            entry.push(OutboxOp::Release(path));
        }
        entry.push(OutboxOp::ReleaseMatching(entry.pattern.clone()));
        entry.close();
    }

    /// Cleanup finished: drop the job and publish its terminal event
    fn on_retired(&mut self, id: JobId) {
        let Some(mut entry) = self.jobs.remove(&id) else {
            return;
        };

        if !entry.job.state().is_terminal() {
            // Only reachable when the outbox task died mid-flight
            tracing::error!(job_id = id.0, state = ?entry.job.state(), "job retired before finishing");
            entry
                .job
                .fail(JobFailure::new(FailureCategory::Internal, "outbox stopped unexpectedly"))
                .ok();
            let artifacts = self.artifacts.clone();
            let path = entry.job.artifact_path.take();
            let pattern = entry.pattern.clone();
            tokio::spawn(async move {
                if let Some(path) = path {
                    artifacts.release(&path).await.ok();
                }
                artifacts.release_matching(&pattern).await.ok();
            });
        }

        let (event, outcome) = match entry.job.failure() {
            Some(failure) => (
                Event::Failed {
                    id,
                    category: failure.category,
                    detail: failure.detail.clone(),
                },
                JobOutcome::Failed(failure.clone()),
            ),
            None => (Event::Succeeded { id }, JobOutcome::Succeeded),
        };
        tracing::info!(job_id = id.0, outcome = ?outcome, "job finished");

        emit(&self.event_tx, event);
        if let Some(done) = entry.done.take() {
            done.send(outcome).ok();
        }
    }
}

fn emit(event_tx: &broadcast::Sender<Event>, event: Event) {
    // No subscribers is fine
    event_tx.send(event).ok();
}
