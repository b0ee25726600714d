//! Per-job outbox: one task per job that runs its notifier calls and file
//! cleanup strictly in the order the coordinator queued them.

use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::mpsc;

use crate::artifacts::{ArtifactPattern, ArtifactStore};
use crate::notify::Notifier;
use crate::types::{ChatAction, JobId, Requester, StatusHandle};

/// Side effect queued by the coordinator for one job
#[derive(Debug)]
pub(crate) enum OutboxOp {
    SendStatus(String),
    ChatAction(ChatAction),
    EditStatus(String),
    Upload { path: PathBuf, caption: String },
    DeleteStatus,
    Release(PathBuf),
    ReleaseMatching(ArtifactPattern),
}

/// Result of an outbox operation the coordinator has to react to
#[derive(Debug)]
pub(crate) enum OutboxReport {
    StatusCreated { id: JobId, handle: StatusHandle },
    StatusFailed { id: JobId, error: String },
    UploadFinished { id: JobId, result: Result<(), String> },
    /// Every queued op has run and the outbox was closed
    Retired { id: JobId },
}

/// Coordinator-side handle; dropping it closes the outbox
///
/// The outbox drains whatever is still queued, then reports
/// [`OutboxReport::Retired`].
#[derive(Debug)]
pub(crate) struct Outbox {
    tx: mpsc::UnboundedSender<OutboxOp>,
}

impl Outbox {
    pub(crate) fn spawn(
        id: JobId,
        requester: Requester,
        notifier: Arc<dyn Notifier>,
        artifacts: ArtifactStore,
        reports: mpsc::UnboundedSender<OutboxReport>,
    ) -> Self {
        let (tx, rx) = mpsc::unbounded_channel();
        let runner = OutboxRunner {
            id,
            requester,
            notifier,
            artifacts,
            reports: reports.clone(),
            status: None,
        };

        tokio::spawn(async move {
            // Retired is sent even if a notifier call panics, so the job never leaks.
            if let Err(e) = tokio::spawn(runner.run(rx)).await {
                tracing::error!(job_id = id.0, error = %e, "outbox task aborted");
            }
            reports.send(OutboxReport::Retired { id }).ok();
        });

        Self { tx }
    }

    pub(crate) fn push(&self, op: OutboxOp) {
        // The runner only stops once this handle is dropped
        self.tx.send(op).ok();
    }
}

struct OutboxRunner {
    id: JobId,
    requester: Requester,
    notifier: Arc<dyn Notifier>,
    artifacts: ArtifactStore,
    reports: mpsc::UnboundedSender<OutboxReport>,
    status: Option<StatusHandle>,
}

impl OutboxRunner {
    async fn run(mut self, mut rx: mpsc::UnboundedReceiver<OutboxOp>) {
        while let Some(op) = rx.recv().await {
            self.execute(op).await;
        }
    }

    async fn execute(&mut self, op: OutboxOp) {
        let id = self.id;
        match op {
            OutboxOp::SendStatus(text) => {
                let report = match self.notifier.send_status(&self.requester, &text).await {
                    Ok(handle) => {
                        self.status = Some(handle);
                        OutboxReport::StatusCreated { id, handle }
                    }
                    Err(e) => {
                        tracing::warn!(job_id = id.0, error = %e, "failed to send status message");
                        OutboxReport::StatusFailed {
                            id,
                            error: e.to_string(),
                        }
                    }
                };
                self.reports.send(report).ok();
            }
            OutboxOp::ChatAction(action) => {
                if let Err(e) = self.notifier.send_chat_action(&self.requester, action).await {
                    tracing::debug!(job_id = id.0, action = action.as_str(), error = %e, "chat action failed");
                }
            }
            OutboxOp::EditStatus(text) => {
                let Some(handle) = self.status else {
                    tracing::debug!(job_id = id.0, "no status message to edit");
                    return;
                };
                if let Err(e) = self.notifier.edit_status(&handle, &text).await {
                    tracing::warn!(job_id = id.0, error = %e, "failed to edit status message");
                }
            }
            OutboxOp::Upload { path, caption } => {
                let result = self
                    .notifier
                    .upload_media(&self.requester, &path, &caption)
                    .await
                    .map_err(|e| e.to_string());
                self.reports
                    .send(OutboxReport::UploadFinished { id, result })
                    .ok();
            }
            OutboxOp::DeleteStatus => {
                let Some(handle) = self.status.take() else {
                    return;
                };
                if let Err(e) = self.notifier.delete_status(&handle).await {
                    tracing::warn!(job_id = id.0, error = %e, "failed to delete status message");
                }
            }
            OutboxOp::Release(path) => {
                if let Err(e) = self.artifacts.release(&path).await {
                    tracing::error!(job_id = id.0, ?path, error = %e, "failed to remove artifact");
                }
            }
            OutboxOp::ReleaseMatching(pattern) => match self.artifacts.release_matching(&pattern).await {
                Ok(0) => {}
                Ok(removed) => tracing::debug!(job_id = id.0, removed, "removed leftover artifacts"),
                Err(e) => {
                    tracing::error!(job_id = id.0, stem = pattern.stem(), error = %e, "failed to remove leftover artifacts")
                }
            },
        }
    }
}
