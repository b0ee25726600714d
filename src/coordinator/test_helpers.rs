//! Shared test doubles for coordinator tests: a notifier that records every
//! call and a fetch engine that plays back a script.

use async_trait::async_trait;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicI64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tempfile::TempDir;

use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::error::{Error, Result};
use crate::fetch::{FetchEngine, FetchError, FetchRequest, FetchedMedia};
use crate::notify::Notifier;
use crate::types::{ChatAction, MessageId, ProgressUpdate, Requester, StatusHandle};

/// One recorded notifier call
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Call {
    SendStatus { chat_id: i64, text: String },
    Edit { chat_id: i64, text: String },
    Delete { chat_id: i64 },
    Upload {
        chat_id: i64,
        path: PathBuf,
        caption: String,
        file_existed: bool,
    },
    ChatAction { chat_id: i64, action: ChatAction },
}

impl Call {
    pub(crate) fn chat_id(&self) -> i64 {
        match self {
            Call::SendStatus { chat_id, .. }
            | Call::Edit { chat_id, .. }
            | Call::Delete { chat_id }
            | Call::Upload { chat_id, .. }
            | Call::ChatAction { chat_id, .. } => *chat_id,
        }
    }

    /// Operation on the status message (send, edit, delete)
    pub(crate) fn is_status_op(&self) -> bool {
        matches!(
            self,
            Call::SendStatus { .. } | Call::Edit { .. } | Call::Delete { .. }
        )
    }
}

/// Notifier that records calls and detects overlapping calls per chat
#[derive(Default)]
pub(crate) struct RecordingNotifier {
    calls: Mutex<Vec<Call>>,
    next_message_id: AtomicI64,
    in_flight: Mutex<HashMap<i64, usize>>,
    overlaps: AtomicUsize,
    fail_uploads: bool,
    fail_send_status: bool,
    call_delay: Duration,
}

impl RecordingNotifier {
    pub(crate) fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub(crate) fn failing_uploads() -> Arc<Self> {
        Arc::new(Self {
            fail_uploads: true,
            ..Default::default()
        })
    }

    pub(crate) fn failing_status() -> Arc<Self> {
        Arc::new(Self {
            fail_send_status: true,
            ..Default::default()
        })
    }

    /// Every call sleeps for `delay`, widening the window for overlaps
    pub(crate) fn slow(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            call_delay: delay,
            ..Default::default()
        })
    }

    pub(crate) fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub(crate) fn status_ops(&self, chat_id: i64) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| c.chat_id() == chat_id && c.is_status_op())
            .collect()
    }

    pub(crate) fn uploads(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|c| matches!(c, Call::Upload { .. }))
            .collect()
    }

    /// Calls that started while another call for the same chat was running
    pub(crate) fn overlaps(&self) -> usize {
        self.overlaps.load(Ordering::SeqCst)
    }

    async fn record(&self, call: Call) {
        let chat_id = call.chat_id();
        {
            let mut in_flight = self.in_flight.lock().unwrap();
            let running = in_flight.entry(chat_id).or_insert(0);
            if *running > 0 {
                self.overlaps.fetch_add(1, Ordering::SeqCst);
            }
            *running += 1;
        }
        self.calls.lock().unwrap().push(call);

        if self.call_delay > Duration::ZERO {
            tokio::time::sleep(self.call_delay).await;
        } else {
            tokio::task::yield_now().await;
        }

        *self.in_flight.lock().unwrap().entry(chat_id).or_insert(1) -= 1;
    }
}

#[async_trait]
impl Notifier for RecordingNotifier {
    async fn send_status(&self, target: &Requester, text: &str) -> Result<StatusHandle> {
        self.record(Call::SendStatus {
            chat_id: target.chat_id,
            text: text.to_string(),
        })
        .await;
        if self.fail_send_status {
            return Err(Error::Telegram {
                code: 403,
                description: "Forbidden: bot was blocked by the user".into(),
            });
        }
        Ok(StatusHandle {
            chat_id: target.chat_id,
            message_id: MessageId(self.next_message_id.fetch_add(1, Ordering::SeqCst) + 100),
        })
    }

    async fn edit_status(&self, handle: &StatusHandle, text: &str) -> Result<()> {
        self.record(Call::Edit {
            chat_id: handle.chat_id,
            text: text.to_string(),
        })
        .await;
        Ok(())
    }

    async fn delete_status(&self, handle: &StatusHandle) -> Result<()> {
        self.record(Call::Delete {
            chat_id: handle.chat_id,
        })
        .await;
        Ok(())
    }

    async fn upload_media(&self, target: &Requester, path: &Path, caption: &str) -> Result<()> {
        self.record(Call::Upload {
            chat_id: target.chat_id,
            path: path.to_path_buf(),
            caption: caption.to_string(),
            file_existed: path.exists(),
        })
        .await;
        if self.fail_uploads {
            return Err(Error::Telegram {
                code: 413,
                description: "Request Entity Too Large".into(),
            });
        }
        Ok(())
    }

    async fn send_chat_action(&self, target: &Requester, action: ChatAction) -> Result<()> {
        self.record(Call::ChatAction {
            chat_id: target.chat_id,
            action,
        })
        .await;
        Ok(())
    }

    fn name(&self) -> &'static str {
        "recording"
    }
}

/// How a scripted fetch ends
#[derive(Clone, Debug)]
pub(crate) enum Finish {
    /// Write `media_<id>.mp4` and report success
    Produce { title: Option<String> },
    /// Like `Produce`, plus a stray `.ytdl` sidecar next to the artifact
    ProduceWithSidecar { title: Option<String> },
    /// Report success without writing anything
    ReportOnly,
    /// Report an engine error
    Fail(String),
    /// Leave a `.part` file behind, then report an engine error
    FailWithPartial(String),
    /// Panic inside the engine
    Panic,
}

/// Engine that emits progress at scripted observation offsets, then finishes
pub(crate) struct ScriptedEngine {
    ticks: Vec<Duration>,
    finish: Finish,
    hold: Duration,
    requests: Mutex<Vec<FetchRequest>>,
}

impl ScriptedEngine {
    pub(crate) fn new(ticks: Vec<Duration>, finish: Finish) -> Self {
        Self {
            ticks,
            finish,
            hold: Duration::ZERO,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub(crate) fn succeeding(ticks: Vec<Duration>) -> Self {
        Self::new(
            ticks,
            Finish::Produce {
                title: Some("Clip".into()),
            },
        )
    }

    /// Block the worker thread this long before finishing
    pub(crate) fn holding(mut self, hold: Duration) -> Self {
        self.hold = hold;
        self
    }

    pub(crate) fn requests(&self) -> Vec<FetchRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn artifact_path(request: &FetchRequest, ext: &str) -> PathBuf {
        PathBuf::from(
            request
                .output_template
                .to_string_lossy()
                .replace("%(ext)s", ext),
        )
    }
}

impl FetchEngine for ScriptedEngine {
    fn fetch(
        &self,
        request: &FetchRequest,
        on_progress: &mut dyn FnMut(ProgressUpdate),
    ) -> std::result::Result<FetchedMedia, FetchError> {
        self.requests.lock().unwrap().push(request.clone());

        let base = Instant::now();
        let total = self.ticks.len();
        for (i, offset) in self.ticks.iter().enumerate() {
            let mut update = ProgressUpdate::new(
                Some((i + 1) as f32 * 100.0 / total as f32),
                "00:05",
                "1.00MiB/s",
            );
            update.observed_at = base + *offset;
            on_progress(update);
        }
        std::thread::sleep(self.hold);

        match &self.finish {
            Finish::Produce { title } => {
                let path = Self::artifact_path(request, "mp4");
                std::fs::write(&path, b"video").unwrap();
                Ok(FetchedMedia {
                    artifact_hint: Some(path),
                    title: title.clone(),
                })
            }
            Finish::ProduceWithSidecar { title } => {
                let path = Self::artifact_path(request, "mp4");
                std::fs::write(&path, b"video").unwrap();
                std::fs::write(Self::artifact_path(request, "mp4.ytdl"), b"state").unwrap();
                Ok(FetchedMedia {
                    artifact_hint: Some(path),
                    title: title.clone(),
                })
            }
            Finish::ReportOnly => Ok(FetchedMedia::default()),
            Finish::Fail(message) => Err(FetchError::new(message.clone())),
            Finish::FailWithPartial(message) => {
                std::fs::write(Self::artifact_path(request, "mp4.part"), b"partial").unwrap();
                Err(FetchError::new(message.clone()))
            }
            Finish::Panic => panic!("scripted engine panic"),
        }
    }

    fn name(&self) -> &'static str {
        "scripted"
    }
}

/// Configuration rooted in a fresh temp work directory
pub(crate) fn test_config(workers: usize) -> (Config, TempDir) {
    let dir = tempfile::tempdir().unwrap();
    let mut config = Config::default();
    config.fetch.work_dir = dir.path().to_path_buf();
    config.relay.workers = workers;
    config.relay.progress_interval = Duration::from_secs(2);
    (config, dir)
}

/// Start a coordinator over the given doubles
pub(crate) fn start(
    engine: Arc<ScriptedEngine>,
    notifier: Arc<RecordingNotifier>,
    workers: usize,
) -> (Coordinator, TempDir) {
    let (config, dir) = test_config(workers);
    (Coordinator::start(&config, engine, notifier), dir)
}

pub(crate) fn requester(chat_id: i64) -> Requester {
    Requester {
        chat_id,
        reply_to: MessageId(chat_id * 10),
    }
}
