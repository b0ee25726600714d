//! Bot front-end: long-polls Telegram for messages and feeds links to the
//! coordinator.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::Config;
use crate::coordinator::Coordinator;
use crate::error::{Error, FailureCategory};
use crate::telegram::{Message, TelegramApi, Update};
use crate::types::Requester;

/// Pause after a failed getUpdates call
const POLL_ERROR_BACKOFF: Duration = Duration::from_secs(5);

/// What an incoming text asks for
#[derive(Debug, PartialEq, Eq)]
enum Incoming<'a> {
    Start,
    Help,
    /// Any other `/command`, ignored
    UnknownCommand(&'a str),
    /// Free text, treated as a link
    Link(&'a str),
}

fn parse_incoming(text: &str) -> Incoming<'_> {
    let text = text.trim();
    let Some(command) = text.strip_prefix('/') else {
        return Incoming::Link(text);
    };
    // "/start@relay_bot payload" addresses a specific bot in groups
    let name = command
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .split('@')
        .next()
        .unwrap_or_default();
    match name {
        "start" => Incoming::Start,
        "help" => Incoming::Help,
        _ => Incoming::UnknownCommand(name),
    }
}

/// Long-polling update loop
pub struct BotRunner {
    api: TelegramApi,
    coordinator: Coordinator,
    poll_timeout: Duration,
    max_size_bytes: u64,
}

impl BotRunner {
    /// Create a runner that submits links to `coordinator`
    pub fn new(api: TelegramApi, coordinator: Coordinator, config: &Config) -> Self {
        Self {
            api,
            coordinator,
            poll_timeout: config.telegram.poll_timeout,
            max_size_bytes: config.fetch.max_size_bytes,
        }
    }

    /// Poll until `cancel` fires
    ///
    /// Each update is acknowledged (via the next offset) once handled.
    /// Polling errors are logged and retried after a pause.
    pub async fn run(&self, cancel: CancellationToken) {
        let mut offset: Option<i64> = None;
        tracing::info!(poll_timeout_secs = self.poll_timeout.as_secs(), "bot is polling");

        loop {
            let result = tokio::select! {
                _ = cancel.cancelled() => break,
                result = self.api.get_updates(offset, self.poll_timeout) => result,
            };

            match result {
                Ok(updates) => {
                    for update in updates {
                        offset = Some(update.update_id + 1);
                        self.handle_update(update).await;
                    }
                }
                Err(e) => {
                    tracing::warn!(error = %e, "getUpdates failed, retrying");
                    tokio::select! {
                        _ = cancel.cancelled() => break,
                        _ = tokio::time::sleep(POLL_ERROR_BACKOFF) => {}
                    }
                }
            }
        }

        tracing::info!("bot stopped polling");
    }

    async fn handle_update(&self, update: Update) {
        let Some(message) = update.message else {
            return;
        };
        let Some(text) = message.text.as_deref() else {
            return;
        };

        match parse_incoming(text) {
            Incoming::Start => {
                let greeting = format!(
                    "Hi! Send me a link to a video, and I'll download it for you. (Max {}MB)",
                    self.max_size_bytes / (1024 * 1024)
                );
                self.reply(&message, &greeting).await;
            }
            Incoming::Help => {
                self.reply(
                    &message,
                    "Paste a URL. If downloads fail, the admin may need to refresh the cookie file.",
                )
                .await;
            }
            Incoming::UnknownCommand(name) => {
                tracing::debug!(chat_id = message.chat.id, command = name, "ignoring command");
            }
            Incoming::Link(link) => self.submit(&message, link).await,
        }
    }

    async fn submit(&self, message: &Message, link: &str) {
        let requester = Requester {
            chat_id: message.chat.id,
            reply_to: message.message_id,
        };
        match self.coordinator.submit(link, requester) {
            Ok(handle) => {
                tracing::debug!(job_id = handle.id().0, chat_id = requester.chat_id, "link submitted");
            }
            Err(Error::InvalidInput(reason)) => {
                tracing::debug!(chat_id = requester.chat_id, %reason, "rejected input");
                let text = FailureCategory::InvalidInput.user_message("", self.max_size_bytes);
                self.reply(message, &text).await;
            }
            Err(e) => {
                tracing::warn!(chat_id = requester.chat_id, error = %e, "link not accepted");
            }
        }
    }

    async fn reply(&self, message: &Message, text: &str) {
        if let Err(e) = self.api.send_message(message.chat.id, text, None).await {
            tracing::warn!(chat_id = message.chat.id, error = %e, "failed to send reply");
        }
    }
}
