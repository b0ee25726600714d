//! Notifier backed by the Telegram Bot API

use async_trait::async_trait;
use std::path::Path;

use super::traits::Notifier;
use crate::error::Result;
use crate::telegram::TelegramApi;
use crate::types::{ChatAction, Requester, StatusHandle};

/// [`Notifier`] that talks to a Telegram chat
#[derive(Clone, Debug)]
pub struct TelegramNotifier {
    api: TelegramApi,
}

impl TelegramNotifier {
    /// Wrap a Bot API client
    pub fn new(api: TelegramApi) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    async fn send_status(&self, target: &Requester, text: &str) -> Result<StatusHandle> {
        let message = self
            .api
            .send_message(target.chat_id, text, Some(target.reply_to))
            .await?;
        Ok(StatusHandle {
            chat_id: message.chat.id,
            message_id: message.message_id,
        })
    }

    async fn edit_status(&self, handle: &StatusHandle, text: &str) -> Result<()> {
        match self
            .api
            .edit_message_text(handle.chat_id, handle.message_id, text)
            .await
        {
            Err(e) if e.is_not_modified() => Ok(()),
            other => other,
        }
    }

    async fn delete_status(&self, handle: &StatusHandle) -> Result<()> {
        self.api
            .delete_message(handle.chat_id, handle.message_id)
            .await
    }

    async fn upload_media(&self, target: &Requester, path: &Path, caption: &str) -> Result<()> {
        self.api
            .send_video(target.chat_id, path, caption, Some(target.reply_to))
            .await?;
        Ok(())
    }

    async fn send_chat_action(&self, target: &Requester, action: ChatAction) -> Result<()> {
        self.api.send_chat_action(target.chat_id, action).await
    }

    fn name(&self) -> &'static str {
        "telegram"
    }
}
