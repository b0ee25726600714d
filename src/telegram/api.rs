use std::path::Path;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::json;
use tokio_util::io::ReaderStream;

use super::types::{ApiResponse, Message, ReplyParameters, Update, User};
use crate::config::TelegramConfig;
use crate::error::{Error, Result};
use crate::types::{ChatAction, MessageId};

#[derive(Serialize)]
struct GetUpdatesParams<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    offset: Option<i64>,
    timeout: u64,
    allowed_updates: &'a [&'a str],
}

#[derive(Serialize)]
struct SendMessageParams<'a> {
    chat_id: i64,
    text: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    reply_parameters: Option<ReplyParameters>,
}

/// Bot API client
///
/// Cheap to clone; clones share the underlying connection pool.
#[derive(Clone)]
pub struct TelegramApi {
    client: reqwest::Client,
    base_url: String,
    request_timeout: Duration,
    upload_timeout: Duration,
}

impl std::fmt::Debug for TelegramApi {
    // The base URL embeds the bot token
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramApi")
            .field("request_timeout", &self.request_timeout)
            .field("upload_timeout", &self.upload_timeout)
            .finish_non_exhaustive()
    }
}

impl TelegramApi {
    /// Create a client from configuration
    pub fn new(config: &TelegramConfig) -> Result<Self> {
        if config.bot_token.is_empty() {
            return Err(Error::Config {
                message: "bot token is empty".to_string(),
                key: Some("BOT_TOKEN".to_string()),
            });
        }
        let client = reqwest::Client::builder()
            .connect_timeout(config.request_timeout)
            .build()?;
        Ok(Self {
            client,
            base_url: format!(
                "{}/bot{}",
                config.api_url.trim_end_matches('/'),
                config.bot_token
            ),
            request_timeout: config.request_timeout,
            upload_timeout: config.upload_timeout,
        })
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/{}", self.base_url, method)
    }

    async fn call<P, R>(&self, method: &str, params: &P, timeout: Duration) -> Result<R>
    where
        P: Serialize + ?Sized,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.method_url(method))
            .json(params)
            .timeout(timeout)
            .send()
            .await?;
        decode(method, response).await
    }

    /// Identity of the bot behind the token
    pub async fn get_me(&self) -> Result<User> {
        self.call("getMe", &json!({}), self.request_timeout).await
    }

    /// Long-poll for new updates
    ///
    /// `offset` acknowledges every update with a lower id. The HTTP timeout is
    /// the poll timeout plus the ordinary request timeout.
    pub async fn get_updates(&self, offset: Option<i64>, poll_timeout: Duration) -> Result<Vec<Update>> {
        let params = GetUpdatesParams {
            offset,
            timeout: poll_timeout.as_secs(),
            allowed_updates: &["message"],
        };
        self.call("getUpdates", &params, poll_timeout + self.request_timeout)
            .await
    }

    /// Send a text message, optionally as a reply
    pub async fn send_message(
        &self,
        chat_id: i64,
        text: &str,
        reply_to: Option<MessageId>,
    ) -> Result<Message> {
        let params = SendMessageParams {
            chat_id,
            text,
            reply_parameters: reply_to.map(ReplyParameters::to),
        };
        self.call("sendMessage", &params, self.request_timeout).await
    }

    /// Replace the text of a message sent by the bot
    pub async fn edit_message_text(&self, chat_id: i64, message_id: MessageId, text: &str) -> Result<()> {
        let params = json!({
            "chat_id": chat_id,
            "message_id": message_id,
            "text": text,
        });
        // Answers with the edited Message, or `true` for inline messages
        let _: serde_json::Value = self
            .call("editMessageText", &params, self.request_timeout)
            .await?;
        Ok(())
    }

    /// Delete a message
    pub async fn delete_message(&self, chat_id: i64, message_id: MessageId) -> Result<()> {
        let params = json!({ "chat_id": chat_id, "message_id": message_id });
        let _: bool = self
            .call("deleteMessage", &params, self.request_timeout)
            .await?;
        Ok(())
    }

    /// Show a chat action such as "typing" for a few seconds
    pub async fn send_chat_action(&self, chat_id: i64, action: ChatAction) -> Result<()> {
        let params = json!({ "chat_id": chat_id, "action": action.as_str() });
        let _: bool = self
            .call("sendChatAction", &params, self.request_timeout)
            .await?;
        Ok(())
    }

    /// Upload a video file as a multipart request
    pub async fn send_video(
        &self,
        chat_id: i64,
        path: &Path,
        caption: &str,
        reply_to: Option<MessageId>,
    ) -> Result<Message> {
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "video.mp4".to_string());
        tracing::debug!(chat_id, file = %file_name, size, "uploading video");

        // Streamed from disk; the artifact is never held in memory whole
        let body = reqwest::Body::wrap_stream(ReaderStream::new(file));
        let video = Part::stream_with_length(body, size)
            .file_name(file_name)
            .mime_str(mime_for(path))?;
        let mut form = Form::new()
            .text("chat_id", chat_id.to_string())
            .text("caption", caption.to_string())
            .text("supports_streaming", "true")
            .part("video", video);
        if let Some(message_id) = reply_to {
            form = form.text(
                "reply_parameters",
                serde_json::to_string(&ReplyParameters::to(message_id))?,
            );
        }

        let response = self
            .client
            .post(self.method_url("sendVideo"))
            .multipart(form)
            .timeout(self.upload_timeout)
            .send()
            .await?;
        decode("sendVideo", response).await
    }
}

/// Unwrap the response envelope
///
/// Non-JSON bodies (proxies, gateways) are reported with the HTTP status.
async fn decode<R: DeserializeOwned>(method: &str, response: reqwest::Response) -> Result<R> {
    let status = response.status();
    let body = response.bytes().await?;

    let envelope: ApiResponse<R> = match serde_json::from_slice(&body) {
        Ok(envelope) => envelope,
        Err(e) if status.is_success() => return Err(e.into()),
        Err(_) => {
            return Err(Error::Telegram {
                code: i64::from(status.as_u16()),
                description: String::from_utf8_lossy(&body).trim().to_string(),
            });
        }
    };

    match envelope {
        ApiResponse {
            ok: true,
            result: Some(result),
            ..
        } => Ok(result),
        ApiResponse {
            description,
            error_code,
            parameters,
            ..
        } => {
            let code = error_code.unwrap_or_else(|| i64::from(status.as_u16()));
            let description = description.unwrap_or_else(|| "no description".to_string());
            tracing::debug!(
                method,
                code,
                retry_after = parameters.and_then(|p| p.retry_after),
                %description,
                "bot api call rejected"
            );
            Err(Error::Telegram { code, description })
        }
    }
}

fn mime_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()) {
        Some("webm") => "video/webm",
        Some("mkv") => "video/x-matroska",
        Some("mov") => "video/quicktime",
        _ => "video/mp4",
    }
}
