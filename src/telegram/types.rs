//! Bot API wire types (the subset the bot reads)

use serde::{Deserialize, Serialize};

use crate::types::MessageId;

/// Envelope every Bot API method answers with
#[derive(Debug, Deserialize)]
pub struct ApiResponse<T> {
    /// Whether the call succeeded
    pub ok: bool,
    /// Method result when `ok`
    pub result: Option<T>,
    /// Error description when not `ok`
    pub description: Option<String>,
    /// Error code when not `ok`
    pub error_code: Option<i64>,
    /// Extra error information (flood control)
    pub parameters: Option<ResponseParameters>,
}

/// Additional error details
#[derive(Debug, Deserialize)]
pub struct ResponseParameters {
    /// Seconds to wait before repeating a request rejected by flood control
    pub retry_after: Option<u64>,
}

/// Incoming update from getUpdates
#[derive(Clone, Debug, Deserialize)]
pub struct Update {
    /// Monotonic update identifier
    pub update_id: i64,
    /// New incoming message, if this update is one
    pub message: Option<Message>,
}

/// A chat message
#[derive(Clone, Debug, Deserialize)]
pub struct Message {
    /// Identifier inside the chat
    pub message_id: MessageId,
    /// Chat the message belongs to
    pub chat: Chat,
    /// Sender, absent for channel posts
    pub from: Option<User>,
    /// Text for text messages
    pub text: Option<String>,
}

/// A chat
#[derive(Clone, Debug, Deserialize)]
pub struct Chat {
    /// Chat identifier
    pub id: i64,
    /// "private", "group", "supergroup", or "channel"
    #[serde(rename = "type")]
    pub kind: String,
}

/// A Telegram user or bot
#[derive(Clone, Debug, Deserialize)]
pub struct User {
    /// User identifier
    pub id: i64,
    /// Whether this user is a bot
    #[serde(default)]
    pub is_bot: bool,
    /// First name
    pub first_name: String,
    /// Username without the leading @
    pub username: Option<String>,
}

/// `reply_parameters` object
#[derive(Clone, Copy, Debug, Serialize)]
pub struct ReplyParameters {
    /// Message to reply to
    pub message_id: MessageId,
    /// Send anyway if the original message was deleted
    pub allow_sending_without_reply: bool,
}

impl ReplyParameters {
    /// Reply to `message_id`, tolerating its deletion
    pub fn to(message_id: MessageId) -> Self {
        Self {
            message_id,
            allow_sending_without_reply: true,
        }
    }
}
