//! Telegram Bot API client
//!
//! A thin wrapper over the HTTP methods the relay needs. Every call goes to
//! `{api_url}/bot{token}/{method}` and answers with an [`ApiResponse`]
//! envelope; `ok: false` becomes [`Error::Telegram`](crate::Error::Telegram).

mod api;
mod types;

pub use api::TelegramApi;
pub use types::{ApiResponse, Chat, Message, ReplyParameters, ResponseParameters, Update, User};
