//! The outbound messaging seam

use async_trait::async_trait;
use std::path::Path;

use crate::error::Result;
use crate::types::{ChatAction, Requester, StatusHandle};

/// Outbound status messages and media delivery
///
/// The coordinator is the only caller. For any one job, calls are made
/// strictly one after another; calls for different jobs may overlap.
///
/// # Examples
///
/// ```no_run
/// use media_relay::config::TelegramConfig;
/// use media_relay::notify::{Notifier, TelegramNotifier};
/// use media_relay::telegram::TelegramApi;
/// use media_relay::types::{MessageId, Requester};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let api = TelegramApi::new(&TelegramConfig {
///     bot_token: "123:abc".into(),
///     ..Default::default()
/// })?;
/// let notifier = TelegramNotifier::new(api);
/// let target = Requester { chat_id: 42, reply_to: MessageId(7) };
///
/// let status = notifier.send_status(&target, "working...").await?;
/// notifier.edit_status(&status, "almost there").await?;
/// notifier.delete_status(&status).await?;
/// # Ok(())
/// # }
/// ```
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Create the status message for a job, replying to the request
    async fn send_status(&self, target: &Requester, text: &str) -> Result<StatusHandle>;

    /// Replace the status message text
    ///
    /// Editing to identical text succeeds.
    async fn edit_status(&self, handle: &StatusHandle, text: &str) -> Result<()>;

    /// Remove the status message
    async fn delete_status(&self, handle: &StatusHandle) -> Result<()>;

    /// Deliver a media file as a reply to the request
    async fn upload_media(&self, target: &Requester, path: &Path, caption: &str) -> Result<()>;

    /// Show a transient activity indicator in the requester's chat
    async fn send_chat_action(&self, target: &Requester, action: ChatAction) -> Result<()>;

    /// Name of this implementation, for logs
    fn name(&self) -> &'static str;
}
