//! Outbound notifications
//!
//! [`Notifier`] is the interface the coordinator drives; [`TelegramNotifier`]
//! implements it over the Bot API.

mod telegram;
mod traits;

pub use telegram::TelegramNotifier;
pub use traits::Notifier;
