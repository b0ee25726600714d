//! # media-relay
//!
//! Fetches media behind a URL with yt-dlp and relays it back to the
//! Telegram chat that asked for it, keeping a single status message up to
//! date while the fetch runs.
//!
//! ## Pieces
//!
//! - [`Coordinator`] - single owner of job state, the only caller of the notifier
//! - [`WorkerPool`] - bounded slots running blocking fetches off the coordinator
//! - [`fetch`] - the [`FetchEngine`] seam and the yt-dlp engine
//! - [`notify`] - the [`Notifier`] seam and its Telegram implementation
//! - [`ArtifactStore`] - per-job file names, verification, and removal
//! - [`BotRunner`] - long-polls Telegram and feeds links to the coordinator
//!
//! ## Quick Start
//!
//! ```no_run
//! use media_relay::notify::TelegramNotifier;
//! use media_relay::telegram::TelegramApi;
//! use media_relay::{Config, Coordinator, Event, MessageId, Requester, fetch};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::from_env()?;
//!     config.validate()?;
//!
//!     let engine = fetch::engine_from_config(&config.fetch);
//!     let notifier = Arc::new(TelegramNotifier::new(TelegramApi::new(&config.telegram)?));
//!     let coordinator = Coordinator::start(&config, engine, notifier);
//!
//!     // Subscribe to events
//!     let mut events = coordinator.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let requester = Requester { chat_id: 42, reply_to: MessageId(1) };
//!     let job = coordinator.submit("https://example.com/watch?v=1", requester)?;
//!     println!("job {} finished: {:?}", job.id(), job.wait().await?);
//!
//!     coordinator.shutdown().await;
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Artifact naming, verification, and removal
pub mod artifacts;
/// Telegram bot front-end
pub mod bot;
/// Worker-to-coordinator progress channel and throttle
pub mod bridge;
/// Fetch error classification
pub mod classify;
/// Configuration types
pub mod config;
/// Job coordinator
pub mod coordinator;
/// Error types
pub mod error;
/// Fetch engines
pub mod fetch;
/// The job entity
pub mod job;
/// Outbound notifications
pub mod notify;
/// Telegram Bot API client
pub mod telegram;
/// Core types and events
pub mod types;
/// Worker pool for blocking fetches
pub mod worker_pool;

// Re-export commonly used types
pub use artifacts::{ArtifactPattern, ArtifactStore};
pub use bot::BotRunner;
pub use bridge::ProgressThrottle;
pub use classify::classify_fetch_error;
pub use config::Config;
pub use coordinator::{Coordinator, JobHandle, JobOutcome, validate_url};
pub use error::{Error, FailureCategory, JobFailure, Result};
pub use fetch::{FetchEngine, NoOpFetchEngine, YtDlpEngine};
pub use job::Job;
pub use notify::{Notifier, TelegramNotifier};
pub use types::{ChatAction, Event, JobId, JobState, MessageId, ProgressUpdate, Requester, StatusHandle};
pub use worker_pool::WorkerPool;

use tokio_util::sync::CancellationToken;

/// Run until a termination signal, then shut down gracefully.
///
/// On SIGTERM/SIGINT (Ctrl+C elsewhere) `intake` is cancelled first so no new
/// links are read, then the coordinator drains its in-flight jobs.
///
/// # Example
///
/// ```no_run
/// use media_relay::{Config, Coordinator, NoOpFetchEngine, run_with_shutdown};
/// use media_relay::notify::TelegramNotifier;
/// use media_relay::telegram::TelegramApi;
/// use std::sync::Arc;
/// use tokio_util::sync::CancellationToken;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let config = Config::from_env()?;
///     let notifier = Arc::new(TelegramNotifier::new(TelegramApi::new(&config.telegram)?));
///     let coordinator = Coordinator::start(&config, Arc::new(NoOpFetchEngine), notifier);
///
///     // Run with automatic signal handling
///     run_with_shutdown(coordinator, CancellationToken::new()).await;
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(coordinator: Coordinator, intake: CancellationToken) {
    wait_for_signal().await;
    intake.cancel();
    coordinator.shutdown().await;
}

#[cfg(unix)]
async fn wait_for_signal() {
    use tokio::signal::unix::{SignalKind, signal};

    // Registration may fail in restricted environments (containers, tests)
    let sigterm_result = signal(SignalKind::terminate());
    let sigint_result = signal(SignalKind::interrupt());

    match (sigterm_result, sigint_result) {
        (Ok(mut sigterm), Ok(mut sigint)) => {
            tokio::select! {
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM signal");
                }
                _ = sigint.recv() => {
                    tracing::info!("Received SIGINT signal (Ctrl+C)");
                }
            }
        }
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "Could not register signal handlers, using ctrl_c fallback");
            tokio::signal::ctrl_c().await.ok();
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_signal() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => {
            tracing::info!("Received Ctrl+C signal");
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
        }
    }
}
