//! media-relay bot binary
//!
//! Reads configuration from the environment (and `.env` if present), then
//! polls Telegram until SIGTERM/SIGINT.

use std::sync::Arc;

use media_relay::notify::TelegramNotifier;
use media_relay::telegram::TelegramApi;
use media_relay::{ArtifactStore, BotRunner, Config, Coordinator, fetch, run_with_shutdown};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set
const DEFAULT_LOG_FILTER: &str = "info,media_relay=debug";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // A missing .env file is fine
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER)),
        )
        .init();

    let config = Config::from_env()?;
    config.validate()?;

    ArtifactStore::new(&config.fetch.work_dir).prepare().await?;

    let api = TelegramApi::new(&config.telegram)?;
    match api.get_me().await {
        Ok(me) => tracing::info!(bot = me.username.as_deref().unwrap_or(&me.first_name), "authorized"),
        Err(e) => tracing::warn!(error = %e, "getMe failed, continuing"),
    }

    let engine = fetch::engine_from_config(&config.fetch);
    let notifier = Arc::new(TelegramNotifier::new(api.clone()));
    let coordinator = Coordinator::start(&config, engine, notifier);

    let intake = CancellationToken::new();
    let bot = BotRunner::new(api, coordinator.clone(), &config);
    let polling = {
        let intake = intake.clone();
        tokio::spawn(async move { bot.run(intake).await })
    };

    run_with_shutdown(coordinator, intake).await;
    polling.await?;

    tracing::info!("shutdown complete");
    Ok(())
}
