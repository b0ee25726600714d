//! Media fetch engines
//!
//! The core abstraction is the [`FetchEngine`] trait: a blocking call that
//! retrieves one URL into the work directory and reports progress through a
//! callback. Implementations:
//!
//! - [`YtDlpEngine`]: runs the external `yt-dlp` binary
//! - [`NoOpFetchEngine`]: fails every request, used when yt-dlp is unavailable
//!
//! ## Usage
//!
//! ```no_run
//! use media_relay::config::FetchConfig;
//! use media_relay::fetch::{FetchConstraints, FetchEngine, FetchRequest, YtDlpEngine};
//! use media_relay::types::JobId;
//!
//! let engine = YtDlpEngine::from_path().expect("yt-dlp not found");
//! let request = FetchRequest {
//!     job_id: JobId(1),
//!     url: "https://example.com/watch?v=1".parse().unwrap(),
//!     output_template: "work/media_1.%(ext)s".into(),
//!     constraints: FetchConstraints::from(&FetchConfig::default()),
//! };
//! let media = engine.fetch(&request, &mut |p| println!("{}", p.status_text()));
//! println!("{:?}", media);
//! ```

mod noop;
pub mod parser;
mod traits;
mod ytdlp;

pub use noop::NoOpFetchEngine;
pub use traits::{FetchConstraints, FetchEngine, FetchError, FetchRequest, FetchedMedia};
pub use ytdlp::YtDlpEngine;

use std::sync::Arc;

use crate::config::FetchConfig;

/// Pick the fetch engine for a configuration
///
/// Explicit `ytdlp_path` first, then PATH (if `search_path`), else [`NoOpFetchEngine`].
pub fn engine_from_config(config: &FetchConfig) -> Arc<dyn FetchEngine> {
    let engine: Arc<dyn FetchEngine> = if let Some(ref path) = config.ytdlp_path {
        Arc::new(YtDlpEngine::new(path.clone()))
    } else if config.search_path {
        YtDlpEngine::from_path()
            .map(|e| Arc::new(e) as Arc<dyn FetchEngine>)
            .unwrap_or_else(|| Arc::new(NoOpFetchEngine))
    } else {
        Arc::new(NoOpFetchEngine)
    };

    tracing::info!(fetch_engine = engine.name(), "Fetch engine initialized");
    engine
}
