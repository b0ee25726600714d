//! No-op fetch engine used when yt-dlp is unavailable

use super::traits::{FetchEngine, FetchError, FetchRequest, FetchedMedia};
use crate::types::ProgressUpdate;

/// Fetch engine that fails every request
///
/// Lets the bot start and answer requests with a clear failure when no
/// yt-dlp binary is configured or found in PATH.
///
/// # Examples
///
/// ```
/// use media_relay::fetch::{FetchEngine, NoOpFetchEngine};
///
/// assert_eq!(NoOpFetchEngine.name(), "noop");
/// ```
pub struct NoOpFetchEngine;

impl FetchEngine for NoOpFetchEngine {
    fn fetch(
        &self,
        _request: &FetchRequest,
        _on_progress: &mut dyn FnMut(ProgressUpdate),
    ) -> Result<FetchedMedia, FetchError> {
        Err(FetchError::new(
            "Fetching requires the yt-dlp binary. \
             Set YTDLP_PATH or ensure yt-dlp is in PATH.",
        ))
    }

    fn name(&self) -> &'static str {
        "noop"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use crate::error::FailureCategory;
    use crate::fetch::FetchConstraints;
    use crate::types::JobId;

    #[test]
    fn fetch_fails_without_progress_and_classifies_as_internal() {
        let request = FetchRequest {
            job_id: JobId(1),
            url: url::Url::parse("https://example.com/v").unwrap(),
            output_template: "media_1.%(ext)s".into(),
            constraints: FetchConstraints::from(&FetchConfig::default()),
        };
        let mut ticks = 0;
        let err = NoOpFetchEngine
            .fetch(&request, &mut |_| ticks += 1)
            .unwrap_err();

        assert_eq!(ticks, 0);
        assert!(err.message.contains("yt-dlp"));
        assert_eq!(
            crate::classify::classify_fetch_error(&err.message),
            FailureCategory::Internal
        );
    }
}
