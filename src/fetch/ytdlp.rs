//! yt-dlp backed fetch engine using the external binary

use std::io::{BufRead, BufReader};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use super::parser::{ExitStatus, OutputSummary, PATH_PRINT, PROGRESS_TEMPLATE, TITLE_PRINT};
use super::traits::{FetchEngine, FetchError, FetchRequest, FetchedMedia};
use crate::types::ProgressUpdate;

/// Fetch engine that runs the `yt-dlp` executable
///
/// stdout and stderr share one pipe and are parsed line by line while the
/// process runs, so progress is reported as it happens.
///
/// # Examples
///
/// ```no_run
/// use media_relay::fetch::YtDlpEngine;
/// use std::path::PathBuf;
///
/// // Explicit path
/// let engine = YtDlpEngine::new(PathBuf::from("/usr/local/bin/yt-dlp"));
///
/// // Or auto-discover from PATH
/// let engine = YtDlpEngine::from_path().expect("yt-dlp not found in PATH");
/// ```
pub struct YtDlpEngine {
    binary_path: PathBuf,
}

impl YtDlpEngine {
    /// Create an engine with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find yt-dlp in PATH
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp").ok().map(Self::new)
    }

    /// Path of the binary this engine runs
    pub fn binary_path(&self) -> &PathBuf {
        &self.binary_path
    }

    /// Command line for a request, without the binary
    pub(crate) fn arguments(request: &FetchRequest) -> Vec<String> {
        let constraints = &request.constraints;
        let mut args = vec![
            "--newline".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            "--no-colors".to_string(),
            "--no-simulate".to_string(),
            "--progress".to_string(),
            "--progress-template".to_string(),
            PROGRESS_TEMPLATE.to_string(),
            "--print".to_string(),
            TITLE_PRINT.to_string(),
            "--print".to_string(),
            PATH_PRINT.to_string(),
            "-f".to_string(),
            constraints.preferred_format.clone(),
            "--max-filesize".to_string(),
            constraints.max_size_bytes.to_string(),
            "--user-agent".to_string(),
            constraints.user_agent.clone(),
            "-o".to_string(),
            request.output_template.to_string_lossy().into_owned(),
        ];
        if let Some(cookie_file) = &constraints.cookie_file {
            args.push("--cookies".to_string());
            args.push(cookie_file.to_string_lossy().into_owned());
        }
        args.push("--".to_string());
        args.push(request.url.to_string());
        args
    }
}

impl FetchEngine for YtDlpEngine {
    fn fetch(
        &self,
        request: &FetchRequest,
        on_progress: &mut dyn FnMut(ProgressUpdate),
    ) -> Result<FetchedMedia, FetchError> {
        let (reader, writer) = std::io::pipe()
            .map_err(|e| FetchError::new(format!("Internal Error: cannot create pipe: {}", e)))?;
        let stderr_writer = writer
            .try_clone()
            .map_err(|e| FetchError::new(format!("Internal Error: cannot clone pipe: {}", e)))?;

        // The Command holds the write ends; it must be dropped before reading to EOF.
        let mut child = {
            let mut command = Command::new(&self.binary_path);
            command
                .args(Self::arguments(request))
                .stdin(Stdio::null())
                .stdout(writer)
                .stderr(stderr_writer);
            command.spawn().map_err(|e| {
                FetchError::new(format!(
                    "Internal Error: failed to execute {}: {}",
                    self.binary_path.display(),
                    e
                ))
            })?
        };

        tracing::debug!(
            job_id = request.job_id.0,
            pid = child.id(),
            url = %request.url,
            "yt-dlp started"
        );

        let mut summary = OutputSummary::default();
        let mut reader = BufReader::new(reader);
        let mut buf = Vec::new();
        loop {
            buf.clear();
            match reader.read_until(b'\n', &mut buf) {
                Ok(0) => break,
                Ok(_) => summary.observe(&String::from_utf8_lossy(&buf), on_progress),
                Err(e) => {
                    tracing::warn!(job_id = request.job_id.0, error = %e, "failed reading yt-dlp output");
                    let _ = child.kill();
                    break;
                }
            }
        }

        let status = child
            .wait()
            .map_err(|e| FetchError::new(format!("Internal Error: waiting for yt-dlp: {}", e)))?;

        tracing::debug!(job_id = request.job_id.0, ?status, "yt-dlp exited");
        summary.finish(ExitStatus::from(status.success()))
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::FetchConfig;
    use crate::fetch::FetchConstraints;
    use crate::types::JobId;

    fn request(cookie_file: Option<PathBuf>) -> FetchRequest {
        let mut config = FetchConfig::default();
        config.cookie_file = cookie_file;
        FetchRequest {
            job_id: JobId(9),
            url: url::Url::parse("https://example.com/watch?v=abc").unwrap(),
            output_template: PathBuf::from("/work/media_9.%(ext)s"),
            constraints: FetchConstraints::from(&config),
        }
    }

    fn value_after<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
        args.iter()
            .position(|a| a == flag)
            .and_then(|i| args.get(i + 1))
            .map(String::as_str)
    }

    #[test]
    fn arguments_carry_constraints() {
        let args = YtDlpEngine::arguments(&request(None));

        assert_eq!(value_after(&args, "-f"), Some("best[ext=mp4]/best"));
        assert_eq!(value_after(&args, "--max-filesize"), Some("52428800"));
        assert_eq!(value_after(&args, "-o"), Some("/work/media_9.%(ext)s"));
        assert!(value_after(&args, "--user-agent").unwrap().starts_with("Mozilla/5.0"));
        assert!(args.contains(&"--no-playlist".to_string()));
        assert!(!args.contains(&"--cookies".to_string()));
        assert_eq!(args.last().map(String::as_str), Some("https://example.com/watch?v=abc"));
        assert_eq!(args[args.len() - 2], "--");
    }

    #[test]
    fn cookie_file_is_passed_when_configured() {
        let args = YtDlpEngine::arguments(&request(Some(PathBuf::from("cookies.txt"))));
        assert_eq!(value_after(&args, "--cookies"), Some("cookies.txt"));
    }

    #[test]
    fn from_path_consistency_with_which_crate() {
        let which_result = which::which("yt-dlp");
        let from_path_result = YtDlpEngine::from_path();
        assert_eq!(which_result.is_ok(), from_path_result.is_some());
    }

    #[test]
    fn missing_binary_is_reported_as_fetch_error() {
        let engine = YtDlpEngine::new(PathBuf::from("/nonexistent/yt-dlp-binary-xyz"));
        let err = engine.fetch(&request(None), &mut |_| {}).unwrap_err();
        assert!(err.message.contains("failed to execute"), "{}", err.message);
    }

    #[cfg(unix)]
    #[test]
    fn parses_output_of_a_stand_in_binary() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-yt-dlp");
        std::fs::write(
            &script,
            "#!/bin/sh\n\
             echo '[youtube] Extracting URL'\n\
             echo '[relay:progress]  50.0%|00:02|2.00MiB/s'\n\
             echo 'WARNING: noise' 1>&2\n\
             echo '[relay:progress] 100.0%|00:00|2.00MiB/s'\n\
             echo '[relay:title] Stand-in'\n\
             echo '[relay:path] /work/media_9.mp4'\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let engine = YtDlpEngine::new(script);
        let mut ticks = Vec::new();
        let media = engine
            .fetch(&request(None), &mut |u| ticks.push(u.percent))
            .unwrap();

        assert_eq!(ticks, vec![Some(50.0), Some(100.0)]);
        assert_eq!(media.title.as_deref(), Some("Stand-in"));
        assert_eq!(media.artifact_hint, Some(PathBuf::from("/work/media_9.mp4")));
    }

    #[cfg(unix)]
    #[test]
    fn stderr_error_lines_become_the_failure_message() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("fake-yt-dlp");
        std::fs::write(
            &script,
            "#!/bin/sh\necho 'ERROR: [youtube] abc: Sign in to confirm your age' 1>&2\nexit 1\n",
        )
        .unwrap();
        std::fs::set_permissions(&script, std::fs::Permissions::from_mode(0o755)).unwrap();

        let err = YtDlpEngine::new(script)
            .fetch(&request(None), &mut |_| {})
            .unwrap_err();
        assert_eq!(err.message, "ERROR: [youtube] abc: Sign in to confirm your age");
    }
}
