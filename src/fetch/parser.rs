//! Parser for yt-dlp command output
//!
//! yt-dlp is started with a progress template and `--print` directives that
//! emit tagged lines; everything else is free text kept for error reporting.

use std::collections::VecDeque;
use std::path::PathBuf;

use super::traits::{FetchError, FetchedMedia};
use crate::types::ProgressUpdate;

/// Prefix of progress lines produced by [`PROGRESS_TEMPLATE`]
pub(crate) const PROGRESS_TAG: &str = "[relay:progress] ";
/// Prefix of the title line printed after the file is moved into place
pub(crate) const TITLE_TAG: &str = "[relay:title] ";
/// Prefix of the final file path line
pub(crate) const PATH_TAG: &str = "[relay:path] ";

/// `--progress-template` value: percent, ETA, and speed separated by `|`
pub(crate) const PROGRESS_TEMPLATE: &str = "download:[relay:progress] %(progress._percent_str)s|%(progress._eta_str)s|%(progress._speed_str)s";
/// `--print` value for the title line
pub(crate) const TITLE_PRINT: &str = "after_move:[relay:title] %(title)s";
/// `--print` value for the path line
pub(crate) const PATH_PRINT: &str = "after_move:[relay:path] %(filepath)s";

/// Untagged lines kept for the failure message when no `ERROR:` line appears
const TAIL_LINES: usize = 5;

/// Exit status of an external command
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// The command exited successfully (exit code 0)
    Success,
    /// The command exited with a non-zero exit code or was killed
    Failure,
}

impl From<bool> for ExitStatus {
    fn from(success: bool) -> Self {
        if success {
            Self::Success
        } else {
            Self::Failure
        }
    }
}

/// One classified line of yt-dlp output
#[derive(Debug, Clone, PartialEq)]
pub enum OutputLine {
    /// Progress tick
    Progress {
        /// Percent complete, if parseable
        percent: Option<f32>,
        /// ETA label
        eta: String,
        /// Speed label
        speed: String,
    },
    /// Media title
    Title(String),
    /// Final artifact path
    Path(PathBuf),
    /// `ERROR:` line
    Error(String),
    /// Download skipped because it exceeds `--max-filesize`
    SizeRejected(String),
    /// Anything else
    Other,
}

/// Classify a single output line
pub fn parse_line(line: &str) -> OutputLine {
    let line = line.trim_end_matches(['\r', '\n']);

    if let Some(rest) = line.strip_prefix(PROGRESS_TAG) {
        let mut fields = rest.split('|').map(str::trim);
        let percent = fields
            .next()
            .and_then(|p| p.trim_end_matches('%').trim().parse::<f32>().ok());
        let eta = label(fields.next());
        let speed = label(fields.next());
        return OutputLine::Progress {
            percent,
            eta,
            speed,
        };
    }
    if let Some(title) = line.strip_prefix(TITLE_TAG) {
        return OutputLine::Title(title.trim().to_string());
    }
    if let Some(path) = line.strip_prefix(PATH_TAG) {
        return OutputLine::Path(PathBuf::from(path.trim()));
    }
    if line.starts_with("ERROR:") {
        return OutputLine::Error(line.to_string());
    }
    if line.contains("File is larger than max-filesize") {
        return OutputLine::SizeRejected(line.trim().to_string());
    }
    OutputLine::Other
}

fn label(field: Option<&str>) -> String {
    match field {
        Some(value) if !value.is_empty() && value != "NA" && !value.starts_with("Unknown") => {
            value.to_string()
        }
        _ => "?".to_string(),
    }
}

/// Accumulates a fetch's output and turns it into the fetch result
#[derive(Debug, Default)]
pub struct OutputSummary {
    title: Option<String>,
    path: Option<PathBuf>,
    errors: Vec<String>,
    size_rejected: Option<String>,
    tail: VecDeque<String>,
}

impl OutputSummary {
    /// Feed one line; progress ticks are forwarded to `on_progress`
    pub fn observe(&mut self, line: &str, on_progress: &mut dyn FnMut(ProgressUpdate)) {
        match parse_line(line) {
            OutputLine::Progress {
                percent,
                eta,
                speed,
            } => on_progress(ProgressUpdate::new(percent, eta, speed)),
            OutputLine::Title(title) => self.title = Some(title),
            OutputLine::Path(path) => self.path = Some(path),
            OutputLine::Error(message) => self.errors.push(message),
            OutputLine::SizeRejected(message) => self.size_rejected = Some(message),
            OutputLine::Other => {
                let trimmed = line.trim();
                if trimmed.is_empty() {
                    return;
                }
                if self.tail.len() == TAIL_LINES {
                    self.tail.pop_front();
                }
                self.tail.push_back(trimmed.to_string());
            }
        }
    }

    /// Final result once the process has exited
    ///
    /// A size rejection is a failure even when yt-dlp exits with status 0,
    /// since it skips the download rather than erroring out.
    pub fn finish(self, exit_status: ExitStatus) -> Result<FetchedMedia, FetchError> {
        if let Some(message) = self.size_rejected {
            return Err(FetchError::new(message));
        }
        match exit_status {
            ExitStatus::Success => Ok(FetchedMedia {
                artifact_hint: self.path,
                title: self.title,
            }),
            ExitStatus::Failure => {
                let message = if !self.errors.is_empty() {
                    self.errors.join("\n")
                } else if !self.tail.is_empty() {
                    Vec::from(self.tail).join("\n")
                } else {
                    "yt-dlp exited with an error and no output".to_string()
                };
                Err(FetchError::new(message))
            }
        }
    }
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_progress_line_with_padding() {
        let line = "[relay:progress]  42.1%|00:13|  1.20MiB/s";
        assert_eq!(
            parse_line(line),
            OutputLine::Progress {
                percent: Some(42.1),
                eta: "00:13".into(),
                speed: "1.20MiB/s".into(),
            }
        );
    }

    #[test]
    fn unknown_progress_fields_become_question_marks() {
        let line = "[relay:progress] N/A|Unknown|Unknown B/s";
        assert_eq!(
            parse_line(line),
            OutputLine::Progress {
                percent: None,
                eta: "?".into(),
                speed: "?".into(),
            }
        );
        assert_eq!(
            parse_line("[relay:progress] 5%"),
            OutputLine::Progress {
                percent: Some(5.0),
                eta: "?".into(),
                speed: "?".into(),
            }
        );
    }

    #[test]
    fn parses_tagged_metadata_and_errors() {
        assert_eq!(
            parse_line("[relay:title] Big Buck Bunny\r"),
            OutputLine::Title("Big Buck Bunny".into())
        );
        assert_eq!(
            parse_line("[relay:path] /work/media_3.mp4"),
            OutputLine::Path(PathBuf::from("/work/media_3.mp4"))
        );
        assert!(matches!(
            parse_line("ERROR: [youtube] x: Sign in to confirm"),
            OutputLine::Error(_)
        ));
        assert!(matches!(
            parse_line("[download] File is larger than max-filesize (1 bytes > 0 bytes). Aborting."),
            OutputLine::SizeRejected(_)
        ));
        assert_eq!(parse_line("[youtube] Extracting URL"), OutputLine::Other);
    }

    #[test]
    fn summary_forwards_progress_and_collects_metadata() {
        let mut summary = OutputSummary::default();
        let mut ticks = Vec::new();
        for line in [
            "[youtube] Extracting URL",
            "[relay:progress]  10.0%|00:20|1.00MiB/s",
            "[relay:progress]  99.9%|00:00|1.10MiB/s",
            "[relay:title] Clip",
            "[relay:path] /work/media_1.mp4",
        ] {
            summary.observe(line, &mut |u| ticks.push(u.percent));
        }

        assert_eq!(ticks, vec![Some(10.0), Some(99.9)]);
        let media = summary.finish(ExitStatus::Success).unwrap();
        assert_eq!(media.title.as_deref(), Some("Clip"));
        assert_eq!(
            media.artifact_hint,
            Some(PathBuf::from("/work/media_1.mp4"))
        );
    }

    #[test]
    fn failure_prefers_error_lines_over_tail() {
        let mut summary = OutputSummary::default();
        summary.observe("[generic] Downloading webpage", &mut |_| {});
        summary.observe("ERROR: Unsupported URL: https://example.com", &mut |_| {});
        let err = summary.finish(ExitStatus::Failure).unwrap_err();
        assert_eq!(err.message, "ERROR: Unsupported URL: https://example.com");
    }

    #[test]
    fn failure_without_error_lines_uses_recent_output() {
        let mut summary = OutputSummary::default();
        for i in 0..8 {
            summary.observe(&format!("line {i}"), &mut |_| {});
        }
        let err = summary.finish(ExitStatus::Failure).unwrap_err();
        assert_eq!(err.message, "line 3\nline 4\nline 5\nline 6\nline 7");

        let empty = OutputSummary::default().finish(ExitStatus::Failure).unwrap_err();
        assert!(empty.message.contains("no output"));
    }

    #[test]
    fn size_rejection_fails_even_on_zero_exit() {
        let mut summary = OutputSummary::default();
        summary.observe(
            "[download] File is larger than max-filesize (73400320 bytes > 52428800 bytes). Aborting.",
            &mut |_| {},
        );
        let err = summary.finish(ExitStatus::Success).unwrap_err();
        assert!(err.message.starts_with("[download] File is larger than"));
    }
}
