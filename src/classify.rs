//! Failure classification for fetch engine errors
//!
//! yt-dlp reports failures as free text, so classification is a best-effort
//! pattern table. Rules are checked in order, the first match wins, and
//! anything unmatched is [`FailureCategory::Internal`].

use regex::RegexSet;
use std::sync::LazyLock;

use crate::error::{FailureCategory, JobFailure};
use crate::fetch::FetchError;

/// Ordered rule table: each pattern maps to one category
const RULES: &[(FailureCategory, &str)] = &[
    (FailureCategory::AuthRequired, r"(?i)\bsign in\b"),
    (FailureCategory::AuthRequired, r"(?i)\blog ?in (is )?required\b"),
    (FailureCategory::AuthRequired, r"(?i)use --cookies"),
    (FailureCategory::AuthRequired, r"(?i)authentication (is )?required"),
    (FailureCategory::AuthRequired, r"(?i)private video"),
    (FailureCategory::SizeLimitExceeded, r"(?i)file is larger than"),
    (FailureCategory::SizeLimitExceeded, r"(?i)max-filesize"),
    (FailureCategory::SizeLimitExceeded, r"(?i)exceeds the maximum"),
];

static RULE_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(RULES.iter().map(|(_, pattern)| *pattern))
        .unwrap_or_else(|_| RegexSet::empty())
});

/// Map fetch engine error text to exactly one category
pub fn classify_fetch_error(message: &str) -> FailureCategory {
    RULE_SET
        .matches(message)
        .iter()
        .next()
        .map(|index| RULES[index].0)
        .unwrap_or(FailureCategory::Internal)
}

impl From<FetchError> for JobFailure {
    fn from(error: FetchError) -> Self {
        let category = classify_fetch_error(&error.message);
        JobFailure::new(category, error.message)
    }
}
