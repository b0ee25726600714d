//! Artifact lifecycle: per-job file names, post-fetch verification, removal.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, warn};

use crate::error::{FailureCategory, JobFailure, Result};
use crate::types::JobId;

/// Stem prefix shared by every job's files
const STEM_PREFIX: &str = "media_";

/// Suffixes of files the engine writes while a fetch is still running
const IN_PROGRESS_SUFFIXES: &[&str] = &[".part", ".ytdl", ".temp"];

/// File name pattern owned by a single job: `<work_dir>/media_<id>.*`
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ArtifactPattern {
    dir: PathBuf,
    stem: String,
}

impl ArtifactPattern {
    /// Directory the artifact lands in
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// File stem shared by every file of this job
    pub fn stem(&self) -> &str {
        &self.stem
    }

    /// yt-dlp output template producing files of this pattern
    pub fn output_template(&self) -> PathBuf {
        self.dir.join(format!("{}.%(ext)s", self.stem))
    }

    /// Whether a file name belongs to this pattern
    pub fn matches(&self, file_name: &str) -> bool {
        file_name
            .strip_prefix(self.stem.as_str())
            .is_some_and(|rest| rest.starts_with('.'))
    }
}

/// Owns the work directory fetched artifacts are written to
#[derive(Clone, Debug)]
pub struct ArtifactStore {
    work_dir: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at `work_dir`
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            work_dir: work_dir.into(),
        }
    }

    /// Work directory
    pub fn work_dir(&self) -> &Path {
        &self.work_dir
    }

    /// Create the work directory if needed and remove artifacts left by
    /// an earlier run
    ///
    /// Job ids restart at 1 with every process, so a leftover `media_1.mp4`
    /// would otherwise collide with the new job 1. Returns how many files
    /// were removed.
    pub async fn prepare(&self) -> Result<usize> {
        fs::create_dir_all(&self.work_dir).await?;

        let mut entries = fs::read_dir(&self.work_dir).await?;
        let mut removed = 0;
        while let Some(entry) = entries.next_entry().await? {
            let is_artifact = entry
                .file_name()
                .to_str()
                .is_some_and(|name| name.starts_with(STEM_PREFIX));
            if !is_artifact || !entry.file_type().await?.is_file() {
                continue;
            }
            let path = entry.path();
            match self.release(&path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(?path, error = %e, "failed to remove stale artifact"),
            }
        }
        if removed > 0 {
            info!(removed, dir = ?self.work_dir, "removed stale artifacts");
        }
        Ok(removed)
    }

    /// Name pattern for a job's artifact
    ///
    /// Scoped to the job id, so concurrent jobs never share a path.
    pub fn derive_name(&self, id: JobId) -> ArtifactPattern {
        ArtifactPattern {
            dir: self.work_dir.clone(),
            stem: format!("{}{}", STEM_PREFIX, id.0),
        }
    }

    /// Locate the finished artifact after the engine reported success
    ///
    /// In-progress files are ignored. When several files match, the
    /// lexicographically first one is returned. No match is a
    /// [`FailureCategory::NotFound`] failure, whatever the engine said.
    pub async fn verify_produced(
        &self,
        pattern: &ArtifactPattern,
    ) -> std::result::Result<PathBuf, JobFailure> {
        let mut candidates = self.list_matching(pattern).await.map_err(|e| {
            JobFailure::new(
                FailureCategory::NotFound,
                format!("cannot read {}: {}", pattern.dir.display(), e),
            )
        })?;
        candidates.retain(|path| !is_in_progress(path));
        candidates.sort();

        candidates.into_iter().next().ok_or_else(|| {
            JobFailure::new(
                FailureCategory::NotFound,
                format!("no file matching {}.* after fetch", pattern.stem),
            )
        })
    }

    /// Delete one artifact; a path that is already gone counts as success
    pub async fn release(&self, path: &Path) -> Result<()> {
        match fs::remove_file(path).await {
            Ok(()) => {
                debug!(?path, "released artifact");
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                debug!(?path, "artifact already gone");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Delete every file of a pattern, partial downloads included
    ///
    /// Returns how many files were removed. Failures on individual files are
    /// logged and skipped.
    pub async fn release_matching(&self, pattern: &ArtifactPattern) -> Result<usize> {
        let paths = match self.list_matching(pattern).await {
            Ok(paths) => paths,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };

        let mut removed = 0;
        for path in paths {
            match self.release(&path).await {
                Ok(()) => removed += 1,
                Err(e) => warn!(?path, error = %e, "failed to remove partial artifact"),
            }
        }
        Ok(removed)
    }

    async fn list_matching(&self, pattern: &ArtifactPattern) -> std::io::Result<Vec<PathBuf>> {
        let mut entries = fs::read_dir(&pattern.dir).await?;
        let mut found = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            let name = entry.file_name();
            let Some(name) = name.to_str() else {
                continue;
            };
            if pattern.matches(name) && entry.file_type().await?.is_file() {
                found.push(entry.path());
            }
        }
        Ok(found)
    }
}

fn is_in_progress(path: &Path) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|name| IN_PROGRESS_SUFFIXES.iter().any(|s| name.ends_with(s)))
}
