//! Freshness check between a source file and its destination counterpart

use crate::error::{BuildError, BuildResult};
use crate::pipeline::SourceFile;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use tokio::fs as async_fs;

/// Decides whether an input must be processed again.
///
/// The destination tree is the only record of previous runs, so the check
/// is repeated against the filesystem on every run.
#[derive(Debug, Clone)]
pub struct ChangeFilter {
    dest: PathBuf,
}

impl ChangeFilter {
    pub fn new(dest: impl Into<PathBuf>) -> Self {
        Self { dest: dest.into() }
    }

    pub fn dest(&self) -> &Path {
        &self.dest
    }

    /// A source is stale when its counterpart is missing or older than it
    pub async fn is_stale(&self, source: &SourceFile) -> BuildResult<bool> {
        let source_time = modified(&source.path)
            .await?
            .ok_or_else(|| {
                BuildError::io(&source.path, std::io::Error::from(ErrorKind::NotFound))
            })?;

        let target = source.destination(&self.dest);
        match modified(&target).await? {
            Some(target_time) => Ok(is_newer(source_time, target_time)),
            None => Ok(true),
        }
    }
}

/// Strictly newer; equal timestamps count as fresh
pub fn is_newer(source: SystemTime, target: SystemTime) -> bool {
    source > target
}

async fn modified(path: &Path) -> BuildResult<Option<SystemTime>> {
    match async_fs::metadata(path).await {
        Ok(metadata) => metadata
            .modified()
            .map(Some)
            .map_err(|e| BuildError::io(path, e)),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
        Err(e) => Err(BuildError::io(path, e)),
    }
}
