//! Per-job temporary file tracking.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

/// Outcome of a cleanup pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CleanupReport {
    pub removed: usize,
    pub already_gone: usize,
    pub failed: Vec<PathBuf>,
}

impl CleanupReport {
    pub fn is_clean(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Paths created while processing one job.
///
/// Every intermediate file is registered here as soon as its path is chosen,
/// so cleanup covers partially-written outputs too.
#[derive(Debug, Default)]
pub struct TempArtifacts {
    paths: Vec<PathBuf>,
}

impl TempArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a path. Duplicates are ignored.
    pub fn track(&mut self, path: impl Into<PathBuf>) {
        let path = path.into();
        if !self.paths.contains(&path) {
            self.paths.push(path);
        }
    }

    pub fn paths(&self) -> &[PathBuf] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    /// Remove a single tracked path now. Returns true when the path is gone.
    pub async fn remove(&mut self, path: &Path) -> bool {
        let gone = remove_path(path).await.is_ok();
        if gone {
            self.paths.retain(|p| p != path);
        }
        gone
    }

    /// Delete everything tracked, newest first.
    ///
    /// Failures are logged and reported but never returned as errors. The
    /// list is drained, so a second call is a no-op.
    pub async fn cleanup(&mut self) -> CleanupReport {
        let mut report = CleanupReport::default();

        for path in self.paths.drain(..).rev() {
            match remove_path(&path).await {
                Ok(true) => {
                    debug!(path = %path.display(), "Removed temp artifact");
                    report.removed += 1;
                }
                Ok(false) => report.already_gone += 1,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Failed to remove temp artifact");
                    report.failed.push(path);
                }
            }
        }

        report
    }
}

/// Returns Ok(false) when the path did not exist.
async fn remove_path(path: &Path) -> std::io::Result<bool> {
    let metadata = match tokio::fs::symlink_metadata(path).await {
        Ok(m) => m,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(false),
        Err(e) => return Err(e),
    };

    let result = if metadata.is_dir() {
        tokio::fs::remove_dir_all(path).await
    } else {
        tokio::fs::remove_file(path).await
    };

    match result {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_cleanup_removes_files_and_dirs() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.mp4");
        let sub = dir.path().join("frames");
        std::fs::write(&file, b"x").unwrap();
        std::fs::create_dir(&sub).unwrap();
        std::fs::write(sub.join("0001.png"), b"x").unwrap();

        let mut artifacts = TempArtifacts::new();
        artifacts.track(&file);
        artifacts.track(&sub);
        artifacts.track(dir.path().join("never-written.mp4"));

        let report = artifacts.cleanup().await;
        assert_eq!(report.removed, 2);
        assert_eq!(report.already_gone, 1);
        assert!(report.is_clean());
        assert!(!file.exists());
        assert!(!sub.exists());
        assert!(artifacts.is_empty());
    }

    #[tokio::test]
    async fn test_cleanup_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("a.mp4");
        std::fs::write(&file, b"x").unwrap();

        let mut artifacts = TempArtifacts::new();
        artifacts.track(&file);
        assert_eq!(artifacts.cleanup().await.removed, 1);
        assert_eq!(artifacts.cleanup().await, CleanupReport::default());
    }

    #[test]
    fn test_track_dedupes() {
        let mut artifacts = TempArtifacts::new();
        artifacts.track("/tmp/a.mp4");
        artifacts.track("/tmp/a.mp4");
        assert_eq!(artifacts.len(), 1);
    }

    #[tokio::test]
    async fn test_remove_single() {
        let dir = TempDir::new().unwrap();
        let file = dir.path().join("out.mp4");
        std::fs::write(&file, b"x").unwrap();

        let mut artifacts = TempArtifacts::new();
        artifacts.track(&file);
        assert!(artifacts.remove(&file).await);
        assert!(artifacts.is_empty());
        assert!(!file.exists());
    }
}
