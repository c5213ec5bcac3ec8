//! Filesystem-backed artifact store for local runs.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::info;

use crate::error::{StorageError, StorageResult};
use crate::store::{object_key, ArtifactStore};

/// Copies renders into a directory and hands back `file://` URLs.
#[derive(Debug, Clone)]
pub struct LocalArtifactStore {
    root: PathBuf,
    key_prefix: String,
}

impl LocalArtifactStore {
    pub fn new(root: impl Into<PathBuf>, key_prefix: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            key_prefix: key_prefix.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

#[async_trait]
impl ArtifactStore for LocalArtifactStore {
    async fn upload(&self, local: &Path, destination: &str) -> StorageResult<String> {
        if !tokio::fs::try_exists(local).await.unwrap_or(false) {
            return Err(StorageError::not_found(local.display().to_string()));
        }

        let key = object_key(&self.key_prefix, destination)?;
        let target = self.root.join(&key);
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        tokio::fs::copy(local, &target)
            .await
            .map_err(|e| StorageError::upload_failed(format!("copy to {}: {}", target.display(), e)))?;

        let absolute = tokio::fs::canonicalize(&target).await?;
        info!(path = %absolute.display(), "Stored render locally");
        Ok(format!("file://{}", absolute.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_upload_copies_file() {
        let src_dir = TempDir::new().unwrap();
        let store_dir = TempDir::new().unwrap();
        let src = src_dir.path().join("out.mp4");
        std::fs::write(&src, b"video").unwrap();

        let store = LocalArtifactStore::new(store_dir.path(), "renders");
        let url = store.upload(&src, "42.mp4").await.unwrap();

        assert!(url.starts_with("file://"));
        assert!(url.ends_with("renders/42.mp4"));
        assert_eq!(std::fs::read(store_dir.path().join("renders/42.mp4")).unwrap(), b"video");
        assert!(src.exists());
    }

    #[tokio::test]
    async fn test_missing_source_fails() {
        let store_dir = TempDir::new().unwrap();
        let store = LocalArtifactStore::new(store_dir.path(), "renders");
        let err = store.upload(Path::new("/nope/out.mp4"), "42.mp4").await.unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }
}
