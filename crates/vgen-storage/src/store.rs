//! The artifact storage seam.

use std::path::Path;

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};

/// Durable storage for finished renders.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    /// Upload `local` under `destination` and return a durable URL for it.
    async fn upload(&self, local: &Path, destination: &str) -> StorageResult<String>;
}

/// Join a key prefix and a destination name into an object key.
///
/// Rejects empty names and parent-directory segments.
pub fn object_key(prefix: &str, destination: &str) -> StorageResult<String> {
    let name = destination.trim_start_matches('/');
    if name.is_empty() || name.split('/').any(|seg| seg == "..") {
        return Err(StorageError::invalid_key(destination));
    }

    let prefix = prefix.trim_matches('/');
    if prefix.is_empty() {
        Ok(name.to_string())
    } else {
        Ok(format!("{}/{}", prefix, name))
    }
}

/// Best-effort content type from the file extension.
pub fn content_type_for(path: &Path) -> &'static str {
    match path.extension().and_then(|e| e.to_str()).map(str::to_ascii_lowercase).as_deref() {
        Some("mp4") => "video/mp4",
        Some("webm") => "video/webm",
        Some("mov") => "video/quicktime",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}
