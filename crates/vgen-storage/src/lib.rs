//! Artifact storage for finished renders.
//!
//! This crate provides:
//! - The [`ArtifactStore`] upload seam
//! - Cloudflare R2 uploads with public or presigned durable URLs
//! - A local directory store for development

pub mod client;
pub mod error;
pub mod local;
pub mod store;

pub use client::{R2Client, R2Config};
pub use error::{StorageError, StorageResult};
pub use local::LocalArtifactStore;
pub use store::{content_type_for, object_key, ArtifactStore};
