//! Shared data models for the vgen render pipeline.
//!
//! This crate provides Serde-serializable types for:
//! - Job identifiers and the raw input record
//! - Derived rendering parameters
//! - Persisted lifecycle status and error payloads

pub mod job;
pub mod render;
pub mod status;

pub use job::{CompositionDescriptor, JobId, JobRecord, TextAlignment, VideoAlignment};
pub use render::{
    RenderParameters, SplitPosition, TextPosition, DEFAULT_DURATION_IN_SECONDS,
    DEFAULT_FIRST_VIDEO_DURATION,
};
pub use status::{ErrorPayload, RenderStatus, StatusExtra, StatusUpdate};
