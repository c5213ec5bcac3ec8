//! Render job pipeline.
//!
//! This crate provides:
//! - Parameter resolution from loosely-structured job records
//! - A bounded-concurrency scheduler with admission validation
//! - The render executor and its failure/cleanup contract
//! - Best-effort status reporting to the record store

pub mod composition;
pub mod config;
pub mod error;
pub mod executor;
pub mod job;
pub mod logging;
pub mod metrics;
pub mod render;
pub mod resolver;
pub mod scheduler;
pub mod status;

pub use composition::{Composition, COMPOSITION_FPS};
pub use config::PipelineConfig;
pub use error::{PipelineError, PipelineResult};
pub use executor::{file_tag, job_work_dir, JobRunner, RenderExecutor};
pub use job::{Job, JobHandle, JobOutcome, JobState};
pub use logging::JobLogger;
pub use render::{CliRenderer, RenderProgress, RenderRequest, Renderer};
pub use resolver::resolve;
pub use scheduler::{QueueStatus, RenderScheduler};
pub use status::StatusReporter;
