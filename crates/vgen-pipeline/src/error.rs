//! Pipeline error types.

use thiserror::Error;

pub type PipelineResult<T> = Result<T, PipelineError>;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("Validation failed: {0}")]
    Validation(String),

    #[error("Invalid layout: {0}")]
    InvalidLayout(String),

    #[error("Media unreadable: {0}")]
    MediaUnreadable(String),

    #[error("Render failed: {0}")]
    RenderFailure(String),

    #[error("Render timed out after {0} seconds")]
    RenderTimeout(u64),

    #[error("Upload failed: {0}")]
    Upload(#[from] vgen_storage::StorageError),

    #[error("Record store error: {0}")]
    Record(#[from] vgen_records::RecordError),

    #[error("Job discarded by queue drain")]
    Drained,

    #[error("Scheduler is not accepting jobs")]
    NotAccepting,

    #[error("Job {0} is already queued or running")]
    AlreadyActive(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl PipelineError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invalid_layout(msg: impl Into<String>) -> Self {
        Self::InvalidLayout(msg.into())
    }

    pub fn media_unreadable(msg: impl Into<String>) -> Self {
        Self::MediaUnreadable(msg.into())
    }

    pub fn render_failure(msg: impl Into<String>) -> Self {
        Self::RenderFailure(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// True for errors raised at admission, before a job is queued.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            PipelineError::Validation(_)
                | PipelineError::InvalidLayout(_)
                | PipelineError::MediaUnreadable(_)
        )
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, PipelineError::Record(e) if e.is_not_found())
    }

    /// True when the scheduler refused or discarded the job without running it.
    pub fn is_unavailable(&self) -> bool {
        matches!(self, PipelineError::Drained | PipelineError::NotAccepting)
    }

    /// True when another job with the same id is queued or running.
    pub fn is_conflict(&self) -> bool {
        matches!(self, PipelineError::AlreadyActive(_))
    }
}
