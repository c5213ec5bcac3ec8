//! API error types.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use vgen_pipeline::PipelineError;

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Service unavailable: {0}")]
    Unavailable(String),

    /// The job ran and ended in failure; its status is already persisted.
    #[error("Render job failed: {0}")]
    JobFailed(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error(transparent)]
    Pipeline(#[from] PipelineError),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Unavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::JobFailed(_) | ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::Pipeline(e) if e.is_validation() => StatusCode::BAD_REQUEST,
            ApiError::Pipeline(e) if e.is_not_found() => StatusCode::NOT_FOUND,
            ApiError::Pipeline(e) if e.is_unavailable() => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::Pipeline(e) if e.is_conflict() => StatusCode::CONFLICT,
            ApiError::Pipeline(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn title(&self) -> String {
        match self {
            ApiError::BadRequest(msg) => msg.clone(),
            ApiError::JobFailed(_) => "Render job failed".to_string(),
            _ => match self.status_code() {
                StatusCode::BAD_REQUEST => "Invalid job".to_string(),
                StatusCode::NOT_FOUND => "Record not found".to_string(),
                StatusCode::SERVICE_UNAVAILABLE => "Service unavailable".to_string(),
                StatusCode::CONFLICT => "Job already in progress".to_string(),
                _ => "Internal error".to_string(),
            },
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
    details: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let details = match &self {
            ApiError::BadRequest(msg) | ApiError::JobFailed(msg) => msg.clone(),
            _ => self.to_string(),
        };
        let body = ErrorResponse {
            error: self.title(),
            details,
        };

        (status, Json(body)).into_response()
    }
}
