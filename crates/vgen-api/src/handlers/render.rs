//! Render trigger handlers.
//!
//! A trigger names a job either by `id`, which is fetched from the record
//! store, or by carrying the full record as a change notification
//! (`{"type": "INSERT", "record": {...}}`), which skips the fetch. The
//! request is held open until the job reaches a terminal state.

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{error, info, warn};
use vgen_models::{JobId, JobRecord, RenderStatus};
use vgen_pipeline::{JobOutcome, PipelineError};

use crate::error::{ApiError, ApiResult};
use crate::metrics::record_trigger;
use crate::state::AppState;

const INSERT_EVENT: &str = "INSERT";

/// Trigger payload.
#[derive(Debug, Default, Deserialize)]
pub struct RenderTrigger {
    #[serde(default)]
    pub id: Option<JobId>,
    /// Full record from a change notification.
    #[serde(default)]
    pub record: Option<JobRecord>,
    /// Change notification event type.
    #[serde(default, rename = "type")]
    pub event_type: Option<String>,
}

/// Successful render response.
#[derive(Debug, Serialize)]
pub struct RenderResponse {
    pub id: JobId,
    pub status: RenderStatus,
    pub video_url: String,
}

/// Job envelope accepted by `/run`.
#[derive(Debug, Deserialize)]
pub struct RunEnvelope {
    #[serde(default)]
    pub input: Option<Value>,
}

/// Render a job named by id or carried in a change notification.
pub async fn render(
    State(state): State<AppState>,
    payload: Result<Json<RenderTrigger>, JsonRejection>,
) -> ApiResult<Json<RenderResponse>> {
    let Json(trigger) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    run_trigger(&state, trigger, "http").await.map(Json)
}

/// Render a job from a `{input: {...}}` envelope.
pub async fn run(
    State(state): State<AppState>,
    payload: Result<Json<RunEnvelope>, JsonRejection>,
) -> ApiResult<Json<RenderResponse>> {
    let Json(envelope) = payload.map_err(|e| ApiError::bad_request(e.body_text()))?;
    let input = envelope
        .input
        .filter(|v| !v.is_null())
        .ok_or_else(|| ApiError::bad_request("No input provided in the job"))?;
    let trigger: RenderTrigger = serde_json::from_value(input)
        .map_err(|e| ApiError::bad_request(format!("Invalid job input: {}", e)))?;

    run_trigger(&state, trigger, "run").await.map(Json)
}

/// Resolve, submit and await one trigger.
pub async fn run_trigger(
    state: &AppState,
    trigger: RenderTrigger,
    source: &str,
) -> ApiResult<RenderResponse> {
    let (record, kind) = resolve_record(state, trigger).await?;
    record_trigger(source, kind);
    let id = record.id.clone();
    info!(job_id = %id, source, kind, "Render triggered");

    let handle = match state.scheduler.submit(record).await {
        Ok(handle) => handle,
        Err(e) if e.is_validation() || e.is_unavailable() || e.is_conflict() => {
            return Err(e.into())
        }
        Err(e) => return Err(fail_unexpected(state, &id, e).await),
    };

    match handle.wait().await {
        JobOutcome::Completed { video_url, .. } => Ok(RenderResponse {
            id,
            status: RenderStatus::Completed,
            video_url,
        }),
        JobOutcome::Failed { message } => Err(ApiError::JobFailed(message)),
        JobOutcome::Drained => Err(PipelineError::Drained.into()),
    }
}

async fn resolve_record(
    state: &AppState,
    trigger: RenderTrigger,
) -> ApiResult<(JobRecord, &'static str)> {
    if let Some(record) = trigger.record {
        match trigger.event_type.as_deref() {
            None => {}
            Some(t) if t.eq_ignore_ascii_case(INSERT_EVENT) => {}
            Some(t) => {
                return Err(ApiError::bad_request(format!(
                    "Unsupported change notification type '{}'",
                    t
                )))
            }
        }
        return Ok((record, "notification"));
    }

    let id = trigger
        .id
        .filter(|id| !id.is_blank())
        .ok_or_else(|| ApiError::bad_request("Payload needs an id or a record"))?;

    match state.records.fetch_by_id(&id).await {
        Ok(record) => Ok((record, "id")),
        Err(e) if e.is_not_found() => Err(ApiError::not_found(format!("No record with id {}", id))),
        Err(e) => Err(fail_unexpected(state, &id, e.into()).await),
    }
}

/// Persist `failed` for an error that escaped the executor, then report it.
async fn fail_unexpected(state: &AppState, id: &JobId, e: PipelineError) -> ApiError {
    error!(job_id = %id, error = %e, "Unexpected trigger failure");
    if !state.status.failed(id, &e).await {
        warn!(job_id = %id, "Could not persist failed status");
    }
    ApiError::Pipeline(e)
}
