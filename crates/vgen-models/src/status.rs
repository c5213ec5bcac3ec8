//! Lifecycle status persisted back onto the job record.

use chrono::{DateTime, SecondsFormat, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Persisted render status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RenderStatus {
    Processing,
    Completed,
    Failed,
}

impl RenderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RenderStatus::Processing => "processing",
            RenderStatus::Completed => "completed",
            RenderStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, RenderStatus::Completed | RenderStatus::Failed)
    }
}

impl std::fmt::Display for RenderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Structured error stored with a failed status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct ErrorPayload {
    pub message: String,
    /// Error source chain, outermost first.
    pub stack: String,
    pub timestamp: DateTime<Utc>,
}

impl ErrorPayload {
    /// Build a payload from an error and its `source()` chain.
    pub fn from_error(error: &(dyn std::error::Error + 'static)) -> Self {
        let mut chain = vec![error.to_string()];
        let mut source = error.source();
        while let Some(cause) = source {
            chain.push(format!("caused by: {}", cause));
            source = cause.source();
        }

        Self {
            message: error.to_string(),
            stack: chain.join("\n"),
            timestamp: Utc::now(),
        }
    }
}

/// Extra fields carried with a status change.
#[derive(Debug, Clone, PartialEq)]
pub enum StatusExtra {
    None,
    Completed {
        video_url: String,
        completed_at: DateTime<Utc>,
    },
    Failed(ErrorPayload),
}

/// One status write against the record store.
#[derive(Debug, Clone, PartialEq)]
pub struct StatusUpdate {
    pub status: RenderStatus,
    pub extra: StatusExtra,
}

impl StatusUpdate {
    pub fn processing() -> Self {
        Self {
            status: RenderStatus::Processing,
            extra: StatusExtra::None,
        }
    }

    pub fn completed(video_url: impl Into<String>, completed_at: DateTime<Utc>) -> Self {
        Self {
            status: RenderStatus::Completed,
            extra: StatusExtra::Completed {
                video_url: video_url.into(),
                completed_at,
            },
        }
    }

    pub fn failed(payload: ErrorPayload) -> Self {
        Self {
            status: RenderStatus::Failed,
            extra: StatusExtra::Failed(payload),
        }
    }

    /// Column values written to the record.
    pub fn into_fields(self) -> Map<String, Value> {
        let mut fields = Map::new();
        fields.insert("status".into(), Value::String(self.status.as_str().into()));

        match self.extra {
            StatusExtra::None => {}
            StatusExtra::Completed {
                video_url,
                completed_at,
            } => {
                fields.insert("video_url".into(), Value::String(video_url));
                fields.insert(
                    "completed_at".into(),
                    Value::String(completed_at.to_rfc3339_opts(SecondsFormat::Millis, true)),
                );
            }
            StatusExtra::Failed(payload) => {
                fields.insert(
                    "error".into(),
                    serde_json::to_value(payload).unwrap_or(Value::Null),
                );
            }
        }

        fields
    }
}
