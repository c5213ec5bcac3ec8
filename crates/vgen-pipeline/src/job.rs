//! Job state and the per-job completion signal.

use std::fmt;

use chrono::{DateTime, Utc};
use tokio::sync::oneshot;
use uuid::Uuid;
use vgen_media::TempArtifacts;
use vgen_models::{JobId, JobRecord};

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Admitted,
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Admitted => "admitted",
            JobState::Queued => "queued",
            JobState::Running => "running",
            JobState::Completed => "completed",
            JobState::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Terminal result delivered to the requester.
#[derive(Debug, Clone, PartialEq)]
pub enum JobOutcome {
    Completed {
        video_url: String,
        completed_at: DateTime<Utc>,
    },
    Failed {
        message: String,
    },
    /// Discarded from the queue before it started.
    Drained,
}

impl JobOutcome {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::Failed {
            message: message.into(),
        }
    }

    pub fn is_completed(&self) -> bool {
        matches!(self, JobOutcome::Completed { .. })
    }
}

/// One render request moving through the scheduler.
#[derive(Debug)]
pub struct Job {
    pub id: JobId,
    /// Distinguishes this submission from earlier runs of the same record.
    pub run_id: Uuid,
    pub record: JobRecord,
    pub state: JobState,
    pub artifacts: TempArtifacts,
    pub admitted_at: DateTime<Utc>,
    completion: Option<oneshot::Sender<JobOutcome>>,
}

impl Job {
    /// Create an admitted job and the handle its requester waits on.
    pub fn new(record: JobRecord) -> (Self, JobHandle) {
        let (tx, rx) = oneshot::channel();
        let id = record.id.clone();
        let job = Self {
            id: id.clone(),
            run_id: Uuid::new_v4(),
            record,
            state: JobState::Admitted,
            artifacts: TempArtifacts::new(),
            admitted_at: Utc::now(),
            completion: Some(tx),
        };
        (job, JobHandle { id, rx })
    }

    pub fn transition(&mut self, state: JobState) {
        self.state = state;
    }

    /// Deliver the outcome. Only the first call has any effect.
    pub fn complete(&mut self, outcome: JobOutcome) {
        let Some(tx) = self.completion.take() else {
            return;
        };
        self.state = match outcome {
            JobOutcome::Completed { .. } => JobState::Completed,
            _ => JobState::Failed,
        };
        // The requester may have stopped waiting.
        let _ = tx.send(outcome);
    }
}

/// Requester side of a job's completion signal.
#[derive(Debug)]
pub struct JobHandle {
    id: JobId,
    rx: oneshot::Receiver<JobOutcome>,
}

impl JobHandle {
    pub fn id(&self) -> &JobId {
        &self.id
    }

    /// Wait for the terminal outcome.
    pub async fn wait(self) -> JobOutcome {
        self.rx
            .await
            .unwrap_or_else(|_| JobOutcome::failed("job dropped before completion"))
    }
}
