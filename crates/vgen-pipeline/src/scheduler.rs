//! Bounded-concurrency FIFO scheduler with synchronous admission.
//!
//! Queue contents and the running count live under one lock. A job moves
//! from the queue to a worker task only while `running < limit`; each job is
//! taken by exactly one task. An id is held from queueing until its task
//! ends, so one record never has two live jobs.

use std::collections::{HashSet, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use serde::Serialize;
use tokio::sync::Notify;
use tracing::{info, warn};
use vgen_media::MediaProber;
use vgen_models::{JobId, JobRecord};

use crate::error::{PipelineError, PipelineResult};
use crate::executor::JobRunner;
use crate::job::{Job, JobHandle, JobOutcome, JobState};
use crate::metrics::{record_job_admitted, record_job_rejected, record_jobs_drained, set_queue_state};
use crate::resolver::resolve;

/// Point-in-time view of the queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct QueueStatus {
    pub queued: usize,
    pub running: usize,
    pub limit: usize,
}

#[derive(Debug, Default)]
struct QueueState {
    pending: VecDeque<Job>,
    running: usize,
    /// Worker tasks still alive, including those started before a drain.
    in_flight: usize,
    /// Ids of queued and running jobs.
    active: HashSet<JobId>,
    /// Bumped by `drain`; completions from an older epoch leave `running` alone.
    epoch: u64,
}

struct Inner {
    limit: usize,
    state: Mutex<QueueState>,
    accepting: AtomicBool,
    idle: Notify,
    prober: Arc<dyn MediaProber>,
    runner: Arc<dyn JobRunner>,
}

/// Admits, queues and runs render jobs.
///
/// Cheap to clone; clones share the same queue.
#[derive(Clone)]
pub struct RenderScheduler {
    inner: Arc<Inner>,
}

impl RenderScheduler {
    /// Create a scheduler. It rejects submissions until [`start`](Self::start).
    pub fn new(limit: usize, prober: Arc<dyn MediaProber>, runner: Arc<dyn JobRunner>) -> Self {
        Self {
            inner: Arc::new(Inner {
                limit: limit.max(1),
                state: Mutex::new(QueueState::default()),
                accepting: AtomicBool::new(false),
                idle: Notify::new(),
                prober,
                runner,
            }),
        }
    }

    /// Begin accepting submissions.
    pub fn start(&self) {
        self.inner.accepting.store(true, Ordering::SeqCst);
        info!(limit = self.inner.limit, "Render scheduler started");
    }

    pub fn is_accepting(&self) -> bool {
        self.inner.accepting.load(Ordering::SeqCst)
    }

    /// Validate `record` and queue it.
    ///
    /// Validation runs before the job touches the queue: a template reference
    /// must exist, the layout must resolve, and every media reference must
    /// probe successfully. Rejected jobs never occupy a slot and get no
    /// persisted status. A record whose id is already queued or running is
    /// refused with [`PipelineError::AlreadyActive`].
    pub async fn submit(&self, record: JobRecord) -> PipelineResult<JobHandle> {
        if !self.is_accepting() {
            return Err(PipelineError::NotAccepting);
        }

        if let Err(e) = self.admit(&record).await {
            record_job_rejected(rejection_reason(&e));
            warn!(job_id = %record.id, error = %e, "Job rejected at admission");
            return Err(e);
        }

        let (mut job, handle) = Job::new(record);
        job.transition(JobState::Queued);

        {
            let mut state = self.inner.lock();
            // `stop` may have run while admission was probing.
            if !self.is_accepting() {
                return Err(PipelineError::NotAccepting);
            }
            if !state.active.insert(job.id.clone()) {
                record_job_rejected("duplicate");
                warn!(job_id = %job.id, "Job already queued or running");
                return Err(PipelineError::AlreadyActive(job.id.to_string()));
            }
            info!(job_id = %job.id, position = state.pending.len(), "Job queued");
            state.pending.push_back(job);
            set_queue_state(state.pending.len(), state.running);
        }
        record_job_admitted();

        self.inner.dispatch();
        Ok(handle)
    }

    async fn admit(&self, record: &JobRecord) -> PipelineResult<()> {
        if record.id.is_blank() {
            return Err(PipelineError::validation("record id is required"));
        }
        if record.template().is_none() {
            return Err(PipelineError::validation(
                "record needs a composition descriptor with a template reference",
            ));
        }
        resolve(record, None, None)?;

        for reference in record.media_references() {
            self.inner.prober.probe(reference).await.map_err(|e| {
                if e.is_unreadable() {
                    PipelineError::media_unreadable(e.to_string())
                } else {
                    PipelineError::internal(format!("media probe unavailable: {}", e))
                }
            })?;
        }
        Ok(())
    }

    /// Queue depth, running count and limit.
    pub fn status(&self) -> QueueStatus {
        let state = self.inner.lock();
        QueueStatus {
            queued: state.pending.len(),
            running: state.running,
            limit: self.inner.limit,
        }
    }

    /// Discard every queued job and reset the running count.
    ///
    /// Discarded requesters observe [`JobOutcome::Drained`]. Running jobs are
    /// not cancelled. Returns the number of jobs discarded.
    pub fn drain(&self) -> usize {
        let drained: Vec<Job> = {
            let mut state = self.inner.lock();
            state.running = 0;
            state.epoch += 1;
            let drained: Vec<Job> = state.pending.drain(..).collect();
            for job in &drained {
                state.active.remove(&job.id);
            }
            set_queue_state(0, 0);
            drained
        };

        let count = drained.len();
        for mut job in drained {
            job.complete(JobOutcome::Drained);
        }
        if count > 0 {
            record_jobs_drained(count);
            info!(count, "Drained queued jobs");
        }
        count
    }

    /// Stop accepting, drain the queue and wait for in-flight jobs.
    ///
    /// Returns false when jobs were still running after `timeout`.
    pub async fn stop(&self, timeout: Duration) -> bool {
        self.inner.accepting.store(false, Ordering::SeqCst);
        self.drain();

        let wait = async {
            loop {
                let notified = self.inner.idle.notified();
                if self.inner.lock().in_flight == 0 {
                    return;
                }
                notified.await;
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(()) => {
                info!("Render scheduler stopped");
                true
            }
            Err(_) => {
                warn!(
                    in_flight = self.inner.lock().in_flight,
                    timeout_secs = timeout.as_secs(),
                    "Render scheduler stopped with jobs still running"
                );
                false
            }
        }
    }
}

impl Inner {
    fn lock(&self) -> MutexGuard<'_, QueueState> {
        // Nothing panics while holding the lock; recover the data if it ever does.
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Start queued jobs while slots are free, oldest first.
    fn dispatch(self: &Arc<Self>) {
        loop {
            let (mut job, epoch) = {
                let mut state = self.lock();
                if state.running >= self.limit {
                    return;
                }
                let Some(job) = state.pending.pop_front() else {
                    return;
                };
                state.running += 1;
                state.in_flight += 1;
                set_queue_state(state.pending.len(), state.running);
                (job, state.epoch)
            };

            job.transition(JobState::Running);
            let slot = SlotGuard {
                inner: Arc::clone(self),
                id: job.id.clone(),
                epoch,
            };
            tokio::spawn(async move {
                let outcome = slot.inner.runner.run(&mut job).await;
                job.complete(outcome);
                drop(slot);
            });
        }
    }

    fn finish(self: &Arc<Self>, id: &JobId, epoch: u64) {
        {
            let mut state = self.lock();
            state.active.remove(id);
            if state.epoch == epoch {
                state.running = state.running.saturating_sub(1);
            }
            state.in_flight = state.in_flight.saturating_sub(1);
            set_queue_state(state.pending.len(), state.running);
            if state.in_flight == 0 {
                self.idle.notify_waiters();
            }
        }
        self.dispatch();
    }
}

/// Releases a worker slot when the task ends, including by panic.
struct SlotGuard {
    inner: Arc<Inner>,
    id: JobId,
    epoch: u64,
}

impl Drop for SlotGuard {
    fn drop(&mut self) {
        self.inner.finish(&self.id, self.epoch);
    }
}

fn rejection_reason(error: &PipelineError) -> &'static str {
    match error {
        PipelineError::InvalidLayout(_) => "layout",
        PipelineError::MediaUnreadable(_) => "media",
        PipelineError::Internal(_) => "internal",
        _ => "validation",
    }
}
