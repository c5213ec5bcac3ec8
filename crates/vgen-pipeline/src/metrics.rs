//! Pipeline metrics.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_ADMITTED_TOTAL: &str = "vgen_jobs_admitted_total";
    pub const JOBS_REJECTED_TOTAL: &str = "vgen_jobs_rejected_total";
    pub const JOBS_COMPLETED_TOTAL: &str = "vgen_jobs_completed_total";
    pub const JOBS_FAILED_TOTAL: &str = "vgen_jobs_failed_total";
    pub const JOBS_DRAINED_TOTAL: &str = "vgen_jobs_drained_total";
    pub const QUEUE_LENGTH: &str = "vgen_queue_length";
    pub const JOBS_RUNNING: &str = "vgen_jobs_running";
    pub const RENDER_DURATION_SECONDS: &str = "vgen_render_duration_seconds";
    pub const UPLOAD_DURATION_SECONDS: &str = "vgen_upload_duration_seconds";
    pub const STATUS_WRITE_FAILURES_TOTAL: &str = "vgen_status_write_failures_total";
}

pub fn record_job_admitted() {
    counter!(names::JOBS_ADMITTED_TOTAL).increment(1);
}

/// Record an admission rejection by reason (`validation`, `layout`, `media`, ...).
pub fn record_job_rejected(reason: &str) {
    counter!(names::JOBS_REJECTED_TOTAL, "reason" => reason.to_string()).increment(1);
}

pub fn record_job_completed() {
    counter!(names::JOBS_COMPLETED_TOTAL).increment(1);
}

pub fn record_job_failed(reason: &str) {
    counter!(names::JOBS_FAILED_TOTAL, "reason" => reason.to_string()).increment(1);
}

pub fn record_jobs_drained(count: usize) {
    counter!(names::JOBS_DRAINED_TOTAL).increment(count as u64);
}

pub fn set_queue_state(queued: usize, running: usize) {
    gauge!(names::QUEUE_LENGTH).set(queued as f64);
    gauge!(names::JOBS_RUNNING).set(running as f64);
}

pub fn record_render_duration(duration_secs: f64) {
    histogram!(names::RENDER_DURATION_SECONDS).record(duration_secs);
}

pub fn record_upload_duration(duration_secs: f64) {
    histogram!(names::UPLOAD_DURATION_SECONDS).record(duration_secs);
}

pub fn record_status_write_failure(status: &str) {
    counter!(names::STATUS_WRITE_FAILURES_TOTAL, "status" => status.to_string()).increment(1);
}
