//! Best-effort status persistence.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};
use vgen_models::{ErrorPayload, JobId, StatusUpdate};
use vgen_records::RecordStore;

use crate::metrics::record_status_write_failure;

/// Writes lifecycle status to the record store.
///
/// Write failures are logged and counted, never returned.
#[derive(Clone)]
pub struct StatusReporter {
    store: Arc<dyn RecordStore>,
}

impl StatusReporter {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }

    /// Persist `update` for `id`. Returns whether the write succeeded.
    pub async fn set_status(&self, id: &JobId, update: StatusUpdate) -> bool {
        let status = update.status;
        match self.store.update(id, update.into_fields()).await {
            Ok(()) => {
                debug!(job_id = %id, status = %status, "Status persisted");
                true
            }
            Err(e) => {
                record_status_write_failure(status.as_str());
                warn!(job_id = %id, status = %status, error = %e, "Failed to persist status");
                false
            }
        }
    }

    pub async fn processing(&self, id: &JobId) -> bool {
        self.set_status(id, StatusUpdate::processing()).await
    }

    pub async fn completed(&self, id: &JobId, video_url: &str, completed_at: DateTime<Utc>) -> bool {
        self.set_status(id, StatusUpdate::completed(video_url, completed_at))
            .await
    }

    pub async fn failed(
        &self,
        id: &JobId,
        error: &(dyn std::error::Error + Send + Sync + 'static),
    ) -> bool {
        self.set_status(id, StatusUpdate::failed(ErrorPayload::from_error(error)))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vgen_records::MemoryRecordStore;

    #[tokio::test]
    async fn test_write_failure_is_swallowed() {
        let store = Arc::new(MemoryRecordStore::new());
        store.set_fail_updates(true);
        let reporter = StatusReporter::new(store.clone());

        assert!(!reporter.processing(&JobId::from("1")).await);
        assert!(store.updates_for(&JobId::from("1")).is_empty());
    }

    #[tokio::test]
    async fn test_failed_carries_error_payload() {
        let store = Arc::new(MemoryRecordStore::new());
        let reporter = StatusReporter::new(store.clone());
        let id = JobId::from("2");
        let err = std::io::Error::new(std::io::ErrorKind::Other, "renderer crashed");

        assert!(reporter.failed(&id, &err).await);

        let updates = store.updates_for(&id);
        assert_eq!(updates[0]["status"], "failed");
        assert_eq!(updates[0]["error"]["message"], "renderer crashed");
    }
}
