//! Background service that renders newly inserted records.
//!
//! Each record delivered by the store's insert subscription is submitted to
//! the scheduler. Admission rejections are logged and skipped; admitted jobs
//! are awaited on their own task so a slow render never blocks the feed.

use std::sync::Arc;

use tracing::{error, info, warn};
use vgen_models::JobRecord;
use vgen_pipeline::{JobOutcome, RenderScheduler};
use vgen_records::RecordStore;

use crate::metrics::record_trigger;

/// Insert listener service.
pub struct InsertListener {
    records: Arc<dyn RecordStore>,
    scheduler: RenderScheduler,
    table: String,
}

impl InsertListener {
    pub fn new(records: Arc<dyn RecordStore>, scheduler: RenderScheduler, table: impl Into<String>) -> Self {
        Self {
            records,
            scheduler,
            table: table.into(),
        }
    }

    /// Consume inserts until the subscription closes.
    ///
    /// Runs for the life of the process; spawn it as a background task.
    pub async fn run(self) {
        let mut inserts = match self.records.subscribe_on_insert(&self.table).await {
            Ok(rx) => rx,
            Err(e) => {
                error!(table = %self.table, error = %e, "Failed to subscribe to record inserts");
                return;
            }
        };

        info!(table = %self.table, "Listening for inserted records");

        while let Some(record) = inserts.recv().await {
            self.submit(record).await;
        }

        info!(table = %self.table, "Insert subscription closed");
    }

    async fn submit(&self, record: JobRecord) {
        let id = record.id.clone();
        record_trigger("insert", "notification");

        let handle = match self.scheduler.submit(record).await {
            Ok(handle) => handle,
            Err(e) => {
                warn!(job_id = %id, error = %e, "Inserted record not admitted");
                return;
            }
        };

        tokio::spawn(async move {
            match handle.wait().await {
                JobOutcome::Completed { video_url, .. } => {
                    info!(job_id = %id, video_url = %video_url, "Inserted record rendered");
                }
                JobOutcome::Failed { message } => {
                    warn!(job_id = %id, error = %message, "Inserted record failed to render");
                }
                JobOutcome::Drained => {
                    info!(job_id = %id, "Inserted record drained before it started");
                }
            }
        });
    }
}
