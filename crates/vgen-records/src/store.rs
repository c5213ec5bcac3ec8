//! The record store seam.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use vgen_models::{JobId, JobRecord};

use crate::error::RecordResult;

/// Persistent store of job records and their status fields.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Load one record. Fails with [`RecordError::NotFound`](crate::RecordError::NotFound)
    /// when no row has this id.
    async fn fetch_by_id(&self, id: &JobId) -> RecordResult<JobRecord>;

    /// Merge `fields` into the record's row.
    async fn update(&self, id: &JobId, fields: Map<String, Value>) -> RecordResult<()>;

    /// Stream records inserted into `table` from now on.
    ///
    /// The stream ends when the receiver is dropped or the store shuts down.
    async fn subscribe_on_insert(&self, table: &str) -> RecordResult<mpsc::Receiver<JobRecord>>;
}
