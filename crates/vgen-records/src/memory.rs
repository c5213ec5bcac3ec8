//! In-process record store for local runs and tests.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::{broadcast, mpsc};
use tracing::debug;
use vgen_models::{JobId, JobRecord};

use crate::error::{RecordError, RecordResult};
use crate::store::RecordStore;

const BROADCAST_CAPACITY: usize = 256;

/// Records held in memory; inserts are fanned out to subscribers.
pub struct MemoryRecordStore {
    rows: Mutex<HashMap<String, JobRecord>>,
    updates: Mutex<Vec<(JobId, Map<String, Value>)>>,
    inserts: broadcast::Sender<(String, JobRecord)>,
    fail_updates: AtomicBool,
}

impl Default for MemoryRecordStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        let (inserts, _) = broadcast::channel(BROADCAST_CAPACITY);
        Self {
            rows: Mutex::new(HashMap::new()),
            updates: Mutex::new(Vec::new()),
            inserts,
            fail_updates: AtomicBool::new(false),
        }
    }

    /// Store a row and notify subscribers of `table`.
    pub fn insert(&self, table: &str, record: JobRecord) {
        if let Ok(mut rows) = self.rows.lock() {
            rows.insert(record.id.as_str().to_string(), record.clone());
        }
        // No subscribers is fine.
        let _ = self.inserts.send((table.to_string(), record));
    }

    /// Every update received for `id`, in order.
    pub fn updates_for(&self, id: &JobId) -> Vec<Map<String, Value>> {
        self.updates
            .lock()
            .map(|updates| {
                updates
                    .iter()
                    .filter(|(uid, _)| uid == id)
                    .map(|(_, fields)| fields.clone())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// Status values written for `id`, in order.
    pub fn statuses_for(&self, id: &JobId) -> Vec<String> {
        self.updates_for(id)
            .iter()
            .filter_map(|f| f.get("status").and_then(Value::as_str).map(str::to_string))
            .collect()
    }

    /// Make every subsequent `update` fail.
    pub fn set_fail_updates(&self, fail: bool) {
        self.fail_updates.store(fail, Ordering::SeqCst);
    }
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn fetch_by_id(&self, id: &JobId) -> RecordResult<JobRecord> {
        self.rows
            .lock()
            .map_err(|_| RecordError::request_failed("record store lock poisoned"))?
            .get(id.as_str())
            .cloned()
            .ok_or_else(|| RecordError::not_found(id.as_str()))
    }

    async fn update(&self, id: &JobId, fields: Map<String, Value>) -> RecordResult<()> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(RecordError::ServerError(503, "updates disabled".into()));
        }

        self.updates
            .lock()
            .map_err(|_| RecordError::request_failed("record store lock poisoned"))?
            .push((id.clone(), fields));
        Ok(())
    }

    async fn subscribe_on_insert(&self, table: &str) -> RecordResult<mpsc::Receiver<JobRecord>> {
        let (tx, rx) = mpsc::channel(BROADCAST_CAPACITY);
        let mut inserts = self.inserts.subscribe();
        let table = table.to_string();

        tokio::spawn(async move {
            loop {
                match inserts.recv().await {
                    Ok((t, record)) if t == table => {
                        if tx.send(record).await.is_err() {
                            break;
                        }
                    }
                    Ok(_) => {}
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        debug!(table = %table, skipped = n, "Insert subscriber lagged");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });

        Ok(rx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_fetch_missing_is_not_found() {
        let store = MemoryRecordStore::new();
        let err = store.fetch_by_id(&JobId::from("nope")).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_subscription_filters_by_table() {
        let store = MemoryRecordStore::new();
        let mut rx = store.subscribe_on_insert("videos").await.unwrap();

        store.insert("other", JobRecord::new("1"));
        store.insert("videos", JobRecord::new("2"));

        let record = rx.recv().await.unwrap();
        assert_eq!(record.id.as_str(), "2");
        assert_eq!(store.fetch_by_id(&JobId::from("1")).await.unwrap().id.as_str(), "1");
    }

    #[tokio::test]
    async fn test_updates_are_recorded() {
        let store = MemoryRecordStore::new();
        let id = JobId::from("7");
        let mut fields = Map::new();
        fields.insert("status".into(), Value::from("processing"));
        store.update(&id, fields).await.unwrap();

        assert_eq!(store.statuses_for(&id), vec!["processing"]);

        store.set_fail_updates(true);
        assert!(store.update(&id, Map::new()).await.is_err());
    }
}
