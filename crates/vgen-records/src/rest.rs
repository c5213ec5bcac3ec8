//! PostgREST-style HTTP record store.
//!
//! Rows are read and patched through `/rest/v1/{table}?id=eq.{id}`. Insert
//! notifications are produced by polling rows newer than a `created_at`
//! cursor.

use std::future::Future;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tracing::{debug, info, info_span, warn, Instrument};
use vgen_models::{JobId, JobRecord};

use crate::error::{RecordError, RecordResult};
use crate::metrics::record_request;
use crate::retry::{with_retry, RetryConfig};
use crate::store::RecordStore;

/// Buffered records per insert subscription.
const SUBSCRIPTION_BUFFER: usize = 64;

/// REST record store configuration.
#[derive(Debug, Clone)]
pub struct RestRecordConfig {
    /// Project base URL, e.g. `https://xyz.supabase.co`
    pub base_url: String,
    /// Service role key, sent as `apikey` and bearer token
    pub service_key: String,
    /// Table holding job records
    pub table: String,
    /// Request timeout
    pub timeout: Duration,
    /// Connect timeout
    pub connect_timeout: Duration,
    /// Insert polling interval
    pub poll_interval: Duration,
    /// Retry configuration
    pub retry: RetryConfig,
}

impl RestRecordConfig {
    /// Create config from environment variables.
    pub fn from_env() -> RecordResult<Self> {
        let base_url = std::env::var("RECORDS_URL")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| RecordError::config_error("RECORDS_URL must be set"))?;

        let service_key = std::env::var("RECORDS_SERVICE_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| RecordError::config_error("RECORDS_SERVICE_KEY must be set"))?;

        let poll_interval_secs: u64 = std::env::var("RECORDS_POLL_INTERVAL_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5);

        Ok(Self {
            base_url,
            service_key,
            table: std::env::var("VGEN_RECORD_TABLE").unwrap_or_else(|_| "videos".to_string()),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(poll_interval_secs.max(1)),
            retry: RetryConfig::from_env(),
        })
    }

    /// Config pointing at `base_url` with defaults for everything else.
    pub fn new(base_url: impl Into<String>, service_key: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            service_key: service_key.into(),
            table: "videos".to_string(),
            timeout: Duration::from_secs(30),
            connect_timeout: Duration::from_secs(5),
            poll_interval: Duration::from_secs(5),
            retry: RetryConfig::default(),
        }
    }
}

/// HTTP record store client.
#[derive(Clone)]
pub struct RestRecordStore {
    http: Client,
    config: RestRecordConfig,
    rest_url: String,
}

impl RestRecordStore {
    /// Create a new client.
    pub fn new(config: RestRecordConfig) -> RecordResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .pool_idle_timeout(Duration::from_secs(90))
            .pool_max_idle_per_host(10)
            .user_agent(concat!("vgen-records/", env!("CARGO_PKG_VERSION")))
            .build()?;

        let rest_url = format!("{}/rest/v1", config.base_url.trim_end_matches('/'));

        Ok(Self {
            http,
            config,
            rest_url,
        })
    }

    /// Create from environment variables.
    pub fn from_env() -> RecordResult<Self> {
        Self::new(RestRecordConfig::from_env()?)
    }

    pub fn table(&self) -> &str {
        &self.config.table
    }

    fn row_url(&self, table: &str, id: &JobId) -> String {
        format!(
            "{}/{}?id=eq.{}",
            self.rest_url,
            table,
            urlencoding::encode(id.as_str())
        )
    }

    fn authorized(&self, builder: RequestBuilder) -> RequestBuilder {
        builder
            .header("apikey", &self.config.service_key)
            .bearer_auth(&self.config.service_key)
    }

    /// Raw rows of `table` created strictly after `cursor`, oldest first.
    ///
    /// Rows are left undecoded so one malformed row cannot fail the page.
    pub async fn fetch_created_after(
        &self,
        table: &str,
        cursor: DateTime<Utc>,
    ) -> RecordResult<Vec<Value>> {
        let cursor = cursor.to_rfc3339_opts(SecondsFormat::Micros, true);
        let url = format!(
            "{}/{}?select=*&created_at=gt.{}&order=created_at.asc",
            self.rest_url,
            table,
            urlencoding::encode(&cursor)
        );

        self.execute_request("poll_inserts", table, None, async {
            let response = self.authorized(self.http.get(&url)).send().await?;
            let response = Self::check_status(response, &url).await?;
            Ok(response.json::<Vec<Value>>().await?)
        })
        .await
    }

    async fn check_status(response: Response, url: &str) -> RecordResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after_ms = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok())
            .map(|secs| secs * 1000);
        let body = response.text().await.unwrap_or_default();

        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(RecordError::RateLimited(retry_after_ms.unwrap_or(1000)));
        }
        Err(RecordError::from_http_status(
            status.as_u16(),
            format!("{} failed: {}", url, body),
        ))
    }

    async fn execute_request<T, F>(
        &self,
        operation: &str,
        table: &str,
        id: Option<&JobId>,
        fut: F,
    ) -> RecordResult<T>
    where
        F: Future<Output = RecordResult<T>>,
    {
        let span = match id {
            Some(id) => info_span!("record_request", operation = %operation, table = %table, job_id = %id),
            None => info_span!("record_request", operation = %operation, table = %table),
        };

        let start = Instant::now();
        let result = fut.instrument(span).await;
        let latency_ms = start.elapsed().as_millis() as f64;

        let status = match &result {
            Ok(_) => 200,
            Err(e) => e.http_status().unwrap_or(500),
        };
        record_request(operation, status, latency_ms);

        result
    }
}

#[async_trait]
impl RecordStore for RestRecordStore {
    async fn fetch_by_id(&self, id: &JobId) -> RecordResult<JobRecord> {
        let table = self.config.table.as_str();
        let url = format!("{}&select=*", self.row_url(table, id));

        let rows = with_retry(&self.config.retry, "fetch_by_id", || {
            self.execute_request("fetch_by_id", table, Some(id), async {
                let response = self.authorized(self.http.get(&url)).send().await?;
                let response = Self::check_status(response, &url).await?;
                Ok(response.json::<Vec<JobRecord>>().await?)
            })
        })
        .await?;

        rows.into_iter()
            .next()
            .ok_or_else(|| RecordError::not_found(id.as_str()))
    }

    async fn update(&self, id: &JobId, fields: Map<String, Value>) -> RecordResult<()> {
        let table = self.config.table.as_str();
        let url = self.row_url(table, id);
        let body = Value::Object(fields);

        with_retry(&self.config.retry, "update", || {
            self.execute_request("update", table, Some(id), async {
                let response = self
                    .authorized(self.http.patch(&url))
                    .header("Prefer", "return=minimal")
                    .json(&body)
                    .send()
                    .await?;
                Self::check_status(response, &url).await?;
                Ok(())
            })
        })
        .await?;

        debug!(job_id = %id, table, "Updated record");
        Ok(())
    }

    async fn subscribe_on_insert(&self, table: &str) -> RecordResult<mpsc::Receiver<JobRecord>> {
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        let store = self.clone();
        let table = table.to_string();
        let interval = self.config.poll_interval;

        info!(table = %table, interval_secs = interval.as_secs(), "Polling for inserted records");

        tokio::spawn(async move {
            let mut cursor = Utc::now();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = ticker.tick() => {}
                    _ = tx.closed() => break,
                }

                let rows = match store.fetch_created_after(&table, cursor).await {
                    Ok(rows) => rows,
                    Err(e) => {
                        warn!(table = %table, error = %e, "Insert poll failed");
                        continue;
                    }
                };

                for row in rows {
                    if let Some(created_at) = row_created_at(&row) {
                        cursor = cursor.max(created_at);
                    }
                    let record = match serde_json::from_value::<JobRecord>(row) {
                        Ok(record) => record,
                        Err(e) => {
                            warn!(table = %table, error = %e, "Skipping malformed inserted row");
                            continue;
                        }
                    };
                    if tx.send(record).await.is_err() {
                        debug!(table = %table, "Insert subscriber dropped");
                        return;
                    }
                }
            }
        });

        Ok(rx)
    }
}

/// `created_at` of a raw row, read without decoding the rest of it.
fn row_created_at(row: &Value) -> Option<DateTime<Utc>> {
    let raw = row.get("created_at")?.as_str()?;
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}
