//! Test doubles and an in-process app for API tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::Value;
use tempfile::TempDir;
use tokio::sync::{mpsc, Semaphore};
use tower::ServiceExt;
use vgen_api::{create_router, ApiConfig, AppState};
use vgen_media::{MediaError, MediaInfo, MediaNormalizer, MediaProber, MediaResult, TempArtifacts};
use vgen_pipeline::{
    PipelineConfig, PipelineError, PipelineResult, RenderExecutor, RenderProgress, RenderRequest,
    RenderScheduler, Renderer, StatusReporter,
};
use vgen_records::MemoryRecordStore;
use vgen_storage::{ArtifactStore, StorageResult};

pub const TEMPLATE: &str = "https://cdn.example.com/a.mp4";
pub const UNREACHABLE: &str = "https://cdn.example.com/missing.mp4";

pub struct FakeProber {
    unreachable: HashSet<String>,
}

#[async_trait]
impl MediaProber for FakeProber {
    async fn probe(&self, reference: &str) -> MediaResult<MediaInfo> {
        if self.unreachable.contains(reference) {
            return Err(MediaError::unreadable(reference, "404 Not Found"));
        }
        Ok(MediaInfo {
            duration: Some(12.0),
            width: 1080,
            height: 1920,
            fps: 30.0,
            codec: "h264".to_string(),
            format: "mp4".to_string(),
            bitrate: 2_000_000,
            has_audio: false,
        })
    }
}

/// Passes every source through untouched.
pub struct PassthroughNormalizer;

#[async_trait]
impl MediaNormalizer for PassthroughNormalizer {
    async fn normalize(
        &self,
        source: Option<&str>,
        _work_dir: &Path,
        _job_tag: &str,
        _artifacts: &mut TempArtifacts,
    ) -> Option<String> {
        source.map(str::to_string)
    }
}

pub struct FakeRenderer {
    fail: bool,
    /// When set, each render waits for a permit.
    gate: Option<Arc<Semaphore>>,
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn render(
        &self,
        request: &RenderRequest,
        _progress: mpsc::Sender<RenderProgress>,
    ) -> PipelineResult<()> {
        if let Some(gate) = &self.gate {
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }
        if self.fail {
            return Err(PipelineError::render_failure("compositor crashed"));
        }
        tokio::fs::write(&request.output_path, b"video").await?;
        Ok(())
    }
}

#[derive(Default)]
pub struct FakeStorage {
    pub uploads: Mutex<Vec<String>>,
}

#[async_trait]
impl ArtifactStore for FakeStorage {
    async fn upload(&self, _local: &Path, destination: &str) -> StorageResult<String> {
        self.uploads.lock().unwrap().push(destination.to_string());
        Ok(format!("https://cdn.test/renders/{}", destination))
    }
}

pub struct TestApp {
    pub work_dir: TempDir,
    pub store: Arc<MemoryRecordStore>,
    pub state: AppState,
    pub router: Router,
    pub gate: Option<Arc<Semaphore>>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::build(false, None, 2)
    }

    pub fn failing_renderer() -> Self {
        Self::build(true, None, 2)
    }

    /// Renders block until permits are added to `gate`.
    pub fn gated_renderer(limit: usize) -> Self {
        Self::build(false, Some(Arc::new(Semaphore::new(0))), limit)
    }

    fn build(fail_render: bool, gate: Option<Arc<Semaphore>>, limit: usize) -> Self {
        let work_dir = TempDir::new().unwrap();
        let pipeline = PipelineConfig::default()
            .with_work_dir(work_dir.path())
            .with_max_concurrent_jobs(limit);
        let store = Arc::new(MemoryRecordStore::new());
        let prober: Arc<dyn MediaProber> = Arc::new(FakeProber {
            unreachable: [UNREACHABLE.to_string()].into_iter().collect(),
        });

        let executor = RenderExecutor::new(
            pipeline.clone(),
            Arc::new(PassthroughNormalizer),
            prober.clone(),
            Arc::new(FakeRenderer {
                fail: fail_render,
                gate: gate.clone(),
            }),
            Arc::new(FakeStorage::default()),
            StatusReporter::new(store.clone()),
        );
        let scheduler = RenderScheduler::new(pipeline.max_concurrent_jobs, prober, Arc::new(executor));
        scheduler.start();

        let state = AppState::from_parts(ApiConfig::default(), pipeline, scheduler, store.clone());
        let router = create_router(state.clone(), None);

        Self {
            work_dir,
            store,
            state,
            router,
            gate,
        }
    }

    /// Wait until the scheduler reports `running` and `queued`.
    pub async fn wait_for_queue(&self, running: usize, queued: usize) {
        let reached = tokio::time::timeout(std::time::Duration::from_secs(5), async {
            loop {
                let status = self.state.scheduler.status();
                if (status.running, status.queued) == (running, queued) {
                    break;
                }
                tokio::time::sleep(std::time::Duration::from_millis(5)).await;
            }
        })
        .await;
        assert!(reached.is_ok(), "queue never reached {} running / {} queued", running, queued);
    }

    pub async fn post(&self, uri: &str, body: &str) -> (StatusCode, Value) {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    pub async fn get(&self, uri: &str) -> (StatusCode, Value) {
        let request = Request::builder().uri(uri).body(Body::empty()).unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> (StatusCode, Value) {
        let response = self.router.clone().oneshot(request).await.unwrap();
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
        (status, body)
    }
}
