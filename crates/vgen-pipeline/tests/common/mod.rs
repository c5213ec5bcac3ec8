//! In-memory collaborators for pipeline tests.

#![allow(dead_code)]

use std::collections::HashSet;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tempfile::TempDir;
use tokio::sync::mpsc;
use vgen_media::{MediaError, MediaInfo, MediaNormalizer, MediaProber, MediaResult, TempArtifacts};
use vgen_pipeline::{
    PipelineConfig, PipelineError, PipelineResult, RenderExecutor, RenderProgress, RenderRequest,
    RenderScheduler, Renderer, StatusReporter,
};
use vgen_records::MemoryRecordStore;
use vgen_storage::{ArtifactStore, StorageError, StorageResult};

pub const TEMPLATE: &str = "https://cdn.example.com/a.mp4";
pub const DEMO: &str = "https://cdn.example.com/b.mp4";

#[derive(Default)]
pub struct FakeProber {
    unreachable: HashSet<String>,
    /// Duration by substring of the probed reference.
    durations: Vec<(String, f64)>,
}

impl FakeProber {
    pub fn unreachable(mut self, reference: &str) -> Self {
        self.unreachable.insert(reference.to_string());
        self
    }

    pub fn duration(mut self, pattern: &str, seconds: f64) -> Self {
        self.durations.push((pattern.to_string(), seconds));
        self
    }
}

#[async_trait]
impl MediaProber for FakeProber {
    async fn probe(&self, reference: &str) -> MediaResult<MediaInfo> {
        if self.unreachable.contains(reference) {
            return Err(MediaError::unreadable(reference, "connection refused"));
        }
        let duration = self
            .durations
            .iter()
            .find(|(pattern, _)| reference.contains(pattern.as_str()))
            .map(|(_, d)| *d);
        Ok(MediaInfo {
            duration,
            width: 1920,
            height: 1080,
            fps: 30.0,
            codec: "h264".to_string(),
            format: "mp4".to_string(),
            bitrate: 1_000_000,
            has_audio: true,
        })
    }
}

/// Writes a placeholder file per input, like a real transcode would.
pub struct FakeNormalizer;

#[async_trait]
impl MediaNormalizer for FakeNormalizer {
    async fn normalize(
        &self,
        source: Option<&str>,
        work_dir: &Path,
        job_tag: &str,
        artifacts: &mut TempArtifacts,
    ) -> Option<String> {
        let source = source?;
        let output = work_dir.join(format!("normalized_{}.mp4", job_tag));
        artifacts.track(&output);
        match tokio::fs::write(&output, source.as_bytes()).await {
            Ok(()) => Some(output.to_string_lossy().into_owned()),
            Err(_) => Some(source.to_string()),
        }
    }
}

#[derive(Clone, Copy)]
pub enum RenderMode {
    Succeed,
    /// Write a partial output, then fail.
    Fail,
    /// Never finish.
    Hang,
}

pub struct FakeRenderer {
    mode: RenderMode,
    pub requests: Mutex<Vec<RenderRequest>>,
}

impl FakeRenderer {
    pub fn new(mode: RenderMode) -> Self {
        Self {
            mode,
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn last_request(&self) -> Option<RenderRequest> {
        self.requests.lock().unwrap().last().cloned()
    }
}

#[async_trait]
impl Renderer for FakeRenderer {
    async fn render(
        &self,
        request: &RenderRequest,
        progress: mpsc::Sender<RenderProgress>,
    ) -> PipelineResult<()> {
        self.requests.lock().unwrap().push(request.clone());
        tokio::fs::write(&request.props_path, request.composition.props_json().unwrap()).await?;
        tokio::fs::write(&request.output_path, b"partial").await?;

        let total = request.composition.duration_in_frames;
        let _ = progress
            .send(RenderProgress {
                rendered_frames: total / 2,
                total_frames: total,
            })
            .await;

        match self.mode {
            RenderMode::Succeed => Ok(()),
            RenderMode::Fail => Err(PipelineError::render_failure("compositor crashed")),
            RenderMode::Hang => {
                tokio::time::sleep(Duration::from_secs(3600)).await;
                Ok(())
            }
        }
    }
}

#[derive(Default)]
pub struct FakeStorage {
    pub uploads: Mutex<Vec<String>>,
}

#[async_trait]
impl ArtifactStore for FakeStorage {
    async fn upload(&self, local: &Path, destination: &str) -> StorageResult<String> {
        if !local.exists() {
            return Err(StorageError::not_found(local.display().to_string()));
        }
        self.uploads.lock().unwrap().push(destination.to_string());
        Ok(format!("https://cdn.test/renders/{}", destination))
    }
}

pub struct Harness {
    pub work_dir: TempDir,
    pub store: Arc<MemoryRecordStore>,
    pub renderer: Arc<FakeRenderer>,
    pub storage: Arc<FakeStorage>,
    pub scheduler: RenderScheduler,
}

impl Harness {
    pub fn new(prober: FakeProber, mode: RenderMode) -> Self {
        Self::with_config(prober, mode, |c| c)
    }

    pub fn with_config(
        prober: FakeProber,
        mode: RenderMode,
        configure: impl FnOnce(PipelineConfig) -> PipelineConfig,
    ) -> Self {
        let work_dir = TempDir::new().unwrap();
        let config = configure(PipelineConfig::default().with_work_dir(work_dir.path()));
        let store = Arc::new(MemoryRecordStore::new());
        let renderer = Arc::new(FakeRenderer::new(mode));
        let storage = Arc::new(FakeStorage::default());
        let prober: Arc<dyn MediaProber> = Arc::new(prober);

        let executor = RenderExecutor::new(
            config.clone(),
            Arc::new(FakeNormalizer),
            prober.clone(),
            renderer.clone(),
            storage.clone(),
            StatusReporter::new(store.clone()),
        );
        let scheduler = RenderScheduler::new(config.max_concurrent_jobs, prober, Arc::new(executor));
        scheduler.start();

        Self {
            work_dir,
            store,
            renderer,
            storage,
            scheduler,
        }
    }

    /// Number of entries left under the work root.
    pub fn leftover_entries(&self) -> usize {
        std::fs::read_dir(self.work_dir.path()).map(|d| d.count()).unwrap_or(0)
    }
}

