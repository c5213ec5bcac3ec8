//! Application state.

use std::sync::Arc;

use anyhow::Context;
use tracing::{info, warn};
use vgen_media::{FfmpegNormalizer, FfprobeProber, MediaProber};
use vgen_pipeline::{CliRenderer, PipelineConfig, RenderExecutor, RenderScheduler, StatusReporter};
use vgen_records::{MemoryRecordStore, RecordStore, RestRecordStore};
use vgen_storage::{ArtifactStore, LocalArtifactStore, R2Client};

use crate::config::{ApiConfig, ArtifactStoreKind};

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub pipeline: PipelineConfig,
    pub scheduler: RenderScheduler,
    pub records: Arc<dyn RecordStore>,
    pub status: StatusReporter,
}

impl AppState {
    /// Build the production pipeline from configuration. The scheduler is
    /// started before this returns.
    pub async fn new(config: ApiConfig, pipeline: PipelineConfig) -> anyhow::Result<Self> {
        let records: Arc<dyn RecordStore> = if std::env::var("RECORDS_URL").is_ok() {
            Arc::new(RestRecordStore::from_env().context("failed to create record store client")?)
        } else {
            warn!("RECORDS_URL not set, using in-memory record store");
            Arc::new(MemoryRecordStore::new())
        };

        let storage: Arc<dyn ArtifactStore> = match config.artifact_store {
            ArtifactStoreKind::R2 => {
                let client = R2Client::from_env().context("failed to create R2 client")?;
                if let Err(e) = client.check_connectivity().await {
                    warn!(error = %e, "R2 connectivity check failed");
                }
                Arc::new(client)
            }
            ArtifactStoreKind::Local => {
                let prefix =
                    std::env::var("VGEN_OUTPUT_PREFIX").unwrap_or_else(|_| "renders".to_string());
                info!(dir = %config.local_store_dir.display(), "Using local artifact store");
                Arc::new(LocalArtifactStore::new(config.local_store_dir.clone(), prefix))
            }
        };

        tokio::fs::create_dir_all(&pipeline.work_dir)
            .await
            .with_context(|| format!("failed to create work dir {}", pipeline.work_dir.display()))?;

        let prober: Arc<dyn MediaProber> = Arc::new(FfprobeProber::new(pipeline.probe_timeout));
        let executor = RenderExecutor::new(
            pipeline.clone(),
            // Transcodes share the render's wall-clock budget.
            Arc::new(FfmpegNormalizer::with_timeout(pipeline.render_timeout.as_secs())),
            prober.clone(),
            Arc::new(CliRenderer::default()),
            storage,
            StatusReporter::new(records.clone()),
        );
        let scheduler =
            RenderScheduler::new(pipeline.max_concurrent_jobs, prober, Arc::new(executor));
        scheduler.start();

        Ok(Self::from_parts(config, pipeline, scheduler, records))
    }

    /// Assemble state around an existing scheduler and record store.
    pub fn from_parts(
        config: ApiConfig,
        pipeline: PipelineConfig,
        scheduler: RenderScheduler,
        records: Arc<dyn RecordStore>,
    ) -> Self {
        let status = StatusReporter::new(records.clone());
        Self {
            config,
            pipeline,
            scheduler,
            records,
            status,
        }
    }
}
