//! End-to-end execution of one admitted job.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use tracing::{debug, Instrument};
use uuid::Uuid;
use vgen_media::{MediaNormalizer, MediaProber};
use vgen_storage::ArtifactStore;

use crate::composition::Composition;
use crate::config::PipelineConfig;
use crate::error::{PipelineError, PipelineResult};
use crate::job::{Job, JobOutcome};
use crate::logging::JobLogger;
use crate::metrics::{
    record_job_completed, record_job_failed, record_render_duration, record_upload_duration,
};
use crate::render::{RenderProgress, RenderRequest, Renderer};
use crate::resolver::resolve;
use crate::status::StatusReporter;

/// Runs a dequeued job to a terminal outcome.
#[async_trait]
pub trait JobRunner: Send + Sync {
    async fn run(&self, job: &mut Job) -> JobOutcome;
}

/// The production [`JobRunner`]: normalize, resolve, render, upload, report.
pub struct RenderExecutor {
    config: PipelineConfig,
    normalizer: Arc<dyn MediaNormalizer>,
    prober: Arc<dyn MediaProber>,
    renderer: Arc<dyn Renderer>,
    storage: Arc<dyn ArtifactStore>,
    status: StatusReporter,
}

impl RenderExecutor {
    pub fn new(
        config: PipelineConfig,
        normalizer: Arc<dyn MediaNormalizer>,
        prober: Arc<dyn MediaProber>,
        renderer: Arc<dyn Renderer>,
        storage: Arc<dyn ArtifactStore>,
        status: StatusReporter,
    ) -> Self {
        Self {
            config,
            normalizer,
            prober,
            renderer,
            storage,
            status,
        }
    }

    async fn execute(&self, job: &mut Job, logger: &JobLogger) -> PipelineResult<(String, DateTime<Utc>)> {
        let tag = file_tag(job.id.as_str());
        let work_dir = job_work_dir(&self.config.work_dir, job.id.as_str(), &job.run_id);
        job.artifacts.track(&work_dir);
        tokio::fs::create_dir_all(&work_dir).await?;

        let main = self
            .normalizer
            .normalize(job.record.template(), &work_dir, &format!("{}_main", tag), &mut job.artifacts)
            .await
            .ok_or_else(|| PipelineError::validation("record has no template media reference"))?;
        let demo = self
            .normalizer
            .normalize(job.record.demo(), &work_dir, &format!("{}_demo", tag), &mut job.artifacts)
            .await;

        let main_duration = self.probe_duration(&main, logger).await;
        let demo_duration = match &demo {
            Some(d) => self.probe_duration(d, logger).await,
            None => None,
        };

        let params = resolve(&job.record, main_duration, demo_duration)?.with_media(main, demo);
        logger.log_progress(&format!(
            "resolved parameters: sequential={} split={:?} first={}s total={}s",
            params.sequential_mode,
            params.split_position.map(|p| p.as_str()),
            params.first_video_duration,
            params.duration_in_seconds
        ));

        self.status.processing(&job.id).await;

        let composition = Composition::new(&self.config.composition_id, params);
        let output_path = work_dir.join(format!("{}.mp4", tag));
        let props_path = work_dir.join(format!("{}_props.json", tag));
        job.artifacts.track(&output_path);
        job.artifacts.track(&props_path);

        let request = RenderRequest {
            composition,
            bundle_location: self.config.bundle_location.clone(),
            output_path: output_path.clone(),
            props_path,
            timeout: self.config.render_timeout,
            concurrency: self.config.render_concurrency,
        };
        self.render(&request, logger).await?;

        let start = Instant::now();
        let video_url = self
            .storage
            .upload(&output_path, &format!("{}.mp4", tag))
            .await?;
        record_upload_duration(start.elapsed().as_secs_f64());
        logger.log_progress(&format!("uploaded render to {}", video_url));

        if !job.artifacts.remove(&output_path).await {
            logger.log_warning("could not remove local render after upload");
        }

        let completed_at = Utc::now();
        self.status.completed(&job.id, &video_url, completed_at).await;
        Ok((video_url, completed_at))
    }

    async fn render(&self, request: &RenderRequest, logger: &JobLogger) -> PipelineResult<()> {
        let (tx, rx) = mpsc::channel(32);
        let progress_task = tokio::spawn(log_progress(rx, logger.clone()));

        let start = Instant::now();
        let timeout = self.config.render_timeout;
        let result = match tokio::time::timeout(timeout, self.renderer.render(request, tx)).await {
            Ok(result) => result,
            Err(_) => Err(PipelineError::RenderTimeout(timeout.as_secs())),
        };
        progress_task.abort();

        let elapsed = start.elapsed().as_secs_f64();
        record_render_duration(elapsed);
        if result.is_ok() {
            logger.log_progress(&format!("rendered in {:.1}s", elapsed));
        }
        result
    }

    /// Probed duration, or `None` when the file cannot be probed.
    async fn probe_duration(&self, reference: &str, logger: &JobLogger) -> Option<f64> {
        match self.prober.probe(reference).await {
            Ok(info) => info.duration,
            Err(e) => {
                logger.log_warning(&format!("could not probe {}: {}", reference, e));
                None
            }
        }
    }
}

#[async_trait]
impl JobRunner for RenderExecutor {
    async fn run(&self, job: &mut Job) -> JobOutcome {
        let logger = JobLogger::new(&job.id, "render");
        let span = logger.create_span();

        async {
            logger.log_start("executing render job");

            let outcome = match self.execute(job, &logger).await {
                Ok((video_url, completed_at)) => {
                    record_job_completed();
                    logger.log_completion(&video_url);
                    JobOutcome::Completed {
                        video_url,
                        completed_at,
                    }
                }
                Err(e) => {
                    record_job_failed(failure_reason(&e));
                    logger.log_error(&e.to_string());
                    self.status.failed(&job.id, &e).await;
                    JobOutcome::failed(e.to_string())
                }
            };

            let report = job.artifacts.cleanup().await;
            debug!(
                removed = report.removed,
                already_gone = report.already_gone,
                failed = report.failed.len(),
                "Cleaned up job artifacts"
            );

            outcome
        }
        .instrument(span)
        .await
    }
}

async fn log_progress(mut rx: mpsc::Receiver<RenderProgress>, logger: JobLogger) {
    let mut last_decile = 0u64;
    while let Some(progress) = rx.recv().await {
        let decile = (progress.fraction() * 10.0).floor() as u64;
        if decile > last_decile {
            last_decile = decile;
            logger.log_progress(&format!(
                "rendered {}/{} frames",
                progress.rendered_frames, progress.total_frames
            ));
        }
    }
}

fn failure_reason(error: &PipelineError) -> &'static str {
    match error {
        PipelineError::Validation(_) | PipelineError::InvalidLayout(_) => "validation",
        PipelineError::MediaUnreadable(_) => "media",
        PipelineError::RenderFailure(_) => "render",
        PipelineError::RenderTimeout(_) => "timeout",
        PipelineError::Upload(_) => "upload",
        _ => "internal",
    }
}

/// Job id reduced to characters safe in file names.
pub fn file_tag(id: &str) -> String {
    let tag: String = id
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    if tag.is_empty() {
        "job".to_string()
    } else {
        tag
    }
}

/// Work directory for one run of `id` under `root`.
///
/// The run id keeps directories apart for ids that share a file tag.
pub fn job_work_dir(root: &Path, id: &str, run_id: &Uuid) -> PathBuf {
    root.join(format!("{}_{}", file_tag(id), run_id.simple()))
}
