//! Pipeline configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Pipeline configuration.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Maximum concurrently running jobs
    pub max_concurrent_jobs: usize,
    /// Root for per-job work directories
    pub work_dir: PathBuf,
    /// Wall-clock limit for one render
    pub render_timeout: Duration,
    /// How long `stop` waits for in-flight jobs
    pub shutdown_timeout: Duration,
    /// Timeout for a single admission probe
    pub probe_timeout: Duration,
    /// Composition rendered for every job
    pub composition_id: String,
    /// Prebuilt render bundle (entry point or serve URL)
    pub bundle_location: Option<String>,
    /// Frame concurrency hint for the renderer
    pub render_concurrency: Option<u32>,
    /// Table holding job records
    pub record_table: String,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            work_dir: PathBuf::from("/tmp/vgen"),
            render_timeout: Duration::from_secs(900), // 15 minutes
            shutdown_timeout: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(30),
            composition_id: "MainComposition".to_string(),
            bundle_location: None,
            render_concurrency: None,
            record_table: "videos".to_string(),
        }
    }
}

impl PipelineConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: std::env::var("VGEN_MAX_CONCURRENT_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n: &usize| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            work_dir: std::env::var("VGEN_WORK_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.work_dir),
            render_timeout: Duration::from_secs(
                std::env::var("VGEN_RENDER_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(900),
            ),
            shutdown_timeout: Duration::from_secs(
                std::env::var("VGEN_SHUTDOWN_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(60),
            ),
            probe_timeout: Duration::from_secs(
                std::env::var("VGEN_PROBE_TIMEOUT_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(30),
            ),
            composition_id: std::env::var("VGEN_COMPOSITION_ID")
                .unwrap_or(defaults.composition_id),
            bundle_location: std::env::var("VGEN_BUNDLE_LOCATION")
                .ok()
                .filter(|s| !s.trim().is_empty()),
            render_concurrency: std::env::var("VGEN_RENDER_CONCURRENCY")
                .ok()
                .and_then(|s| s.parse().ok()),
            record_table: std::env::var("VGEN_RECORD_TABLE").unwrap_or(defaults.record_table),
        }
    }

    pub fn with_work_dir(mut self, work_dir: impl Into<PathBuf>) -> Self {
        self.work_dir = work_dir.into();
        self
    }

    pub fn with_max_concurrent_jobs(mut self, n: usize) -> Self {
        self.max_concurrent_jobs = n.max(1);
        self
    }

    pub fn with_render_timeout(mut self, timeout: Duration) -> Self {
        self.render_timeout = timeout;
        self
    }
}
