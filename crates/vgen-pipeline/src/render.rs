//! External render invocation.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, AsyncRead, BufReader};
use tokio::process::Command;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::composition::Composition;
use crate::error::{PipelineError, PipelineResult};

/// Lines of renderer output kept for error reports.
const OUTPUT_TAIL_LINES: usize = 20;

/// Frame progress reported by the renderer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RenderProgress {
    pub rendered_frames: u64,
    pub total_frames: u64,
}

impl RenderProgress {
    /// Fraction complete in `0.0..=1.0`.
    pub fn fraction(&self) -> f64 {
        if self.total_frames == 0 {
            return 0.0;
        }
        (self.rendered_frames as f64 / self.total_frames as f64).min(1.0)
    }
}

/// Everything the renderer needs for one job.
#[derive(Debug, Clone)]
pub struct RenderRequest {
    pub composition: Composition,
    /// Prebuilt bundle or entry point; the renderer's default when `None`
    pub bundle_location: Option<String>,
    pub output_path: PathBuf,
    /// Where the input props JSON is written
    pub props_path: PathBuf,
    pub timeout: Duration,
    pub concurrency: Option<u32>,
}

/// Renders a composition to a local file.
#[async_trait]
pub trait Renderer: Send + Sync {
    /// Render `request` to `request.output_path`, reporting progress on
    /// `progress`. Dropping the returned future must stop the render.
    async fn render(
        &self,
        request: &RenderRequest,
        progress: mpsc::Sender<RenderProgress>,
    ) -> PipelineResult<()>;
}

/// [`Renderer`] that runs the render CLI as a subprocess.
#[derive(Debug, Clone)]
pub struct CliRenderer {
    program: String,
    base_args: Vec<String>,
}

impl Default for CliRenderer {
    fn default() -> Self {
        Self::new("npx", ["remotion", "render"])
    }
}

impl CliRenderer {
    pub fn new<I, S>(program: impl Into<String>, base_args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            program: program.into(),
            base_args: base_args.into_iter().map(Into::into).collect(),
        }
    }

    /// Command line for `request`, excluding the program.
    pub fn build_args(&self, request: &RenderRequest) -> Vec<String> {
        let mut args = self.base_args.clone();
        if let Some(bundle) = &request.bundle_location {
            args.push(bundle.clone());
        }
        args.push(request.composition.id.clone());
        args.push(request.output_path.to_string_lossy().into_owned());
        args.push(format!("--props={}", request.props_path.to_string_lossy()));
        args.push(format!("--frames=0-{}", request.composition.duration_in_frames.saturating_sub(1)));
        args.push(format!("--timeout={}", request.timeout.as_millis()));
        if let Some(concurrency) = request.concurrency {
            args.push(format!("--concurrency={}", concurrency));
        }
        args
    }
}

#[async_trait]
impl Renderer for CliRenderer {
    async fn render(
        &self,
        request: &RenderRequest,
        progress: mpsc::Sender<RenderProgress>,
    ) -> PipelineResult<()> {
        let props = request
            .composition
            .props_json()
            .map_err(|e| PipelineError::internal(format!("serialize props: {}", e)))?;
        tokio::fs::write(&request.props_path, props).await?;

        let args = self.build_args(request);
        debug!("Running renderer: {} {}", self.program, args.join(" "));

        let mut child = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| PipelineError::render_failure(format!("failed to start {}: {}", self.program, e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PipelineError::internal("renderer stdout not captured"))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| PipelineError::internal("renderer stderr not captured"))?;

        let stdout_task = tokio::spawn(read_output(stdout, progress.clone()));
        let stderr_task = tokio::spawn(read_output(stderr, progress));

        let status = child.wait().await?;
        let stdout_tail = stdout_task.await.unwrap_or_default();
        let stderr_tail = stderr_task.await.unwrap_or_default();

        if status.success() {
            return Ok(());
        }

        let tail = if stderr_tail.is_empty() { stdout_tail } else { stderr_tail };
        warn!(exit_code = ?status.code(), "Renderer exited with failure");
        Err(PipelineError::render_failure(format!(
            "renderer exited with {}: {}",
            status
                .code()
                .map(|c| c.to_string())
                .unwrap_or_else(|| "signal".to_string()),
            tail
        )))
    }
}

/// Forward progress lines and keep the tail of everything else.
async fn read_output<R>(reader: R, progress: mpsc::Sender<RenderProgress>) -> String
where
    R: AsyncRead + Unpin,
{
    let mut lines = BufReader::new(reader).lines();
    let mut tail: Vec<String> = Vec::new();

    while let Ok(Some(line)) = lines.next_line().await {
        if let Some(p) = parse_render_progress(&line) {
            // Progress is advisory; drop it when the consumer lags.
            let _ = progress.try_send(p);
        } else if !line.trim().is_empty() {
            if tail.len() == OUTPUT_TAIL_LINES {
                tail.remove(0);
            }
            tail.push(line);
        }
    }

    tail.join("\n")
}

/// Parse `Rendered 30/900` style lines.
pub fn parse_render_progress(line: &str) -> Option<RenderProgress> {
    let rest = &line[line.find("Rendered ")? + "Rendered ".len()..];
    let (done, rest) = rest.split_once('/')?;
    let total: String = rest.chars().take_while(|c| c.is_ascii_digit()).collect();

    Some(RenderProgress {
        rendered_frames: done.trim().parse().ok()?,
        total_frames: total.parse().ok()?,
    })
}
