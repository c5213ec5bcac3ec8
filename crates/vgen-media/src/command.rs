//! ffmpeg invocation.

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, warn};

use crate::error::{MediaError, MediaResult};
use crate::progress::{parse_progress_line, FfmpegProgress};

/// Lines of non-progress stderr kept for error reports.
const STDERR_TAIL_LINES: usize = 20;

/// One ffmpeg transcode: a single input, a single output file.
#[derive(Debug, Clone)]
pub struct FfmpegCommand {
    input: String,
    output: PathBuf,
    input_options: Vec<String>,
    output_options: Vec<String>,
}

impl FfmpegCommand {
    pub fn new(input: impl Into<String>, output: impl AsRef<Path>) -> Self {
        Self {
            input: input.into(),
            output: output.as_ref().to_path_buf(),
            input_options: Vec::new(),
            output_options: Vec::new(),
        }
    }

    /// Option applied to the input, placed before `-i`.
    pub fn input_option(mut self, flag: &str, value: impl Into<String>) -> Self {
        self.input_options.push(flag.to_string());
        self.input_options.push(value.into());
        self
    }

    /// Option applied to the output.
    pub fn option(mut self, flag: &str, value: impl Into<String>) -> Self {
        self.output_options.push(flag.to_string());
        self.output_options.push(value.into());
        self
    }

    /// Full argument list, excluding the program name.
    ///
    /// Machine-readable progress goes to stderr; the human stats line is off.
    pub fn args(&self) -> Vec<String> {
        let mut args: Vec<String> = ["-y", "-v", "error", "-progress", "pipe:2", "-nostats"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        args.extend(self.input_options.iter().cloned());
        args.push("-i".to_string());
        args.push(self.input.clone());
        args.extend(self.output_options.iter().cloned());
        args.push(self.output.to_string_lossy().into_owned());
        args
    }
}

/// Runs [`FfmpegCommand`]s with an optional wall-clock limit.
#[derive(Debug, Clone, Default)]
pub struct FfmpegRunner {
    timeout: Option<Duration>,
}

impl FfmpegRunner {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(mut self, secs: u64) -> Self {
        self.timeout = Some(Duration::from_secs(secs));
        self
    }

    /// Run `cmd`, calling `on_progress` for every progress block.
    ///
    /// The child is killed when the timeout elapses or the future is dropped.
    pub async fn run<F>(&self, cmd: &FfmpegCommand, mut on_progress: F) -> MediaResult<()>
    where
        F: FnMut(&FfmpegProgress) + Send + 'static,
    {
        check_ffmpeg()?;

        let args = cmd.args();
        debug!("Running ffmpeg {}", args.join(" "));

        let mut child = Command::new("ffmpeg")
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()?;

        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| MediaError::internal("ffmpeg stderr not captured"))?;

        let reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut current = FfmpegProgress::default();
            let mut tail: Vec<String> = Vec::new();

            while let Ok(Some(line)) = lines.next_line().await {
                if let Some(progress) = parse_progress_line(&line, &mut current) {
                    on_progress(&progress);
                } else if !line.contains('=') {
                    if tail.len() == STDERR_TAIL_LINES {
                        tail.remove(0);
                    }
                    tail.push(line);
                }
            }
            tail.join("\n")
        });

        let status = match self.timeout {
            Some(limit) => match tokio::time::timeout(limit, child.wait()).await {
                Ok(status) => status?,
                Err(_) => {
                    warn!(timeout_secs = limit.as_secs(), "ffmpeg timed out, killing process");
                    let _ = child.kill().await;
                    reader.abort();
                    return Err(MediaError::Timeout(limit.as_secs()));
                }
            },
            None => child.wait().await?,
        };
        let stderr_tail = reader.await.unwrap_or_default();

        if status.success() {
            return Ok(());
        }
        Err(MediaError::ffmpeg_failed(
            "ffmpeg exited with non-zero status",
            (!stderr_tail.is_empty()).then_some(stderr_tail),
            status.code(),
        ))
    }
}

/// Path to ffmpeg, or [`MediaError::FfmpegNotFound`].
pub fn check_ffmpeg() -> MediaResult<PathBuf> {
    which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)
}

/// Path to ffprobe, or [`MediaError::FfprobeNotFound`].
pub fn check_ffprobe() -> MediaResult<PathBuf> {
    which::which("ffprobe").map_err(|_| MediaError::FfprobeNotFound)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_order() {
        let args = FfmpegCommand::new("https://cdn.example.com/a.mp4", "out.mp4")
            .input_option("-rw_timeout", "30000000")
            .option("-c:v", "libx264")
            .args();

        assert_eq!(&args[..2], ["-y", "-v"]);
        let flag = args.iter().position(|a| a == "-rw_timeout").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        let codec = args.iter().position(|a| a == "-c:v").unwrap();
        assert!(flag < input && input < codec);
        assert_eq!(args[input + 1], "https://cdn.example.com/a.mp4");
        assert_eq!(args.last().map(String::as_str), Some("out.mp4"));
    }

    #[test]
    fn test_progress_goes_to_stderr() {
        let args = FfmpegCommand::new("a.mp4", "b.mp4").args();
        let pos = args.iter().position(|a| a == "-progress").unwrap();
        assert_eq!(args[pos + 1], "pipe:2");
        assert!(args.contains(&"-nostats".to_string()));
    }
}
