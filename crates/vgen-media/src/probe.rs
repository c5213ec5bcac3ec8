//! FFprobe media inspection.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::process::Command;
use tracing::debug;

use crate::command::check_ffprobe;
use crate::error::{MediaError, MediaResult};

/// Stream metadata for a media source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MediaInfo {
    /// Duration in seconds, when the container reports one
    pub duration: Option<f64>,
    /// Width in pixels
    pub width: u32,
    /// Height in pixels
    pub height: u32,
    /// Frame rate (fps)
    pub fps: f64,
    /// Video codec
    pub codec: String,
    /// Container format name
    pub format: String,
    /// Bitrate in bits/second
    pub bitrate: u64,
    /// Whether an audio stream is present
    pub has_audio: bool,
}

/// Inspects a media source without modifying it.
#[async_trait]
pub trait MediaProber: Send + Sync {
    /// Probe a path or URL. Fails with [`MediaError::Unreadable`] when the
    /// source is unreachable or carries no decodable video stream.
    async fn probe(&self, reference: &str) -> MediaResult<MediaInfo>;
}

/// FFprobe JSON output format.
#[derive(Debug, Deserialize)]
struct FfprobeOutput {
    format: FfprobeFormat,
    #[serde(default)]
    streams: Vec<FfprobeStream>,
}

#[derive(Debug, Deserialize)]
struct FfprobeFormat {
    format_name: Option<String>,
    duration: Option<String>,
    bit_rate: Option<String>,
}

#[derive(Debug, Deserialize)]
struct FfprobeStream {
    codec_type: String,
    codec_name: Option<String>,
    width: Option<u32>,
    height: Option<u32>,
    r_frame_rate: Option<String>,
    avg_frame_rate: Option<String>,
}

/// [`MediaProber`] backed by the `ffprobe` binary.
#[derive(Debug, Clone)]
pub struct FfprobeProber {
    timeout: Duration,
}

impl Default for FfprobeProber {
    fn default() -> Self {
        Self::new(Duration::from_secs(30))
    }
}

impl FfprobeProber {
    pub fn new(timeout: Duration) -> Self {
        Self { timeout }
    }

    async fn run_ffprobe(&self, reference: &str) -> MediaResult<Vec<u8>> {
        check_ffprobe()?;

        let mut cmd = Command::new("ffprobe");
        cmd.args(["-v", "error", "-print_format", "json", "-show_format", "-show_streams"]);
        if is_remote(reference) {
            // Network read timeout in microseconds.
            cmd.args(["-rw_timeout", &self.timeout.as_micros().to_string()]);
        }
        cmd.arg(reference)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = tokio::time::timeout(self.timeout, cmd.output())
            .await
            .map_err(|_| MediaError::Timeout(self.timeout.as_secs()))??;

        if !output.status.success() {
            return Err(MediaError::FfprobeFailed {
                message: "FFprobe failed".to_string(),
                stderr: Some(String::from_utf8_lossy(&output.stderr).trim().to_string()),
            });
        }

        Ok(output.stdout)
    }
}

#[async_trait]
impl MediaProber for FfprobeProber {
    async fn probe(&self, reference: &str) -> MediaResult<MediaInfo> {
        let target = match local_path(reference) {
            Some(path) if !path.exists() => {
                return Err(MediaError::unreadable(reference, "file not found"));
            }
            Some(path) => path.to_string_lossy().into_owned(),
            None => reference.to_string(),
        };

        let stdout = self.run_ffprobe(&target).await.map_err(|e| match e {
            MediaError::FfprobeNotFound => e,
            MediaError::FfprobeFailed { stderr, message } => {
                MediaError::unreadable(reference, stderr.filter(|s| !s.is_empty()).unwrap_or(message))
            }
            other => MediaError::unreadable(reference, other),
        })?;

        let info = parse_probe_output(&stdout).map_err(|e| MediaError::unreadable(reference, e))?;
        debug!(
            reference,
            codec = %info.codec,
            width = info.width,
            height = info.height,
            duration = ?info.duration,
            "Probed media"
        );
        Ok(info)
    }
}

/// Parse ffprobe JSON into [`MediaInfo`].
fn parse_probe_output(stdout: &[u8]) -> MediaResult<MediaInfo> {
    let probe: FfprobeOutput = serde_json::from_slice(stdout)?;

    let video_stream = probe
        .streams
        .iter()
        .find(|s| s.codec_type == "video")
        .ok_or_else(|| MediaError::InvalidVideo("No video stream found".to_string()))?;

    let duration = probe
        .format
        .duration
        .as_deref()
        .and_then(|d| d.parse::<f64>().ok())
        .filter(|d| d.is_finite() && *d > 0.0);

    let bitrate = probe
        .format
        .bit_rate
        .as_deref()
        .and_then(|b| b.parse::<u64>().ok())
        .unwrap_or(0);

    let fps = video_stream
        .avg_frame_rate
        .as_deref()
        .and_then(parse_frame_rate)
        .or_else(|| video_stream.r_frame_rate.as_deref().and_then(parse_frame_rate))
        .unwrap_or(30.0);

    Ok(MediaInfo {
        duration,
        width: video_stream.width.unwrap_or(0),
        height: video_stream.height.unwrap_or(0),
        fps,
        codec: video_stream.codec_name.clone().unwrap_or_default(),
        format: probe.format.format_name.unwrap_or_default(),
        bitrate,
        has_audio: probe.streams.iter().any(|s| s.codec_type == "audio"),
    })
}

/// True for references ffmpeg opens through a protocol handler.
pub fn is_remote(reference: &str) -> bool {
    reference.contains("://") && !reference.starts_with("file://")
}

/// Filesystem path for a plain path or `file://` URL; `None` when remote.
pub fn local_path(reference: &str) -> Option<PathBuf> {
    if is_remote(reference) {
        return None;
    }
    match reference.strip_prefix("file://") {
        Some(path) => {
            let decoded = urlencoding::decode(path)
                .map(|p| p.into_owned())
                .unwrap_or_else(|_| path.to_string());
            Some(PathBuf::from(decoded))
        }
        None => Some(PathBuf::from(reference)),
    }
}

/// Parse frame rate string (e.g., "30/1" or "29.97").
fn parse_frame_rate(s: &str) -> Option<f64> {
    if let Some((num, den)) = s.split_once('/') {
        let num: f64 = num.parse().ok()?;
        let den: f64 = den.parse().ok()?;
        if den > 0.0 && num > 0.0 {
            return Some(num / den);
        }
        return None;
    }
    s.parse().ok().filter(|fps: &f64| *fps > 0.0)
}
