//! Transcoding render inputs to a uniform, web-safe profile.

use std::path::Path;
use std::time::Instant;

use async_trait::async_trait;
use metrics::{counter, histogram};
use tracing::{debug, info, warn};

use crate::artifacts::TempArtifacts;
use crate::command::{FfmpegCommand, FfmpegRunner};
use crate::error::MediaResult;
use crate::probe::is_remote;

pub const NORMALIZE_DURATION_SECONDS: &str = "vgen_normalize_duration_seconds";
pub const NORMALIZE_FALLBACKS_TOTAL: &str = "vgen_normalize_fallbacks_total";

/// Stall limit for reading remote inputs, in microseconds.
const REMOTE_IO_TIMEOUT_US: u64 = 30_000_000;

/// Fixed output profile every input is converted to.
pub struct TargetProfile;

impl TargetProfile {
    pub const VIDEO_CODEC: &'static str = "libx264";
    pub const VIDEO_PROFILE: &'static str = "baseline";
    pub const PIXEL_FORMAT: &'static str = "yuv420p";
    pub const AUDIO_CODEC: &'static str = "aac";
    pub const AUDIO_BITRATE: &'static str = "128k";
    pub const MAX_RATE: &'static str = "5M";
    pub const BUFFER_SIZE: &'static str = "10M";
    pub const MAX_WIDTH: u32 = 1920;
    pub const MAX_HEIGHT: u32 = 1080;
    pub const FPS: u32 = 30;

    /// Downscale-only fit into the max box, then round to even dimensions
    /// for yuv420p.
    pub fn scale_filter() -> String {
        format!(
            "scale='min({w},iw)':'min({h},ih)':force_original_aspect_ratio=decrease,scale=trunc(iw/2)*2:trunc(ih/2)*2",
            w = Self::MAX_WIDTH,
            h = Self::MAX_HEIGHT,
        )
    }
}

/// Converts an input media reference to the target profile.
#[async_trait]
pub trait MediaNormalizer: Send + Sync {
    /// Returns `None` for an absent source. On transcode failure the
    /// original reference is returned unchanged.
    ///
    /// The output path is tracked in `artifacts` before any work starts.
    async fn normalize(
        &self,
        source: Option<&str>,
        work_dir: &Path,
        job_tag: &str,
        artifacts: &mut TempArtifacts,
    ) -> Option<String>;
}

/// [`MediaNormalizer`] that shells out to ffmpeg.
#[derive(Debug, Clone, Default)]
pub struct FfmpegNormalizer {
    runner: FfmpegRunner,
}

impl FfmpegNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_timeout(secs: u64) -> Self {
        Self {
            runner: FfmpegRunner::new().with_timeout(secs),
        }
    }

    /// Build the transcode command for one input.
    pub fn build_command(source: &str, output: &Path) -> FfmpegCommand {
        let mut cmd = FfmpegCommand::new(source, output);
        if is_remote(source) {
            cmd = cmd.input_option("-rw_timeout", REMOTE_IO_TIMEOUT_US.to_string());
        }
        cmd.option("-vf", TargetProfile::scale_filter())
            .option("-c:v", TargetProfile::VIDEO_CODEC)
            .option("-profile:v", TargetProfile::VIDEO_PROFILE)
            .option("-pix_fmt", TargetProfile::PIXEL_FORMAT)
            .option("-r", TargetProfile::FPS.to_string())
            .option("-preset", "fast")
            .option("-maxrate", TargetProfile::MAX_RATE)
            .option("-bufsize", TargetProfile::BUFFER_SIZE)
            .option("-c:a", TargetProfile::AUDIO_CODEC)
            .option("-b:a", TargetProfile::AUDIO_BITRATE)
            .option("-movflags", "+faststart")
    }

    async fn transcode(&self, source: &str, output: &Path, job_tag: &str) -> MediaResult<()> {
        let cmd = Self::build_command(source, output);
        let tag = job_tag.to_string();
        self.runner
            .run(&cmd, move |p| {
                debug!(job_tag = %tag, out_time_secs = p.out_time_secs(), speed = p.speed, "Transcode progress");
            })
            .await
    }
}

#[async_trait]
impl MediaNormalizer for FfmpegNormalizer {
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

        let start = Instant::now();
        let result = match tokio::fs::create_dir_all(work_dir).await {
            Ok(()) => self.transcode(source, &output, job_tag).await,
            Err(e) => Err(e.into()),
        };
        let elapsed = start.elapsed().as_secs_f64();

        match result {
            Ok(()) => {
                histogram!(NORMALIZE_DURATION_SECONDS).record(elapsed);
                info!(
                    job_tag,
                    output = %output.display(),
                    duration_secs = elapsed,
                    "Normalized media"
                );
                Some(output.to_string_lossy().into_owned())
            }
            Err(e) => {
                counter!(NORMALIZE_FALLBACKS_TOTAL).increment(1);
                warn!(
                    job_tag,
                    source,
                    error = %e,
                    "Normalization failed, using original source"
                );
                Some(source.to_string())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_command_targets_profile() {
        let args = FfmpegNormalizer::build_command("in.mov", Path::new("out.mp4")).args();
        let joined = args.join(" ");
        assert!(joined.contains("-c:v libx264"));
        assert!(joined.contains("-profile:v baseline"));
        assert!(joined.contains("-c:a aac"));
        assert!(joined.contains("-maxrate 5M"));
        assert!(joined.contains("-bufsize 10M"));
        assert!(joined.contains("-r 30"));
        assert!(joined.contains("-movflags +faststart"));
        assert!(joined.contains("min(1920,iw)"));
        assert!(joined.contains("min(1080,ih)"));
        assert!(!joined.contains("-rw_timeout"));
    }

    #[test]
    fn test_remote_source_gets_io_timeout() {
        let args =
            FfmpegNormalizer::build_command("https://cdn.example.com/a.mp4", Path::new("out.mp4")).args();
        let flag = args.iter().position(|a| a == "-rw_timeout").unwrap();
        let input = args.iter().position(|a| a == "-i").unwrap();
        assert!(flag < input);
    }

    #[tokio::test]
    async fn test_absent_source_is_absent() {
        let dir = TempDir::new().unwrap();
        let mut artifacts = TempArtifacts::new();
        let out = FfmpegNormalizer::new()
            .normalize(None, dir.path(), "job-1", &mut artifacts)
            .await;
        assert!(out.is_none());
        assert!(artifacts.is_empty());
    }

    #[tokio::test]
    async fn test_failed_transcode_returns_original() {
        let dir = TempDir::new().unwrap();
        let mut artifacts = TempArtifacts::new();
        let original = dir.path().join("not-a-video.mp4");
        std::fs::write(&original, b"garbage").unwrap();
        let original = original.to_string_lossy().into_owned();

        let out = FfmpegNormalizer::new()
            .normalize(Some(&original), dir.path(), "job-1", &mut artifacts)
            .await;

        assert_eq!(out.as_deref(), Some(original.as_str()));
        assert_eq!(artifacts.len(), 1);
        assert!(artifacts.paths()[0].ends_with("normalized_job-1.mp4"));
    }

    #[tokio::test]
    #[ignore = "requires ffmpeg"]
    async fn test_normalizes_generated_clip() {
        let dir = TempDir::new().unwrap();
        let source = dir.path().join("src.mp4");
        let status = tokio::process::Command::new("ffmpeg")
            .args(["-y", "-v", "error", "-f", "lavfi", "-i", "testsrc=size=2560x1440:rate=60", "-t", "1"])
            .arg(&source)
            .status()
            .await
            .unwrap();
        assert!(status.success());

        let mut artifacts = TempArtifacts::new();
        let source = source.to_string_lossy().into_owned();
        let out = FfmpegNormalizer::new()
            .normalize(Some(&source), dir.path(), "main", &mut artifacts)
            .await
            .unwrap();

        assert_ne!(out, source);
        assert!(Path::new(&out).exists());
    }
}
