//! FFmpeg CLI wrapper for render inputs.
//!
//! This crate provides:
//! - ffmpeg command building and a runner with timeout
//! - Progress parsing from `-progress pipe:2`
//! - Media probing via ffprobe (local paths and URLs)
//! - Normalization to a fixed web-safe profile
//! - Per-job temp artifact tracking with best-effort cleanup

pub mod artifacts;
pub mod command;
pub mod error;
pub mod normalize;
pub mod probe;
pub mod progress;

pub use artifacts::{CleanupReport, TempArtifacts};
pub use command::{check_ffmpeg, check_ffprobe, FfmpegCommand, FfmpegRunner};
pub use error::{MediaError, MediaResult};
pub use normalize::{FfmpegNormalizer, MediaNormalizer, TargetProfile};
pub use probe::{is_remote, local_path, FfprobeProber, MediaInfo, MediaProber};
pub use progress::FfmpegProgress;
