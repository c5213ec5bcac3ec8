//! Rendering parameters derived from a job record.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Default length of the primary segment in seconds.
pub const DEFAULT_FIRST_VIDEO_DURATION: f64 = 6.0;

/// Default composition length in seconds.
pub const DEFAULT_DURATION_IN_SECONDS: f64 = 30.0;

/// Directional arrangement of the two sources in split-screen mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
pub enum SplitPosition {
    #[serde(rename = "right-left")]
    RightLeft,
    #[serde(rename = "left-right")]
    LeftRight,
    #[serde(rename = "bottom-top")]
    BottomTop,
    #[serde(rename = "top-bottom")]
    TopBottom,
}

impl SplitPosition {
    pub const ALL: [SplitPosition; 4] = [
        SplitPosition::RightLeft,
        SplitPosition::LeftRight,
        SplitPosition::BottomTop,
        SplitPosition::TopBottom,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            SplitPosition::RightLeft => "right-left",
            SplitPosition::LeftRight => "left-right",
            SplitPosition::BottomTop => "bottom-top",
            SplitPosition::TopBottom => "top-bottom",
        }
    }
}

impl fmt::Display for SplitPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Error)]
#[error("Unknown split position: {0}")]
pub struct UnknownSplitPosition(pub String);

impl FromStr for SplitPosition {
    type Err = UnknownSplitPosition;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SplitPosition::ALL
            .into_iter()
            .find(|p| p.as_str() == s)
            .ok_or_else(|| UnknownSplitPosition(s.to_string()))
    }
}

/// Vertical placement of the caption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum TextPosition {
    Top,
    #[default]
    Center,
    Bottom,
}

/// Concrete parameters for one composition, computed once per job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct RenderParameters {
    /// Caption text ("" when the record has none).
    pub text: String,
    pub text_position: TextPosition,

    /// Primary media URL (normalized local path or original reference).
    pub video_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub demo_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,

    pub has_audio: bool,
    /// Audio start offset in seconds.
    pub audio_offset: f64,

    pub split_screen: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub split_position: Option<SplitPosition>,
    pub sequential_mode: bool,

    /// Primary segment length in seconds.
    pub first_video_duration: f64,
    /// Total composition length in seconds.
    pub duration_in_seconds: f64,
}

impl RenderParameters {
    /// Replace the media URLs with their normalized counterparts.
    pub fn with_media(mut self, video_url: impl Into<String>, demo_url: Option<String>) -> Self {
        self.video_url = video_url.into();
        if self.demo_url.is_some() {
            self.demo_url = demo_url;
        }
        self
    }

    /// Composition length in frames at the given frame rate.
    pub fn duration_in_frames(&self, fps: u32) -> u64 {
        (self.duration_in_seconds * fps as f64).ceil().max(1.0) as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_position_round_trip_names() {
        for position in SplitPosition::ALL {
            assert_eq!(position.as_str().parse::<SplitPosition>().unwrap(), position);
        }
        assert!("diagonal".parse::<SplitPosition>().is_err());
    }

    #[test]
    fn test_parameters_serialize_camel_case() {
        let params = RenderParameters {
            text: "hi".into(),
            text_position: TextPosition::Bottom,
            video_url: "a.mp4".into(),
            demo_url: None,
            audio_url: None,
            has_audio: false,
            audio_offset: 0.0,
            split_screen: true,
            split_position: Some(SplitPosition::RightLeft),
            sequential_mode: false,
            first_video_duration: 6.0,
            duration_in_seconds: 12.5,
        };

        let json = serde_json::to_value(&params).unwrap();
        assert_eq!(json["splitPosition"], "right-left");
        assert_eq!(json["textPosition"], "bottom");
        assert_eq!(json["durationInSeconds"], 12.5);
        assert!(json.get("demoUrl").is_none());
        assert_eq!(params.duration_in_frames(30), 375);
    }
}
