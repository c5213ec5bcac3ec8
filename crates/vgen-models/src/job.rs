//! Job identifiers and the raw input record a render is driven from.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use uuid::Uuid;

/// Unique identifier for a render job.
///
/// Record stores hand out both string and integer keys, so deserialization
/// accepts either and normalizes to a string.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new random job ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True when the id is empty or whitespace only.
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for JobId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl<'de> Deserialize<'de> for JobId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        #[derive(Deserialize)]
        #[serde(untagged)]
        enum RawId {
            Text(String),
            Int(i64),
            Uint(u64),
        }

        Ok(match RawId::deserialize(deserializer)? {
            RawId::Text(s) => JobId(s),
            RawId::Int(n) => JobId(n.to_string()),
            RawId::Uint(n) => JobId(n.to_string()),
        })
    }
}

/// Layout alignment requested for the secondary ("demo") media.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum VideoAlignment {
    /// Play primary and demo back to back.
    Serial,
    /// Primary and demo side by side.
    Side,
    /// Demo stacked on top of the primary.
    Top,
    /// No alignment given.
    #[default]
    Unset,
    /// Any value the pipeline does not understand.
    Other(String),
}

impl VideoAlignment {
    pub fn as_str(&self) -> &str {
        match self {
            VideoAlignment::Serial => "serial",
            VideoAlignment::Side => "side",
            VideoAlignment::Top => "top",
            VideoAlignment::Unset => "",
            VideoAlignment::Other(s) => s,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, VideoAlignment::Unset)
    }
}

impl From<&str> for VideoAlignment {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "" => VideoAlignment::Unset,
            "serial" => VideoAlignment::Serial,
            "side" => VideoAlignment::Side,
            "top" => VideoAlignment::Top,
            _ => VideoAlignment::Other(s.to_string()),
        }
    }
}

impl fmt::Display for VideoAlignment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for VideoAlignment {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for VideoAlignment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(VideoAlignment::from).unwrap_or_default())
    }
}

/// Caption alignment requested by the record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default)]
pub enum TextAlignment {
    Top,
    Center,
    Bottom,
    #[default]
    Unset,
    Other(String),
}

impl TextAlignment {
    pub fn as_str(&self) -> &str {
        match self {
            TextAlignment::Top => "top",
            TextAlignment::Center => "center",
            TextAlignment::Bottom => "bottom",
            TextAlignment::Unset => "",
            TextAlignment::Other(s) => s,
        }
    }

    pub fn is_unset(&self) -> bool {
        matches!(self, TextAlignment::Unset)
    }
}

impl From<&str> for TextAlignment {
    fn from(s: &str) -> Self {
        match s.trim().to_ascii_lowercase().as_str() {
            "" => TextAlignment::Unset,
            "top" => TextAlignment::Top,
            "center" | "centre" | "middle" => TextAlignment::Center,
            "bottom" => TextAlignment::Bottom,
            _ => TextAlignment::Other(s.to_string()),
        }
    }
}

impl Serialize for TextAlignment {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for TextAlignment {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = Option::<String>::deserialize(deserializer)?;
        Ok(raw.as_deref().map(TextAlignment::from).unwrap_or_default())
    }
}

/// Composition descriptor nested under the record's `remotion` key.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompositionDescriptor {
    /// Primary (template) media reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,

    /// Secondary media reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub demo: Option<String>,

    /// Background audio reference.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio: Option<String>,

    /// Audio start offset in seconds.
    #[serde(
        default,
        deserialize_with = "lenient_seconds",
        skip_serializing_if = "Option::is_none"
    )]
    pub audio_offset: Option<f64>,

    /// Caption text.
    #[serde(default, alias = "caption", skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,

    #[serde(default, skip_serializing_if = "TextAlignment::is_unset")]
    pub text_alignment: TextAlignment,

    #[serde(default, skip_serializing_if = "VideoAlignment::is_unset")]
    pub video_alignment: VideoAlignment,
}

/// Immutable snapshot of one render request as stored upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRecord {
    pub id: JobId,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remotion: Option<CompositionDescriptor>,

    /// Top-level layout alignment, used when the descriptor has none.
    #[serde(default, skip_serializing_if = "VideoAlignment::is_unset")]
    pub video_alignment: VideoAlignment,

    /// Top-level caption alignment, used when the descriptor has none.
    #[serde(default, skip_serializing_if = "TextAlignment::is_unset")]
    pub text_alignment: TextAlignment,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl JobRecord {
    /// Create a record with an empty descriptor.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: JobId::from_string(id),
            remotion: Some(CompositionDescriptor::default()),
            video_alignment: VideoAlignment::Unset,
            text_alignment: TextAlignment::Unset,
            status: None,
            created_at: None,
        }
    }

    /// Set the template reference.
    pub fn with_template(mut self, template: impl Into<String>) -> Self {
        self.descriptor_mut().template = Some(template.into());
        self
    }

    /// Set the demo reference.
    pub fn with_demo(mut self, demo: impl Into<String>) -> Self {
        self.descriptor_mut().demo = Some(demo.into());
        self
    }

    /// Set the audio reference and offset.
    pub fn with_audio(mut self, audio: impl Into<String>, offset: Option<f64>) -> Self {
        let descriptor = self.descriptor_mut();
        descriptor.audio = Some(audio.into());
        descriptor.audio_offset = offset;
        self
    }

    /// Set the caption text and alignment.
    pub fn with_text(mut self, text: impl Into<String>, alignment: TextAlignment) -> Self {
        let descriptor = self.descriptor_mut();
        descriptor.text = Some(text.into());
        descriptor.text_alignment = alignment;
        self
    }

    /// Set the top-level layout alignment.
    pub fn with_video_alignment(mut self, alignment: VideoAlignment) -> Self {
        self.video_alignment = alignment;
        self
    }

    fn descriptor_mut(&mut self) -> &mut CompositionDescriptor {
        self.remotion.get_or_insert_with(CompositionDescriptor::default)
    }

    pub fn descriptor(&self) -> Option<&CompositionDescriptor> {
        self.remotion.as_ref()
    }

    /// Primary media reference, if non-empty.
    pub fn template(&self) -> Option<&str> {
        self.descriptor().and_then(|d| non_empty(d.template.as_deref()))
    }

    /// Secondary media reference, if non-empty.
    pub fn demo(&self) -> Option<&str> {
        self.descriptor().and_then(|d| non_empty(d.demo.as_deref()))
    }

    /// Audio reference, if non-empty.
    pub fn audio(&self) -> Option<&str> {
        self.descriptor().and_then(|d| non_empty(d.audio.as_deref()))
    }

    pub fn audio_offset(&self) -> Option<f64> {
        self.descriptor().and_then(|d| d.audio_offset)
    }

    pub fn text(&self) -> Option<&str> {
        self.descriptor().and_then(|d| d.text.as_deref())
    }

    /// Effective layout alignment: descriptor value first, then top level.
    pub fn video_alignment(&self) -> &VideoAlignment {
        match self.descriptor() {
            Some(d) if !d.video_alignment.is_unset() => &d.video_alignment,
            _ => &self.video_alignment,
        }
    }

    /// Effective caption alignment: descriptor value first, then top level.
    pub fn text_alignment(&self) -> &TextAlignment {
        match self.descriptor() {
            Some(d) if !d.text_alignment.is_unset() => &d.text_alignment,
            _ => &self.text_alignment,
        }
    }

    /// Every media reference that must be probed before admission.
    pub fn media_references(&self) -> Vec<&str> {
        self.template().into_iter().chain(self.demo()).collect()
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|s| !s.is_empty())
}

/// Accept `1.5`, `"1.5"`, `null` or an empty string.
fn lenient_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum RawSeconds {
        Number(f64),
        Text(String),
    }

    match Option::<RawSeconds>::deserialize(deserializer)? {
        None => Ok(None),
        Some(RawSeconds::Number(n)) => Ok(Some(n)),
        Some(RawSeconds::Text(s)) if s.trim().is_empty() => Ok(None),
        Some(RawSeconds::Text(s)) => s
            .trim()
            .parse::<f64>()
            .map(Some)
            .map_err(|_| serde::de::Error::custom(format!("invalid seconds value: {}", s))),
    }
}
