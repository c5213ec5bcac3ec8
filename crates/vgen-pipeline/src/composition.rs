//! The composition handed to the renderer.

use serde::Serialize;
use vgen_models::RenderParameters;

/// Frame rate every composition renders at.
pub const COMPOSITION_FPS: u32 = 30;

/// A named composition with its input props and length.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Composition {
    pub id: String,
    pub fps: u32,
    pub duration_in_frames: u64,
    pub input_props: RenderParameters,
}

impl Composition {
    pub fn new(id: impl Into<String>, input_props: RenderParameters) -> Self {
        Self {
            id: id.into(),
            fps: COMPOSITION_FPS,
            duration_in_frames: input_props.duration_in_frames(COMPOSITION_FPS),
            input_props,
        }
    }

    /// Input props as the JSON document the renderer reads.
    pub fn props_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&self.input_props)
    }
}
