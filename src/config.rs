use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::LumaError;

/// Engine tunables. Missing fields in a config file fall back to the defaults.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    /// Box-blur radius backing clarity (low-frequency local contrast).
    pub clarity_radius: u32,
    /// Box-blur radius backing texture (high-frequency local contrast).
    pub texture_radius: u32,
    /// Multiplier applied to `(channel - blurred) * amount`.
    pub detail_scale: f32,
    /// Radial masks drawn smaller than this on either axis are discarded.
    pub min_radial_radius: f32,
    /// Crop boxes never shrink below this many pixels per side while dragging.
    pub min_crop_size: f32,
    /// Grab distance for crop-box handles.
    pub crop_handle_size: f32,
    /// Peak alpha of the active-mask overlay.
    pub overlay_opacity: f32,
    /// Pick distance for curve control points.
    pub curve_hit_radius: f32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            clarity_radius: 5,
            texture_radius: 2,
            detail_scale: 1.0 / 250.0,
            min_radial_radius: 5.0,
            min_crop_size: 20.0,
            crop_handle_size: 10.0,
            overlay_opacity: 0.5,
            curve_hit_radius: 8.0,
        }
    }
}

impl EngineConfig {
    pub fn from_json_str(text: &str) -> Result<Self, LumaError> {
        let cfg: Self = serde_json::from_str(text)?;
        Ok(cfg)
    }

    pub fn load(path: &Path) -> Result<Self, LumaError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json_str(&text)
    }
}
