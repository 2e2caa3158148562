// ============================================================================
// PRESETS: JSON documents carrying global edits and the mask stack
// ============================================================================
//
// A preset is validated in full before anything touches the session, so a
// rejected document leaves history exactly as it was.
// ============================================================================

use std::path::Path;

use image::GrayImage;
use serde::{Deserialize, Serialize};

use crate::components::history::HistoryEntry;
use crate::error::PresetError;
use crate::mask::{Mask, MaskKind, RadialGeometry};
use crate::params::{EditParameters, GlobalEdits};

/// Newest document version this build understands.
pub const PRESET_VERSION: u32 = 1;

fn default_version() -> u32 {
    PRESET_VERSION
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Preset {
    #[serde(default = "default_version")]
    pub version: u32,
    #[serde(default)]
    pub global_edits: GlobalEdits,
    #[serde(default)]
    pub masks: Vec<PresetMask>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PresetMask {
    Ai {
        name: String,
        #[serde(default)]
        edits: EditParameters,
        #[serde(rename = "maskData")]
        mask_data: Vec<u8>,
    },
    Radial {
        name: String,
        #[serde(default)]
        edits: EditParameters,
        params: RadialGeometry,
    },
}

impl PresetMask {
    fn from_mask(mask: &Mask) -> Self {
        match &mask.kind {
            MaskKind::Ai { coverage } => PresetMask::Ai {
                name: mask.name.clone(),
                edits: mask.edits,
                mask_data: coverage.as_raw().clone(),
            },
            MaskKind::Radial(g) => PresetMask::Radial {
                name: mask.name.clone(),
                edits: mask.edits,
                params: *g,
            },
        }
    }

    fn name(&self) -> &str {
        match self {
            PresetMask::Ai { name, .. } | PresetMask::Radial { name, .. } => name,
        }
    }

    fn edits(&self) -> &EditParameters {
        match self {
            PresetMask::Ai { edits, .. } | PresetMask::Radial { edits, .. } => edits,
        }
    }
}

impl Preset {
    /// Snapshot of a history entry. Mask ids and the selection are dropped.
    pub fn from_entry(entry: &HistoryEntry) -> Self {
        Self {
            version: PRESET_VERSION,
            global_edits: entry.global_edits.clone(),
            masks: entry.masks.iter().map(PresetMask::from_mask).collect(),
        }
    }

    pub fn to_json(&self) -> Result<String, PresetError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    pub fn from_json(text: &str) -> Result<Self, PresetError> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn save(&self, path: &Path) -> Result<(), PresetError> {
        std::fs::write(path, self.to_json()?)?;
        Ok(())
    }

    pub fn load(path: &Path) -> Result<Self, PresetError> {
        let text = std::fs::read_to_string(path)?;
        Self::from_json(&text)
    }

    /// Check the whole document against an image of `width × height`.
    pub fn validate(&self, width: u32, height: u32) -> Result<(), PresetError> {
        if self.version == 0 || self.version > PRESET_VERSION {
            return Err(PresetError::Version { found: self.version, supported: PRESET_VERSION });
        }
        if !self.global_edits.adjustments.is_finite() {
            return Err(PresetError::Shape("global edits contain a non-finite value".into()));
        }
        let curve = &self.global_edits.tone_curve_points;
        if curve.len() < 2 {
            return Err(PresetError::Shape("tone curve needs at least two points".into()));
        }
        let in_range = |v: f32| v.is_finite() && (0.0..=255.0).contains(&v);
        if !curve.iter().all(|p| in_range(p.x) && in_range(p.y)) {
            return Err(PresetError::Shape("tone curve point outside 0..255".into()));
        }

        let pixels = width as usize * height as usize;
        for (i, mask) in self.masks.iter().enumerate() {
            if !mask.edits().is_finite() {
                return Err(PresetError::Shape(format!("mask {i} ({}) has a non-finite edit", mask.name())));
            }
            match mask {
                PresetMask::Ai { mask_data, .. } if mask_data.len() != pixels => {
                    return Err(PresetError::Shape(format!(
                        "mask {i} has {} coverage values, image has {pixels} pixels",
                        mask_data.len()
                    )));
                }
                PresetMask::Radial { params, .. } if !params.is_valid() => {
                    return Err(PresetError::Shape(format!("mask {i} has an invalid ellipse")));
                }
                _ => {}
            }
        }
        Ok(())
    }

    /// Validate, then build the masks with fresh ids.
    pub fn to_masks(&self, width: u32, height: u32) -> Result<Vec<Mask>, PresetError> {
        self.validate(width, height)?;
        self.masks
            .iter()
            .map(|pm| -> Result<Mask, PresetError> {
                let kind = match pm {
                    PresetMask::Ai { mask_data, .. } => MaskKind::Ai {
                        coverage: GrayImage::from_raw(width, height, mask_data.clone())
                            .ok_or_else(|| PresetError::Shape("coverage does not fit the image".into()))?,
                    },
                    PresetMask::Radial { params, .. } => MaskKind::Radial(*params),
                };
                let mut mask = Mask::new(pm.name(), kind);
                mask.edits = *pm.edits();
                Ok(mask)
            })
            .collect()
    }
}
