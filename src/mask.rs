// ============================================================================
// MASKS: spatial selections carrying their own parameter set
// ============================================================================

use std::fmt;

use image::{GrayImage, Luma};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::params::EditParameters;

/// Session-local mask identity. Never persisted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct MaskId(Uuid);

impl MaskId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for MaskId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for MaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "mask_{}", self.0.simple())
    }
}

/// Ellipse centre and radii in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct RadialGeometry {
    pub cx: f32,
    pub cy: f32,
    pub rx: f32,
    pub ry: f32,
}

impl RadialGeometry {
    pub fn is_valid(&self) -> bool {
        [self.cx, self.cy, self.rx, self.ry].iter().all(|v| v.is_finite()) && self.rx > 0.0 && self.ry > 0.0
    }
}

/// Mask variants with their kind-specific payload.
#[derive(Clone, Debug, PartialEq)]
pub enum MaskKind {
    /// Coverage produced by the segmentation collaborator, stored verbatim.
    Ai { coverage: GrayImage },
    /// Coverage derived from the ellipse every time it is needed.
    Radial(RadialGeometry),
}

impl MaskKind {
    pub fn type_name(&self) -> &'static str {
        match self {
            MaskKind::Ai { .. } => "ai",
            MaskKind::Radial(_) => "radial",
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct Mask {
    pub id: MaskId,
    pub name: String,
    pub kind: MaskKind,
    pub edits: EditParameters,
}

impl Mask {
    pub fn new(name: impl Into<String>, kind: MaskKind) -> Self {
        Self {
            id: MaskId::new(),
            name: name.into(),
            kind,
            edits: EditParameters::default(),
        }
    }

    pub fn radial(geometry: RadialGeometry) -> Self {
        Self::new("Radial Gradient", MaskKind::Radial(geometry))
    }

    pub fn coverage(&self, width: u32, height: u32) -> GrayImage {
        generate_coverage(&self.kind, width, height)
    }
}

/// Radial falloff: `(1 - sqrt(d)) * 255` inside the unit ellipse, 0 outside.
#[inline]
pub fn radial_falloff(g: &RadialGeometry, x: f32, y: f32) -> u8 {
    let dx = (x - g.cx) / g.rx;
    let dy = (y - g.cy) / g.ry;
    let d = dx * dx + dy * dy;
    if d < 1.0 { ((1.0 - d.sqrt()) * 255.0).round().clamp(0.0, 255.0) as u8 } else { 0 }
}

/// Per-pixel coverage for a mask, always exactly `width × height`.
pub fn generate_coverage(kind: &MaskKind, width: u32, height: u32) -> GrayImage {
    match kind {
        MaskKind::Ai { coverage } => {
            if coverage.dimensions() == (width, height) {
                coverage.clone()
            } else {
                // Stale coverage (should not happen after a transform reset):
                // keep the overlap, nothing outside it.
                GrayImage::from_fn(width, height, |x, y| {
                    if x < coverage.width() && y < coverage.height() {
                        *coverage.get_pixel(x, y)
                    } else {
                        Luma([0])
                    }
                })
            }
        }
        MaskKind::Radial(g) => {
            let w = width as usize;
            let mut raw = vec![0u8; w * height as usize];
            if g.is_valid() && w > 0 {
                raw.par_chunks_mut(w).enumerate().for_each(|(y, row)| {
                    for (x, out) in row.iter_mut().enumerate() {
                        *out = radial_falloff(g, x as f32, y as f32);
                    }
                });
            }
            GrayImage::from_raw(width, height, raw).unwrap_or_else(|| GrayImage::new(width, height))
        }
    }
}

/// Rescale segmentation confidences (0..1) to coverage (0..255).
/// Returns `None` when the value count does not match the image.
pub fn coverage_from_confidence(confidence: &[f32], width: u32, height: u32) -> Option<GrayImage> {
    if confidence.len() != width as usize * height as usize {
        return None;
    }
    let raw = confidence
        .iter()
        .map(|&c| if c.is_finite() { (c * 255.0).round().clamp(0.0, 255.0) as u8 } else { 0 })
        .collect();
    GrayImage::from_raw(width, height, raw)
}
