// ============================================================================
// EDIT PARAMETERS: value types for global and per-mask adjustments
// ============================================================================

use serde::{Deserialize, Serialize};

/// One tone-curve control point in curve space.
///
/// `y` is stored screen-down (0 = top = brightest output), matching how the
/// curve is drawn. The LUT builder inverts it.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurvePoint {
    pub x: f32,
    pub y: f32,
}

impl CurvePoint {
    pub const fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }
}

/// The two fixed endpoints every curve starts from (identity in brightness).
pub fn default_curve_points() -> Vec<CurvePoint> {
    vec![CurvePoint::new(0.0, 255.0), CurvePoint::new(255.0, 0.0)]
}

/// Tonal/colour adjustment values for the whole image or for one mask.
///
/// Every field defaults to zero, which is the identity edit.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EditParameters {
    pub exposure: f32,
    pub contrast: f32,
    pub highlights: f32,
    pub shadows: f32,
    pub temperature: f32,
    pub saturation: f32,
    pub texture: f32,
    pub clarity: f32,
    pub dehaze: f32,
    pub shadows_hue: f32,
    pub shadows_saturation: f32,
    pub midtones_hue: f32,
    pub midtones_saturation: f32,
    pub highlights_hue: f32,
    pub highlights_saturation: f32,
}

/// Slider range for most parameters.
pub const PARAM_RANGE: f32 = 100.0;
/// Contrast is allowed a wider internal range; 259 would divide by zero.
pub const CONTRAST_RANGE: f32 = 255.0;
/// Hue offsets are degrees.
pub const HUE_RANGE: f32 = 360.0;

fn sane(v: f32, range: f32) -> f32 {
    if v.is_finite() { v.clamp(-range, range) } else { 0.0 }
}

impl EditParameters {
    pub fn is_identity(&self) -> bool {
        *self == Self::default()
    }

    /// Clamp every field into its range and replace non-finite values with 0.
    /// The compositor only ever sees sanitised values.
    pub fn sanitized(&self) -> Self {
        Self {
            exposure: sane(self.exposure, PARAM_RANGE),
            contrast: sane(self.contrast, CONTRAST_RANGE),
            highlights: sane(self.highlights, PARAM_RANGE),
            shadows: sane(self.shadows, PARAM_RANGE),
            temperature: sane(self.temperature, PARAM_RANGE),
            saturation: sane(self.saturation, PARAM_RANGE),
            texture: sane(self.texture, PARAM_RANGE),
            clarity: sane(self.clarity, PARAM_RANGE),
            dehaze: sane(self.dehaze, PARAM_RANGE),
            shadows_hue: sane(self.shadows_hue, HUE_RANGE),
            shadows_saturation: sane(self.shadows_saturation, PARAM_RANGE),
            midtones_hue: sane(self.midtones_hue, HUE_RANGE),
            midtones_saturation: sane(self.midtones_saturation, PARAM_RANGE),
            highlights_hue: sane(self.highlights_hue, HUE_RANGE),
            highlights_saturation: sane(self.highlights_saturation, PARAM_RANGE),
        }
    }

    /// True when every field is a finite number.
    pub fn is_finite(&self) -> bool {
        [
            self.exposure,
            self.contrast,
            self.highlights,
            self.shadows,
            self.temperature,
            self.saturation,
            self.texture,
            self.clarity,
            self.dehaze,
            self.shadows_hue,
            self.shadows_saturation,
            self.midtones_hue,
            self.midtones_saturation,
            self.highlights_hue,
            self.highlights_saturation,
        ]
        .iter()
        .all(|v| v.is_finite())
    }
}

/// Global parameter set: the numeric adjustments plus the tone curve, which
/// only exists at the global level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalEdits {
    #[serde(flatten)]
    pub adjustments: EditParameters,
    #[serde(default = "default_curve_points")]
    pub tone_curve_points: Vec<CurvePoint>,
}

impl Default for GlobalEdits {
    fn default() -> Self {
        Self {
            adjustments: EditParameters::default(),
            tone_curve_points: default_curve_points(),
        }
    }
}

impl GlobalEdits {
    /// True when the curve is exactly the default two-point curve.
    pub fn has_default_curve(&self) -> bool {
        self.tone_curve_points == default_curve_points()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_identity() {
        let g = GlobalEdits::default();
        assert!(g.adjustments.is_identity());
        assert!(g.has_default_curve());
    }

    #[test]
    fn sanitize_clamps_and_drops_nan() {
        let p = EditParameters {
            exposure: 500.0,
            contrast: -1000.0,
            dehaze: f32::NAN,
            midtones_hue: 400.0,
            ..Default::default()
        };
        let s = p.sanitized();
        assert_eq!(s.exposure, 100.0);
        assert_eq!(s.contrast, -255.0);
        assert_eq!(s.dehaze, 0.0);
        assert_eq!(s.midtones_hue, 360.0);
        assert!(s.is_finite());
        assert!(!p.is_finite());
    }

    #[test]
    fn global_edits_read_camel_case_json() {
        let json = r#"{"exposure": 12, "shadowsHue": 30, "toneCurvePoints": [{"x":0,"y":255},{"x":128,"y":100},{"x":255,"y":0}]}"#;
        let g: GlobalEdits = serde_json::from_str(json).unwrap();
        assert_eq!(g.adjustments.exposure, 12.0);
        assert_eq!(g.adjustments.shadows_hue, 30.0);
        assert_eq!(g.tone_curve_points.len(), 3);
    }

    #[test]
    fn missing_curve_defaults_to_endpoints() {
        let g: GlobalEdits = serde_json::from_str(r#"{"contrast": 5}"#).unwrap();
        assert!(g.has_default_curve());
    }
}
