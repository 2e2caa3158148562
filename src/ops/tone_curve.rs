// ============================================================================
// TONE CURVE: control points → 256-entry brightness LUT
// ============================================================================
//
// Points live in curve space: x = input level, y = output drawn screen-down
// (0 is the top of the curve widget, i.e. the brightest output). The LUT
// inverts y so that the default endpoints (0,255)/(255,0) are the identity.
//
// Interpolation is piecewise linear between neighbouring points. The point
// editing helpers here are pure math; `Session::curve_press` and friends feed
// them pointer positions.
// ============================================================================

use crate::params::{CurvePoint, default_curve_points};

pub type CurveLut = [u8; 256];

/// Identity LUT (used when a curve has fewer than two points).
pub fn identity_lut() -> CurveLut {
    let mut lut = [0u8; 256];
    for (i, v) in lut.iter_mut().enumerate() {
        *v = i as u8;
    }
    lut
}

/// Curve-space (screen-down) output for input level `i`, before inversion.
/// `points` must be sorted by x and hold at least two entries.
fn curve_y(points: &[CurvePoint], i: f32) -> f32 {
    let mut p1_idx = 0;
    while p1_idx < points.len() - 2 && points[p1_idx + 1].x < i {
        p1_idx += 1;
    }
    let p1 = points[p1_idx];
    let p2 = points[p1_idx + 1];
    let span = p2.x - p1.x;
    let t = if span == 0.0 { 0.0 } else { (i - p1.x) / span };
    p1.y + t * (p2.y - p1.y)
}

/// Build the brightness LUT for sorted control points.
pub fn build_lut(points: &[CurvePoint]) -> CurveLut {
    if points.len() < 2 {
        return identity_lut();
    }
    let mut lut = [0u8; 256];
    for (i, v) in lut.iter_mut().enumerate() {
        let y = 255.0 - curve_y(points, i as f32);
        *v = if y.is_finite() { y.round().clamp(0.0, 255.0) as u8 } else { i as u8 };
    }
    lut
}

/// Ascending by x. Equal x keep their order.
pub fn sort_points(points: &mut [CurvePoint]) {
    points.sort_by(|a, b| a.x.total_cmp(&b.x));
}

/// Tone curve state: sorted control points and the LUT derived from them.
#[derive(Clone, Debug, PartialEq)]
pub struct ToneCurve {
    points: Vec<CurvePoint>,
    lut: CurveLut,
}

impl Default for ToneCurve {
    fn default() -> Self {
        Self::new(default_curve_points())
    }
}

impl ToneCurve {
    pub fn new(points: Vec<CurvePoint>) -> Self {
        let mut curve = Self { points: Vec::new(), lut: identity_lut() };
        curve.set_points(points);
        curve
    }

    /// Replace all points, sort ascending by x, recompute the LUT.
    pub fn set_points(&mut self, mut points: Vec<CurvePoint>) {
        sort_points(&mut points);
        self.points = points;
        self.generate_lut();
    }

    pub fn generate_lut(&mut self) {
        self.lut = build_lut(&self.points);
    }

    pub fn points(&self) -> &[CurvePoint] {
        &self.points
    }

    pub fn lut(&self) -> &CurveLut {
        &self.lut
    }

    /// Screen-down curve value at input level `i` (what the widget draws).
    pub fn curve_value(&self, i: u8) -> f32 {
        if self.points.len() < 2 {
            return 255.0 - i as f32;
        }
        curve_y(&self.points, i as f32)
    }

    pub fn is_identity(&self) -> bool {
        self.lut == identity_lut()
    }

    pub fn reset(&mut self) {
        self.set_points(default_curve_points());
    }

    fn is_endpoint(p: &CurvePoint) -> bool {
        p.x == 0.0 || p.x == 255.0
    }

    // --- point editing ------------------------------------------------------

    /// Index of the first point within `radius` of (x, y) on both axes.
    pub fn hit_test(&self, x: f32, y: f32, radius: f32) -> Option<usize> {
        self.points
            .iter()
            .position(|p| (p.x - x).abs() < radius && (p.y - y).abs() < radius)
    }

    /// Insert an interior point and return its index after sorting.
    pub fn add_point(&mut self, x: f32, y: f32) -> usize {
        let p = CurvePoint::new(x.clamp(1.0, 254.0), y.clamp(0.0, 255.0));
        self.points.push(p);
        sort_points(&mut self.points);
        self.generate_lut();
        self.points.iter().position(|q| *q == p).unwrap_or(0)
    }

    /// Move point `index`; endpoints keep their x. Returns the point's index
    /// after re-sorting, or `None` if `index` is out of range.
    pub fn drag_point(&mut self, index: usize, x: f32, y: f32) -> Option<usize> {
        let p = self.points.get_mut(index)?;
        if !Self::is_endpoint(p) {
            p.x = x.clamp(1.0, 254.0);
        }
        p.y = y.clamp(0.0, 255.0);
        let moved = *p;
        sort_points(&mut self.points);
        self.generate_lut();
        self.points.iter().position(|q| *q == moved)
    }

    /// Delete an interior point. Endpoints and the last interior point of a
    /// two-point curve are never removed.
    pub fn remove_point(&mut self, index: usize) -> bool {
        match self.points.get(index) {
            Some(p) if !Self::is_endpoint(p) && self.points.len() > 2 => {
                self.points.remove(index);
                self.generate_lut();
                true
            }
            _ => false,
        }
    }
}
