// ============================================================================
// DESTRUCTIVE TRANSFORMS: rotate, flip, crop
// ============================================================================
//
// Each transform takes the currently visible frame (edits baked in) and
// returns a brand-new base buffer. The session then resets history.
// ============================================================================

use image::{RgbaImage, imageops};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Rotation {
    /// 90° clockwise (swaps W↔H).
    Clockwise,
    /// 90° counter-clockwise (swaps W↔H).
    CounterClockwise,
}

impl Rotation {
    pub fn degrees(self) -> i32 {
        match self {
            Rotation::Clockwise => 90,
            Rotation::CounterClockwise => -90,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FlipAxis {
    /// Mirror left↔right.
    Horizontal,
    /// Mirror top↔bottom.
    Vertical,
}

impl FlipAxis {
    pub fn label(self) -> &'static str {
        match self {
            FlipAxis::Horizontal => "horizontal",
            FlipAxis::Vertical => "vertical",
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DestructiveTransform {
    Rotate(Rotation),
    Flip(FlipAxis),
    /// Pixel rectangle, already clamped to the frame.
    Crop { x: u32, y: u32, width: u32, height: u32 },
}

impl DestructiveTransform {
    /// History label for the fresh entry that follows the transform.
    pub fn action_name(&self) -> String {
        match self {
            DestructiveTransform::Rotate(r) => format!("Rotate {}°", r.degrees()),
            DestructiveTransform::Flip(axis) => format!("Flip {}", axis.label()),
            DestructiveTransform::Crop { .. } => "Apply Crop".to_string(),
        }
    }

    pub fn apply(&self, frame: &RgbaImage) -> RgbaImage {
        match *self {
            DestructiveTransform::Rotate(Rotation::Clockwise) => imageops::rotate90(frame),
            DestructiveTransform::Rotate(Rotation::CounterClockwise) => imageops::rotate270(frame),
            DestructiveTransform::Flip(FlipAxis::Horizontal) => imageops::flip_horizontal(frame),
            DestructiveTransform::Flip(FlipAxis::Vertical) => imageops::flip_vertical(frame),
            DestructiveTransform::Crop { x, y, width, height } => {
                let x = x.min(frame.width().saturating_sub(1));
                let y = y.min(frame.height().saturating_sub(1));
                let width = width.clamp(1, frame.width().saturating_sub(x).max(1));
                let height = height.clamp(1, frame.height().saturating_sub(y).max(1));
                imageops::crop_imm(frame, x, y, width, height).to_image()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgba;

    fn tagged(w: u32, h: u32) -> RgbaImage {
        RgbaImage::from_fn(w, h, |x, y| Rgba([x as u8, y as u8, 0, 255]))
    }

    #[test]
    fn rotation_swaps_dimensions() {
        let img = tagged(4, 2);
        let cw = DestructiveTransform::Rotate(Rotation::Clockwise).apply(&img);
        assert_eq!(cw.dimensions(), (2, 4));
        // Top-left of a clockwise rotation is the original bottom-left.
        assert_eq!(cw.get_pixel(0, 0).0, [0, 1, 0, 255]);
        let ccw = DestructiveTransform::Rotate(Rotation::CounterClockwise).apply(&img);
        assert_eq!(ccw.dimensions(), (2, 4));
        assert_eq!(ccw.get_pixel(0, 0).0, [3, 0, 0, 255]);
    }

    #[test]
    fn flips_mirror() {
        let img = tagged(3, 2);
        let h = DestructiveTransform::Flip(FlipAxis::Horizontal).apply(&img);
        assert_eq!(h.get_pixel(0, 0).0, [2, 0, 0, 255]);
        let v = DestructiveTransform::Flip(FlipAxis::Vertical).apply(&img);
        assert_eq!(v.get_pixel(0, 0).0, [0, 1, 0, 255]);
    }

    #[test]
    fn crop_is_clamped() {
        let img = tagged(10, 10);
        let out = DestructiveTransform::Crop { x: 8, y: 2, width: 50, height: 3 }.apply(&img);
        assert_eq!(out.dimensions(), (2, 3));
        assert_eq!(out.get_pixel(0, 0).0, [8, 2, 0, 255]);
    }

    #[test]
    fn action_names() {
        assert_eq!(DestructiveTransform::Rotate(Rotation::Clockwise).action_name(), "Rotate 90°");
        assert_eq!(DestructiveTransform::Rotate(Rotation::CounterClockwise).action_name(), "Rotate -90°");
        assert_eq!(DestructiveTransform::Flip(FlipAxis::Vertical).action_name(), "Flip vertical");
    }
}
