// ============================================================================
// GEOMETRY TOOLS: crop box and radial-mask drawing state
// ============================================================================
//
// While a geometry tool is active the numeric edit controls are inert; the
// session checks `ToolState::controls_enabled` before committing edits.
// ============================================================================

use crate::mask::RadialGeometry;

/// Orchestrator state.
#[derive(Clone, Debug, Default, PartialEq)]
pub enum ToolState {
    /// No base image loaded.
    #[default]
    Idle,
    /// Image loaded, no geometry tool active.
    Ready,
    Cropping(CropTool),
    RadialDrawing(RadialTool),
}

impl ToolState {
    pub fn controls_enabled(&self) -> bool {
        matches!(self, ToolState::Ready)
    }

    pub fn label(&self) -> &'static str {
        match self {
            ToolState::Idle => "idle",
            ToolState::Ready => "ready",
            ToolState::Cropping(_) => "cropping",
            ToolState::RadialDrawing(_) => "radial-drawing",
        }
    }
}

// ---------------------------------------------------------------------------
//  Crop
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CropBox {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl CropBox {
    /// Integer pixel rectangle clamped to the image, at least 1×1.
    pub fn to_pixel_rect(&self, image_w: u32, image_h: u32) -> (u32, u32, u32, u32) {
        let finite = |v: f32| if v.is_finite() { v } else { 0.0 };
        let max_x = image_w.saturating_sub(1) as f32;
        let max_y = image_h.saturating_sub(1) as f32;
        let x = finite(self.x).round().clamp(0.0, max_x) as u32;
        let y = finite(self.y).round().clamp(0.0, max_y) as u32;
        let w = (finite(self.w).round().max(1.0) as u32).min(image_w - x.min(image_w)).max(1);
        let h = (finite(self.h).round().max(1.0) as u32).min(image_h - y.min(image_h)).max(1);
        (x, y, w, h)
    }
}

/// Which part of the crop box a drag grabbed.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CropHandle {
    TopLeft,
    TopRight,
    BottomLeft,
    BottomRight,
    Top,
    Bottom,
    Left,
    Right,
    Move,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CropTool {
    pub crop_box: CropBox,
    drag: Option<CropHandle>,
}

impl CropTool {
    /// Start with the box covering the whole image.
    pub fn new(image_w: u32, image_h: u32) -> Self {
        Self {
            crop_box: CropBox { x: 0.0, y: 0.0, w: image_w as f32, h: image_h as f32 },
            drag: None,
        }
    }

    pub fn handle_at(&self, x: f32, y: f32, handle_size: f32) -> Option<CropHandle> {
        let b = self.crop_box;
        let handles = [
            (CropHandle::TopLeft, b.x, b.y),
            (CropHandle::TopRight, b.x + b.w, b.y),
            (CropHandle::BottomLeft, b.x, b.y + b.h),
            (CropHandle::BottomRight, b.x + b.w, b.y + b.h),
            (CropHandle::Top, b.x + b.w / 2.0, b.y),
            (CropHandle::Bottom, b.x + b.w / 2.0, b.y + b.h),
            (CropHandle::Left, b.x, b.y + b.h / 2.0),
            (CropHandle::Right, b.x + b.w, b.y + b.h / 2.0),
        ];
        handles
            .into_iter()
            .find(|&(_, hx, hy)| (x - hx).abs() < handle_size && (y - hy).abs() < handle_size)
            .map(|(h, _, _)| h)
    }

    /// Pointer down: grab a handle, or the whole box.
    pub fn press(&mut self, x: f32, y: f32, handle_size: f32) -> CropHandle {
        let handle = self.handle_at(x, y, handle_size).unwrap_or(CropHandle::Move);
        self.drag = Some(handle);
        handle
    }

    /// Pointer move while pressed. Sides never shrink below `min_size`.
    pub fn drag_to(&mut self, x: f32, y: f32, min_size: f32) {
        let Some(handle) = self.drag else { return };
        let b = &mut self.crop_box;
        let (ox, oy, ow, oh) = (b.x, b.y, b.w, b.h);
        match handle {
            CropHandle::TopLeft => {
                b.x = x;
                b.y = y;
                b.w += ox - x;
                b.h += oy - y;
            }
            CropHandle::TopRight => {
                b.y = y;
                b.w = x - ox;
                b.h += oy - y;
            }
            CropHandle::BottomLeft => {
                b.x = x;
                b.w += ox - x;
                b.h = y - oy;
            }
            CropHandle::BottomRight => {
                b.w = x - ox;
                b.h = y - oy;
            }
            CropHandle::Top => {
                b.y = y;
                b.h += oy - y;
            }
            CropHandle::Bottom => b.h = y - oy,
            CropHandle::Left => {
                b.x = x;
                b.w += ox - x;
            }
            CropHandle::Right => b.w = x - ox,
            CropHandle::Move => {
                b.x += x - (ox + ow / 2.0);
                b.y += y - (oy + oh / 2.0);
            }
        }
        b.w = b.w.max(min_size);
        b.h = b.h.max(min_size);
    }

    pub fn release(&mut self) {
        self.drag = None;
    }
}

// ---------------------------------------------------------------------------
//  Radial mask drawing
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RadialDrag {
    pub start: (f32, f32),
    pub end: (f32, f32),
}

impl RadialDrag {
    /// Centre at the press point; radii are the drag extents.
    pub fn geometry(&self) -> RadialGeometry {
        RadialGeometry {
            cx: self.start.0,
            cy: self.start.1,
            rx: (self.end.0 - self.start.0).abs(),
            ry: (self.end.1 - self.start.1).abs(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RadialTool {
    drag: Option<RadialDrag>,
}

impl RadialTool {
    pub fn press(&mut self, x: f32, y: f32) {
        self.drag = Some(RadialDrag { start: (x, y), end: (x, y) });
    }

    pub fn drag_to(&mut self, x: f32, y: f32) {
        if let Some(d) = self.drag.as_mut() {
            d.end = (x, y);
        }
    }

    pub fn drag(&self) -> Option<&RadialDrag> {
        self.drag.as_ref()
    }

    /// Pointer up. Returns the ellipse, or `None` when either radius is below
    /// `min_radius` (the drawing is discarded).
    pub fn release(&mut self, min_radius: f32) -> Option<RadialGeometry> {
        let g = self.drag.take()?.geometry();
        (g.rx >= min_radius && g.ry >= min_radius && g.is_valid()).then_some(g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_ready_enables_controls() {
        assert!(!ToolState::Idle.controls_enabled());
        assert!(ToolState::Ready.controls_enabled());
        assert!(!ToolState::Cropping(CropTool::new(10, 10)).controls_enabled());
        assert!(!ToolState::RadialDrawing(RadialTool::default()).controls_enabled());
    }

    #[test]
    fn bottom_right_handle_resizes() {
        let mut tool = CropTool::new(200, 100);
        assert_eq!(tool.press(199.0, 98.0, 10.0), CropHandle::BottomRight);
        tool.drag_to(120.0, 60.0, 20.0);
        tool.release();
        assert_eq!(tool.crop_box, CropBox { x: 0.0, y: 0.0, w: 120.0, h: 60.0 });
    }

    #[test]
    fn crop_box_respects_min_size() {
        let mut tool = CropTool::new(200, 100);
        tool.press(200.0, 50.0, 10.0);
        tool.drag_to(5.0, 50.0, 20.0);
        assert_eq!(tool.crop_box.w, 20.0);
    }

    #[test]
    fn interior_press_moves_box() {
        let mut tool = CropTool::new(100, 100);
        tool.press(50.0, 50.0, 10.0);
        tool.drag_to(60.0, 45.0, 20.0);
        assert_eq!(tool.crop_box.x, 10.0);
        assert_eq!(tool.crop_box.y, -5.0);
    }

    #[test]
    fn pixel_rect_is_clamped() {
        let b = CropBox { x: -10.0, y: 90.0, w: 500.0, h: 50.0 };
        assert_eq!(b.to_pixel_rect(100, 100), (0, 90, 100, 10));
    }

    #[test]
    fn small_radial_drag_is_discarded() {
        let mut tool = RadialTool::default();
        tool.press(50.0, 50.0);
        tool.drag_to(53.0, 80.0);
        assert_eq!(tool.release(5.0), None);
        tool.press(50.0, 50.0);
        tool.drag_to(30.0, 80.0);
        assert_eq!(tool.release(5.0), Some(RadialGeometry { cx: 50.0, cy: 50.0, rx: 20.0, ry: 30.0 }));
    }
}
