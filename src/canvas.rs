// ============================================================================
// RENDER ORCHESTRATOR: rebuilds the visible frame from base + snapshot
// ============================================================================
//
// The base buffer is never modified by edits. Every render starts from a
// copy of it, runs the global pass (tone curve, detail layers) and then one
// pass per mask in stack order. The result is cached until something marks
// the canvas dirty, so a burst of parameter changes costs a single render.
// ============================================================================

use image::{GrayImage, Rgba, RgbaImage};
use rayon::prelude::*;
use tracing::debug;

use crate::components::tools::CropBox;
use crate::config::EngineConfig;
use crate::mask::{Mask, MaskId, RadialGeometry};
use crate::ops::blur::{BlurCache, DetailBand};
use crate::ops::compositor::{self, DetailLayers};
use crate::ops::tone_curve::ToneCurve;
use crate::params::{CurvePoint, EditParameters};

/// Everything one render needs, borrowed from the current history entry
/// (plus any live preview the caller substitutes).
#[derive(Clone, Copy)]
pub struct RenderRequest<'a> {
    pub global: &'a EditParameters,
    pub curve_points: &'a [CurvePoint],
    pub masks: &'a [Mask],
    /// Uncommitted edits standing in for one mask's stored edits.
    pub mask_override: Option<(MaskId, &'a EditParameters)>,
}

// ============================================================================
// CANVAS
// ============================================================================

pub struct Canvas {
    base: RgbaImage,
    /// Bumped whenever `base` is replaced; keys the blur cache.
    generation: u64,
    frame: RgbaImage,
    dirty: bool,
    blur_cache: BlurCache,
    curve: ToneCurve,
    renders: u64,
}

impl Canvas {
    pub fn new(base: RgbaImage) -> Self {
        Self {
            frame: base.clone(),
            base,
            generation: 0,
            dirty: true,
            blur_cache: BlurCache::new(),
            curve: ToneCurve::default(),
            renders: 0,
        }
    }

    /// Swap in a new base buffer (destructive transform).
    pub fn set_base(&mut self, base: RgbaImage) {
        self.frame = base.clone();
        self.base = base;
        self.generation = self.generation.wrapping_add(1);
        self.blur_cache.clear();
        self.dirty = true;
    }

    pub fn base(&self) -> &RgbaImage {
        &self.base
    }

    pub fn width(&self) -> u32 {
        self.base.width()
    }

    pub fn height(&self) -> u32 {
        self.base.height()
    }

    pub fn dimensions(&self) -> (u32, u32) {
        self.base.dimensions()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Number of full renders performed.
    pub fn render_count(&self) -> u64 {
        self.renders
    }

    pub fn blur_cache(&self) -> &BlurCache {
        &self.blur_cache
    }

    /// The last rendered frame, possibly stale.
    pub fn frame(&self) -> &RgbaImage {
        &self.frame
    }

    /// Render if dirty, then return the frame.
    pub fn render(&mut self, req: &RenderRequest<'_>, config: &EngineConfig) -> &RgbaImage {
        if self.dirty {
            self.frame = self.compose(req, config);
            self.dirty = false;
            self.renders += 1;
        }
        &self.frame
    }

    fn compose(&mut self, req: &RenderRequest<'_>, config: &EngineConfig) -> RgbaImage {
        let start = std::time::Instant::now();
        let (w, h) = self.base.dimensions();
        let mut frame = self.base.clone();

        if self.curve.points() != req.curve_points {
            self.curve.set_points(req.curve_points.to_vec());
        }

        // Global pass: curve + detail layers.
        let global = req.global.sanitized();
        if global.clarity != 0.0 {
            self.blur_cache.ensure(
                DetailBand::Clarity,
                &self.base,
                self.generation,
                config.clarity_radius,
                global.clarity,
            );
        }
        if global.texture != 0.0 {
            self.blur_cache.ensure(
                DetailBand::Texture,
                &self.base,
                self.generation,
                config.texture_radius,
                global.texture,
            );
        }
        let detail = DetailLayers {
            clarity: self.blur_cache.get(DetailBand::Clarity).filter(|_| global.clarity != 0.0),
            texture: self.blur_cache.get(DetailBand::Texture).filter(|_| global.texture != 0.0),
            scale: config.detail_scale,
        };
        compositor::apply(&mut frame, &global, None, Some(self.curve.lut()), Some(&detail));

        // Mask passes, bottom to top.
        for mask in req.masks {
            let edits = match req.mask_override {
                Some((id, edits)) if id == mask.id => edits,
                _ => &mask.edits,
            };
            if edits.is_identity() {
                continue;
            }
            let coverage = mask.coverage(w, h);
            compositor::apply(&mut frame, edits, Some(&coverage), None, None);
        }

        debug!(
            width = w,
            height = h,
            masks = req.masks.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "frame rendered"
        );
        frame
    }
}

// ============================================================================
// OVERLAYS
// ============================================================================

const OVERLAY_RED: [f32; 3] = [255.0, 0.0, 0.0];
const OUTLINE_WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);

/// What to draw on top of a rendered frame.
#[derive(Clone, Debug, Default)]
pub struct Overlays<'a> {
    /// Active-mask coverage, tinted red.
    pub mask_coverage: Option<&'a GrayImage>,
    pub mask_opacity: f32,
    pub crop_box: Option<CropBox>,
    pub radial_outline: Option<RadialGeometry>,
}

impl Overlays<'_> {
    pub fn is_empty(&self) -> bool {
        self.mask_coverage.is_none() && self.crop_box.is_none() && self.radial_outline.is_none()
    }
}

/// Copy `frame` and draw the requested overlays onto it.
pub fn draw_overlays(frame: &RgbaImage, overlays: &Overlays<'_>) -> RgbaImage {
    let mut out = frame.clone();
    if let Some(coverage) = overlays.mask_coverage {
        tint_mask(&mut out, coverage, overlays.mask_opacity);
    }
    if let Some(crop_box) = overlays.crop_box {
        shade_outside_crop(&mut out, &crop_box);
    }
    if let Some(g) = overlays.radial_outline {
        outline_ellipse(&mut out, &g);
    }
    out
}

/// Alpha-blend red over the frame at `coverage/255 * opacity`.
pub fn tint_mask(img: &mut RgbaImage, coverage: &GrayImage, opacity: f32) {
    let w = img.width() as usize;
    if w == 0 || coverage.dimensions() != img.dimensions() {
        return;
    }
    let opacity = if opacity.is_finite() { opacity.clamp(0.0, 1.0) } else { 0.0 };
    let cov = coverage.as_raw();
    let raw: &mut [u8] = img;
    raw.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
        for x in 0..w {
            let c = cov[y * w + x];
            if c == 0 {
                continue;
            }
            let a = c as f32 / 255.0 * opacity;
            let px = &mut row[x * 4..x * 4 + 3];
            for (ch, red) in px.iter_mut().zip(OVERLAY_RED) {
                *ch = (*ch as f32 * (1.0 - a) + red * a).round().clamp(0.0, 255.0) as u8;
            }
        }
    });
}

/// Darken everything outside the crop box by half, then draw a 1-px white
/// border along its edge.
pub fn shade_outside_crop(img: &mut RgbaImage, crop_box: &CropBox) {
    let (iw, ih) = img.dimensions();
    if iw == 0 || ih == 0 {
        return;
    }
    let (x0, y0, cw, ch) = crop_box.to_pixel_rect(iw, ih);
    let (x1, y1) = (x0 + cw, y0 + ch);
    let w = iw as usize;
    let raw: &mut [u8] = img;
    raw.par_chunks_mut(w * 4).enumerate().for_each(|(y, row)| {
        let y = y as u32;
        for x in 0..iw {
            let inside = x >= x0 && x < x1 && y >= y0 && y < y1;
            let px = &mut row[x as usize * 4..x as usize * 4 + 4];
            if !inside {
                for ch in &mut px[..3] {
                    *ch /= 2;
                }
            } else if x == x0 || x == x1 - 1 || y == y0 || y == y1 - 1 {
                px.copy_from_slice(&OUTLINE_WHITE.0);
            }
        }
    });
}

/// One-pixel-ish outline of an ellipse (radial mask being drawn).
pub fn outline_ellipse(img: &mut RgbaImage, g: &RadialGeometry) {
    if !g.is_valid() || img.width() == 0 || img.height() == 0 {
        return;
    }
    let max_x = img.width() as f32 - 1.0;
    let max_y = img.height() as f32 - 1.0;
    let x_lo = (g.cx - g.rx - 1.0).floor().clamp(0.0, max_x) as u32;
    let x_hi = (g.cx + g.rx + 1.0).ceil().clamp(0.0, max_x) as u32;
    let y_lo = (g.cy - g.ry - 1.0).floor().clamp(0.0, max_y) as u32;
    let y_hi = (g.cy + g.ry + 1.0).ceil().clamp(0.0, max_y) as u32;
    // Band half-width in normalised units, about one pixel on the short axis.
    let band = 1.0 / g.rx.min(g.ry);
    for y in y_lo..=y_hi {
        for x in x_lo..=x_hi {
            let dx = (x as f32 - g.cx) / g.rx;
            let dy = (y as f32 - g.cy) / g.ry;
            let d = (dx * dx + dy * dy).sqrt();
            if (d - 1.0).abs() <= band * 0.5 {
                img.put_pixel(x, y, OUTLINE_WHITE);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mask::MaskKind;
    use crate::params::default_curve_points;
    use image::Luma;

    fn gray(w: u32, h: u32, v: u8) -> RgbaImage {
        RgbaImage::from_pixel(w, h, Rgba([v, v, v, 255]))
    }

    fn request<'a>(global: &'a EditParameters, curve: &'a [CurvePoint], masks: &'a [Mask]) -> RenderRequest<'a> {
        RenderRequest { global, curve_points: curve, masks, mask_override: None }
    }

    #[test]
    fn identity_render_matches_base() {
        let base = RgbaImage::from_fn(8, 8, |x, y| Rgba([x as u8 * 30, y as u8 * 30, 77, 255]));
        let mut canvas = Canvas::new(base.clone());
        let curve = default_curve_points();
        let frame = canvas.render(&request(&EditParameters::default(), &curve, &[]), &EngineConfig::default());
        assert_eq!(frame, &base);
    }

    #[test]
    fn clean_canvas_does_not_rerender() {
        let mut canvas = Canvas::new(gray(4, 4, 100));
        let curve = default_curve_points();
        let edits = EditParameters { exposure: 10.0, ..Default::default() };
        let cfg = EngineConfig::default();
        canvas.render(&request(&edits, &curve, &[]), &cfg);
        canvas.render(&request(&edits, &curve, &[]), &cfg);
        assert_eq!(canvas.render_count(), 1);
        canvas.mark_dirty();
        canvas.render(&request(&edits, &curve, &[]), &cfg);
        assert_eq!(canvas.render_count(), 2);
    }

    #[test]
    fn mask_pass_only_touches_covered_pixels() {
        let mut canvas = Canvas::new(gray(100, 100, 100));
        let mut mask = Mask::radial(RadialGeometry { cx: 50.0, cy: 50.0, rx: 10.0, ry: 10.0 });
        mask.edits.exposure = 50.0;
        let masks = [mask];
        let curve = default_curve_points();
        let frame = canvas.render(&request(&EditParameters::default(), &curve, &masks), &EngineConfig::default());
        assert_eq!(frame.get_pixel(50, 50).0, [200, 200, 200, 255]);
        assert_eq!(frame.get_pixel(60, 50).0, [100, 100, 100, 255]);
        assert_eq!(frame.get_pixel(0, 0).0, [100, 100, 100, 255]);
    }

    #[test]
    fn mask_override_replaces_stored_edits() {
        let mut canvas = Canvas::new(gray(4, 4, 100));
        let mask = Mask::new("Subject 1", MaskKind::Ai { coverage: GrayImage::from_pixel(4, 4, Luma([255])) });
        let preview = EditParameters { exposure: 50.0, ..Default::default() };
        let masks = [mask];
        let curve = default_curve_points();
        let req = RenderRequest {
            global: &EditParameters::default(),
            curve_points: &curve,
            masks: &masks,
            mask_override: Some((masks[0].id, &preview)),
        };
        let frame = canvas.render(&req, &EngineConfig::default());
        assert_eq!(frame.get_pixel(1, 1).0, [200, 200, 200, 255]);
    }

    #[test]
    fn blur_is_reused_until_base_changes() {
        let base = RgbaImage::from_fn(16, 16, |x, y| Rgba([(x * 15) as u8, (y * 15) as u8, 40, 255]));
        let mut canvas = Canvas::new(base.clone());
        let curve = default_curve_points();
        let cfg = EngineConfig::default();
        let clarity = EditParameters { clarity: 40.0, ..Default::default() };
        let clarity_and_exposure = EditParameters { exposure: 5.0, ..clarity };
        canvas.render(&request(&clarity, &curve, &[]), &cfg);
        canvas.mark_dirty();
        canvas.render(&request(&clarity_and_exposure, &curve, &[]), &cfg);
        assert_eq!(canvas.blur_cache().recompute_count(), 1);
        canvas.set_base(base);
        canvas.render(&request(&clarity, &curve, &[]), &cfg);
        assert_eq!(canvas.blur_cache().recompute_count(), 2);
        assert_eq!(canvas.generation(), 1);
    }

    #[test]
    fn texture_uses_configured_radius() {
        let base = RgbaImage::from_fn(16, 16, |x, y| Rgba([((x * 37 + y * 11) % 256) as u8, (y * 15) as u8, 90, 255]));
        let mut canvas = Canvas::new(base.clone());
        let curve = default_curve_points();
        let cfg = EngineConfig { texture_radius: 3, ..EngineConfig::default() };
        let texture = EditParameters { texture: 60.0, ..Default::default() };
        let frame = canvas.render(&request(&texture, &curve, &[]), &cfg).clone();

        let blurred = crate::ops::blur::box_blur(&base, 3);
        let detail = DetailLayers { clarity: None, texture: Some(&blurred), scale: cfg.detail_scale };
        let mut expected = base.clone();
        compositor::apply(&mut expected, &texture, None, None, Some(&detail));
        assert_eq!(frame, expected);
        assert_ne!(frame, base);
        assert!(canvas.blur_cache().get(DetailBand::Texture).is_some());
        assert!(canvas.blur_cache().get(DetailBand::Clarity).is_none());
    }

    #[test]
    fn mask_detail_sliders_do_nothing() {
        let base = RgbaImage::from_fn(16, 16, |x, y| Rgba([(x * 15) as u8, (y * 15) as u8, 40, 255]));
        let mut canvas = Canvas::new(base.clone());
        let mut mask = Mask::new("Subject 1", MaskKind::Ai { coverage: GrayImage::from_pixel(16, 16, Luma([255])) });
        mask.edits.clarity = 80.0;
        mask.edits.texture = -60.0;
        let masks = [mask];
        let curve = default_curve_points();
        let frame = canvas.render(&request(&EditParameters::default(), &curve, &masks), &EngineConfig::default());
        assert_eq!(frame, &base);
        assert_eq!(canvas.blur_cache().recompute_count(), 0);
    }

    #[test]
    fn overlapping_masks_composite_in_stack_order() {
        let full = || MaskKind::Ai { coverage: GrayImage::from_pixel(4, 4, Luma([255])) };
        let mut brighten = Mask::new("Subject 1", full());
        brighten.edits.exposure = 40.0;
        let mut contrast = Mask::new("Subject 2", full());
        contrast.edits.contrast = 80.0;
        let curve = default_curve_points();
        let cfg = EngineConfig::default();

        let forward = [brighten.clone(), contrast.clone()];
        let a = Canvas::new(gray(4, 4, 120)).render(&request(&EditParameters::default(), &curve, &forward), &cfg).clone();
        let reversed = [contrast, brighten];
        let b = Canvas::new(gray(4, 4, 120)).render(&request(&EditParameters::default(), &curve, &reversed), &cfg).clone();
        // 120 → 209 → 255 against 120 → 113 → 197
        assert_eq!(a.get_pixel(0, 0).0, [255, 255, 255, 255]);
        assert_eq!(b.get_pixel(0, 0).0, [197, 197, 197, 255]);
    }

    #[test]
    fn mask_overlay_is_half_red() {
        let mut img = gray(2, 1, 100);
        let cov = GrayImage::from_raw(2, 1, vec![255, 0]).unwrap();
        tint_mask(&mut img, &cov, 0.5);
        assert_eq!(img.get_pixel(0, 0).0, [178, 50, 50, 255]);
        assert_eq!(img.get_pixel(1, 0).0, [100, 100, 100, 255]);
    }

    #[test]
    fn crop_overlay_darkens_outside_and_borders_inside() {
        let mut img = gray(10, 10, 200);
        shade_outside_crop(&mut img, &CropBox { x: 2.0, y: 2.0, w: 5.0, h: 5.0 });
        assert_eq!(img.get_pixel(0, 0).0, [100, 100, 100, 255]);
        assert_eq!(img.get_pixel(2, 4).0, [255, 255, 255, 255]);
        assert_eq!(img.get_pixel(6, 6).0, [255, 255, 255, 255]);
        assert_eq!(img.get_pixel(4, 4).0, [200, 200, 200, 255]);
        assert_eq!(img.get_pixel(7, 4).0, [100, 100, 100, 255]);
    }

    #[test]
    fn ellipse_outline_hits_the_rim_only() {
        let mut img = gray(40, 40, 0);
        outline_ellipse(&mut img, &RadialGeometry { cx: 20.0, cy: 20.0, rx: 10.0, ry: 10.0 });
        assert_eq!(img.get_pixel(30, 20).0, [255, 255, 255, 255]);
        assert_eq!(img.get_pixel(20, 10).0, [255, 255, 255, 255]);
        assert_eq!(img.get_pixel(20, 20).0, [0, 0, 0, 255]);
        assert_eq!(img.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }
}
