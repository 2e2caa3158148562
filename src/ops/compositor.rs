// ============================================================================
// PIXEL COMPOSITOR: one parameter set applied to a buffer, in place
// ============================================================================
//
// Per-pixel pipeline order (changing it changes the picture):
//   curve → exposure → contrast → highlights → shadows → dehaze →
//   clarity/texture → zone colour grading → temperature → saturation →
//   blend toward the original by coverage → clamp.
//
// Pixels with zero coverage are skipped outright, so a mask can never leak
// outside its footprint. Alpha is never touched. Rows run in parallel; every
// pixel only reads its own inputs, so the result is deterministic.
// ============================================================================

use image::{GrayImage, RgbaImage};
use rayon::prelude::*;

use crate::ops::color::{luminance, shift_hue_saturation};
use crate::ops::tone_curve::CurveLut;
use crate::params::EditParameters;

/// Luminance thresholds separating shadows / midtones / highlights.
const SHADOW_ZONE_END: f32 = 85.0;
const HIGHLIGHT_ZONE_START: f32 = 170.0;
const ZONE_WIDTH: f32 = 85.0;

/// Blurred copies of the pre-edit buffer used for unsharp-mask detail.
/// Only the global pass supplies these.
#[derive(Clone, Copy)]
pub struct DetailLayers<'a> {
    pub clarity: Option<&'a RgbaImage>,
    pub texture: Option<&'a RgbaImage>,
    pub scale: f32,
}

/// Derived per-call constants.
struct Factors {
    exposure: f32,
    contrast: f32,
    highlights: f32,
    shadows: f32,
    dehaze: f32,
    saturation: f32,
}

impl Factors {
    fn new(p: &EditParameters) -> Self {
        Self {
            exposure: 2.0f32.powf(p.exposure / 50.0),
            contrast: (259.0 * (p.contrast + 255.0)) / (255.0 * (259.0 - p.contrast)),
            highlights: p.highlights / 100.0,
            shadows: p.shadows / 100.0,
            dehaze: p.dehaze / 100.0,
            saturation: 1.0 + p.saturation / 100.0,
        }
    }
}

/// Interpolated (hue shift, saturation shift) for a pixel luminance.
fn zone_grade(p: &EditParameters, lum: f32) -> (f32, f32) {
    if lum < SHADOW_ZONE_END {
        let t = lum / ZONE_WIDTH;
        (
            t * p.midtones_hue + (1.0 - t) * p.shadows_hue,
            t * p.midtones_saturation + (1.0 - t) * p.shadows_saturation,
        )
    } else if lum > HIGHLIGHT_ZONE_START {
        let t = (lum - HIGHLIGHT_ZONE_START) / ZONE_WIDTH;
        (
            (1.0 - t) * p.midtones_hue + t * p.highlights_hue,
            (1.0 - t) * p.midtones_saturation + t * p.highlights_saturation,
        )
    } else {
        (p.midtones_hue, p.midtones_saturation)
    }
}

#[inline]
fn to_channel(v: f32, fallback: u8) -> u8 {
    if v.is_finite() { v.round().clamp(0.0, 255.0) as u8 } else { fallback }
}

/// Run the full pipeline for one pixel. `px` is RGBA; alpha is left alone.
#[allow(clippy::too_many_arguments)]
fn composite_pixel(
    px: &mut [u8],
    p: &EditParameters,
    f: &Factors,
    amount: f32,
    lut: Option<&CurveLut>,
    clarity_px: Option<&[u8]>,
    texture_px: Option<&[u8]>,
    detail_scale: f32,
) {
    let (or, og, ob) = (px[0], px[1], px[2]);

    // 1. curve
    let (mut r, mut g, mut b) = match lut {
        Some(l) => (l[or as usize] as f32, l[og as usize] as f32, l[ob as usize] as f32),
        None => (or as f32, og as f32, ob as f32),
    };

    // 2. exposure
    r *= f.exposure;
    g *= f.exposure;
    b *= f.exposure;

    // 3. contrast
    r = f.contrast * (r - 128.0) + 128.0;
    g = f.contrast * (g - 128.0) + 128.0;
    b = f.contrast * (b - 128.0) + 128.0;

    // 4.–6. highlights / shadows
    let lum = luminance(r, g, b);
    if f.highlights != 0.0 {
        let hf = (lum / 255.0).powi(2) * f.highlights;
        r += hf * (255.0 - r);
        g += hf * (255.0 - g);
        b += hf * (255.0 - b);
    }
    if f.shadows != 0.0 {
        let sf = (1.0 - lum / 255.0).powi(2) * f.shadows;
        r += sf * r;
        g += sf * g;
        b += sf * b;
    }

    // 7. dehaze
    if f.dehaze != 0.0 {
        let min_c = r.min(g).min(b);
        let lift = f.dehaze * (1.0 - min_c / 255.0) * 20.0;
        r += lift;
        g += lift;
        b += lift;
    }

    // 8. clarity / texture
    if p.clarity != 0.0
        && let Some(bl) = clarity_px
    {
        let k = p.clarity * detail_scale;
        r += (r - bl[0] as f32) * k;
        g += (g - bl[1] as f32) * k;
        b += (b - bl[2] as f32) * k;
    }
    if p.texture != 0.0
        && let Some(bl) = texture_px
    {
        let k = p.texture * detail_scale;
        r += (r - bl[0] as f32) * k;
        g += (g - bl[1] as f32) * k;
        b += (b - bl[2] as f32) * k;
    }

    // 9.–10. zone colour grading; negative saturation shifts are ignored
    let (hue_shift, sat_shift) = zone_grade(p, luminance(r, g, b));
    if sat_shift > 0.0 {
        (r, g, b) = shift_hue_saturation(r, g, b, hue_shift, sat_shift);
    }

    // 11. temperature
    r += p.temperature;
    g += p.temperature * 0.5;
    b -= p.temperature;

    // 12. saturation
    let avg = (r + g + b) / 3.0;
    r = avg + f.saturation * (r - avg);
    g = avg + f.saturation * (g - avg);
    b = avg + f.saturation * (b - avg);

    // 13.–14. coverage blend and clamp
    let (fr, fg, fb) = (or as f32, og as f32, ob as f32);
    px[0] = to_channel(fr + (r - fr) * amount, or);
    px[1] = to_channel(fg + (g - fg) * amount, og);
    px[2] = to_channel(fb + (b - fb) * amount, ob);
}

/// Apply `params` to `buffer` in place.
///
/// * `coverage`: per-pixel mask strength (0..255), `None` for the whole image.
///   Pixels at 0 are skipped; a coverage image with different dimensions
///   than `buffer` only affects the overlapping pixels.
/// * `curve_lut`: tone curve, global pass only.
/// * `detail`: blurred buffers for clarity/texture, global pass only.
pub fn apply(
    buffer: &mut RgbaImage,
    params: &EditParameters,
    coverage: Option<&GrayImage>,
    curve_lut: Option<&CurveLut>,
    detail: Option<&DetailLayers<'_>>,
) {
    let w = buffer.width() as usize;
    let h = buffer.height() as usize;
    if w == 0 || h == 0 {
        return;
    }
    let p = params.sanitized();
    let factors = Factors::new(&p);
    let stride = w * 4;

    let mask = coverage.map(|m| (m.as_raw().as_slice(), m.width() as usize, m.height() as usize));
    let same_dims = |img: &&RgbaImage| img.width() as usize == w && img.height() as usize == h;
    let clarity_raw = detail.and_then(|d| d.clarity).filter(same_dims).map(|i| i.as_raw().as_slice());
    let texture_raw = detail.and_then(|d| d.texture).filter(same_dims).map(|i| i.as_raw().as_slice());
    let detail_scale = detail.map_or(0.0, |d| d.scale);

    let raw: &mut [u8] = buffer;
    raw.par_chunks_mut(stride).enumerate().for_each(|(y, row)| {
        for x in 0..w {
            let amount = match mask {
                Some((mr, mw, mh)) => {
                    if x >= mw || y >= mh {
                        continue;
                    }
                    let c = mr[y * mw + x];
                    if c == 0 {
                        continue;
                    }
                    c as f32 / 255.0
                }
                None => 1.0,
            };
            let pi = x * 4;
            let gi = y * stride + pi;
            composite_pixel(
                &mut row[pi..pi + 4],
                &p,
                &factors,
                amount,
                curve_lut,
                clarity_raw.map(|c| &c[gi..gi + 4]),
                texture_raw.map(|t| &t[gi..gi + 4]),
                detail_scale,
            );
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ops::tone_curve::{ToneCurve, build_lut};
    use crate::params::CurvePoint;
    use image::{Luma, Rgba};

    fn sample_image() -> RgbaImage {
        RgbaImage::from_fn(16, 16, |x, y| {
            Rgba([(x * 16) as u8, (y * 16) as u8, ((x * y) % 256) as u8, (200 + x) as u8])
        })
    }

    #[test]
    fn identity_parameters_leave_pixels_unchanged() {
        let src = sample_image();
        let mut buf = src.clone();
        let curve = ToneCurve::default();
        apply(&mut buf, &EditParameters::default(), None, Some(curve.lut()), None);
        assert_eq!(buf, src);
    }

    #[test]
    fn exposure_doubles_and_clamps() {
        let mut buf = RgbaImage::from_raw(2, 1, vec![100, 100, 100, 255, 200, 200, 200, 255]).unwrap();
        let params = EditParameters { exposure: 50.0, ..Default::default() };
        apply(&mut buf, &params, None, None, None);
        assert_eq!(buf.get_pixel(0, 0).0, [200, 200, 200, 255]);
        assert_eq!(buf.get_pixel(1, 0).0, [255, 255, 255, 255]);
    }

    #[test]
    fn zero_coverage_never_changes_pixel() {
        let src = sample_image();
        let mut buf = src.clone();
        let coverage = GrayImage::from_fn(16, 16, |x, _| Luma([if x < 8 { 0 } else { 255 }]));
        let params = EditParameters {
            exposure: 80.0,
            contrast: 120.0,
            temperature: 60.0,
            midtones_saturation: 40.0,
            midtones_hue: 90.0,
            dehaze: 50.0,
            ..Default::default()
        };
        apply(&mut buf, &params, Some(&coverage), None, None);
        for y in 0..16 {
            for x in 0..8 {
                assert_eq!(buf.get_pixel(x, y), src.get_pixel(x, y));
            }
        }
        assert_ne!(buf, src);
    }

    #[test]
    fn partial_coverage_blends_halfway() {
        let mut buf = RgbaImage::from_pixel(1, 1, Rgba([100, 100, 100, 255]));
        let coverage = GrayImage::from_pixel(1, 1, Luma([255 / 2 + 1]));
        let params = EditParameters { exposure: 50.0, ..Default::default() };
        apply(&mut buf, &params, Some(&coverage), None, None);
        // 100 + (200 - 100) * 128/255 = 150.2
        assert_eq!(buf.get_pixel(0, 0).0, [150, 150, 150, 255]);
    }

    #[test]
    fn alpha_is_untouched() {
        let src = sample_image();
        let mut buf = src.clone();
        let params = EditParameters { exposure: -70.0, saturation: 50.0, ..Default::default() };
        apply(&mut buf, &params, None, None, None);
        for (a, b) in buf.pixels().zip(src.pixels()) {
            assert_eq!(a[3], b[3]);
        }
    }

    #[test]
    fn temperature_warms() {
        let mut buf = RgbaImage::from_pixel(1, 1, Rgba([100, 100, 100, 255]));
        let params = EditParameters { temperature: 20.0, ..Default::default() };
        apply(&mut buf, &params, None, None, None);
        assert_eq!(buf.get_pixel(0, 0).0, [120, 110, 80, 255]);
    }

    #[test]
    fn full_desaturation_goes_grey() {
        let mut buf = RgbaImage::from_pixel(1, 1, Rgba([200, 100, 0, 255]));
        let params = EditParameters { saturation: -100.0, ..Default::default() };
        apply(&mut buf, &params, None, None, None);
        assert_eq!(buf.get_pixel(0, 0).0, [100, 100, 100, 255]);
    }

    #[test]
    fn negative_grading_saturation_is_ignored() {
        let src = RgbaImage::from_pixel(1, 1, Rgba([180, 90, 40, 255]));
        let mut buf = src.clone();
        let params = EditParameters { midtones_hue: 120.0, midtones_saturation: -50.0, ..Default::default() };
        apply(&mut buf, &params, None, None, None);
        assert_eq!(buf, src);
    }

    #[test]
    fn positive_grading_saturation_shifts_hue() {
        let mut buf = RgbaImage::from_pixel(1, 1, Rgba([200, 60, 60, 255]));
        let params = EditParameters { midtones_hue: 120.0, midtones_saturation: 10.0, ..Default::default() };
        apply(&mut buf, &params, None, None, None);
        let px = buf.get_pixel(0, 0);
        // Red rotated by 120° becomes predominantly green.
        assert!(px[1] > px[0] && px[1] > px[2]);
    }

    #[test]
    fn curve_lut_runs_first() {
        let mut buf = RgbaImage::from_pixel(1, 1, Rgba([128, 128, 128, 255]));
        let lut = build_lut(&[CurvePoint::new(0.0, 255.0), CurvePoint::new(128.0, 64.0), CurvePoint::new(255.0, 0.0)]);
        apply(&mut buf, &EditParameters::default(), None, Some(&lut), None);
        assert_eq!(buf.get_pixel(0, 0).0, [191, 191, 191, 255]);
    }

    #[test]
    fn clarity_pushes_away_from_blur() {
        let mut buf = RgbaImage::from_pixel(1, 1, Rgba([150, 150, 150, 255]));
        let blurred = RgbaImage::from_pixel(1, 1, Rgba([100, 100, 100, 255]));
        let detail = DetailLayers { clarity: Some(&blurred), texture: None, scale: 1.0 / 250.0 };
        let params = EditParameters { clarity: 50.0, ..Default::default() };
        apply(&mut buf, &params, None, None, Some(&detail));
        // 150 + 50 * 50/250 = 160
        assert_eq!(buf.get_pixel(0, 0).0, [160, 160, 160, 255]);
    }

    #[test]
    fn clarity_without_blur_is_noop() {
        let src = sample_image();
        let mut buf = src.clone();
        let params = EditParameters { clarity: 80.0, texture: 80.0, ..Default::default() };
        apply(&mut buf, &params, None, None, None);
        assert_eq!(buf, src);
    }

    #[test]
    fn highlights_lift_bright_pixels() {
        let mut buf = RgbaImage::from_pixel(1, 1, Rgba([200, 200, 200, 255]));
        let params = EditParameters { highlights: 50.0, ..Default::default() };
        apply(&mut buf, &params, None, None, None);
        // 200 + (200/255)² * 0.5 * 55 = 216.9
        assert_eq!(buf.get_pixel(0, 0).0, [217, 217, 217, 255]);
    }

    #[test]
    fn shadows_scale_dark_pixels() {
        let mut buf = RgbaImage::from_pixel(1, 1, Rgba([50, 50, 50, 255]));
        let params = EditParameters { shadows: 50.0, ..Default::default() };
        apply(&mut buf, &params, None, None, None);
        // 50 + (1 - 50/255)² * 0.5 * 50 = 66.2
        assert_eq!(buf.get_pixel(0, 0).0, [66, 66, 66, 255]);
    }

    #[test]
    fn dehaze_lifts_by_darkest_channel() {
        let mut buf = RgbaImage::from_pixel(1, 1, Rgba([100, 150, 200, 255]));
        let params = EditParameters { dehaze: 50.0, ..Default::default() };
        apply(&mut buf, &params, None, None, None);
        // 0.5 * (1 - 100/255) * 20 = 6.08 added to every channel
        assert_eq!(buf.get_pixel(0, 0).0, [106, 156, 206, 255]);
    }

    #[test]
    fn grading_after_negative_dehaze_keeps_the_edit() {
        // Dehaze moves (0,40,20) to (-20,20,0), whose HSL lightness is 0.
        let src = RgbaImage::from_raw(2, 1, vec![0, 40, 20, 255, 0, 40, 21, 255]).unwrap();
        let mut buf = src.clone();
        let params = EditParameters { dehaze: -100.0, shadows_saturation: 10.0, ..Default::default() };
        apply(&mut buf, &params, None, None, None);
        assert_ne!(buf, src);
        assert_eq!(buf.get_pixel(0, 0).0, [0, 0, 0, 255]);
    }

    #[test]
    fn overlapping_passes_depend_on_order() {
        let src = RgbaImage::from_pixel(2, 2, Rgba([120, 80, 60, 255]));
        let full = GrayImage::from_pixel(2, 2, Luma([255]));
        let brighten = EditParameters { exposure: 40.0, ..Default::default() };
        let contrast = EditParameters { contrast: 80.0, ..Default::default() };

        let mut a = src.clone();
        apply(&mut a, &brighten, Some(&full), None, None);
        apply(&mut a, &contrast, Some(&full), None, None);
        let mut b = src.clone();
        apply(&mut b, &contrast, Some(&full), None, None);
        apply(&mut b, &brighten, Some(&full), None, None);
        assert_ne!(a, b);
    }

    #[test]
    fn extreme_parameters_stay_finite() {
        let mut buf = sample_image();
        let params = EditParameters {
            exposure: f32::INFINITY,
            contrast: 259.0,
            highlights: f32::NAN,
            shadows: 100.0,
            ..Default::default()
        };
        apply(&mut buf, &params, None, None, None);
        // Every channel was written from a finite value.
        assert_eq!(buf.dimensions(), (16, 16));
    }
}
