// ============================================================================
// COLOR HELPERS: luminance and HSL conversion
// ============================================================================

/// Rec. 709 luma on 0..255 channel values.
#[inline]
pub fn luminance(r: f32, g: f32, b: f32) -> f32 {
    0.2126 * r + 0.7152 * g + 0.0722 * b
}

/// RGB (0..1) → HSL (H: 0..1, S: 0..1, L: 0..1)
///
/// Channels pushed outside 0..1 by earlier steps can zero the saturation
/// denominator; such pixels get `s = 0`.
pub fn rgb_to_hsl(r: f32, g: f32, b: f32) -> (f32, f32, f32) {
    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() < 1e-6 {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let denom = if l > 0.5 { 2.0 - max - min } else { max + min };
    let s = if denom.abs() < 1e-6 { 0.0 } else { d / denom };

    let h = if (max - r).abs() < 1e-6 {
        let mut h = (g - b) / d;
        if h < 0.0 { h += 6.0; }
        h / 6.0
    } else if (max - g).abs() < 1e-6 {
        ((b - r) / d + 2.0) / 6.0
    } else {
        ((r - g) / d + 4.0) / 6.0
    };

    (h, s, l)
}

/// HSL (H: 0..1, S: 0..1, L: 0..1) → RGB (0..1)
pub fn hsl_to_rgb(h: f32, s: f32, l: f32) -> (f32, f32, f32) {
    if s.abs() < 1e-6 {
        return (l, l, l);
    }

    let q = if l < 0.5 { l * (1.0 + s) } else { l + s - l * s };
    let p = 2.0 * l - q;

    (
        hue_to_rgb(p, q, h + 1.0 / 3.0),
        hue_to_rgb(p, q, h),
        hue_to_rgb(p, q, h - 1.0 / 3.0),
    )
}

fn hue_to_rgb(p: f32, q: f32, mut t: f32) -> f32 {
    if t < 0.0 { t += 1.0; }
    if t > 1.0 { t -= 1.0; }
    if t < 1.0 / 6.0 { return p + (q - p) * 6.0 * t; }
    if t < 1.0 / 2.0 { return q; }
    if t < 2.0 / 3.0 { return p + (q - p) * (2.0 / 3.0 - t) * 6.0; }
    p
}

/// Rotate hue by `hue_shift` degrees (wrapped into 0..360) and add
/// `sat_shift` percent saturation. Channels are 0..255 in and out.
pub fn shift_hue_saturation(r: f32, g: f32, b: f32, hue_shift: f32, sat_shift: f32) -> (f32, f32, f32) {
    let (h, s, l) = rgb_to_hsl(r / 255.0, g / 255.0, b / 255.0);
    let h = (h * 360.0 + hue_shift).rem_euclid(360.0) / 360.0;
    let s = s + sat_shift / 100.0;
    let (nr, ng, nb) = hsl_to_rgb(h, s, l);
    (nr * 255.0, ng * 255.0, nb * 255.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-3
    }

    #[test]
    fn pure_red_hsl() {
        let (h, s, l) = rgb_to_hsl(1.0, 0.0, 0.0);
        assert!(close(h, 0.0) && close(s, 1.0) && close(l, 0.5));
        let (r, g, b) = hsl_to_rgb(h, s, l);
        assert!(close(r, 1.0) && close(g, 0.0) && close(b, 0.0));
    }

    #[test]
    fn grey_has_no_saturation() {
        let (_, s, l) = rgb_to_hsl(0.5, 0.5, 0.5);
        assert_eq!(s, 0.0);
        assert!(close(l, 0.5));
    }

    #[test]
    fn hue_shift_wraps_negative() {
        // Red shifted by -120° lands on blue.
        let (r, g, b) = shift_hue_saturation(255.0, 0.0, 0.0, -120.0, 0.0);
        assert!(close(r, 0.0) && close(g, 0.0) && close(b, 255.0));
    }

    #[test]
    fn out_of_range_channels_stay_finite() {
        let (_, s, l) = rgb_to_hsl(-20.0 / 255.0, 20.0 / 255.0, 0.0);
        assert_eq!(s, 0.0);
        assert!(close(l, 0.0));
        let (r, g, b) = shift_hue_saturation(-20.0, 20.0, 0.0, 30.0, 10.0);
        assert!(r.is_finite() && g.is_finite() && b.is_finite());
    }

    #[test]
    fn luminance_of_white() {
        assert!(close(luminance(255.0, 255.0, 255.0), 255.0));
    }
}
