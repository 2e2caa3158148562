// ============================================================================
// BLUR CACHE: memoized box blurs backing clarity and texture
// ============================================================================
//
// The blur is a square box average where out-of-bounds neighbours are left
// out (edge pixels average fewer samples). Because the valid window is always
// a rectangle, the average factors into a horizontal and a vertical pass with
// integer sums, which gives exactly the naive result.
//
// Cache slots are keyed structurally by what can invalidate them: the radius,
// the amount that asked for the blur, and the generation of the source buffer.
// ============================================================================

use image::RgbaImage;
use rayon::prelude::*;
use tracing::debug;

/// Box blur with edge exclusion. Output alpha is always 255.
pub fn box_blur(src: &RgbaImage, radius: u32) -> RgbaImage {
    let w = src.width() as usize;
    let h = src.height() as usize;
    if w == 0 || h == 0 {
        return src.clone();
    }
    let r = radius as usize;
    let src_raw = src.as_raw();

    // Horizontal pass: per-pixel RGB sums over the valid x-range.
    let mut h_sums = vec![[0u32; 3]; w * h];
    h_sums
        .par_chunks_mut(w)
        .enumerate()
        .for_each(|(y, row_out)| {
            let row_in = &src_raw[y * w * 4..(y + 1) * w * 4];
            for (x, out) in row_out.iter_mut().enumerate() {
                let x0 = x.saturating_sub(r);
                let x1 = (x + r).min(w - 1);
                let mut sums = [0u32; 3];
                for sx in x0..=x1 {
                    let si = sx * 4;
                    sums[0] += row_in[si] as u32;
                    sums[1] += row_in[si + 1] as u32;
                    sums[2] += row_in[si + 2] as u32;
                }
                *out = sums;
            }
        });

    // Vertical pass over the horizontal sums, divide by the window area.
    let mut dst_raw = vec![0u8; w * h * 4];
    dst_raw
        .par_chunks_mut(w * 4)
        .enumerate()
        .for_each(|(y, row_out)| {
            let y0 = y.saturating_sub(r);
            let y1 = (y + r).min(h - 1);
            let rows = (y1 - y0 + 1) as u32;
            for x in 0..w {
                let cols = ((x + r).min(w - 1) - x.saturating_sub(r) + 1) as u32;
                let count = (rows * cols) as f32;
                let mut sums = [0u32; 3];
                for sy in y0..=y1 {
                    let s = h_sums[sy * w + x];
                    sums[0] += s[0];
                    sums[1] += s[1];
                    sums[2] += s[2];
                }
                let pi = x * 4;
                for c in 0..3 {
                    row_out[pi + c] = (sums[c] as f32 / count).round().clamp(0.0, 255.0) as u8;
                }
                row_out[pi + 3] = 255;
            }
        });

    // Dimensions come from `src`, so the buffer length always matches.
    RgbaImage::from_raw(w as u32, h as u32, dst_raw).unwrap_or_else(|| src.clone())
}

/// Which local-contrast band a cached blur serves.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetailBand {
    Clarity,
    Texture,
}

impl DetailBand {
    fn slot(self) -> usize {
        match self {
            DetailBand::Clarity => 0,
            DetailBand::Texture => 1,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
struct BlurKey {
    radius: u32,
    amount: f32,
    generation: u64,
}

#[derive(Default)]
struct BlurSlot {
    key: Option<BlurKey>,
    image: Option<RgbaImage>,
}

/// Two-slot blur memo (clarity + texture).
#[derive(Default)]
pub struct BlurCache {
    slots: [BlurSlot; 2],
    recomputes: u64,
}

impl BlurCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the blurred copy of `source` for `band`, recomputing only when
    /// the radius, the amount, or the source generation changed.
    pub fn ensure(
        &mut self,
        band: DetailBand,
        source: &RgbaImage,
        generation: u64,
        radius: u32,
        amount: f32,
    ) -> &RgbaImage {
        let key = BlurKey { radius, amount, generation };
        let slot = &mut self.slots[band.slot()];
        let stale = slot.key != Some(key)
            || slot
                .image
                .as_ref()
                .is_none_or(|img| img.dimensions() != source.dimensions());
        if stale {
            debug!(?band, radius, amount, generation, "recomputing detail blur");
            slot.image = Some(box_blur(source, radius));
            slot.key = Some(key);
            self.recomputes += 1;
        }
        slot.image.get_or_insert_with(|| box_blur(source, radius))
    }

    /// Last blur computed for `band`, whatever it was keyed on.
    pub fn get(&self, band: DetailBand) -> Option<&RgbaImage> {
        self.slots[band.slot()].image.as_ref()
    }

    /// Number of blur passes run so far.
    pub fn recompute_count(&self) -> u64 {
        self.recomputes
    }

    pub fn clear(&mut self) {
        self.slots = Default::default();
    }
}
