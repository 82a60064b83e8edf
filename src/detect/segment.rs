//! Foreground mask cleanup.
//!
//! Two deterministic passes over the likelihood mask: a 3x3 median filter to
//! knock out isolated-pixel noise, then a fixed-threshold binarization at the
//! midpoint of the intensity range. The output is strictly two-valued.

use crate::detect::Mask;

/// Midpoint cutoff; pixels strictly above become foreground.
const BINARY_THRESHOLD: u8 = 127;

/// Value written for foreground pixels in the binary mask.
pub(crate) const FOREGROUND: u8 = 255;

/// Stateless mask cleaner: rank filter followed by binarization.
pub struct Segmenter {
    threshold: u8,
}

impl Segmenter {
    pub fn new() -> Self {
        Self {
            threshold: BINARY_THRESHOLD,
        }
    }

    /// Produce a strictly two-valued mask from a likelihood mask.
    pub fn clean(&self, mask: &Mask) -> Mask {
        let filtered = median_filter(mask);
        let mut out = Mask::zeroed(mask.width(), mask.height());
        for (dst, &src) in out.data_mut().iter_mut().zip(filtered.data()) {
            *dst = if src > self.threshold { FOREGROUND } else { 0 };
        }
        out
    }
}

impl Default for Segmenter {
    fn default() -> Self {
        Self::new()
    }
}

/// 3x3 median filter. The window is clamped at raster edges, so border pixels
/// take the median of the available neighborhood.
fn median_filter(mask: &Mask) -> Mask {
    let width = mask.width();
    let height = mask.height();
    let mut out = Mask::zeroed(width, height);
    let mut window = [0u8; 9];

    for y in 0..height {
        for x in 0..width {
            let mut n = 0;
            for dy in -1i64..=1 {
                for dx in -1i64..=1 {
                    let nx = x as i64 + dx;
                    let ny = y as i64 + dy;
                    if nx >= 0 && nx < width as i64 && ny >= 0 && ny < height as i64 {
                        window[n] = mask.get(nx as u32, ny as u32);
                        n += 1;
                    }
                }
            }
            let samples = &mut window[..n];
            samples.sort_unstable();
            out.set(x, y, samples[n / 2]);
        }
    }
    out
}
