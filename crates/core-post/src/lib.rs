//! Pixel-domain post-processing: tone limiting, separable Gaussian blur,
//! log-space Lanczos resampling, and overlays.
//!
//! Every function here is pure band arithmetic over plain slices; the
//! pipeline driver owns the barrier choreography and hands each thread its
//! disjoint destination band. That split keeps this crate safe code and
//! directly testable while the concurrency contract lives in one place.

use core_image::PixelRgb;
use std::ops::Range;
use tracing::debug;

pub mod blur;
pub mod lanczos;
pub mod overlay;

/// Tone limit: scale flux so `pixel_limit` maps to 1.0, apply the camera
/// gamma, clamp to [0, 1]. Runs on the main thread between barriers.
pub fn tone_limit(pixels: &mut [PixelRgb], pixel_limit: f64, gamma: f64, preserve_hue: bool) {
    let inverse_limit = 1.0 / pixel_limit;
    let apply_gamma = gamma != 1.0;
    for pixel in pixels {
        pixel.r *= inverse_limit;
        pixel.g *= inverse_limit;
        pixel.b *= inverse_limit;
        if apply_gamma {
            pixel.r = pixel.r.powf(gamma);
            pixel.g = pixel.g.powf(gamma);
            pixel.b = pixel.b.powf(gamma);
        }
        if preserve_hue {
            pixel.limit_preserve_hue();
        } else {
            pixel.limit_saturate();
        }
    }
    debug!(pixel_limit, gamma, preserve_hue, "applied tone limit");
}

/// Rows `rows` of a `width`-pixel-wide image as a flat slice range.
pub fn band_offsets(width: u32, rows: &Range<u32>) -> Range<usize> {
    (rows.start as usize * width as usize)..(rows.end as usize * width as usize)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tone_limit_scales_and_clamps() {
        let mut pixels = vec![
            PixelRgb::new(0.005, 0.0025, 0.0),
            PixelRgb::new(1.0, 0.0, 0.0),
            PixelRgb::new(-0.5, f64::NAN, f64::INFINITY),
        ];
        tone_limit(&mut pixels, 0.005, 1.0, false);
        assert_eq!(pixels[0], PixelRgb::new(1.0, 0.5, 0.0));
        assert_eq!(pixels[1], PixelRgb::new(1.0, 0.0, 0.0));
        // negatives, NaN, and inf are all pinned into range
        assert_eq!(pixels[2], PixelRgb::new(0.0, 0.0, 1.0));
    }

    #[test]
    fn tone_limit_preserve_hue_keeps_ratios() {
        let mut pixels = vec![PixelRgb::new(0.02, 0.01, 0.005)];
        tone_limit(&mut pixels, 0.005, 1.0, true);
        let p = pixels[0];
        assert_eq!(p.r, 1.0);
        assert!((p.g - 0.5).abs() < 1e-12);
        assert!((p.b - 0.25).abs() < 1e-12);
    }

    #[test]
    fn camera_gamma_applies_before_the_clamp() {
        let mut pixels = vec![PixelRgb::new(0.0025, 0.0025, 0.0025)];
        tone_limit(&mut pixels, 0.01, 2.0, false);
        // (0.25)^2
        assert!((pixels[0].r - 0.0625).abs() < 1e-12);
    }
}
