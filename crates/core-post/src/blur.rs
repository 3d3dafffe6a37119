//! Separable Gaussian blur.
//!
//! Two passes over the composition buffer with a barrier between them:
//! horizontal (composition -> blur buffer) then vertical (blur buffer ->
//! composition). Kernel half-width is `3 * ceil(radius)`, wide enough that
//! the truncated tails are far below double round-off for any radius.

use core_image::PixelRgb;
use std::ops::Range;

/// Centered 1-D Gaussian kernel of `6 * ceil(radius) + 1` samples,
/// normalized to sum exactly 1.
pub fn gaussian_kernel(radius: f64) -> Vec<f64> {
    let half = (radius.ceil() as i64 * 3) + 1;
    let variance_term = 2.0 * radius * radius;
    let scale = 1.0 / (std::f64::consts::PI * variance_term).sqrt();
    let mut kernel: Vec<f64> = ((-half + 1)..half)
        .map(|k| scale * (-((k * k) as f64) / variance_term).exp())
        .collect();
    let sum: f64 = kernel.iter().sum();
    for weight in &mut kernel {
        *weight /= sum;
    }
    kernel
}

/// Horizontal pass for the rows in `rows`: convolve `src` along x and
/// write into `dst_band` (exactly the same rows of the blur buffer).
pub fn horizontal_band(
    src: &[PixelRgb],
    width: u32,
    kernel: &[f64],
    rows: Range<u32>,
    dst_band: &mut [PixelRgb],
) {
    let width = width as i64;
    let half = (kernel.len() / 2) as i64;
    let mut out = dst_band.iter_mut();
    for y in rows {
        let row_start = y as i64 * width;
        for x in 0..width {
            let mut sum = PixelRgb::BLACK;
            for (tap, weight) in kernel.iter().enumerate() {
                let source_x = x + tap as i64 - half;
                if source_x >= 0 && source_x < width {
                    let pixel = src[(row_start + source_x) as usize];
                    sum.r += pixel.r * weight;
                    sum.g += pixel.g * weight;
                    sum.b += pixel.b * weight;
                }
            }
            *out.next().expect("destination band matches row range") = sum;
        }
    }
}

/// Vertical pass for the rows in `rows`: convolve `src` along y and write
/// into `dst_band` (the same rows of the composition buffer).
pub fn vertical_band(
    src: &[PixelRgb],
    width: u32,
    height: u32,
    kernel: &[f64],
    rows: Range<u32>,
    dst_band: &mut [PixelRgb],
) {
    let width = width as i64;
    let height = height as i64;
    let half = (kernel.len() / 2) as i64;
    let mut out = dst_band.iter_mut();
    for y in rows {
        for x in 0..width {
            let mut sum = PixelRgb::BLACK;
            for (tap, weight) in kernel.iter().enumerate() {
                let source_y = y as i64 + tap as i64 - half;
                if source_y >= 0 && source_y < height {
                    let pixel = src[((source_y * width) + x) as usize];
                    sum.r += pixel.r * weight;
                    sum.g += pixel.g * weight;
                    sum.b += pixel.b * weight;
                }
            }
            *out.next().expect("destination band matches row range") = sum;
        }
    }
}

/// Both passes over one whole image, single-threaded. Test and
/// small-image path; the pipeline drives the banded passes directly.
pub fn blur_image(pixels: &mut [PixelRgb], width: u32, height: u32, radius: f64) {
    let kernel = gaussian_kernel(radius);
    let mut scratch = vec![PixelRgb::BLACK; pixels.len()];
    horizontal_band(pixels, width, &kernel, 0..height, &mut scratch);
    vertical_band(&scratch, width, height, &kernel, 0..height, pixels);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::band_offsets as band_range;

    #[test]
    fn kernel_is_normalized_and_symmetric() {
        for radius in [0.4, 1.0, 2.5, 7.3] {
            let kernel = gaussian_kernel(radius);
            assert_eq!(kernel.len(), (radius.ceil() as usize * 6) + 1);
            let sum: f64 = kernel.iter().sum();
            assert!((sum - 1.0).abs() < 1e-12, "radius {radius} sum {sum}");
            for (a, b) in kernel.iter().zip(kernel.iter().rev()) {
                assert_eq!(a, b);
            }
            // center is the max
            let center = kernel[kernel.len() / 2];
            assert!(kernel.iter().all(|&w| w <= center));
        }
    }

    #[test]
    fn impulse_blurs_to_separable_gaussian() {
        let width = 31u32;
        let height = 31u32;
        let radius = 2.0;
        let mut pixels = vec![PixelRgb::BLACK; (width * height) as usize];
        pixels[(15 * width + 15) as usize] = PixelRgb::new(1.0, 1.0, 1.0);
        blur_image(&mut pixels, width, height, radius);

        let kernel = gaussian_kernel(radius);
        let half = kernel.len() as i64 / 2;
        for dy in -half..=half {
            for dx in -half..=half {
                let expected =
                    kernel[(dx + half) as usize] * kernel[(dy + half) as usize];
                let got = pixels[((15 + dy) * width as i64 + (15 + dx)) as usize].g;
                assert!(
                    (got - expected).abs() < 1e-9,
                    "({dx},{dy}): {got} vs {expected}"
                );
            }
        }
    }

    #[test]
    fn blur_preserves_total_flux_away_from_edges() {
        let width = 41u32;
        let height = 41u32;
        let mut pixels = vec![PixelRgb::BLACK; (width * height) as usize];
        pixels[(20 * width + 20) as usize] = PixelRgb::new(3.0, 0.0, 0.0);
        blur_image(&mut pixels, width, height, 1.5);
        let total: f64 = pixels.iter().map(|p| p.r).sum();
        assert!((total - 3.0).abs() < 1e-9);
    }

    #[test]
    fn banded_passes_match_the_whole_image_pass() {
        let width = 16u32;
        let height = 12u32;
        let mut pixels: Vec<PixelRgb> = (0..(width * height))
            .map(|i| PixelRgb::new(f64::from(i % 7), f64::from(i % 3), 0.25))
            .collect();
        let reference = {
            let mut copy = pixels.clone();
            blur_image(&mut copy, width, height, 1.0);
            copy
        };

        // three uneven bands through the banded entry points
        let kernel = gaussian_kernel(1.0);
        let mut scratch = vec![PixelRgb::BLACK; pixels.len()];
        for rows in [0u32..5, 5..6, 6..12] {
            let band = band_range(width, &rows);
            horizontal_band(&pixels, width, &kernel, rows, &mut scratch[band]);
        }
        for rows in [0u32..1, 1..9, 9..12] {
            let band = band_range(width, &rows);
            vertical_band(&scratch, width, height, &kernel, rows, &mut pixels[band]);
        }
        for (got, expected) in pixels.iter().zip(&reference) {
            assert_eq!(got, expected);
        }
    }
}
