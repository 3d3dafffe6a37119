//! Log-space Lanczos resampling.
//!
//! Star fields are nearly-black images with isolated bright peaks, the
//! worst case for windowed-sinc ringing: undershoot around a bright star
//! clips to black and leaves dark halos. Resampling the *log* of the flux
//! compresses the dynamic range so the ringing stays proportional, then the
//! output is exponentiated back. A small additive offset keeps log(0)
//! finite and is subtracted again afterwards; residual negative excursions
//! clamp to zero.
//!
//! Weights are normalized over the in-bounds support window, so a constant
//! image resamples to itself and edge pixels keep full brightness.

use core_image::PixelRgb;
use std::f64::consts::PI;
use std::ops::Range;

/// Offset added before the log and removed after; far below any visible
/// flux but large enough that log stays finite on empty sky.
pub const LOG_OFFSET: f64 = 1.0E-10;

/// Output resolution for a scaling factor, rounded to the nearest pixel.
pub fn scaled_resolution(res_x: u32, res_y: u32, scaling_factor: f64) -> (u32, u32) {
    (
        ((f64::from(res_x) * scaling_factor) + 0.5) as u32,
        ((f64::from(res_y) * scaling_factor) + 0.5) as u32,
    )
}

/// Clamp the configured kernel order to the supported 2..=10.
pub fn clamp_order(order: u32) -> u32 {
    order.clamp(2, 10)
}

/// The Lanczos window: `a sin(pi x) sin(pi x / a) / (pi^2 x^2)` inside
/// |x| <= a, 1 at 0, 0 outside.
#[inline]
pub fn kernel(x: f64, order: u32) -> f64 {
    if x == 0.0 {
        return 1.0;
    }
    let a = f64::from(order);
    if x < -a || x > a {
        return 0.0;
    }
    a * (PI * x).sin() * (PI * x / a).sin() / (PI * PI * x * x)
}

/// Convert one band of the source image to log scale (in place).
pub fn log_prep_band(band: &mut [PixelRgb]) {
    for pixel in band {
        pixel.r = (LOG_OFFSET + pixel.r).ln();
        pixel.g = (LOG_OFFSET + pixel.g).ln();
        pixel.b = (LOG_OFFSET + pixel.b).ln();
    }
}

/// Resample rows `rows` of the output from a log-scaled source image.
/// `dst_band` holds exactly those output rows.
#[allow(clippy::too_many_arguments)]
pub fn resample_band(
    src: &[PixelRgb],
    src_width: u32,
    src_height: u32,
    dst_width: u32,
    scaling_factor: f64,
    order: u32,
    rows: Range<u32>,
    dst_band: &mut [PixelRgb],
) {
    let order = clamp_order(order);
    let reach = order as i64;
    let source_w = 1.0 / scaling_factor;
    let half_source_w = source_w / 2.0;
    let src_width_i = src_width as i64;
    let src_height_i = src_height as i64;

    let mut out = dst_band.iter_mut();
    for y in rows {
        let source_y_center = (f64::from(y) * source_w) + half_source_w - 0.5;
        for x in 0..dst_width {
            let source_x_center = (f64::from(x) * source_w) + half_source_w - 0.5;
            let mut sum = PixelRgb::BLACK;
            let mut weight_sum = 0.0;
            for source_y in
                ((source_y_center as i64) - reach + 1)..=((source_y_center as i64) + reach)
            {
                if source_y < 0 || source_y >= src_height_i {
                    continue;
                }
                let weight_y = kernel(source_y_center - source_y as f64, order);
                for source_x in
                    ((source_x_center as i64) - reach + 1)..=((source_x_center as i64) + reach)
                {
                    if source_x < 0 || source_x >= src_width_i {
                        continue;
                    }
                    let weight = weight_y * kernel(source_x_center - source_x as f64, order);
                    let pixel = src[((source_y * src_width_i) + source_x) as usize];
                    sum.r += pixel.r * weight;
                    sum.g += pixel.g * weight;
                    sum.b += pixel.b * weight;
                    weight_sum += weight;
                }
            }
            let inverse = if weight_sum != 0.0 {
                1.0 / weight_sum
            } else {
                0.0
            };
            // back out of log space; negative ring clips to black
            let result = PixelRgb::new(
                ((sum.r * inverse).exp() - LOG_OFFSET).max(0.0),
                ((sum.g * inverse).exp() - LOG_OFFSET).max(0.0),
                ((sum.b * inverse).exp() - LOG_OFFSET).max(0.0),
            );
            *out.next().expect("destination band matches row range") = result;
        }
    }
}

/// Whole-image resize, single-threaded: log prep, resample, done. Test and
/// small-image path; the pipeline drives the banded passes directly.
pub fn resize_image(
    src: &[PixelRgb],
    src_width: u32,
    src_height: u32,
    scaling_factor: f64,
    order: u32,
) -> (Vec<PixelRgb>, u32, u32) {
    let (dst_width, dst_height) = scaled_resolution(src_width, src_height, scaling_factor);
    let mut log_src = src.to_vec();
    log_prep_band(&mut log_src);
    let mut dst = vec![PixelRgb::BLACK; dst_width as usize * dst_height as usize];
    resample_band(
        &log_src,
        src_width,
        src_height,
        dst_width,
        scaling_factor,
        order,
        0..dst_height,
        &mut dst,
    );
    (dst, dst_width, dst_height)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kernel_shape() {
        assert_eq!(kernel(0.0, 3), 1.0);
        // zero at every other integer within the window
        for k in 1..=3 {
            assert!(kernel(k as f64, 3).abs() < 1e-12);
            assert!(kernel(-(k as f64), 3).abs() < 1e-12);
        }
        assert_eq!(kernel(3.5, 3), 0.0);
        assert_eq!(kernel(-7.0, 3), 0.0);
        // positive main lobe, negative first sidelobe
        assert!(kernel(0.5, 3) > 0.0);
        assert!(kernel(1.5, 3) < 0.0);
    }

    #[test]
    fn constant_image_survives_upscaling() {
        let src = vec![PixelRgb::new(0.125, 0.5, 0.75); 8 * 6];
        let (dst, w, h) = resize_image(&src, 8, 6, 2.0, 3);
        assert_eq!((w, h), (16, 12));
        for pixel in &dst {
            assert!((pixel.r - 0.125).abs() < 1e-9);
            assert!((pixel.g - 0.5).abs() < 1e-9);
            assert!((pixel.b - 0.75).abs() < 1e-9);
        }
    }

    #[test]
    fn identity_scale_preserves_a_delta() {
        let mut src = vec![PixelRgb::BLACK; 9 * 9];
        src[4 * 9 + 4] = PixelRgb::new(1.0, 0.25, 0.0);
        let (dst, w, h) = resize_image(&src, 9, 9, 1.0, 3);
        assert_eq!((w, h), (9, 9));
        for (offset, pixel) in dst.iter().enumerate() {
            let expected = src[offset];
            assert!(
                (pixel.r - expected.r).abs() < 1e-9
                    && (pixel.g - expected.g).abs() < 1e-9
                    && (pixel.b - expected.b).abs() < 1e-9,
                "offset {offset}: {pixel:?} vs {expected:?}"
            );
        }
    }

    #[test]
    fn downscale_halves_the_resolution() {
        let src = vec![PixelRgb::new(0.25, 0.25, 0.25); 16 * 8];
        let (dst, w, h) = resize_image(&src, 16, 8, 0.5, 2);
        assert_eq!((w, h), (8, 4));
        for pixel in &dst {
            assert!((pixel.r - 0.25).abs() < 1e-9);
        }
    }

    #[test]
    fn resample_never_outputs_negatives() {
        // a harsh edge next to a bright star rings hard; the clamp must
        // hold the floor at zero
        let mut src = vec![PixelRgb::BLACK; 12 * 12];
        src[5 * 12 + 5] = PixelRgb::new(1000.0, 1000.0, 1000.0);
        let (dst, _, _) = resize_image(&src, 12, 12, 1.7, 4);
        for pixel in &dst {
            assert!(pixel.r >= 0.0 && pixel.g >= 0.0 && pixel.b >= 0.0);
        }
    }

    #[test]
    fn banded_resample_matches_whole_image() {
        let mut src: Vec<PixelRgb> = (0..(10 * 10))
            .map(|i| PixelRgb::new(f64::from(i % 5) * 0.1, 0.2, f64::from(i % 3) * 0.3))
            .collect();
        let (reference, w, h) = resize_image(&src, 10, 10, 1.5, 3);

        log_prep_band(&mut src);
        let mut dst = vec![PixelRgb::BLACK; (w * h) as usize];
        for rows in [0u32..4, 4..5, 5..h] {
            let band = (rows.start as usize * w as usize)..(rows.end as usize * w as usize);
            resample_band(&src, 10, 10, w, 1.5, 3, rows, &mut dst[band]);
        }
        assert_eq!(dst, reference);
    }

    #[test]
    fn identity_scale_delta_in_log_space_is_exact() {
        // with normalized weights and integer-aligned centers, scale 1.0
        // reduces to a copy: kernel(0) = 1, all other taps are zeros
        let mut src = vec![PixelRgb::new(0.5, 0.5, 0.5); 5 * 5];
        src[12] = PixelRgb::new(2.0, 2.0, 2.0);
        let (dst, _, _) = resize_image(&src, 5, 5, 1.0, 5);
        assert!((dst[12].r - 2.0).abs() < 1e-9);
        assert!((dst[0].r - 0.5).abs() < 1e-9);
    }
}
