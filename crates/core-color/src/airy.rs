//! Oversampled Airy-disk point-spread-function maps.
//!
//! One quadrant per color channel: pixel (x, y) of the map holds the PSF
//! integral over that output pixel for a star centered at (0, 0); the
//! splatter mirrors the quadrant into the other three. Green's scale is set
//! directly by the configured first-null radius in pixels; red and blue
//! scale inversely with their band's center wavelength so longer
//! wavelengths diffract wider.
//!
//! Each map pixel is oversampled on an n x n grid (n chosen so the 0.1-step
//! J1 table is fully used, minimum 11) and the analytic pattern
//! `I0 * (2 J1(x)/x)^2` — or its central-obstruction variant — is averaged
//! over the grid. Pixels beyond the configured max extent, or whose Bessel
//! argument runs past the table, are zero.

use crate::bessel::{BesselTable, SAMPLES_PER_X, TABLE_LEN};
use tracing::debug;

/// Scale and calibration for one color channel.
#[derive(Debug, Clone, Copy)]
struct ChannelScale {
    pixel_scaling_factor: f32,
    half_oversampling: i32,
    center_intensity: f32,
}

fn channel_scale(first_null: f32, center_nm: f32, green_center_nm: f32) -> ChannelScale {
    let pixel_scaling_factor = (3.8317f32 / first_null) * green_center_nm / center_nm;
    // enough sub-samples to hit every J1 table entry across one pixel, and
    // no fewer than 11x11
    let half_oversampling = ((pixel_scaling_factor * 10.0) + 0.5).max(5.0) as i32;
    let oversampling = (half_oversampling * 2) + 1;
    let center_intensity = 1.16823f32 * (green_center_nm * green_center_nm)
        / ((center_nm * center_nm) * (first_null * oversampling as f32).powi(2));
    ChannelScale {
        pixel_scaling_factor,
        half_oversampling,
        center_intensity,
    }
}

/// The three per-channel quadrant maps.
pub struct AiryMaps {
    width: usize,
    red: Vec<f64>,
    green: Vec<f64>,
    blue: Vec<f64>,
}

/// Inputs the maps depend on; filter limits come straight from the camera
/// filter configuration (nm).
#[derive(Debug, Clone, Copy)]
pub struct AiryParams {
    pub first_null: f64,
    pub max_extent: u32,
    pub obstruction_ratio: f64,
    pub red_filter_long_limit: f64,
    pub red_filter_short_limit: f64,
    pub green_filter_long_limit: f64,
    pub green_filter_short_limit: f64,
    pub blue_filter_long_limit: f64,
    pub blue_filter_short_limit: f64,
}

impl AiryMaps {
    pub fn new(params: &AiryParams, bessel: &BesselTable) -> AiryMaps {
        let red_center = band_center(params.red_filter_short_limit, params.red_filter_long_limit);
        let green_center =
            band_center(params.green_filter_short_limit, params.green_filter_long_limit);
        let blue_center =
            band_center(params.blue_filter_short_limit, params.blue_filter_long_limit);
        let first_null = params.first_null as f32;
        let obstruction = params.obstruction_ratio.clamp(0.0, 0.99) as f32;

        let width = params.max_extent as usize + 1;
        let max_r = params.max_extent as f32;
        let build = |center_nm: f32| {
            let scale = channel_scale(first_null, center_nm, green_center);
            build_map(width, max_r, scale, obstruction, bessel)
        };
        let maps = AiryMaps {
            width,
            red: build(red_center),
            green: build(green_center),
            blue: build(blue_center),
        };
        debug!(
            width,
            first_null = params.first_null,
            obstruction = params.obstruction_ratio,
            "generated Airy maps"
        );
        maps
    }

    /// Quadrant width: max extent + 1.
    pub fn width(&self) -> usize {
        self.width
    }

    /// PSF weights at quadrant offset (x, y), one per channel.
    #[inline]
    pub fn at(&self, x: usize, y: usize) -> (f64, f64, f64) {
        let offset = (y * self.width) + x;
        (self.red[offset], self.green[offset], self.blue[offset])
    }
}

fn band_center(short_nm: f64, long_nm: f64) -> f32 {
    (short_nm + ((long_nm - short_nm) / 2.0)) as f32
}

fn build_map(
    width: usize,
    max_r: f32,
    scale: ChannelScale,
    obstruction: f32,
    bessel: &BesselTable,
) -> Vec<f64> {
    let oversampling = (scale.half_oversampling * 2) + 1;
    let obstruction_center_factor = if obstruction > 0.0 {
        1.0f32 / (1.0 - (obstruction * obstruction)).powi(2)
    } else {
        0.0
    };

    let mut map = vec![0.0f64; width * width];
    for map_y in 0..width {
        for map_x in 0..width {
            let pixel_x = map_x as f32;
            let pixel_y = map_y as f32;
            let pixel_r = ((pixel_x * pixel_x) + (pixel_y * pixel_y)).sqrt();
            if pixel_r > max_r || (pixel_r * scale.pixel_scaling_factor) >= 12800.0 {
                continue;
            }
            let mut accumulated = 0.0f64;
            'pixel: for oversample_y_index in 0..oversampling {
                for oversample_x_index in 0..oversampling {
                    let oversample_x = pixel_x
                        + ((oversample_x_index - scale.half_oversampling) as f32
                            / oversampling as f32);
                    let oversample_y = pixel_y
                        + ((oversample_y_index - scale.half_oversampling) as f32
                            / oversampling as f32);
                    let oversample_r =
                        ((oversample_x * oversample_x) + (oversample_y * oversample_y)).sqrt();
                    let bessel_x = oversample_r * scale.pixel_scaling_factor;
                    let bessel_index = ((bessel_x * SAMPLES_PER_X as f32) + 0.5) as usize;
                    if oversample_r == 0.0 || bessel_index == 0 {
                        accumulated += f64::from(scale.center_intensity);
                    } else if bessel_index >= TABLE_LEN {
                        // too many diffraction orders; drop the whole pixel
                        accumulated = 0.0;
                        break 'pixel;
                    } else if obstruction > 0.0 {
                        let obstructed_index =
                            ((obstruction * bessel_x * SAMPLES_PER_X as f32) + 0.5) as usize;
                        let numerator = (2.0 * bessel.at(bessel_index))
                            - (2.0 * obstruction * bessel.at(obstructed_index));
                        accumulated += f64::from(
                            scale.center_intensity
                                * obstruction_center_factor
                                * (numerator / bessel_x).powi(2),
                        );
                    } else {
                        accumulated += f64::from(
                            scale.center_intensity
                                * (2.0 * bessel.at(bessel_index) / bessel_x).powi(2),
                        );
                    }
                }
            }
            map[(map_y * width) + map_x] = accumulated;
        }
    }
    map
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_params(first_null: f64, max_extent: u32) -> AiryParams {
        AiryParams {
            first_null,
            max_extent,
            obstruction_ratio: 0.0,
            red_filter_long_limit: 705.0,
            red_filter_short_limit: 550.0,
            green_filter_long_limit: 600.0,
            green_filter_short_limit: 445.0,
            blue_filter_long_limit: 465.0,
            blue_filter_short_limit: 395.0,
        }
    }

    #[test]
    fn center_dominates_and_first_null_dips() {
        let bessel = BesselTable::new();
        let maps = AiryMaps::new(&default_params(4.0, 10), &bessel);
        let (_, center, _) = maps.at(0, 0);
        let (_, at_null, _) = maps.at(4, 0);
        let (_, ring, _) = maps.at(5, 0);
        assert!(center > 0.0);
        // the first null is far below the central peak
        assert!(at_null < center * 0.02, "null {at_null} vs center {center}");
        // the first bright ring comes back up
        assert!(ring > at_null);
    }

    #[test]
    fn map_is_symmetric_across_the_diagonal() {
        let bessel = BesselTable::new();
        let maps = AiryMaps::new(&default_params(1.5, 5), &bessel);
        for y in 0..=5 {
            for x in 0..=5 {
                let (r1, g1, b1) = maps.at(x, y);
                let (r2, g2, b2) = maps.at(y, x);
                assert_eq!((r1, g1, b1), (r2, g2, b2));
            }
        }
    }

    #[test]
    fn pixels_outside_max_extent_are_zero() {
        let bessel = BesselTable::new();
        let maps = AiryMaps::new(&default_params(1.0, 4), &bessel);
        // corner beyond radius 4
        let (r, g, b) = maps.at(4, 4);
        assert_eq!((r, g, b), (0.0, 0.0, 0.0));
    }

    #[test]
    fn red_diffracts_wider_than_blue() {
        let bessel = BesselTable::new();
        let maps = AiryMaps::new(&default_params(2.0, 6), &bessel);
        // at a fixed radius inside the red first null but past the blue
        // one, red (longer wavelength, wider disk) retains more energy
        let (red, _, blue) = maps.at(1, 1);
        assert!(red > blue * 2.0, "red {red} blue {blue}");
    }

    #[test]
    fn obstruction_narrows_the_core() {
        let bessel = BesselTable::new();
        let mut params = default_params(2.0, 6);
        let open = AiryMaps::new(&params, &bessel);
        params.obstruction_ratio = 0.5;
        let obstructed = AiryMaps::new(&params, &bessel);
        let (_, open_center, _) = open.at(0, 0);
        let (_, obstructed_center, _) = obstructed.at(0, 0);
        assert!(open_center > 0.0 && obstructed_center > 0.0);
        // energy moves from the core into the rings
        let (_, open_ring, _) = open.at(3, 0);
        let (_, obstructed_ring, _) = obstructed.at(3, 0);
        assert!(obstructed_ring / obstructed_center > open_ring / open_center);
    }
}
