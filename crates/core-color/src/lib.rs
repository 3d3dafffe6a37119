//! Blackbody color tables and diffraction maps.
//!
//! Everything here is precomputed once per render and then read-only in the
//! hot loop: a star contributes `flux * rgb[temperature]` per channel, where
//! `rgb` folds together the Planck spectrum, the camera's filter bands, the
//! Gaia G-band transmissivity the catalog fluxes are calibrated against,
//! white balance, and the chroma saturation control.

use tracing::debug;

pub mod airy;
pub mod bessel;
pub mod passbands;

pub use airy::{AiryMaps, AiryParams};
pub use bessel::BesselTable;

/// Temperatures are tabulated for every integer Kelvin in 0..=32767,
/// matching the catalog's temperature range.
pub const TEMPERATURE_STEPS: usize = 32768;

const BOLTZMANN: f64 = 1.380649E-23;
const PLANCK: f64 = 6.62607015E-34;
const LIGHT_SPEED: f64 = 299792458.0;

/// Planck spectral radiance with the constant factors dropped: every use
/// normalizes against the G band integral, so only the shape matters.
/// `wavelength` in nm, `temperature` in Kelvin.
#[inline]
fn specific_intensity(wavelength_nm: f64, temperature: f64) -> f64 {
    let wavelength_m = wavelength_nm * 1.0E-9;
    1.0 / (wavelength_m.powi(5)
        * ((PLANCK * LIGHT_SPEED / (wavelength_m * BOLTZMANN * temperature)).exp() - 1.0))
}

/// Camera filter band limits in nm, long and short per channel.
#[derive(Debug, Clone, Copy)]
pub struct FilterBands {
    pub red_long: f64,
    pub red_short: f64,
    pub green_long: f64,
    pub green_short: f64,
    pub blue_long: f64,
    pub blue_short: f64,
}

/// White-balance and saturation controls for the RGB table.
#[derive(Debug, Clone, Copy)]
pub struct RgbParams {
    pub bands: FilterBands,
    pub wb_enable: bool,
    pub wb_temp: f64,
    pub color_saturation: f64,
}

struct BandIntegrals {
    gband: f64,
    red: f64,
    green: f64,
    blue: f64,
}

/// Per-temperature RGB weights.
pub struct RgbTable {
    red: Vec<f64>,
    green: Vec<f64>,
    blue: Vec<f64>,
}

impl RgbTable {
    pub fn new(params: &RgbParams) -> RgbTable {
        const WAVELENGTH_INCREMENTS: usize = 200;

        let bands = &params.bands;
        // scan from the longest limit any band needs down to the shortest
        let wavelength_start = passbands::GBAND_LONG_LIMIT
            .max(bands.red_long)
            .max(bands.green_long)
            .max(bands.blue_long);
        let wavelength_end = passbands::GBAND_SHORT_LIMIT
            .min(bands.red_short)
            .min(bands.green_short)
            .min(bands.blue_short);
        let increment = (wavelength_start - wavelength_end) / WAVELENGTH_INCREMENTS as f64;

        let integrate = |temperature: f64| -> BandIntegrals {
            let mut sums = BandIntegrals {
                gband: 0.0,
                red: 0.0,
                green: 0.0,
                blue: 0.0,
            };
            let mut wavelength = wavelength_start;
            while wavelength >= wavelength_end {
                let intensity = specific_intensity(wavelength, temperature);
                if (passbands::GBAND_SHORT_LIMIT..=passbands::GBAND_LONG_LIMIT)
                    .contains(&wavelength)
                {
                    sums.gband += intensity * passbands::transmissivity_g(wavelength);
                }
                if (bands.red_short..=bands.red_long).contains(&wavelength) {
                    sums.red += intensity;
                }
                if (bands.green_short..=bands.green_long).contains(&wavelength) {
                    sums.green += intensity;
                }
                if (bands.blue_short..=bands.blue_long).contains(&wavelength) {
                    sums.blue += intensity;
                }
                wavelength -= increment;
            }
            sums
        };

        // White balance scales each filter integral to match the G band at
        // the reference temperature; with WB off, all three channels share
        // the green factor so only the G-band flux calibration remains.
        let reference = integrate(if params.wb_enable {
            params.wb_temp
        } else {
            4300.0
        });
        let (red_wb_factor, green_wb_factor, blue_wb_factor) = if params.wb_enable {
            (
                reference.gband / reference.red,
                reference.gband / reference.green,
                reference.gband / reference.blue,
            )
        } else {
            let shared = reference.gband / reference.green;
            (shared, shared, shared)
        };

        let mut table = RgbTable {
            red: vec![0.0; TEMPERATURE_STEPS],
            green: vec![0.0; TEMPERATURE_STEPS],
            blue: vec![0.0; TEMPERATURE_STEPS],
        };
        for temperature in 0..TEMPERATURE_STEPS {
            let sums = integrate(temperature as f64);
            let (mut red, mut green, mut blue) = if sums.gband != 0.0 {
                (
                    red_wb_factor * sums.red / sums.gband,
                    green_wb_factor * sums.green / sums.gband,
                    blue_wb_factor * sums.blue / sums.gband,
                )
            } else {
                (0.0, 0.0, 0.0)
            };

            // chroma saturation rescales each channel about the mid channel
            let color_max = red.max(green).max(blue);
            let color_min = red.min(green).min(blue);
            let color_mid = (color_max + color_min) / 2.0;
            red = (color_mid + (params.color_saturation * (red - color_mid))).max(0.0);
            green = (color_mid + (params.color_saturation * (green - color_mid))).max(0.0);
            blue = (color_mid + (params.color_saturation * (blue - color_mid))).max(0.0);

            table.red[temperature] = red;
            table.green[temperature] = green;
            table.blue[temperature] = blue;
        }
        debug!(
            wb_enable = params.wb_enable,
            wb_temp = params.wb_temp,
            saturation = params.color_saturation,
            "generated blackbody RGB table"
        );
        table
    }

    /// RGB weights for one catalog temperature.
    #[inline]
    pub fn at(&self, temperature: u16) -> (f64, f64, f64) {
        let i = temperature as usize;
        (self.red[i], self.green[i], self.blue[i])
    }
}

/// Gaia BP/RP/G flux ratios per blackbody temperature; the catalog builder
/// matches observed ratios against this table to assign temperatures.
pub struct BandpassRatios {
    pub rp_over_g: Vec<f64>,
    pub bp_over_g: Vec<f64>,
    pub bp_over_rp: Vec<f64>,
}

impl BandpassRatios {
    pub fn new() -> BandpassRatios {
        let mut ratios = BandpassRatios {
            rp_over_g: vec![0.0; TEMPERATURE_STEPS],
            bp_over_g: vec![0.0; TEMPERATURE_STEPS],
            bp_over_rp: vec![0.0; TEMPERATURE_STEPS],
        };
        for temperature in 0..TEMPERATURE_STEPS {
            let mut g = 0.0;
            let mut rp = 0.0;
            let mut bp = 0.0;
            // the passband tables cover 320-1100 nm
            for wavelength in 320..=1100u32 {
                let wavelength = f64::from(wavelength);
                let intensity = specific_intensity(wavelength, temperature as f64);
                g += passbands::transmissivity_g(wavelength) * intensity;
                rp += passbands::transmissivity_rp(wavelength) * intensity;
                bp += passbands::transmissivity_bp(wavelength) * intensity;
            }
            if g != 0.0 {
                ratios.rp_over_g[temperature] = rp / g;
                ratios.bp_over_g[temperature] = bp / g;
            }
            if rp != 0.0 {
                ratios.bp_over_rp[temperature] = bp / rp;
            }
        }
        ratios
    }
}

impl Default for BandpassRatios {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn default_params() -> RgbParams {
        RgbParams {
            bands: FilterBands {
                red_long: 705.0,
                red_short: 550.0,
                green_long: 600.0,
                green_short: 445.0,
                blue_long: 465.0,
                blue_short: 395.0,
            },
            wb_enable: true,
            wb_temp: 4300.0,
            color_saturation: 1.0,
        }
    }

    #[test]
    fn white_balance_neutralizes_the_reference_temperature() {
        let table = RgbTable::new(&default_params());
        let (r, g, b) = table.at(4300);
        assert!((r - g).abs() / g < 0.01, "r {r} g {g}");
        assert!((b - g).abs() / g < 0.01, "b {b} g {g}");
    }

    #[test]
    fn hot_stars_are_bluer_than_cool_stars() {
        let table = RgbTable::new(&default_params());
        let (r_cool, _, b_cool) = table.at(3000);
        let (r_hot, _, b_hot) = table.at(15000);
        assert!(b_cool / r_cool < b_hot / r_hot);
    }

    #[test]
    fn zero_saturation_collapses_to_gray() {
        let mut params = default_params();
        params.color_saturation = 0.0;
        let table = RgbTable::new(&params);
        for temperature in [1000u16, 4300, 9000, 32000] {
            let (r, g, b) = table.at(temperature);
            assert!((r - g).abs() < 1e-12 && (g - b).abs() < 1e-12);
        }
    }

    #[test]
    fn zero_temperature_contributes_nothing() {
        let table = RgbTable::new(&default_params());
        assert_eq!(table.at(0), (0.0, 0.0, 0.0));
    }

    #[test]
    fn saturation_never_produces_negative_weights() {
        let mut params = default_params();
        params.color_saturation = 4.0;
        let table = RgbTable::new(&params);
        for temperature in 0..TEMPERATURE_STEPS {
            let (r, g, b) = table.at(temperature as u16);
            assert!(r >= 0.0 && g >= 0.0 && b >= 0.0, "negative at {temperature}");
        }
    }

    #[test]
    fn bandpass_ratios_track_temperature() {
        let ratios = BandpassRatios::new();
        // cool stars emit mostly in RP, hot stars shift toward BP
        assert!(ratios.bp_over_rp[3000] < ratios.bp_over_rp[10000]);
        assert!(ratios.rp_over_g[3000] > ratios.rp_over_g[10000]);
        // ratios stay finite everywhere
        for temperature in 0..TEMPERATURE_STEPS {
            assert!(ratios.bp_over_rp[temperature].is_finite());
        }
    }
}
