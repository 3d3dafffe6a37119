//! Derived per-render state: everything the hot loop needs, computed once
//! from the raw configuration.

use core_catalog::ExtinctionUndo;
use core_config::{DistanceSelector, IntensitySelector, RenderConfig};
use core_geometry::{CameraAim, Quaternion, Vec3, icrs_spherical_to_cartesian};
use core_projection::{CameraFrame, ProjectionKind, SphericalOrientation};
use tracing::debug;

use crate::PipelineError;

/// Anti-alias spread: half-width (clamped to 0.5..=2.0) and the
/// precomputed `1 / (2 radius)^2` full-overlap weight.
#[derive(Debug, Clone, Copy)]
pub struct AntiAliasParams {
    pub radius: f64,
    pub per_pixel: f64,
}

/// Airy footprint scaling: the per-star extent autoscale clamps into
/// `min_extent..=max_extent`.
#[derive(Debug, Clone, Copy)]
pub struct AiryScaling {
    pub first_null: f64,
    pub min_extent: i64,
    pub max_extent: i64,
}

/// Geometry and gates shared read-only by every worker.
#[derive(Debug, Clone)]
pub struct RenderGeometry {
    pub camera_position: Vec3,
    pub target_position: Vec3,
    /// Composite target rotation; applied to every star.
    pub rotation: Quaternion,
    pub frame: CameraFrame,
    pub pixel_limit: f64,
    pub distance_min_squared: f64,
    pub distance_max_squared: f64,
    pub distance_selector: DistanceSelector,
    /// Linear intensity gates (converted from the configured magnitudes;
    /// min is the dim floor, max the bright ceiling).
    pub intensity_min: f64,
    pub intensity_max: f64,
    pub intensity_selector: IntensitySelector,
    pub color_min: f64,
    pub color_max: f64,
    pub anti_alias: Option<AntiAliasParams>,
    pub airy: Option<AiryScaling>,
    pub extinction: ExtinctionUndo,
}

/// Color-table parameters for this render's camera filters.
pub fn rgb_params(config: &RenderConfig) -> core_color::RgbParams {
    core_color::RgbParams {
        bands: core_color::FilterBands {
            red_long: config.red_filter_long_limit,
            red_short: config.red_filter_short_limit,
            green_long: config.green_filter_long_limit,
            green_short: config.green_filter_short_limit,
            blue_long: config.blue_filter_long_limit,
            blue_short: config.blue_filter_short_limit,
        },
        wb_enable: config.camera_wb_enable,
        wb_temp: config.camera_wb_temp,
        color_saturation: config.camera_color_saturation,
    }
}

/// Airy-map parameters, when the Airy disk is enabled.
pub fn airy_params(config: &RenderConfig) -> Option<core_color::AiryParams> {
    config.airy_disk_enable.then(|| core_color::AiryParams {
        first_null: config.airy_disk_first_null,
        max_extent: config.airy_disk_max_extent,
        obstruction_ratio: config.airy_disk_obstruction,
        red_filter_long_limit: config.red_filter_long_limit,
        red_filter_short_limit: config.red_filter_short_limit,
        green_filter_long_limit: config.green_filter_long_limit,
        green_filter_short_limit: config.green_filter_short_limit,
        blue_filter_long_limit: config.blue_filter_long_limit,
        blue_filter_short_limit: config.blue_filter_short_limit,
    })
}

/// Cartesian position, or the spherical one converted, when the Cartesian
/// fields were left at zero. Explicit Cartesian coordinates win.
fn resolve_position(x: f64, y: f64, z: f64, ra: f64, dec: f64, r: f64) -> Vec3 {
    if (ra != 0.0 || dec != 0.0 || r != 0.0) && x == 0.0 && y == 0.0 && z == 0.0 {
        icrs_spherical_to_cartesian(ra, dec, r)
    } else {
        Vec3::new(x, y, z)
    }
}

fn magnitude_to_linear(magnitude: f64) -> f64 {
    100.0_f64.powf(-magnitude / 5.0)
}

impl RenderGeometry {
    pub fn from_config(config: &RenderConfig) -> Result<RenderGeometry, PipelineError> {
        let projection = ProjectionKind::from_index(config.camera_projection)
            .ok_or(PipelineError::BadProjection(config.camera_projection))?;
        let frame = CameraFrame::new(
            config.camera_res_x,
            config.camera_res_y,
            config.camera_fov,
            projection,
            SphericalOrientation::from_index(config.spherical_orientation),
            config.mollweide_iterations,
        );

        let camera_position = resolve_position(
            config.camera_icrs_x,
            config.camera_icrs_y,
            config.camera_icrs_z,
            config.camera_icrs_ra,
            config.camera_icrs_dec,
            config.camera_icrs_r,
        );
        let target_position = resolve_position(
            config.target_icrs_x,
            config.target_icrs_y,
            config.target_icrs_z,
            config.target_icrs_ra,
            config.target_icrs_dec,
            config.target_icrs_r,
        );

        let aim = CameraAim::toward(
            target_position - camera_position,
            config.camera_rotation,
            config.camera_pan,
            config.camera_tilt,
        );

        let anti_alias = config.anti_alias_enable.then(|| {
            let radius = config.anti_alias_radius.clamp(0.5, 2.0);
            let spread = radius * 2.0;
            AntiAliasParams {
                radius,
                per_pixel: 1.0 / (spread * spread),
            }
        });

        let airy = config.airy_disk_enable.then(|| AiryScaling {
            first_null: config.airy_disk_first_null,
            min_extent: i64::from(config.airy_disk_min_extent),
            max_extent: i64::from(config.airy_disk_max_extent),
        });

        let geometry = RenderGeometry {
            camera_position,
            target_position,
            rotation: aim.rotation(),
            frame,
            pixel_limit: config.camera_pixel_limit(),
            distance_min_squared: config.render_distance_min * config.render_distance_min,
            distance_max_squared: config.render_distance_max * config.render_distance_max,
            distance_selector: config.render_distance_selector,
            intensity_min: magnitude_to_linear(config.star_intensity_min_mag),
            intensity_max: magnitude_to_linear(config.star_intensity_max_mag),
            intensity_selector: config.star_intensity_selector,
            color_min: config.star_color_min,
            color_max: config.star_color_max,
            anti_alias,
            airy,
            extinction: ExtinctionUndo {
                dimming: config.extinction_dimming_undo,
                reddening: config.extinction_reddening_undo,
            },
        };
        debug!(
            camera = ?geometry.camera_position,
            target = ?geometry.target_position,
            pixels_per_radian = geometry.frame.pixels_per_radian,
            "derived render geometry"
        );
        Ok(geometry)
    }
}
