//! Star splatting: one projected star becomes one pixel, an anti-alias
//! spread square, or a mirrored four-quadrant Airy footprint — every
//! resulting contribution goes through the worker's dedup cache.

use core_color::{AiryMaps, RgbTable};

use crate::PipelineError;
use crate::dedup::DedupCache;
use crate::phase::StatusBoard;
use crate::ring::Producer;
use crate::state::RenderGeometry;

/// Read-only inputs shared by every star a worker processes.
pub struct SplatContext<'a> {
    pub geometry: &'a RenderGeometry,
    pub rgb: &'a RgbTable,
    pub airy_maps: Option<&'a AiryMaps>,
}

/// The worker-local output side: dedup cache in front of this worker's
/// ring section.
pub struct PixelSink<'a, 'ring> {
    pub dedup: &'a mut DedupCache,
    pub producer: &'a mut Producer<'ring>,
    pub board: &'ring StatusBoard,
}

impl PixelSink<'_, '_> {
    #[inline]
    fn submit(&mut self, offset: usize, r: f64, g: f64, b: f64) -> Result<(), PipelineError> {
        self.dedup
            .submit(offset, r, g, b, self.producer, self.board)
    }
}

/// Spread one contribution over the pixels overlapped by a square of
/// half-width `radius` centered at the floating-point position, weighting
/// each by its overlap area (the same shape as an optical low-pass
/// filter). Weights over the full square sum to 1.
#[allow(clippy::too_many_arguments)]
pub fn anti_alias_submit(
    context: &SplatContext<'_>,
    sink: &mut PixelSink<'_, '_>,
    aa: crate::state::AntiAliasParams,
    center_x: f64,
    center_y: f64,
    r: f64,
    g: f64,
    b: f64,
) -> Result<(), PipelineError> {
    let frame = &context.geometry.frame;
    let left_edge = center_x - aa.radius;
    let right_edge = center_x + aa.radius;
    let top_edge = center_y - aa.radius;
    let bottom_edge = center_y + aa.radius;

    let res_x = i64::from(frame.res_x);
    let res_y = i64::from(frame.res_y);
    for spread_y in (top_edge as i64)..=(bottom_edge as i64) {
        for spread_x in (left_edge as i64)..=(right_edge as i64) {
            let x0 = spread_x as f64;
            let y0 = spread_y as f64;
            let x_overlap = if left_edge >= x0 && left_edge < x0 + 1.0 {
                (x0 + 1.0) - left_edge
            } else if right_edge >= x0 && right_edge < x0 + 1.0 {
                right_edge - x0
            } else {
                1.0
            };
            let y_overlap = if top_edge >= y0 && top_edge < y0 + 1.0 {
                (y0 + 1.0) - top_edge
            } else if bottom_edge >= y0 && bottom_edge < y0 + 1.0 {
                bottom_edge - y0
            } else {
                1.0
            };

            if spread_x >= 0 && spread_x < res_x && spread_y >= 0 && spread_y < res_y {
                let weight = aa.per_pixel * x_overlap * y_overlap;
                let offset = (res_x * spread_y + spread_x) as usize;
                sink.submit(offset, weight * r, weight * g, weight * b)?;
            }
        }
    }
    Ok(())
}

/// Render one in-raster star into the sink: plain pixel, anti-aliased
/// spread, or Airy footprint depending on the configured mode.
#[allow(clippy::too_many_arguments)]
pub fn splat_star(
    context: &SplatContext<'_>,
    sink: &mut PixelSink<'_, '_>,
    x_d: f64,
    y_d: f64,
    x: u32,
    y: u32,
    linear_intensity: f64,
    temperature: u16,
) -> Result<(), PipelineError> {
    let geometry = context.geometry;
    let frame = &geometry.frame;
    let (rgb_r, rgb_g, rgb_b) = context.rgb.at(temperature);

    if let (Some(airy), Some(maps)) = (geometry.airy, context.airy_maps) {
        // footprint extent scales with how far this star saturates the
        // sensor, clamped to the configured range
        let autoscale = ((linear_intensity * 10.0 / geometry.pixel_limit).sqrt()
            * 2.0
            * airy.first_null) as i64;
        let extent = autoscale.clamp(airy.min_extent, airy.max_extent);

        let res_x = i64::from(frame.res_x);
        let res_y = i64::from(frame.res_y);
        let center_x = i64::from(x);
        let center_y = i64::from(y);
        for map_y in 0..=extent {
            for map_x in 0..=extent {
                let (map_r, map_g, map_b) = maps.at(map_x as usize, map_y as usize);
                if map_r <= 0.0 || map_g <= 0.0 || map_b <= 0.0 {
                    continue;
                }
                let r = linear_intensity * map_r * rgb_r;
                let g = linear_intensity * map_g * rgb_g;
                let b = linear_intensity * map_b * rgb_b;
                // mirror the quadrant into all four; skip the duplicated
                // axes
                for (sign_x, sign_y) in [(1i64, 1i64), (-1, 1), (1, -1), (-1, -1)] {
                    if (sign_x < 0 && map_x == 0) || (sign_y < 0 && map_y == 0) {
                        continue;
                    }
                    let pixel_x = center_x + (sign_x * map_x);
                    let pixel_y = center_y + (sign_y * map_y);
                    if pixel_x < 0 || pixel_x >= res_x || pixel_y < 0 || pixel_y >= res_y {
                        continue;
                    }
                    if let Some(aa) = geometry.anti_alias {
                        anti_alias_submit(
                            context,
                            sink,
                            aa,
                            x_d + (sign_x * map_x) as f64,
                            y_d + (sign_y * map_y) as f64,
                            r,
                            g,
                            b,
                        )?;
                    } else {
                        let offset = (res_x * pixel_y + pixel_x) as usize;
                        sink.submit(offset, r, g, b)?;
                    }
                }
            }
        }
        return Ok(());
    }

    let r = linear_intensity * rgb_r;
    let g = linear_intensity * rgb_g;
    let b = linear_intensity * rgb_b;
    if let Some(aa) = geometry.anti_alias {
        anti_alias_submit(context, sink, aa, x_d, y_d, r, g, b)
    } else {
        let offset = (i64::from(frame.res_x) * i64::from(y) + i64::from(x)) as usize;
        sink.submit(offset, r, g, b)
    }
}
