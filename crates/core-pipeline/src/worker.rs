//! The per-worker star loop: stream this worker's slice of every shard,
//! filter, transform, project, splat.

use core_catalog::{ShardSet, partition};
use core_config::{DistanceSelector, IntensitySelector};
use core_geometry::Vec3;
use tracing::trace;

use crate::PipelineError;
use crate::splat::{PixelSink, SplatContext, splat_star};

/// Process this worker's share of the catalog. The sink's dedup cache is
/// drained exactly once at end of input, after the last star.
pub fn process_stars(
    context: &SplatContext<'_>,
    shards: &ShardSet,
    worker_index: u32,
    worker_count: u32,
    sink: &mut PixelSink<'_, '_>,
) -> Result<(), PipelineError> {
    let geometry = context.geometry;
    let mut accepted: u64 = 0;

    for shard in shards.shards() {
        let total = shard.record_count();
        if total == 0 {
            continue;
        }
        let (start, count) = partition(total, worker_count, worker_index);
        for record in shard.records(start, count) {
            let (linear_1pc_intensity, color_temperature) =
                record.observables(geometry.extinction);
            let star_icrs = Vec3::new(record.icrs_x, record.icrs_y, record.icrs_z);

            // translate to camera-relative coordinates; distances stay
            // squared until a projection needs better
            let star = star_icrs - geometry.camera_position;
            let distance_squared = star.length_squared();
            let linear_intensity = f64::from(linear_1pc_intensity) / distance_squared;

            let intensity_test = match geometry.intensity_selector {
                IntensitySelector::Camera => linear_intensity,
                IntensitySelector::Earth => {
                    f64::from(linear_1pc_intensity) / star_icrs.length_squared()
                }
                // absolute magnitude reference distance is 10 pc
                IntensitySelector::Absolute => f64::from(linear_1pc_intensity) * 0.01,
            };

            let render_distance_squared = match geometry.distance_selector {
                DistanceSelector::Camera => distance_squared,
                // gate on distance from the *untranslated* target
                DistanceSelector::Target => {
                    (star_icrs - geometry.target_position).length_squared()
                }
            };

            if distance_squared > 0.0
                && render_distance_squared >= geometry.distance_min_squared
                && render_distance_squared <= geometry.distance_max_squared
                && intensity_test >= geometry.intensity_min
                && intensity_test <= geometry.intensity_max
                && f64::from(color_temperature) >= geometry.color_min
                && f64::from(color_temperature) <= geometry.color_max
            {
                let rotated = geometry.rotation.rotate(star);
                let (x_d, y_d) = geometry.frame.project(rotated);
                if let Some((x, y)) = geometry.frame.to_pixel(x_d, y_d) {
                    splat_star(
                        context,
                        sink,
                        x_d,
                        y_d,
                        x,
                        y,
                        linear_intensity,
                        color_temperature,
                    )?;
                    accepted += 1;
                }
            }
        }
    }

    // everything buffered must cross to the aggregator before we report
    // render-complete
    sink.dedup.drain(sink.producer, sink.board)?;
    trace!(worker_index, accepted, "worker input exhausted");
    Ok(())
}
