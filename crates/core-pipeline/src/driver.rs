//! Pipeline orchestration: one coordinator (the calling thread), N render
//! workers, and a dedicated aggregator thread, all over one status board.
//!
//! Thread roles per phase:
//!
//! | phase          | coordinator        | workers            | aggregator |
//! |----------------|--------------------|--------------------|------------|
//! | init           | allocate + release | build dedup caches | —          |
//! | render         | wait               | stream stars       | sole image writer |
//! | post (tone)    | whole image        | handshake          | done       |
//! | blur H/V       | band 0             | bands 1..=N        | —          |
//! | resize prep/resample | band 0       | bands 1..=N        | —          |
//! | overlays       | whole image        | parked             | —          |
//! | sequence       | band 0             | bands 1..=N        | —          |
//!
//! Buffer access follows the phase table exactly; that is what makes the
//! `SharedImage` unsafe blocks below sound. Between any two rows of the
//! table sits a status-board barrier.

use core_catalog::ShardSet;
use core_color::{AiryMaps, RgbTable, passbands};
use core_config::{PixelLimitMode, RenderConfig};
use core_image::{ByteImage, FloatImage, PixelRgb, SharedBytes, SharedImage, row_band};
use core_post::{blur, lanczos, overlay, tone_limit};
use core_projection::{ProjectionKind, SphericalOrientation};
use core_sequence::{SequenceParams, sequence_band};
use std::f64::consts::{FRAC_PI_2, PI};
use std::time::Instant;
use tracing::{debug, info, warn};

use crate::PipelineError;
use crate::dedup::DedupCache;
use crate::phase::{Phase, StatusBoard};
use crate::ring::RingBuffer;
use crate::splat::{PixelSink, SplatContext};
use crate::state::RenderGeometry;
use crate::worker::process_stars;

/// Everything a finished render hands back.
pub struct RenderOutput {
    /// The sequenced byte stream ready for an encoder.
    pub bytes: ByteImage,
    /// The post-processed float image (diagnostics and tests).
    pub image: FloatImage,
}

struct PipelineShared<'a> {
    config: &'a RenderConfig,
    geometry: &'a RenderGeometry,
    rgb: &'a RgbTable,
    airy_maps: Option<&'a AiryMaps>,
    shards: &'a ShardSet,
    board: StatusBoard,
    ring: RingBuffer,
    composition: SharedImage,
    blur_buffer: Option<SharedImage>,
    resize_buffer: Option<SharedImage>,
    output: SharedBytes,
    sequence: SequenceParams,
    blur_kernel: Option<Vec<f64>>,
    worker_count: u32,
    /// Stop after the render barrier and skip the post/sequence phases.
    composition_only: bool,
}

impl PipelineShared<'_> {
    fn band_count(&self) -> u32 {
        self.worker_count + 1
    }

    /// The buffer the sequencer reads: the resized image when resizing is
    /// configured, otherwise the composition.
    fn current_image(&self) -> &SharedImage {
        self.resize_buffer.as_ref().unwrap_or(&self.composition)
    }
}

/// Render the composition buffer only: init + render phases, no
/// post-processing. This is the deterministic observation point for the
/// renderer's additive semantics.
pub fn render_composition(
    config: &RenderConfig,
    geometry: &RenderGeometry,
    rgb: &RgbTable,
    airy_maps: Option<&AiryMaps>,
    shards: &ShardSet,
) -> Result<FloatImage, PipelineError> {
    let output = run(config, geometry, rgb, airy_maps, shards, true)?;
    Ok(output.image)
}

/// Run the full pipeline: render, post-process, sequence. The caller
/// encodes the returned bytes.
pub fn run_pipeline(
    config: &RenderConfig,
    geometry: &RenderGeometry,
    rgb: &RgbTable,
    airy_maps: Option<&AiryMaps>,
    shards: &ShardSet,
) -> Result<RenderOutput, PipelineError> {
    run(config, geometry, rgb, airy_maps, shards, false)
}

fn run(
    config: &RenderConfig,
    geometry: &RenderGeometry,
    rgb: &RgbTable,
    airy_maps: Option<&AiryMaps>,
    shards: &ShardSet,
    composition_only: bool,
) -> Result<RenderOutput, PipelineError> {
    let worker_count = config.num_threads.saturating_sub(1).max(1);
    let slots_per_worker = if config.airy_disk_enable {
        config.per_thread_buffer_airy
    } else {
        config.per_thread_buffer
    };

    let res_x = config.camera_res_x;
    let res_y = config.camera_res_y;
    let resize = (config.output_scaling_factor != 1.0 && !composition_only).then(|| {
        lanczos::scaled_resolution(res_x, res_y, config.output_scaling_factor)
    });
    let (out_x, out_y) = resize.unwrap_or((res_x, res_y));

    let sequence = SequenceParams {
        format: config.image_format,
        bits_per_color: config.bits_per_color,
        number_format: config.image_number_format,
        color_profile: config.color_profile,
        limit_mode: config.camera_pixel_limit_mode,
    };

    let shared = PipelineShared {
        config,
        geometry,
        rgb,
        airy_maps,
        shards,
        board: StatusBoard::new(worker_count as usize),
        ring: RingBuffer::new(worker_count as usize, slots_per_worker),
        composition: SharedImage::from_image(init_composition(config, geometry, rgb)),
        blur_buffer: (config.gaussian_blur_radius > 0.0 && !composition_only)
            .then(|| SharedImage::new(res_x, res_y)),
        resize_buffer: resize.map(|(w, h)| SharedImage::new(w, h)),
        output: if composition_only {
            SharedBytes::new(0, 0, sequence.bytes_per_pixel())
        } else {
            SharedBytes::new(out_x, out_y, sequence.bytes_per_pixel())
        },
        sequence,
        blur_kernel: (config.gaussian_blur_radius > 0.0 && !composition_only)
            .then(|| blur::gaussian_kernel(config.gaussian_blur_radius)),
        worker_count,
        composition_only,
    };

    info!(
        workers = worker_count,
        slots_per_worker,
        stars = shards.total_records(),
        res_x,
        res_y,
        "starting render"
    );

    coordinate(&shared)?;

    let PipelineShared {
        composition,
        resize_buffer,
        output,
        ..
    } = shared;
    let image = match resize_buffer {
        Some(resized) => resized.into_image(),
        None => composition.into_image(),
    };
    Ok(RenderOutput {
        bytes: output.into_image(),
        image,
    })
}

/// Coordinator body; spawns workers + aggregator in a scope and drives
/// the status board through every phase.
///
/// The scope joins every spawned thread before returning, so the
/// coordinator must flip the liveness flag on *any* non-success path
/// before the implicit join — workers parked at a phase gate or on a full
/// ring slot only exit once they observe the flag.
fn coordinate(shared: &PipelineShared<'_>) -> Result<(), PipelineError> {
    let result = std::thread::scope(|scope| {
        for thread_id in 1..=shared.worker_count as usize {
            scope.spawn(move || worker_main(shared, thread_id));
        }
        scope.spawn(move || aggregator_main(shared));
        let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            coordinator_main(shared)
        }));
        if !matches!(outcome, Ok(Ok(()))) {
            shared.board.set_coordinator_dead();
        }
        outcome
    });
    match result {
        Ok(outcome) => outcome,
        Err(panic_payload) => std::panic::resume_unwind(panic_payload),
    }
}

fn coordinator_main(shared: &PipelineShared<'_>) -> Result<(), PipelineError> {
    let board = &shared.board;
    let config = shared.config;

    board.wait_for_workers(Phase::InitComplete)?;
    let render_started = Instant::now();
    board.release_workers(Phase::RenderBegin);
    board.wait_for_workers(Phase::RenderComplete)?;
    board.wait_for_participant(board.aggregator_index(), Phase::RenderComplete);
    info!(elapsed = ?render_started.elapsed(), "render phase complete");

    if shared.composition_only {
        // skip straight to shutdown; workers follow the same conditionals
        board.release_workers(Phase::OutputBegin);
        board.wait_for_workers(Phase::OutputComplete)?;
        return Ok(());
    }

    // tone limit runs on the main thread while the workers sit parked
    // between the render and post barriers
    board.release_workers(Phase::PostBegin);
    let stage_started = Instant::now();
    {
        // Safety: render phase is over (barrier above) and no worker
        // touches the composition during the post handshake.
        let pixels = unsafe { shared.composition.rows_mut(0..shared.composition.height()) };
        tone_limit(
            pixels,
            shared.geometry.pixel_limit,
            config.camera_gamma,
            config.camera_pixel_limit_mode == PixelLimitMode::PreserveColor,
        );
    }
    board.wait_for_workers(Phase::PostComplete)?;
    debug!(elapsed = ?stage_started.elapsed(), "tone limit complete");

    if shared.blur_kernel.is_some() {
        let stage_started = Instant::now();
        board.release_workers(Phase::BlurHorizontalBegin);
        blur_horizontal_band(shared, 0);
        board.wait_for_workers(Phase::BlurHorizontalComplete)?;
        board.release_workers(Phase::BlurVerticalBegin);
        blur_vertical_band(shared, 0);
        board.wait_for_workers(Phase::BlurVerticalComplete)?;
        info!(
            radius = config.gaussian_blur_radius,
            elapsed = ?stage_started.elapsed(),
            "gaussian blur complete"
        );
    }

    if shared.resize_buffer.is_some() {
        let stage_started = Instant::now();
        board.release_workers(Phase::ResizePrepBegin);
        resize_prep_band(shared, 0);
        board.wait_for_workers(Phase::ResizePrepComplete)?;
        board.release_workers(Phase::ResizeBegin);
        resize_resample_band(shared, 0);
        board.wait_for_workers(Phase::ResizeComplete)?;
        info!(
            scale = config.output_scaling_factor,
            elapsed = ?stage_started.elapsed(),
            "lanczos resize complete"
        );
    }

    if config.draw_crosshairs || config.draw_grid_lines {
        let current = shared.current_image();
        // Safety: between barriers; only the coordinator runs here.
        let pixels = unsafe { current.rows_mut(0..current.height()) };
        if config.draw_crosshairs {
            overlay::draw_crosshairs(pixels, current.width(), current.height());
        }
        if config.draw_grid_lines {
            overlay::draw_grid_lines(pixels, current.width(), current.height());
        }
    }

    let stage_started = Instant::now();
    board.release_workers(Phase::SequenceBegin);
    sequence_image_band(shared, 0);
    board.wait_for_workers(Phase::SequenceComplete)?;
    debug!(elapsed = ?stage_started.elapsed(), "pixel sequencing complete");

    board.release_workers(Phase::OutputBegin);
    board.wait_for_workers(Phase::OutputComplete)?;
    Ok(())
}

fn worker_main(shared: &PipelineShared<'_>, thread_id: usize) {
    let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
        worker_body(shared, thread_id)
    }));
    match result {
        Ok(Ok(())) => {}
        Ok(Err(PipelineError::CoordinatorGone)) => {
            // the pipeline is already tearing down; nothing to report
        }
        Ok(Err(error)) => {
            warn!(thread_id, %error, "render worker failed");
            shared.board.mark_failed(thread_id);
        }
        Err(_) => {
            warn!(thread_id, "render worker panicked");
            shared.board.mark_failed(thread_id);
        }
    }
}

fn worker_body(shared: &PipelineShared<'_>, thread_id: usize) -> Result<(), PipelineError> {
    let board = &shared.board;
    let worker_index = (thread_id - 1) as u32;

    let capacity = if shared.config.airy_disk_enable {
        shared.config.per_thread_buffer_airy
    } else {
        shared.config.per_thread_buffer
    };
    let mut dedup = DedupCache::new(capacity, shared.composition.pixel_count());
    let mut producer = shared.ring.producer(worker_index as usize);
    let context = SplatContext {
        geometry: shared.geometry,
        rgb: shared.rgb,
        airy_maps: shared.airy_maps,
    };

    board.set(thread_id, Phase::InitComplete);
    board.wait_for_release(thread_id, Phase::RenderBegin)?;
    {
        let mut sink = PixelSink {
            dedup: &mut dedup,
            producer: &mut producer,
            board,
        };
        process_stars(
            &context,
            shared.shards,
            worker_index,
            shared.worker_count,
            &mut sink,
        )?;
    }
    board.set(thread_id, Phase::RenderComplete);

    if shared.composition_only {
        board.wait_for_release(thread_id, Phase::OutputBegin)?;
        board.set(thread_id, Phase::OutputComplete);
        return Ok(());
    }

    board.wait_for_release(thread_id, Phase::PostBegin)?;
    board.set(thread_id, Phase::PostComplete);

    if shared.blur_kernel.is_some() {
        board.wait_for_release(thread_id, Phase::BlurHorizontalBegin)?;
        blur_horizontal_band(shared, thread_id as u32);
        board.set(thread_id, Phase::BlurHorizontalComplete);
        board.wait_for_release(thread_id, Phase::BlurVerticalBegin)?;
        blur_vertical_band(shared, thread_id as u32);
        board.set(thread_id, Phase::BlurVerticalComplete);
    }

    if shared.resize_buffer.is_some() {
        board.wait_for_release(thread_id, Phase::ResizePrepBegin)?;
        resize_prep_band(shared, thread_id as u32);
        board.set(thread_id, Phase::ResizePrepComplete);
        board.wait_for_release(thread_id, Phase::ResizeBegin)?;
        resize_resample_band(shared, thread_id as u32);
        board.set(thread_id, Phase::ResizeComplete);
    }

    board.wait_for_release(thread_id, Phase::SequenceBegin)?;
    sequence_image_band(shared, thread_id as u32);
    board.set(thread_id, Phase::SequenceComplete);

    board.wait_for_release(thread_id, Phase::OutputBegin)?;
    board.set(thread_id, Phase::OutputComplete);
    Ok(())
}

/// Aggregator: the image's sole writer during the render phase. Drains
/// every worker's ring section round-robin until all workers have settled
/// (complete or failed) *before* a pass that then finds every section
/// empty — workers push their final dedup drain before reporting
/// complete, so that pass cannot miss anything.
fn aggregator_main(shared: &PipelineShared<'_>) {
    let board = &shared.board;
    let mut consumer = shared.ring.consumer();
    let mut applied: u64 = 0;
    loop {
        let settled_before_pass = board.workers_settled(Phase::RenderComplete);
        let consumed = consumer.drain_pass(|update| {
            // Safety: single writer by role; no other thread touches the
            // composition until the render barrier.
            unsafe {
                shared
                    .composition
                    .add(update.offset, update.r, update.g, update.b);
            }
        });
        applied += consumed as u64;
        if settled_before_pass && consumed == 0 {
            break;
        }
        if !board.coordinator_alive() {
            break;
        }
        if consumed == 0 {
            std::thread::yield_now();
        }
    }
    debug!(applied, "aggregator drained");
    board.set(board.aggregator_index(), Phase::RenderComplete);
}

/// Zero the composition, or paint the skyglow background into the valid
/// projection region when enabled.
fn init_composition(
    config: &RenderConfig,
    geometry: &RenderGeometry,
    rgb: &RgbTable,
) -> FloatImage {
    let mut image = FloatImage::new(config.camera_res_x, config.camera_res_y);
    if !config.skyglow_enable {
        return image;
    }

    // rgb table entries fold in G-band transmissivity; skyglow is
    // specified as raw per-pixel magnitude, so undo that factor
    let temperature = (config.skyglow_temp + 0.5) as u16;
    let intensity =
        passbands::GBAND_SCALAR * 100.0_f64.powf(-config.skyglow_per_pixel_mag / 5.0);
    let (r, g, b) = rgb.at(temperature.min(32767));
    let glow = PixelRgb::new(intensity * r, intensity * g, intensity * b);

    let frame = &geometry.frame;
    let ppr = frame.pixels_per_radian;
    // rectangle edge tuned to avoid one stray pixel on even rasters
    let edge = 0.4999999;
    let disk_radius_squared = ((FRAC_PI_2 * ppr) + 0.5).powi(2);
    let semimajor_squared = ((PI * ppr) + 0.5).powi(2);

    let width = image.width();
    for y in 0..image.height() {
        let dy = f64::from(y) - frame.half_res_y + 0.5;
        for x in 0..width {
            let dx = f64::from(x) - frame.half_res_x + 0.5;
            let inside = match frame.projection {
                ProjectionKind::Equirectangular => {
                    dx.abs() <= (PI * ppr) + edge && dy.abs() <= (FRAC_PI_2 * ppr) + edge
                }
                ProjectionKind::Spherical => match frame.spherical_orientation {
                    SphericalOrientation::FrontCentered => {
                        let center = (dx * dx) + (dy * dy);
                        let left_dx = dx + (PI * ppr);
                        let right_dx = dx - (PI * ppr);
                        center <= disk_radius_squared
                            || ((left_dx * left_dx) + (dy * dy) <= disk_radius_squared
                                && left_dx >= -edge)
                            || ((right_dx * right_dx) + (dy * dy) <= disk_radius_squared
                                && right_dx <= edge)
                    }
                    SphericalOrientation::SideBySide => {
                        let left_dx = dx + (FRAC_PI_2 * ppr);
                        let right_dx = dx - (FRAC_PI_2 * ppr);
                        (left_dx * left_dx) + (dy * dy) <= disk_radius_squared
                            || (right_dx * right_dx) + (dy * dy) <= disk_radius_squared
                    }
                },
                ProjectionKind::Hammer | ProjectionKind::Mollweide => {
                    (dx * dx / semimajor_squared) + (dy * dy / disk_radius_squared) <= 1.0
                }
            };
            if inside {
                *image.pixel_mut(x, y) = glow;
            }
        }
    }
    image
}

fn blur_horizontal_band(shared: &PipelineShared<'_>, band: u32) {
    let kernel = shared.blur_kernel.as_ref().expect("blur phase needs kernel");
    let blur_buffer = shared.blur_buffer.as_ref().expect("blur phase needs buffer");
    let height = shared.composition.height();
    let rows = row_band(height, shared.band_count(), band);
    // Safety: blur-H phase — composition is read-only everywhere, each
    // band writes only its own rows of the blur buffer.
    unsafe {
        let src = shared.composition.all();
        let dst = blur_buffer.rows_mut(rows.clone());
        blur::horizontal_band(src, shared.composition.width(), kernel, rows, dst);
    }
}

fn blur_vertical_band(shared: &PipelineShared<'_>, band: u32) {
    let kernel = shared.blur_kernel.as_ref().expect("blur phase needs kernel");
    let blur_buffer = shared.blur_buffer.as_ref().expect("blur phase needs buffer");
    let height = shared.composition.height();
    let rows = row_band(height, shared.band_count(), band);
    // Safety: blur-V phase — the blur buffer is read-only everywhere,
    // each band writes only its own rows of the composition.
    unsafe {
        let src = blur_buffer.all();
        let dst = shared.composition.rows_mut(rows.clone());
        blur::vertical_band(
            src,
            shared.composition.width(),
            height,
            kernel,
            rows,
            dst,
        );
    }
}

fn resize_prep_band(shared: &PipelineShared<'_>, band: u32) {
    let rows = row_band(shared.composition.height(), shared.band_count(), band);
    // Safety: resize-prep phase — each band owns its rows of the
    // composition.
    unsafe {
        lanczos::log_prep_band(shared.composition.rows_mut(rows));
    }
}

fn resize_resample_band(shared: &PipelineShared<'_>, band: u32) {
    let resize_buffer = shared
        .resize_buffer
        .as_ref()
        .expect("resize phase needs buffer");
    let rows = row_band(resize_buffer.height(), shared.band_count(), band);
    // Safety: resample phase — composition is read-only everywhere, each
    // band writes only its own rows of the resize buffer.
    unsafe {
        let src = shared.composition.all();
        let dst = resize_buffer.rows_mut(rows.clone());
        lanczos::resample_band(
            src,
            shared.composition.width(),
            shared.composition.height(),
            resize_buffer.width(),
            shared.config.output_scaling_factor,
            shared.config.lanczos_order,
            rows,
            dst,
        );
    }
}

fn sequence_image_band(shared: &PipelineShared<'_>, band: u32) {
    let current = shared.current_image();
    let rows = row_band(current.height(), shared.band_count(), band);
    // Safety: sequence phase — the current image is read-only everywhere,
    // each band writes only its own rows of the output byte stream.
    unsafe {
        let src = current.all();
        let dst = shared.output.rows_mut(rows.clone());
        sequence_band(src, current.width(), &shared.sequence, rows, dst);
    }
}
