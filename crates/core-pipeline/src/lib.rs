//! The parallel star-rendering pipeline.
//!
//! A render streams memory-mapped catalog shards through N worker threads.
//! Each worker unpacks, filters, rotates, and projects its contiguous
//! slice of every shard, expands accepted stars into pixel contributions
//! (optionally through the Airy point-spread maps and the anti-alias
//! spread), coalesces coincident writes in a thread-local dedup cache, and
//! hands finalized pixels to a dedicated aggregator over a lock-free
//! dual-status ring buffer. The aggregator is the composition buffer's
//! only writer. A status-array barrier then walks the same worker pool
//! through the post-process chain (tone limit, separable Gaussian blur,
//! log-space Lanczos resize, overlays) and the byte sequencer.
//!
//! Ordering guarantees: none between stars — flux is accumulated
//! additively in whatever order slots drain, so bit-identical output
//! across different worker counts is out of scope (floating-point
//! addition does not associate). Within one star, every footprint pixel
//! is submitted before the next star. Between stages, the barrier gives
//! strict happens-before.

use thiserror::Error;

pub mod dedup;
pub mod driver;
pub mod phase;
pub mod ring;
pub mod splat;
pub mod state;
pub mod worker;

pub use driver::{RenderOutput, render_composition, run_pipeline};
pub use phase::{PHASE_FAILED, Phase, StatusBoard};
pub use ring::{PixelUpdate, RingBuffer};
pub use state::{RenderGeometry, airy_params, rgb_params};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("render worker {thread} failed")]
    WorkerFailed { thread: usize },
    #[error("coordinator terminated while workers were running")]
    CoordinatorGone,
    #[error("camera_projection {0} is not a valid projection index")]
    BadProjection(u8),
}
