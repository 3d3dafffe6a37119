//! The pipeline's phase gate: one status cell per participant and a
//! coordinator-driven barrier between every stage.
//!
//! Phase codes are a totally ordered enumeration in execution order. The
//! protocol alternates writers on each worker cell, never concurrently:
//!
//! 1. a worker finishing stage P stores `P_COMPLETE` in its own cell and
//!    spins until the cell reaches the next `*_BEGIN` code;
//! 2. the coordinator spins until every worker cell is at least
//!    `P_COMPLETE`, then stores the next `*_BEGIN` code into every cell.
//!
//! Stores use release ordering and loads acquire, so every buffer write
//! from stage P happens-before any stage P+1 read — the barrier invariant
//! the whole post-process chain leans on.
//!
//! Phases are long (millions to billions of operations), so both sides
//! busy-wait; a blocking primitive would buy nothing and cost latency at
//! every gate. A worker that fails stores [`PHASE_FAILED`]; the
//! coordinator checks for it at every barrier. Workers parked in a spin
//! loop also watch the coordinator's liveness flag so a dying coordinator
//! never strands them.

use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

use crate::PipelineError;

/// Ordered phase codes. Gaps leave room for the paired begin/complete
/// codes to stay grouped by stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[repr(i32)]
pub enum Phase {
    Boot = 0,
    InitComplete = 11,
    RenderBegin = 20,
    RenderComplete = 21,
    PostBegin = 30,
    PostComplete = 31,
    BlurHorizontalBegin = 40,
    BlurHorizontalComplete = 41,
    BlurVerticalBegin = 42,
    BlurVerticalComplete = 43,
    ResizePrepBegin = 50,
    ResizePrepComplete = 51,
    ResizeBegin = 52,
    ResizeComplete = 53,
    SequenceBegin = 60,
    SequenceComplete = 61,
    OutputBegin = 70,
    OutputComplete = 71,
}

/// Sentinel stored by a worker that hit an error; compares below every
/// real phase.
pub const PHASE_FAILED: i32 = -1;

/// One status cell per participant: index 0 is the coordinator, 1..=N the
/// workers, N+1 the aggregator.
pub struct StatusBoard {
    cells: Vec<AtomicI32>,
    coordinator_alive: AtomicBool,
    worker_count: usize,
}

impl StatusBoard {
    pub fn new(worker_count: usize) -> StatusBoard {
        StatusBoard {
            cells: (0..worker_count + 2).map(|_| AtomicI32::new(0)).collect(),
            coordinator_alive: AtomicBool::new(true),
            worker_count,
        }
    }

    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Aggregator's participant index.
    pub fn aggregator_index(&self) -> usize {
        self.worker_count + 1
    }

    #[inline]
    pub fn set(&self, participant: usize, phase: Phase) {
        self.cells[participant].store(phase as i32, Ordering::Release);
    }

    #[inline]
    pub fn get(&self, participant: usize) -> i32 {
        self.cells[participant].load(Ordering::Acquire)
    }

    pub fn mark_failed(&self, participant: usize) {
        self.cells[participant].store(PHASE_FAILED, Ordering::Release);
    }

    #[inline]
    pub fn coordinator_alive(&self) -> bool {
        self.coordinator_alive.load(Ordering::Acquire)
    }

    /// Flag every spinning participant to bail out; set on any coordinator
    /// exit path, normal or not.
    pub fn set_coordinator_dead(&self) {
        self.coordinator_alive.store(false, Ordering::Release);
    }

    /// Worker side: spin on our own cell until the coordinator has
    /// released us into `phase` (or further).
    pub fn wait_for_release(&self, participant: usize, phase: Phase) -> Result<(), PipelineError> {
        let mut idle: u32 = 0;
        loop {
            if self.get(participant) >= phase as i32 {
                return Ok(());
            }
            idle += 1;
            if idle > 10_000 {
                idle = 0;
                if !self.coordinator_alive() {
                    return Err(PipelineError::CoordinatorGone);
                }
                std::thread::yield_now();
            } else {
                std::hint::spin_loop();
            }
        }
    }

    /// Coordinator side: spin until every worker has reached `phase`.
    /// A failed worker surfaces as an error instead.
    pub fn wait_for_workers(&self, phase: Phase) -> Result<(), PipelineError> {
        loop {
            let mut all_reached = true;
            for worker in 1..=self.worker_count {
                let status = self.get(worker);
                if status == PHASE_FAILED {
                    return Err(PipelineError::WorkerFailed { thread: worker });
                }
                if status < phase as i32 {
                    all_reached = false;
                    break;
                }
            }
            if all_reached {
                return Ok(());
            }
            std::hint::spin_loop();
            std::thread::yield_now();
        }
    }

    /// Coordinator side: spin until one participant (the aggregator)
    /// reaches `phase`.
    pub fn wait_for_participant(&self, participant: usize, phase: Phase) {
        while self.get(participant) < phase as i32 {
            std::hint::spin_loop();
            std::thread::yield_now();
        }
    }

    /// Coordinator side: move every worker into `phase`.
    pub fn release_workers(&self, phase: Phase) {
        for worker in 1..=self.worker_count {
            self.set(worker, phase);
        }
    }

    /// Non-blocking: have all workers either reached `phase` or failed?
    /// The aggregator's termination check.
    pub fn workers_settled(&self, phase: Phase) -> bool {
        (1..=self.worker_count)
            .all(|worker| matches!(self.get(worker), status if status >= phase as i32 || status == PHASE_FAILED))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn phase_codes_are_strictly_increasing() {
        let order = [
            Phase::Boot,
            Phase::InitComplete,
            Phase::RenderBegin,
            Phase::RenderComplete,
            Phase::PostBegin,
            Phase::PostComplete,
            Phase::BlurHorizontalBegin,
            Phase::BlurHorizontalComplete,
            Phase::BlurVerticalBegin,
            Phase::BlurVerticalComplete,
            Phase::ResizePrepBegin,
            Phase::ResizePrepComplete,
            Phase::ResizeBegin,
            Phase::ResizeComplete,
            Phase::SequenceBegin,
            Phase::SequenceComplete,
            Phase::OutputBegin,
            Phase::OutputComplete,
        ];
        for pair in order.windows(2) {
            assert!((pair[0] as i32) < (pair[1] as i32));
        }
        assert!(PHASE_FAILED < Phase::Boot as i32);
    }

    #[test]
    fn coordinator_waits_for_all_workers() {
        let board = Arc::new(StatusBoard::new(3));
        let waiter = {
            let board = Arc::clone(&board);
            std::thread::spawn(move || board.wait_for_workers(Phase::RenderComplete))
        };
        for worker in 1..=3 {
            assert!(!waiter.is_finished());
            board.set(worker, Phase::RenderComplete);
        }
        waiter.join().unwrap().unwrap();
    }

    #[test]
    fn failed_worker_surfaces_at_the_barrier() {
        let board = StatusBoard::new(2);
        board.set(1, Phase::RenderComplete);
        board.mark_failed(2);
        match board.wait_for_workers(Phase::RenderComplete) {
            Err(PipelineError::WorkerFailed { thread }) => assert_eq!(thread, 2),
            other => panic!("expected WorkerFailed, got {other:?}"),
        }
    }

    #[test]
    fn dead_coordinator_releases_spinning_workers() {
        let board = Arc::new(StatusBoard::new(1));
        let worker = {
            let board = Arc::clone(&board);
            std::thread::spawn(move || board.wait_for_release(1, Phase::RenderBegin))
        };
        board.set_coordinator_dead();
        assert!(matches!(
            worker.join().unwrap(),
            Err(PipelineError::CoordinatorGone)
        ));
    }

    #[test]
    fn workers_settled_accepts_failures() {
        let board = StatusBoard::new(2);
        board.set(1, Phase::RenderComplete);
        assert!(!board.workers_settled(Phase::RenderComplete));
        board.mark_failed(2);
        assert!(board.workers_settled(Phase::RenderComplete));
    }
}
