//! Barrier-ordering property: no participant observes phase P+1 before
//! the coordinator has observed every participant at phase P.

use core_pipeline::{Phase, StatusBoard};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

#[test]
fn no_worker_passes_a_gate_early() {
    const WORKERS: usize = 8;
    const ROUNDS: usize = 200;

    for _ in 0..ROUNDS {
        let board = Arc::new(StatusBoard::new(WORKERS));
        let arrivals = Arc::new(AtomicUsize::new(0));

        std::thread::scope(|scope| {
            for thread_id in 1..=WORKERS {
                let board = Arc::clone(&board);
                let arrivals = Arc::clone(&arrivals);
                scope.spawn(move || {
                    arrivals.fetch_add(1, Ordering::SeqCst);
                    board.set(thread_id, Phase::InitComplete);
                    board.wait_for_release(thread_id, Phase::RenderBegin).unwrap();
                    // the release may only happen after every worker
                    // arrived at the previous phase
                    assert_eq!(arrivals.load(Ordering::SeqCst), WORKERS);

                    board.set(thread_id, Phase::RenderComplete);
                    board.wait_for_release(thread_id, Phase::PostBegin).unwrap();
                    board.set(thread_id, Phase::PostComplete);
                });
            }

            board.wait_for_workers(Phase::InitComplete).unwrap();
            board.release_workers(Phase::RenderBegin);
            board.wait_for_workers(Phase::RenderComplete).unwrap();
            board.release_workers(Phase::PostBegin);
            board.wait_for_workers(Phase::PostComplete).unwrap();
        });
    }
}

#[test]
fn buffer_writes_are_visible_across_the_barrier() {
    // non-atomic data written before a phase-complete store must be
    // visible after the coordinator's barrier observes it
    use std::cell::UnsafeCell;

    struct Slots(Vec<UnsafeCell<u64>>);
    // Safety: each worker writes exactly one cell before its
    // phase-complete store; the main thread reads only after the barrier.
    unsafe impl Sync for Slots {}

    const WORKERS: usize = 4;
    let board = Arc::new(StatusBoard::new(WORKERS));
    let slots = Slots((0..WORKERS).map(|_| UnsafeCell::new(0)).collect());

    std::thread::scope(|scope| {
        let slots = &slots;
        for index in 0..WORKERS {
            let board = Arc::clone(&board);
            scope.spawn(move || {
                unsafe {
                    *slots.0[index].get() = 0xC0FFEE + index as u64;
                }
                board.set(index + 1, Phase::RenderComplete);
            });
        }
        board.wait_for_workers(Phase::RenderComplete).unwrap();
        for (index, cell) in slots.0.iter().enumerate() {
            let value = unsafe { *cell.get() };
            assert_eq!(value, 0xC0FFEE + index as u64);
        }
    });
}
