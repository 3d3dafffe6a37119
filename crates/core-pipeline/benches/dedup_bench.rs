//! Dedup cache and ring hot-path benchmarks: coalesced submissions versus
//! collision bypass, with a consumer draining on the same thread.

use core_pipeline::dedup::DedupCache;
use core_pipeline::ring::{PixelUpdate, RingBuffer};
use core_pipeline::{Phase, StatusBoard};
use criterion::{Criterion, criterion_group, criterion_main};
use std::hint::black_box;

fn bench_coalesced_submissions(c: &mut Criterion) {
    let ring = RingBuffer::new(1, 100_000);
    let board = StatusBoard::new(1);
    board.set(1, Phase::RenderBegin);

    c.bench_function("dedup_submit_coalesced_64px", |bencher| {
        bencher.iter_batched(
            || (DedupCache::new(10_000, 1 << 20), ring.producer(0)),
            |(mut dedup, mut producer)| {
                // a tight Airy footprint pattern: 64 pixels hit 16 times
                for round in 0..16usize {
                    for pixel in 0..64usize {
                        dedup
                            .submit(
                                black_box(pixel * 7),
                                0.001 * round as f64,
                                0.002,
                                0.003,
                                &mut producer,
                                &board,
                            )
                            .unwrap();
                    }
                }
                dedup.drain(&mut producer, &board).unwrap();
                let mut consumer = ring.consumer();
                while consumer.drain_pass(|update| {
                    black_box(update.offset);
                }) > 0
                {}
            },
            criterion::BatchSize::SmallInput,
        );
    });
}

fn bench_ring_round_trip(c: &mut Criterion) {
    let ring = RingBuffer::new(1, 4096);
    let board = StatusBoard::new(1);

    c.bench_function("ring_push_drain_4096", |bencher| {
        bencher.iter(|| {
            let mut producer = ring.producer(0);
            for offset in 0..4096usize {
                producer
                    .push(
                        PixelUpdate {
                            offset,
                            r: 1.0,
                            g: 0.5,
                            b: 0.25,
                        },
                        &board,
                    )
                    .unwrap();
            }
            let mut consumer = ring.consumer();
            let mut total = 0.0f64;
            consumer.drain_pass(|update| total += update.r);
            black_box(total);
        });
    });
}

criterion_group!(benches, bench_coalesced_submissions, bench_ring_round_trip);
criterion_main!(benches);
