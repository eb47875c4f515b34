//! # Sync Primitive Benchmark
//!
//! Measures the per-frame cost of the primitives the engine leans on:
//! 1. Queue push/pop round trips (pool task distribution)
//! 2. Double buffer write + swap + read (one frame of result publication)
//! 3. Atomic state reads under CAS churn

#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pitlane_core::{atomic_repr, AtomicState, DoubleBuffer, TaskQueue};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[repr(u8)]
enum Phase {
    Idle,
    Busy,
}

atomic_repr!(Phase { Idle, Busy });

fn bench_queue(c: &mut Criterion) {
    let mut group = c.benchmark_group("task_queue");

    for batch in [16_usize, 256, 4096] {
        let queue = TaskQueue::new();
        group.bench_with_input(BenchmarkId::new("push_then_drain", batch), &batch, |b, &n| {
            b.iter(|| {
                for i in 0..n {
                    queue.push(black_box(i));
                }
                while let Some(item) = queue.try_pop() {
                    black_box(item);
                }
            });
        });
    }

    group.finish();
}

fn bench_double_buffer(c: &mut Criterion) {
    let mut group = c.benchmark_group("double_buffer_frame");

    for width in [64_usize, 4096, 65_536] {
        let buffer = DoubleBuffer::new(vec![0.0_f32; width]);
        group.bench_with_input(BenchmarkId::new("write_swap_read", width), &width, |b, _| {
            let mut frame = 0.0_f32;
            b.iter(|| {
                frame += 1.0;
                buffer.modify_back(|slot| slot.iter_mut().for_each(|v| *v = frame));
                buffer.swap();
                black_box(buffer.front()[0]);
            });
        });
    }

    group.finish();
}

fn bench_atomic_state(c: &mut Criterion) {
    let state = AtomicState::new(Phase::Idle);

    c.bench_function("atomic_state_cas_toggle", |b| {
        b.iter(|| {
            if !state.compare_and_swap(Phase::Idle, Phase::Busy) {
                state.set(Phase::Idle);
            }
            black_box(state.get());
        });
    });
}

criterion_group!(benches, bench_queue, bench_double_buffer, bench_atomic_state);
criterion_main!(benches);
