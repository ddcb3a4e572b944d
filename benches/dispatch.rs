//! Latency of small dispatches, the typical per-frame pattern.
//!
//! Measures the round trip of `execute` + `wait_for` and of a small grouped
//! dispatch that uses shared scratch memory.

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use jobdispatch::{Context, JobSystem};

fn bench_execute_round_trip(c: &mut Criterion) {
    let system = JobSystem::with_threads(num_cpus::get()).expect("initialize failed");
    let ctx = Context::new();

    c.bench_function("execute_wait", |b| {
        b.iter(|| {
            system
                .execute(&ctx, |args| {
                    std::hint::black_box(args.job_index);
                })
                .expect("execute failed");
            system.wait_for(&ctx);
        })
    });
}

fn bench_small_dispatch(c: &mut Criterion) {
    let system = JobSystem::with_threads(num_cpus::get()).expect("initialize failed");
    let ctx = Context::new();
    let mut group = c.benchmark_group("small_dispatch");

    for shared_memory_size in [0usize, 256, 4096] {
        group.bench_function(BenchmarkId::new("1024x32", shared_memory_size), |b| {
            b.iter(|| {
                system
                    .dispatch(
                        &ctx,
                        1024,
                        32,
                        |args| {
                            if let Some(shared) = args.shared_memory {
                                shared[0] = shared[0].wrapping_add(args.group_index as u8);
                            }
                        },
                        shared_memory_size,
                    )
                    .expect("dispatch failed");
                system.wait_for(&ctx);
            })
        });
    }

    group.finish();
}

criterion_group!(benches, bench_execute_round_trip, bench_small_dispatch);
criterion_main!(benches);
