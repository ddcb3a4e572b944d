use jobdispatch::{Context, JobSystem};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::time::Instant;
use tracing_subscriber::EnvFilter;

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    println!("jobdispatch - Grouped Parallel Job Dispatch\n");

    let mut job_system = JobSystem::default();
    if let Err(e) = job_system.start() {
        eprintln!("Failed to start job system: {}", e);
        return;
    }
    println!(
        "Initialized job system with {} worker threads (requested {})\n",
        job_system.get_thread_count(),
        job_system.config().max_threads
    );

    // Example 1: Single job
    println!("Example 1: Single job execution");
    let ctx = Context::new();
    if let Err(e) = job_system.execute(&ctx, |_| {
        println!("  Hello from a job!");
    }) {
        eprintln!("  execute failed: {}", e);
    }
    job_system.wait_for(&ctx);
    println!("  Job completed\n");

    // Example 2: Grouped dispatch
    println!("Example 2: Parallel sum over 1,000,000 indices in groups of 4096");
    let sum = Arc::new(AtomicU64::new(0));
    let sum_clone = sum.clone();
    let start = Instant::now();
    let groups = match job_system.dispatch(
        &ctx,
        1_000_000,
        4096,
        move |args| {
            sum_clone.fetch_add(args.job_index as u64, Ordering::Relaxed);
        },
        0,
    ) {
        Ok(groups) => groups,
        Err(e) => {
            eprintln!("  dispatch failed: {}", e);
            0
        }
    };
    job_system.wait_for(&ctx);
    let expected: u64 = (0..1_000_000u64).sum();
    println!("  {} groups finished in {:?}", groups, start.elapsed());
    println!(
        "  Sum result: {} (expected: {})\n",
        sum.load(Ordering::Relaxed),
        expected
    );

    // Example 3: Scratch memory shared within a group
    println!("Example 3: Per-group partial sums in scratch memory");
    let total = Arc::new(AtomicU64::new(0));
    let total_clone = total.clone();
    if let Err(e) = job_system.dispatch(
        &ctx,
        10_000,
        256,
        move |args| {
            let Some(shared) = args.shared_memory else {
                return;
            };
            let mut partial = if args.is_first_job_in_group {
                0
            } else {
                let mut bytes = [0u8; 8];
                bytes.copy_from_slice(&shared[..8]);
                u64::from_ne_bytes(bytes)
            };
            partial += args.job_index as u64;
            shared[..8].copy_from_slice(&partial.to_ne_bytes());
            if args.is_last_job_in_group {
                total_clone.fetch_add(partial, Ordering::Relaxed);
            }
        },
        8,
    ) {
        eprintln!("  dispatch failed: {}", e);
    }
    job_system.wait_for(&ctx);
    println!(
        "  Total of group partials: {} (expected: {})\n",
        total.load(Ordering::Relaxed),
        (0..10_000u64).sum::<u64>()
    );

    // Example 4: Panics are captured on the context
    println!("Example 4: Panic capture");
    let ran = Arc::new(AtomicUsize::new(0));
    let ran_clone = ran.clone();
    if let Err(e) = job_system.dispatch(
        &ctx,
        8,
        2,
        move |args| {
            ran_clone.fetch_add(1, Ordering::Relaxed);
            if args.job_index == 5 {
                panic!("job 5 failed");
            }
        },
        0,
    ) {
        eprintln!("  dispatch failed: {}", e);
    }
    job_system.wait_for(&ctx);
    for failure in ctx.take_failures() {
        println!(
            "  group {} job {} panicked: {}",
            failure.group_id, failure.job_index, failure.message
        );
    }
    println!("  {} invocations ran\n", ran.load(Ordering::Relaxed));

    // Example 5: Throughput
    println!("Example 5: High-throughput benchmark");
    let num_jobs = 10_000_000u32;
    let start = Instant::now();
    if let Err(e) = job_system.dispatch(
        &ctx,
        num_jobs,
        1024,
        |args| {
            std::hint::black_box(args.job_index.wrapping_mul(31));
        },
        0,
    ) {
        eprintln!("  dispatch failed: {}", e);
    }
    job_system.wait_for(&ctx);
    let duration = start.elapsed();
    println!("  Executed {} jobs in {:?}", num_jobs, duration);
    println!(
        "  Throughput: {:.2} jobs/second\n",
        num_jobs as f64 / duration.as_secs_f64()
    );

    println!("Shutting down job system...");
    match job_system.shutdown() {
        Ok(_) => println!("Done!"),
        Err(e) => eprintln!("Shutdown error: {}", e),
    }
}
