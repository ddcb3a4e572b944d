//! High-level job system interface.
//!
//! [`JobSystem`] owns the worker pool and is the entry point for dispatching
//! work and synchronizing on it. It has an explicit lifecycle: it is created
//! idle, started with [`JobSystem::initialize`] and stopped with
//! [`JobSystem::shutdown`] (or when dropped).

use crate::PinningStrategy;
use crate::context::Context;
use crate::error::JobError;
use crate::job::{Job, JobArgs, Task, dispatch_group_count, group_range, into_task};
#[cfg(feature = "metrics")]
use crate::metrics::MetricsSnapshot;
use crate::scratch::ScratchBuffer;
use crate::worker::WorkerPool;
use serde::{Deserialize, Serialize};
use std::thread;
use std::time::Instant;

/// Configuration for the worker pool.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Worker count requested by [`JobSystem::start`]. Default: 4.
    pub max_threads: usize,
    /// Overrides the detected number of hardware threads.
    pub hardware_threads: Option<usize>,
    /// How worker threads are pinned to cores. Default: no pinning.
    pub pinning: PinningStrategy,
    /// Worker threads are named `"{thread_name_prefix}::{index}"`.
    pub thread_name_prefix: String,
    /// Maximum number of groups that may sit in the queues unstarted.
    /// `None` leaves the queues unbounded.
    pub max_pending_groups: Option<usize>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_threads: 4,
            hardware_threads: None,
            pinning: PinningStrategy::None,
            thread_name_prefix: "jobdispatch::worker".to_string(),
            max_pending_groups: None,
        }
    }
}

impl PoolConfig {
    /// Worker count for a requested maximum: at least one, and at most one
    /// less than the hardware thread count so the calling thread keeps a core.
    pub fn worker_count(&self, requested: usize) -> usize {
        let hardware = self.hardware_threads.unwrap_or_else(num_cpus::get);
        requested.clamp(1, hardware.saturating_sub(1).max(1))
    }
}

/// The job system: a fixed pool of worker threads fed by per-worker queues.
pub struct JobSystem {
    config: PoolConfig,
    pool: Option<WorkerPool>,
}

impl JobSystem {
    /// Creates an idle job system. Call [`initialize`](Self::initialize)
    /// before dispatching.
    pub fn new(config: PoolConfig) -> Self {
        JobSystem { config, pool: None }
    }

    /// Creates and initializes a job system with default configuration.
    ///
    /// # Example
    ///
    /// ```
    /// use jobdispatch::JobSystem;
    ///
    /// let mut jobs = JobSystem::with_threads(4).unwrap();
    /// assert!(jobs.ready());
    /// jobs.shutdown().unwrap();
    /// ```
    pub fn with_threads(max_thread_count: usize) -> Result<Self, JobError> {
        let mut job_system = JobSystem::new(PoolConfig::default());
        job_system.initialize(max_thread_count)?;
        Ok(job_system)
    }

    /// Starts the worker threads using the configured `max_threads`.
    pub fn start(&mut self) -> Result<(), JobError> {
        self.initialize(self.config.max_threads)
    }

    /// Starts the worker threads. Does nothing if already initialized.
    ///
    /// The worker count is `max_thread_count` clamped to
    /// `[1, hardware_threads - 1]`.
    pub fn initialize(&mut self, max_thread_count: usize) -> Result<(), JobError> {
        if self.pool.is_some() {
            return Ok(());
        }

        let timer = Instant::now();
        let num_threads = self.config.worker_count(max_thread_count);
        let pool = WorkerPool::new(
            num_threads,
            &self.config.thread_name_prefix,
            self.config.pinning,
        )?;
        self.pool = Some(pool);

        tracing::info!(
            cores = self.config.hardware_threads.unwrap_or_else(num_cpus::get),
            threads = num_threads,
            elapsed_us = timer.elapsed().as_micros() as u64,
            "job system initialized"
        );
        Ok(())
    }

    /// Returns true while the worker threads are running.
    pub fn ready(&self) -> bool {
        self.pool.is_some()
    }

    /// Returns the number of worker threads, or 0 when not initialized.
    pub fn get_thread_count(&self) -> usize {
        self.pool.as_ref().map_or(0, WorkerPool::size)
    }

    pub fn config(&self) -> &PoolConfig {
        &self.config
    }

    /// Runs `task` once, asynchronously, with `job_index == 0`.
    ///
    /// Equivalent to `dispatch(ctx, 1, 1, task, 0)`.
    pub fn execute<F>(&self, ctx: &Context, task: F) -> Result<(), JobError>
    where
        F: Fn(JobArgs<'_>) + Send + Sync + 'static,
    {
        self.dispatch(ctx, 1, 1, task, 0).map(|_| ())
    }

    /// Splits `job_count` invocations of `task` into groups of `group_size`
    /// and spreads the groups over the worker queues.
    ///
    /// Invocations inside one group run serially on one thread and share
    /// `shared_memory_size` bytes of scratch memory. `ctx` is busy from the
    /// moment this returns until every group has finished.
    ///
    /// Returns the number of groups enqueued. A `job_count` or `group_size`
    /// of zero is a no-op that returns `Ok(0)`.
    ///
    /// # Example
    ///
    /// ```
    /// use jobdispatch::{Context, JobSystem};
    /// use std::sync::Arc;
    /// use std::sync::atomic::{AtomicU32, Ordering};
    ///
    /// let mut jobs = JobSystem::with_threads(2).unwrap();
    /// let ctx = Context::new();
    /// let sum = Arc::new(AtomicU32::new(0));
    /// let sum_clone = sum.clone();
    ///
    /// let groups = jobs
    ///     .dispatch(&ctx, 10, 3, move |args| {
    ///         sum_clone.fetch_add(args.job_index, Ordering::Relaxed);
    ///     }, 0)
    ///     .unwrap();
    /// assert_eq!(groups, 4);
    ///
    /// jobs.wait_for(&ctx);
    /// assert_eq!(sum.load(Ordering::Relaxed), 45);
    /// jobs.shutdown().unwrap();
    /// ```
    pub fn dispatch<F>(
        &self,
        ctx: &Context,
        job_count: u32,
        group_size: u32,
        task: F,
        shared_memory_size: usize,
    ) -> Result<u32, JobError>
    where
        F: Fn(JobArgs<'_>) + Send + Sync + 'static,
    {
        let pool = self.pool.as_ref().ok_or(JobError::NotInitialized)?;

        if job_count == 0 || group_size == 0 {
            tracing::debug!(job_count, group_size, "empty dispatch ignored");
            return Ok(0);
        }

        let group_count = dispatch_group_count(job_count, group_size);
        let shared = pool.shared();
        if let Err(err) = shared.reserve(group_count as usize, self.config.max_pending_groups) {
            tracing::debug!(error = %err, "dispatch rejected");
            return Err(err);
        }

        // Publish the whole group count before the first push so the counter
        // cannot touch zero while later groups are still being enqueued.
        if let Err(err) = ctx.add(group_count) {
            shared.release(group_count as usize);
            tracing::debug!(error = %err, "dispatch rejected");
            return Err(err);
        }

        let task: Task = into_task(task);
        for group_id in 0..group_count {
            let range = group_range(group_id, group_size, job_count);
            shared.push(Job::new(
                task.clone(),
                ctx.clone(),
                group_id,
                range.start,
                range.end,
                shared_memory_size,
            ));
        }

        #[cfg(feature = "metrics")]
        shared
            .metrics
            .groups_dispatched
            .fetch_add(group_count as u64, std::sync::atomic::Ordering::Relaxed);

        shared.wake_all();
        Ok(group_count)
    }

    /// Returns true while `ctx` has outstanding groups.
    pub fn is_busy(&self, ctx: &Context) -> bool {
        ctx.is_busy()
    }

    /// Blocks until `ctx` is idle.
    ///
    /// The calling thread first runs one scan pass over the queues itself,
    /// picking up groups no worker has started yet. Whatever remains is
    /// already executing on other threads, so it then yields until the
    /// counter drops to zero.
    pub fn wait_for(&self, ctx: &Context) {
        if !ctx.is_busy() {
            return;
        }

        if let Some(pool) = &self.pool {
            let shared = pool.shared();
            shared.wake_all();

            let mut scratch = ScratchBuffer::new();
            let helped = shared.work(shared.next_queue_index(), &mut scratch, false);
            if helped > 0 {
                tracing::trace!(groups = helped, "caller executed groups while waiting");
            }
        }

        while ctx.is_busy() {
            thread::yield_now();
        }
    }

    /// Snapshot of the pool's metrics, if initialized.
    #[cfg(feature = "metrics")]
    pub fn metrics(&self) -> Option<MetricsSnapshot> {
        self.pool.as_ref().map(|pool| pool.shared().metrics.snapshot())
    }

    /// Stops the worker threads after every queued group has run.
    ///
    /// Safe to call when never initialized and safe to call repeatedly. The
    /// system may be initialized again afterwards.
    pub fn shutdown(&mut self) -> Result<(), JobError> {
        let Some(pool) = self.pool.take() else {
            return Ok(());
        };

        let threads = pool.size();
        pool.shutdown()?;
        tracing::info!(threads, "job system shut down");
        Ok(())
    }
}

impl Default for JobSystem {
    fn default() -> Self {
        JobSystem::new(PoolConfig::default())
    }
}

impl Drop for JobSystem {
    fn drop(&mut self) {
        if let Err(err) = self.shutdown() {
            tracing::error!(error = %err, "job system shutdown failed during drop");
        }
    }
}
