//! Optional counters describing what the pool has done.
//!
//! Compiled only with the `metrics` feature so the hot path stays free of
//! extra atomics by default.

#[cfg(feature = "metrics")]
use std::sync::atomic::{AtomicU64, Ordering};
#[cfg(feature = "metrics")]
use std::time::Instant;

/// Performance metrics for one initialized pool.
#[cfg(feature = "metrics")]
#[derive(Debug)]
pub struct Metrics {
    /// Groups accepted by `dispatch`/`execute`.
    pub groups_dispatched: AtomicU64,
    /// Dispatches refused by the pending-group limit.
    pub dispatches_rejected: AtomicU64,
    /// Groups executed by worker threads.
    pub worker_groups_executed: AtomicU64,
    /// Groups executed by threads blocked in `wait_for`.
    pub caller_groups_executed: AtomicU64,
    /// Individual task invocations covered by executed groups.
    pub jobs_executed: AtomicU64,
    /// Groups that ended in a task panic.
    pub task_panics: AtomicU64,
    /// Time when metrics collection started.
    pub start_time: Instant,
}

#[cfg(feature = "metrics")]
impl Metrics {
    pub fn new() -> Self {
        Self {
            groups_dispatched: AtomicU64::new(0),
            dispatches_rejected: AtomicU64::new(0),
            worker_groups_executed: AtomicU64::new(0),
            caller_groups_executed: AtomicU64::new(0),
            jobs_executed: AtomicU64::new(0),
            task_panics: AtomicU64::new(0),
            start_time: Instant::now(),
        }
    }

    pub(crate) fn record_group(&self, jobs: u32, on_worker: bool, completed: bool) {
        if on_worker {
            self.worker_groups_executed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.caller_groups_executed.fetch_add(1, Ordering::Relaxed);
        }
        self.jobs_executed.fetch_add(jobs as u64, Ordering::Relaxed);
        if !completed {
            self.task_panics.fetch_add(1, Ordering::Relaxed);
        }
    }

    /// Returns a snapshot of current metrics values.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            groups_dispatched: self.groups_dispatched.load(Ordering::Relaxed),
            dispatches_rejected: self.dispatches_rejected.load(Ordering::Relaxed),
            worker_groups_executed: self.worker_groups_executed.load(Ordering::Relaxed),
            caller_groups_executed: self.caller_groups_executed.load(Ordering::Relaxed),
            jobs_executed: self.jobs_executed.load(Ordering::Relaxed),
            task_panics: self.task_panics.load(Ordering::Relaxed),
            elapsed_seconds: self.start_time.elapsed().as_secs_f64(),
        }
    }
}

#[cfg(feature = "metrics")]
impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of metrics at a point in time.
#[cfg(feature = "metrics")]
#[derive(Debug, Clone)]
pub struct MetricsSnapshot {
    pub groups_dispatched: u64,
    pub dispatches_rejected: u64,
    pub worker_groups_executed: u64,
    pub caller_groups_executed: u64,
    pub jobs_executed: u64,
    pub task_panics: u64,
    pub elapsed_seconds: f64,
}

#[cfg(feature = "metrics")]
impl MetricsSnapshot {
    /// Total groups executed, by workers and waiting callers alike.
    pub fn groups_executed(&self) -> u64 {
        self.worker_groups_executed + self.caller_groups_executed
    }

    /// Approximates the number of groups still queued or running.
    pub fn groups_in_flight(&self) -> i64 {
        self.groups_dispatched as i64 - self.groups_executed() as i64
    }

    /// Calculates task invocations per second.
    pub fn jobs_per_second(&self) -> f64 {
        if self.elapsed_seconds > 0.0 {
            self.jobs_executed as f64 / self.elapsed_seconds
        } else {
            0.0
        }
    }
}
