//! Worker thread implementation.
//!
//! Every worker owns one job queue. A worker drains its own queue first and
//! then walks the remaining queues in order, wrapping around, draining each
//! before moving on. When a full pass finds nothing it sleeps on the pool's
//! wake condition until new work is published or the pool shuts down.

use crate::PinningStrategy;
use crate::error::JobError;
use crate::job::Job;
#[cfg(feature = "metrics")]
use crate::metrics::Metrics;
use crate::queue::JobQueue;
use crate::scratch::ScratchBuffer;
use crossbeam::utils::CachePadded;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Condvar, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

/// State shared between the pool handle, its workers and waiting callers.
pub(crate) struct Shared {
    queues: Box<[JobQueue]>,
    /// Round-robin cursor used to place new groups and pick scan starts.
    next_queue: CachePadded<AtomicUsize>,
    /// Groups reserved by dispatch and not yet popped by anyone.
    pending: CachePadded<AtomicUsize>,
    alive: AtomicBool,
    wake_lock: Mutex<()>,
    wake_condition: Condvar,
    #[cfg(feature = "metrics")]
    pub(crate) metrics: Metrics,
}

impl Shared {
    fn new(num_threads: usize) -> Self {
        Shared {
            queues: (0..num_threads).map(|_| JobQueue::new()).collect(),
            next_queue: CachePadded::new(AtomicUsize::new(0)),
            pending: CachePadded::new(AtomicUsize::new(0)),
            alive: AtomicBool::new(true),
            wake_lock: Mutex::new(()),
            wake_condition: Condvar::new(),
            #[cfg(feature = "metrics")]
            metrics: Metrics::new(),
        }
    }

    pub(crate) fn thread_count(&self) -> usize {
        self.queues.len()
    }

    /// Advances the round-robin cursor and maps it onto a queue index.
    pub(crate) fn next_queue_index(&self) -> usize {
        self.next_queue.fetch_add(1, Ordering::Relaxed) % self.queues.len()
    }

    /// Reserves room for `groups` new groups, honouring an optional limit on
    /// groups queued but not yet started. Either all groups are reserved or
    /// none are.
    pub(crate) fn reserve(&self, groups: usize, limit: Option<usize>) -> Result<(), JobError> {
        let Some(limit) = limit else {
            self.pending.fetch_add(groups, Ordering::SeqCst);
            return Ok(());
        };

        self.pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |pending| {
                pending.checked_add(groups).filter(|&total| total <= limit)
            })
            .map(|_| ())
            .map_err(|pending| {
                #[cfg(feature = "metrics")]
                self.metrics
                    .dispatches_rejected
                    .fetch_add(1, Ordering::Relaxed);
                JobError::Rejected {
                    requested: groups,
                    pending,
                    limit,
                }
            })
    }

    /// Returns a reservation that will not be pushed.
    pub(crate) fn release(&self, groups: usize) {
        self.pending.fetch_sub(groups, Ordering::SeqCst);
    }

    /// Pushes a reserved group onto the next queue in round-robin order.
    pub(crate) fn push(&self, job: Job) {
        self.queues[self.next_queue_index()].push(job);
    }

    fn pop_from(&self, index: usize) -> Option<Job> {
        let job = self.queues[index].pop()?;
        self.pending.fetch_sub(1, Ordering::SeqCst);
        Some(job)
    }

    fn has_pending(&self) -> bool {
        self.pending.load(Ordering::SeqCst) > 0
    }

    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }

    /// Wakes every sleeping worker.
    ///
    /// Notifying under the wake lock pairs with the predicate check in
    /// the worker loop, so a worker can never miss work published just before
    /// it went to sleep.
    pub(crate) fn wake_all(&self) {
        let _guard = self.wake_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.wake_condition.notify_all();
    }

    fn stop(&self) {
        let _guard = self.wake_lock.lock().unwrap_or_else(PoisonError::into_inner);
        self.alive.store(false, Ordering::SeqCst);
        self.wake_condition.notify_all();
    }

    /// Runs one scan pass starting at queue `start`, draining each queue
    /// before moving to the next. Returns the number of groups executed.
    pub(crate) fn work(&self, start: usize, scratch: &mut ScratchBuffer, on_worker: bool) -> usize {
        let num_queues = self.queues.len();
        let mut executed = 0;

        for offset in 0..num_queues {
            let index = (start + offset) % num_queues;
            while let Some(job) = self.pop_from(index) {
                let group_id = job.group_id();
                let jobs = job.range().len();
                tracing::trace!(
                    queue = index,
                    group_id,
                    jobs,
                    shared_memory = job.shared_memory_size(),
                    "executing group"
                );

                let completed = job.execute(scratch);
                executed += 1;

                #[cfg(feature = "metrics")]
                self.metrics.record_group(jobs as u32, on_worker, completed);
                #[cfg(not(feature = "metrics"))]
                let _ = (on_worker, completed);
            }
        }

        executed
    }
}

/// A worker thread that executes groups from the shared queues.
pub struct Worker {
    id: usize,
    handle: Option<JoinHandle<()>>,
}

impl Worker {
    fn spawn(
        id: usize,
        name: String,
        shared: Arc<Shared>,
        pinning: PinningStrategy,
    ) -> std::io::Result<Self> {
        let handle = thread::Builder::new().name(name).spawn(move || {
            pin_current_thread(id, pinning);
            Worker::run_loop(id, &shared);
        })?;

        Ok(Worker {
            id,
            handle: Some(handle),
        })
    }

    /// Main execution loop: scan, execute, sleep.
    ///
    /// The alive flag is only consulted once a scan pass comes up empty, so a
    /// group that has started always runs to completion and everything queued
    /// before shutdown is drained.
    fn run_loop(id: usize, shared: &Shared) {
        tracing::debug!(worker = id, "worker started");
        let mut scratch = ScratchBuffer::new();

        loop {
            if shared.work(id, &mut scratch, true) > 0 {
                continue;
            }

            let guard = shared
                .wake_lock
                .lock()
                .unwrap_or_else(PoisonError::into_inner);
            let _guard = shared
                .wake_condition
                .wait_while(guard, |_| shared.is_alive() && !shared.has_pending())
                .unwrap_or_else(PoisonError::into_inner);

            if !shared.is_alive() && !shared.has_pending() {
                break;
            }
        }

        tracing::debug!(worker = id, scratch_bytes = scratch.capacity(), "worker exiting");
    }

    /// Returns the worker's ID.
    pub fn id(&self) -> usize {
        self.id
    }

    /// Waits for the worker thread to finish.
    pub fn join(mut self) -> thread::Result<()> {
        if let Some(handle) = self.handle.take() {
            handle.join()
        } else {
            Ok(())
        }
    }
}

fn pin_current_thread(id: usize, pinning: PinningStrategy) {
    let target = match pinning {
        PinningStrategy::None => return,
        PinningStrategy::Linear => id,
        PinningStrategy::AvoidSMT => id * 2,
    };

    let Some(core_ids) = core_affinity::get_core_ids() else {
        tracing::warn!(worker = id, "unable to query core ids, worker left unpinned");
        return;
    };

    match core_ids.get(target) {
        Some(&core) => {
            if !core_affinity::set_for_current(core) {
                tracing::warn!(worker = id, core = target, "failed to pin worker");
            }
        }
        None => {
            tracing::warn!(
                worker = id,
                core = target,
                available = core_ids.len(),
                "core out of range, worker left unpinned"
            );
        }
    }
}

/// The set of running workers and the state they share.
pub struct WorkerPool {
    workers: Vec<Worker>,
    shared: Arc<Shared>,
}

impl WorkerPool {
    /// Spawns `num_threads` workers named `"{name_prefix}::{index}"`.
    ///
    /// If any spawn fails, the workers already started are stopped and the
    /// error is returned.
    pub fn new(
        num_threads: usize,
        name_prefix: &str,
        pinning: PinningStrategy,
    ) -> Result<Self, JobError> {
        let shared = Arc::new(Shared::new(num_threads));
        let mut pool = WorkerPool {
            workers: Vec::with_capacity(num_threads),
            shared,
        };

        for id in 0..num_threads {
            let name = format!("{name_prefix}::{id}");
            match Worker::spawn(id, name, Arc::clone(&pool.shared), pinning) {
                Ok(worker) => pool.workers.push(worker),
                Err(err) => {
                    if let Err(shutdown_err) = pool.shutdown() {
                        tracing::error!(error = %shutdown_err, "cleanup after failed spawn");
                    }
                    return Err(JobError::Spawn(err));
                }
            }
        }

        Ok(pool)
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.shared
    }

    /// Returns the number of worker threads in the pool.
    pub fn size(&self) -> usize {
        self.shared.thread_count()
    }

    /// Stops the workers once all queued work has run and joins them.
    ///
    /// Returns `Err(JobError::WorkerPanicked(n))` if `n` worker threads
    /// terminated abnormally.
    pub fn shutdown(self) -> Result<(), JobError> {
        self.shared.stop();

        let mut failed_count = 0;
        for worker in self.workers {
            let worker_id = worker.id();
            if worker.join().is_err() {
                failed_count += 1;
                tracing::error!(worker = worker_id, "worker panicked during execution");
            }
        }

        if failed_count > 0 {
            Err(JobError::WorkerPanicked(failed_count))
        } else {
            Ok(())
        }
    }
}
