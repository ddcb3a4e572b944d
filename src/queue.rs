//! Per-worker job queue.

use crate::job::Job;
use std::collections::VecDeque;
use std::sync::{Mutex, PoisonError};

/// A mutex-guarded FIFO of pending job records.
///
/// Push and pop are each a single short critical section. Task code never
/// runs while the lock is held, so a poisoned lock is recovered rather than
/// propagated.
#[derive(Default)]
pub struct JobQueue {
    jobs: Mutex<VecDeque<Job>>,
}

impl JobQueue {
    pub fn new() -> Self {
        Self {
            jobs: Mutex::new(VecDeque::new()),
        }
    }

    /// Appends a job to the back of the queue.
    pub fn push(&self, job: Job) {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push_back(job);
    }

    /// Removes and returns the earliest queued job.
    pub fn pop(&self) -> Option<Job> {
        self.jobs
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop_front()
    }

    #[cfg(test)]
    pub(crate) fn len(&self) -> usize {
        self.jobs.lock().unwrap_or_else(PoisonError::into_inner).len()
    }
}
