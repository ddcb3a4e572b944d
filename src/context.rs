//! Execution contexts: the synchronization handle callers wait on.
//!
//! A [`Context`] counts outstanding job groups. Dispatch adds the number of
//! groups it is about to enqueue before any of them becomes visible to a
//! worker, and every completed group subtracts exactly one. The context also
//! collects the failures of any task that panicked while it was being tracked.

use crate::error::JobError;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

/// A task panic captured while executing one job group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    /// Group the failing job belonged to.
    pub group_id: u32,
    /// Global index of the invocation that panicked.
    pub job_index: u32,
    /// Panic payload rendered as text.
    pub message: String,
}

struct InnerContext {
    counter: AtomicU32,
    failures: Mutex<Vec<JobFailure>>,
}

/// Counting handle for a set of dispatched job groups.
///
/// Cloning is cheap and every clone observes the same counter. Job records
/// carry a clone, so the handle stays valid for as long as work referencing
/// it is queued or running.
#[derive(Clone)]
pub struct Context {
    inner: Arc<InnerContext>,
}

impl Context {
    /// Creates an idle context.
    pub fn new() -> Self {
        Context {
            inner: Arc::new(InnerContext {
                counter: AtomicU32::new(0),
                failures: Mutex::new(Vec::new()),
            }),
        }
    }

    /// Adds `groups` outstanding groups. Fails without changing the counter
    /// if the total would exceed `u32::MAX`.
    pub(crate) fn add(&self, groups: u32) -> Result<(), JobError> {
        self.inner
            .counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |pending| {
                pending.checked_add(groups)
            })
            .map(|_| ())
            .map_err(|pending| JobError::ContextOverflow {
                requested: groups,
                pending,
            })
    }

    /// Marks one group as complete.
    pub(crate) fn complete_group(&self) {
        // Release so that everything the group wrote is visible to whoever
        // observes the counter reaching zero.
        let previous = self.inner.counter.fetch_sub(1, Ordering::Release);
        debug_assert!(previous > 0, "context counter underflow");
    }

    pub(crate) fn record_failure(&self, failure: JobFailure) {
        self.inner
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(failure);
    }

    /// Number of groups dispatched against this context that have not finished.
    pub fn pending(&self) -> u32 {
        self.inner.counter.load(Ordering::Acquire)
    }

    /// Returns true while any group tracked by this context is outstanding.
    pub fn is_busy(&self) -> bool {
        self.pending() > 0
    }

    /// Number of task failures recorded and not yet taken.
    pub fn failure_count(&self) -> usize {
        self.inner
            .failures
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Removes and returns every recorded failure.
    pub fn take_failures(&self) -> Vec<JobFailure> {
        std::mem::take(
            &mut *self
                .inner
                .failures
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
        )
    }
}

impl Default for Context {
    fn default() -> Self {
        Context::new()
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("pending", &self.pending())
            .field("failures", &self.failure_count())
            .finish()
    }
}
