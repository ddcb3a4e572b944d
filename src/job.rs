//! Job records and per-invocation arguments.
//!
//! A dispatch of `job_count` invocations is cut into groups of at most
//! `group_size` consecutive indices. Each group becomes one [`Job`] record
//! that a single worker executes serially, which is what makes the group's
//! shared scratch memory safe to use without synchronization.

use crate::context::{Context, JobFailure};
use crate::scratch::ScratchBuffer;
use std::any::Any;
use std::ops::Range;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

/// Arguments delivered to a task for one invocation.
///
/// The naming mirrors compute-shader dispatch: `job_index` is the global
/// index, `group_id` the group, `group_index` the position inside the group.
#[derive(Debug)]
pub struct JobArgs<'a> {
    /// Index relative to the whole dispatch.
    pub job_index: u32,
    /// Index of the group this invocation belongs to.
    pub group_id: u32,
    /// Index relative to the start of the group.
    pub group_index: u32,
    pub is_first_job_in_group: bool,
    pub is_last_job_in_group: bool,
    /// Scratch memory shared by every invocation of the current group.
    /// Present only when the dispatch asked for a non-zero size.
    pub shared_memory: Option<&'a mut [u8]>,
}

/// Type-erased task shared by every group of one dispatch.
pub type Task = Arc<dyn Fn(JobArgs<'_>) + Send + Sync + 'static>;

/// Boxes a closure as a shareable [`Task`].
pub fn into_task<F>(task: F) -> Task
where
    F: Fn(JobArgs<'_>) + Send + Sync + 'static,
{
    Arc::new(task)
}

/// Number of groups needed to cover `job_count` jobs in groups of `group_size`.
///
/// Returns 0 if either argument is 0.
pub fn dispatch_group_count(job_count: u32, group_size: u32) -> u32 {
    if group_size == 0 {
        return 0;
    }
    job_count.div_ceil(group_size)
}

/// Index range covered by `group_id`. The final group may be shorter.
pub fn group_range(group_id: u32, group_size: u32, job_count: u32) -> Range<u32> {
    let start = group_id.saturating_mul(group_size).min(job_count);
    let end = start.saturating_add(group_size).min(job_count);
    start..end
}

/// One enqueued group of a dispatch.
pub struct Job {
    task: Task,
    context: Context,
    group_id: u32,
    start: u32,
    end: u32,
    shared_memory_size: usize,
}

impl Job {
    pub fn new(
        task: Task,
        context: Context,
        group_id: u32,
        start: u32,
        end: u32,
        shared_memory_size: usize,
    ) -> Self {
        debug_assert!(start < end, "job groups are never empty");
        Job {
            task,
            context,
            group_id,
            start,
            end,
            shared_memory_size,
        }
    }

    pub fn group_id(&self) -> u32 {
        self.group_id
    }

    pub fn range(&self) -> Range<u32> {
        self.start..self.end
    }

    pub fn shared_memory_size(&self) -> usize {
        self.shared_memory_size
    }

    /// Runs every index of the group on the calling thread, then marks the
    /// group complete on its context.
    ///
    /// A panicking invocation ends the group early. The panic is recorded on
    /// the context and the counter is still decremented. A group whose shared
    /// memory cannot be allocated runs no invocations and is recorded the
    /// same way. Returns false if the group failed.
    pub fn execute(self, scratch: &mut ScratchBuffer) -> bool {
        let Job {
            task,
            context,
            group_id,
            start,
            end,
            shared_memory_size,
        } = self;

        let mut current = start;
        let failure = match scratch.acquire(shared_memory_size) {
            Ok(mut shared) => catch_unwind(AssertUnwindSafe(|| {
                for job_index in start..end {
                    current = job_index;
                    task(JobArgs {
                        job_index,
                        group_id,
                        group_index: job_index - start,
                        is_first_job_in_group: job_index == start,
                        is_last_job_in_group: job_index == end - 1,
                        shared_memory: shared.as_deref_mut(),
                    });
                }
            }))
            .err()
            .map(|payload| panic_message(payload.as_ref())),
            Err(err) => Some(format!(
                "could not allocate {shared_memory_size} bytes of shared memory: {err}"
            )),
        };

        let completed = match failure {
            None => true,
            Some(message) => {
                tracing::warn!(group_id, job_index = current, error = %message, "job group failed");
                context.record_failure(JobFailure {
                    group_id,
                    job_index: current,
                    message,
                });
                false
            }
        };

        context.complete_group();
        completed
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "Unknown panic".to_string()
    }
}
