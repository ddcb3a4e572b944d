//! # jobdispatch - Grouped Parallel Job Dispatch
//!
//! A small job system for CPU-bound batched work such as per-frame updates.
//! A fixed pool of worker threads is fed through one FIFO queue per worker;
//! callers split a batch into groups, the groups are spread over the queues
//! round-robin, and callers synchronize through counting [`Context`]s.
//!
//! ## Architecture
//!
//! - **Job groups**: a dispatch of `job_count` invocations is cut into groups
//!   of `group_size`. A group runs serially on one thread and may share a
//!   scratch buffer between its invocations.
//! - **Job queues**: one mutex-guarded FIFO per worker. A worker drains its own
//!   queue, then walks the others in order.
//! - **Contexts**: atomic counters of outstanding groups. They become busy
//!   before `dispatch` returns and idle when the last group finishes.
//! - **Waiting**: [`JobSystem::wait_for`] runs queued groups on the calling
//!   thread before yielding until the context drains.
//!
//! ## Example
//!
//! ```no_run
//! use jobdispatch::{Context, JobSystem};
//!
//! let mut job_system = JobSystem::with_threads(4).unwrap();
//! let ctx = Context::new();
//!
//! job_system
//!     .dispatch(&ctx, 1000, 64, |args| {
//!         if args.is_first_job_in_group {
//!             println!("group {} starting at {}", args.group_id, args.job_index);
//!         }
//!     }, 0)
//!     .unwrap();
//!
//! job_system.wait_for(&ctx);
//! job_system.shutdown().unwrap();
//! ```

pub mod context;
pub mod error;
pub mod job;
pub mod job_system;
pub mod metrics;
pub mod queue;
pub mod scratch;
pub mod worker;

use serde::{Deserialize, Serialize};

/// Strategy for pinning worker threads to CPU cores.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PinningStrategy {
    /// No pinning (standard OS scheduling).
    #[default]
    None,
    /// Linear pinning (worker i -> logical processor i).
    Linear,
    /// Pin to physical cores only (even-numbered logical processors), avoiding SMT contention.
    AvoidSMT,
}

pub use context::{Context, JobFailure};
pub use error::JobError;
pub use job::{JobArgs, dispatch_group_count};
pub use job_system::{JobSystem, PoolConfig};
#[cfg(feature = "metrics")]
pub use metrics::{Metrics, MetricsSnapshot};
