//! Error types returned by the job system.

use std::io;

/// Errors surfaced by [`JobSystem`](crate::JobSystem) operations.
#[derive(Debug, thiserror::Error)]
pub enum JobError {
    /// The pool has not been initialized, or has already been shut down.
    #[error("job system is not initialized")]
    NotInitialized,

    /// Accepting the dispatch would exceed the configured pending-group limit.
    #[error("dispatch of {requested} group(s) rejected: {pending} pending, limit {limit}")]
    Rejected {
        requested: usize,
        pending: usize,
        limit: usize,
    },

    /// The context already tracks so many groups that its counter would overflow.
    #[error("context cannot track {requested} more group(s): {pending} already pending")]
    ContextOverflow { requested: u32, pending: u32 },

    /// A worker thread could not be spawned.
    #[error("failed to spawn worker thread: {0}")]
    Spawn(#[from] io::Error),

    /// One or more worker threads terminated abnormally.
    #[error("{0} worker thread(s) panicked")]
    WorkerPanicked(usize),
}
