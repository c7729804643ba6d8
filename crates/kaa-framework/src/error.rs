//! Error types for the Kaa framework.

use thiserror::Error;

/// Errors raised while scheduling an invocation onto the worker pool.
///
/// None of these stop the dispatch loop; they are counted in the
/// [`DispatchReport`](crate::engine::DispatchReport) and logged.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    /// The queue was full and the backpressure policy discards silently.
    #[error("queue full, dropped invocation of '{hook}'")]
    Dropped {
        /// Hook of the discarded invocation.
        hook: String,
    },

    /// The queue was full and the backpressure policy rejects.
    #[error("queue full, rejected invocation of '{hook}'")]
    Rejected {
        /// Hook of the rejected invocation.
        hook: String,
    },

    /// The worker pool has shut down.
    #[error("worker pool is closed")]
    PoolClosed,
}

/// Result type for scheduling operations.
pub type DispatchResult<T> = Result<T, DispatchError>;
