use std::io;

use crate::CoroId;

/// Failures surfaced by engine operations.
///
/// Nothing is retried internally; retry policy belongs to the caller.
/// Querying state and destroying are deliberately infallible (safe default
/// and silent no-op respectively), so only `create` and `resume` produce
/// these.
#[derive(Debug, thiserror::Error)]
pub enum CoroError {
    /// Every slot in the fixed-capacity pool is occupied.
    #[error("coroutine pool exhausted")]
    PoolExhausted,

    /// The handle is out of range or names a free slot.
    #[error("invalid coroutine handle {0}")]
    InvalidHandle(CoroId),

    /// Stack region allocation failed (stackful engine only). The slot the
    /// create was targeting is left free.
    #[error("coroutine stack allocation failed: {0}")]
    AllocationFailed(#[source] io::Error),
}
