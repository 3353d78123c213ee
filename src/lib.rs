//! Two cooperative, single-threaded coroutine engines over fixed-capacity
//! pools.
//!
//! [`stackless::StacklessEngine`] keeps no per-coroutine stack: a suspended
//! coroutine is an integer resume point plus whatever the logic closure
//! captures, and every resume re-enters the closure, which dispatches on
//! that point. [`stackful::StackfulEngine`] gives every coroutine its own
//! mmap'd stack and suspends by saving and restoring the callee-saved
//! register set, so native locals survive a yield.
//!
//! The two engines expose the same surface (create / resume / destroy /
//! state / cleanup) and can be driven interchangeably, e.g. by the `bench`
//! binary.

pub mod error;
mod pool;
pub mod stackful;
pub mod stackless;

#[cfg(test)]
mod tests;

pub use error::CoroError;
pub use stackful::{StackfulEngine, Yielder};
pub use stackless::{StacklessEngine, StepCx};

/// Pool index identifying one coroutine. Only indexes handed out by
/// `create` on the same engine are valid; everything else is rejected by
/// `resume` and ignored by `destroy`.
pub type CoroId = usize;

/// Default pool capacity of either engine.
pub const MAX_COROUTINES: usize = 1024;

/// Stack region size for each stackful coroutine (64 KiB).
pub const STACK_SIZE: usize = 64 * 1024;

/// Lifecycle state of one coroutine slot.
///
/// A slot that is not currently allocated to a live coroutine reports
/// `Init`; querying the state of an invalid handle is never an error.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, strum_macros::Display)]
pub enum CoroState {
    #[default]
    Init,
    Running,
    Suspended,
    Finished,
}

/// Successful outcome of a resume: the coroutine either yielded control
/// back or ran to completion.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resume {
    Yielded,
    Finished,
}
