//! Context-switching coroutine engine.
//!
//! Each coroutine owns a full execution snapshot — the callee-saved
//! register set and a dedicated 64 KiB stack — so its entry closure runs
//! exactly once, keeping its native call stack and locals across any
//! number of suspensions. `resume` is a genuine stack switch: the
//! resumer's state is spilled into the record's caller context and the
//! coroutine's saved context is activated; [`Yielder::suspend`] performs
//! the reverse switch back to whoever resumed last.
//!
//! Completion never falls off the end of the entry routine. The trampoline
//! invokes the closure, marks the slot `Finished`, and routes control back
//! to the recorded caller with one final switch, because a coroutine stack
//! has no OS-managed return linkage to fall back on.
//!
//! A panic inside an entry closure cannot unwind across the switch frames
//! and aborts the process.

mod context;
mod stack;

use std::ptr::{addr_of, addr_of_mut};

use libc::c_void;
use log::{debug, warn};

use context::Context;
use stack::Stack;

use crate::pool::{Slot, SlotPool};
use crate::{CoroError, CoroId, CoroState, Resume, MAX_COROUTINES, STACK_SIZE};

type EntryBox = Box<dyn FnOnce(&Yielder)>;

#[derive(Default)]
struct SwitchRecord {
    /// The coroutine's saved snapshot; activated by resume.
    coro_ctx: Context,
    /// Where resume spills the resuming party's state. Overwritten on
    /// every resume, so yield always returns to the most recent caller.
    caller_ctx: Context,
    stack: Option<Stack>,
    /// Taken by the trampoline on first activation; `Some` only while the
    /// coroutine has never run.
    entry: Option<EntryBox>,
}

/// Suspension handle passed by reference into the entry closure. Usable
/// only while the coroutine is running; it cannot outlive the call.
pub struct Yielder {
    slot: *mut Slot<SwitchRecord>,
}

impl Yielder {
    /// Suspends the running coroutine and switches back to its most recent
    /// resumer. Returns when the coroutine is resumed again, with the
    /// entire native stack intact.
    pub fn suspend(&self) {
        unsafe {
            (*self.slot).state = CoroState::Suspended;
            context::switch(
                addr_of_mut!((*self.slot).record.coro_ctx),
                addr_of!((*self.slot).record.caller_ctx),
            );
        }
    }
}

// Entered exactly once per coroutine, on the first resume of its fresh
// context.
unsafe extern "C" fn trampoline(slot: *mut c_void) -> ! {
    let slot = slot as *mut Slot<SwitchRecord>;
    (*slot).state = CoroState::Running;

    let entry = (*slot).record.entry.take().unwrap();
    let yielder = Yielder { slot };
    entry(&yielder);

    (*slot).state = CoroState::Finished;
    context::switch(
        addr_of_mut!((*slot).record.coro_ctx),
        addr_of!((*slot).record.caller_ctx),
    );
    unreachable!("finished coroutine activated again");
}

/// Fixed-capacity pool of stack-switching coroutines.
pub struct StackfulEngine {
    pool: SlotPool<SwitchRecord>,
    current: Option<CoroId>,
}

impl StackfulEngine {
    pub fn new() -> Self {
        Self::with_capacity(MAX_COROUTINES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        debug!("stackful engine init, capacity {capacity}");
        Self {
            pool: SlotPool::new(capacity),
            current: None,
        }
    }

    pub fn capacity(&self) -> usize {
        self.pool.capacity()
    }

    /// Id of the coroutine currently being resumed, if any.
    pub fn current(&self) -> Option<CoroId> {
        self.current
    }

    /// Claims the lowest free slot, allocates its stack, and roots a fresh
    /// context at the trampoline. The closure does not run until the first
    /// resume. On allocation failure the slot is left free.
    pub fn create(
        &mut self,
        entry: impl FnOnce(&Yielder) + 'static,
    ) -> Result<CoroId, CoroError> {
        let Some(id) = self.pool.claim() else {
            warn!("stackful create failed: all {} slots busy", self.capacity());
            return Err(CoroError::PoolExhausted);
        };
        let stack = match Stack::new(STACK_SIZE) {
            Ok(stack) => stack,
            Err(err) => {
                self.pool.release(id);
                warn!("stackful create failed: stack allocation: {err}");
                return Err(CoroError::AllocationFailed(err));
            }
        };

        // All record writes go through the same raw pointer handed to the
        // trampoline, as in resume, so no later borrow invalidates it.
        let slot = self.pool.slot_ptr(id);
        unsafe {
            let record = &mut (*slot).record;
            record.coro_ctx = context::prepare(stack.top(), trampoline, slot as *mut c_void);
            record.stack = Some(stack);
            record.entry = Some(Box::new(entry));
        }
        Ok(id)
    }

    /// Switches into the coroutine until it suspends or completes.
    ///
    /// An already-finished coroutine reports `Finished` immediately without
    /// a switch.
    pub fn resume(&mut self, id: CoroId) -> Result<Resume, CoroError> {
        let Some(slot) = self.pool.get(id) else {
            return Err(CoroError::InvalidHandle(id));
        };
        if slot.state == CoroState::Finished {
            return Ok(Resume::Finished);
        }

        let prev = self.current.replace(id);
        let slot = self.pool.slot_ptr(id);
        unsafe {
            (*slot).state = CoroState::Running;
            context::switch(
                addr_of_mut!((*slot).record.caller_ctx),
                addr_of!((*slot).record.coro_ctx),
            );
        }
        self.current = prev;

        let finished = unsafe { (*slot).state == CoroState::Finished };
        Ok(if finished {
            Resume::Finished
        } else {
            Resume::Yielded
        })
    }

    /// Unmaps the stack and frees the slot. Silent no-op on an invalid
    /// handle.
    ///
    /// Destroying a started-but-unfinished coroutine is permitted but
    /// abandons its frames in place: nothing on the coroutine's stack is
    /// unwound or dropped. Callers that care drive the coroutine to
    /// `Finished` first.
    pub fn destroy(&mut self, id: CoroId) {
        if let Some(slot) = self.pool.get(id) {
            debug!("stackful destroy {id}, state {}", slot.state);
        }
        self.pool.release(id);
    }

    /// State query; `Init` for any invalid handle rather than an error.
    pub fn state(&self, id: CoroId) -> CoroState {
        self.pool.state(id)
    }

    /// Destroys every active coroutine. Safe to call repeatedly; the engine
    /// afterwards is indistinguishable from a freshly constructed one.
    pub fn cleanup(&mut self) {
        let active: Vec<_> = self.pool.active_ids().collect();
        debug!("stackful cleanup, {} active slots", active.len());
        for id in active {
            self.destroy(id);
        }
        self.current = None;
    }
}

impl Default for StackfulEngine {
    fn default() -> Self {
        Self::new()
    }
}
