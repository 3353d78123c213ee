//! State-machine coroutine engine.
//!
//! A coroutine here is a closure plus a stored integer resume point. The
//! engine never keeps an execution stack for it: every resume invokes the
//! closure again, and the closure is expected to dispatch on
//! [`StepCx::resume_point`] to continue exactly where it last suspended.
//! Anything that must survive a suspension lives in the closure's captures
//! or in the resume point itself; plain locals inside the closure body do
//! not.
//!
//! Suspension is purely a state flag. [`StepCx::yield_at`] records the next
//! dispatch key and marks the slot `Suspended`, but control only returns to
//! the resumer because the closure itself returns afterwards. A closure
//! that returns without calling `yield_at` or `finish` is treated as merely
//! out of work this turn: the engine downgrades it to `Suspended` and the
//! next resume re-enters at the unchanged resume point.

use log::{debug, warn};

use crate::pool::{Slot, SlotPool};
use crate::{CoroError, CoroId, CoroState, Resume, MAX_COROUTINES};

/// Stored logic function. Invoked once per resume with a fresh view of the
/// slot's dispatch state.
pub type StepFn = Box<dyn FnMut(&mut StepCx<'_>)>;

#[derive(Default)]
struct StepRecord {
    resume_point: u32,
    func: Option<StepFn>,
}

/// The view a logic closure gets of its own slot while running.
pub struct StepCx<'a> {
    state: &'a mut CoroState,
    resume_point: &'a mut u32,
}

impl StepCx<'_> {
    /// Dispatch key recorded by the last [`yield_at`](Self::yield_at);
    /// 0 on the first resume.
    pub fn resume_point(&self) -> u32 {
        *self.resume_point
    }

    /// Suspends the coroutine: the next resume will see `point` as the
    /// dispatch key. The closure must return shortly after calling this;
    /// the engine does not transfer control on its behalf.
    pub fn yield_at(&mut self, point: u32) {
        *self.resume_point = point;
        *self.state = CoroState::Suspended;
    }

    /// Marks the coroutine complete. Subsequent resumes report
    /// [`Resume::Finished`] without re-entering the closure.
    pub fn finish(&mut self) {
        *self.state = CoroState::Finished;
    }
}

/// Fixed-capacity pool of state-machine coroutines.
pub struct StacklessEngine {
    pool: SlotPool<StepRecord>,
    current: Option<CoroId>,
}

impl StacklessEngine {
    pub fn new() -> Self {
        Self::with_capacity(MAX_COROUTINES)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        debug!("stackless engine init, capacity {capacity}");
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

    /// Claims the lowest free slot for `func`, starting at resume point 0.
    pub fn create(
        &mut self,
        func: impl FnMut(&mut StepCx<'_>) + 'static,
    ) -> Result<CoroId, CoroError> {
        let Some(id) = self.pool.claim() else {
            warn!("stackless create failed: all {} slots busy", self.capacity());
            return Err(CoroError::PoolExhausted);
        };
        let record = &mut self.pool.get_mut(id).unwrap().record;
        record.resume_point = 0;
        record.func = Some(Box::new(func));
        Ok(id)
    }

    /// Runs the coroutine for one turn.
    ///
    /// Re-enters the stored closure, which dispatches on the saved resume
    /// point. An already-finished coroutine reports `Finished` immediately
    /// and is never re-entered.
    pub fn resume(&mut self, id: CoroId) -> Result<Resume, CoroError> {
        let slot = self
            .pool
            .get_mut(id)
            .ok_or(CoroError::InvalidHandle(id))?;
        if slot.state == CoroState::Finished {
            return Ok(Resume::Finished);
        }

        let prev = self.current.replace(id);
        slot.state = CoroState::Running;

        let Slot { state, record, .. } = slot;
        let mut func = record.func.take().unwrap();
        let mut cx = StepCx {
            state: &mut *state,
            resume_point: &mut record.resume_point,
        };
        func(&mut cx);

        // A plain return means "no work this turn", not completion.
        if *state == CoroState::Running {
            *state = CoroState::Suspended;
        }
        let finished = *state == CoroState::Finished;
        record.func = Some(func);

        self.current = prev;
        Ok(if finished {
            Resume::Finished
        } else {
            Resume::Yielded
        })
    }

    /// Releases the slot and drops the stored closure. Silent no-op on an
    /// invalid handle so teardown loops stay idempotent.
    pub fn destroy(&mut self, id: CoroId) {
        if let Some(slot) = self.pool.get(id) {
            debug!("stackless destroy {id}, state {}", slot.state);
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
        debug!("stackless cleanup, {} active slots", active.len());
        for id in active {
            self.destroy(id);
        }
        self.current = None;
    }
}

impl Default for StacklessEngine {
    fn default() -> Self {
        Self::new()
    }
}
