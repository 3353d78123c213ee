use crate::{CoroId, CoroState};

/// One pool entry: lifecycle bookkeeping shared by both engines plus the
/// engine-specific record.
pub(crate) struct Slot<R> {
    pub(crate) id: CoroId,
    pub(crate) active: bool,
    pub(crate) state: CoroState,
    pub(crate) record: R,
}

/// Fixed-capacity slot pool with deterministic first-fit allocation.
///
/// The backing storage is allocated once at construction and never moves,
/// so a raw pointer to a slot stays valid for the pool's lifetime. The
/// stackful engine relies on this while a coroutine runs on its own stack.
pub(crate) struct SlotPool<R> {
    slots: Box<[Slot<R>]>,
}

impl<R: Default> SlotPool<R> {
    pub(crate) fn new(capacity: usize) -> Self {
        let slots = (0..capacity)
            .map(|id| Slot {
                id,
                active: false,
                state: CoroState::Init,
                record: R::default(),
            })
            .collect();
        Self { slots }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Claims the lowest free slot, marking it active with state `Init`.
    /// Returns `None` when every slot is occupied.
    pub(crate) fn claim(&mut self) -> Option<CoroId> {
        let slot = self.slots.iter_mut().find(|slot| !slot.active)?;
        slot.active = true;
        slot.state = CoroState::Init;
        slot.record = R::default();
        Some(slot.id)
    }

    /// Returns the slot to the free list, resetting its record. No-op for
    /// invalid ids so teardown stays idempotent.
    pub(crate) fn release(&mut self, id: CoroId) {
        if let Some(slot) = self.slots.get_mut(id) {
            slot.active = false;
            slot.state = CoroState::Init;
            slot.record = R::default();
        }
    }

    /// Live-slot lookup: `None` for out-of-range ids and free slots alike.
    pub(crate) fn get(&self, id: CoroId) -> Option<&Slot<R>> {
        self.slots.get(id).filter(|slot| slot.active)
    }

    pub(crate) fn get_mut(&mut self, id: CoroId) -> Option<&mut Slot<R>> {
        self.slots.get_mut(id).filter(|slot| slot.active)
    }

    /// Stable pointer to a live slot. Caller must have validated `id`.
    pub(crate) fn slot_ptr(&mut self, id: CoroId) -> *mut Slot<R> {
        debug_assert!(self.slots[id].active);
        &mut self.slots[id] as *mut _
    }

    /// State query with the safe default: invalid handles report `Init`.
    pub(crate) fn state(&self, id: CoroId) -> CoroState {
        self.get(id).map_or(CoroState::Init, |slot| slot.state)
    }

    pub(crate) fn active_ids(&self) -> impl Iterator<Item = CoroId> + '_ {
        self.slots
            .iter()
            .filter(|slot| slot.active)
            .map(|slot| slot.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_fit_is_deterministic() {
        let mut pool: SlotPool<u32> = SlotPool::new(4);
        assert_eq!(pool.claim(), Some(0));
        assert_eq!(pool.claim(), Some(1));
        assert_eq!(pool.claim(), Some(2));
        pool.release(1);
        assert_eq!(pool.claim(), Some(1));
        assert_eq!(pool.claim(), Some(3));
        assert_eq!(pool.claim(), None);
    }

    #[test]
    fn release_resets_record_and_state() {
        let mut pool: SlotPool<u32> = SlotPool::new(2);
        let id = pool.claim().unwrap();
        pool.get_mut(id).unwrap().record = 7;
        pool.get_mut(id).unwrap().state = CoroState::Suspended;
        pool.release(id);
        assert!(pool.get(id).is_none());
        assert_eq!(pool.state(id), CoroState::Init);
        let id = pool.claim().unwrap();
        assert_eq!(pool.get(id).unwrap().record, 0);
    }

    #[test]
    fn invalid_ids_are_harmless() {
        let mut pool: SlotPool<u32> = SlotPool::new(2);
        pool.release(17);
        assert!(pool.get(17).is_none());
        assert_eq!(pool.state(17), CoroState::Init);
    }
}
