use crate::example::{Example, SlotState};
use crate::invariants::{
    debug_assert_bounded_count, debug_assert_read_not_past_commit, debug_assert_slot_state,
};
use std::cell::UnsafeCell;
use std::mem;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};

// =============================================================================
// SLOT OWNERSHIP PROTOCOL
// =============================================================================
//
// Every slot carries a tag (`SlotState`) stored in `Cursors::states`, which
// lives behind the ring mutex. Payloads (`slots[i]`) are NOT behind the
// mutex. Access to a payload is granted by the tag:
//
// - `ForLocalUse`:   only the holder of the `LocalSlot` for index i touches it
// - `ForForeignUse`: only the holder of the `ForeignSlot` for index i touches it
// - `Empty`:         nobody touches it
//
// Tags only change under the mutex, so the Acquire/Release of the lock
// orders payload writes before the tag change that hands the slot over.
//
// ## Cursors
//
// `committed` and `retrieved` are unbounded u64 sequence numbers. The slot
// index is `sequence % capacity`, computed only when touching a slot.
// - Producer fills slot `committed % capacity`; it waits while that slot is
//   still `ForForeignUse` (backpressure).
// - Consumer retrieves slot `retrieved % capacity` while `retrieved < committed`.
//
// =============================================================================

/// Source of ring identities. A `ForeignSlot` records the id of the ring that
/// issued it; ids are never reused, so a handle outliving its ring cannot be
/// accepted by a later ring allocated at the same address.
static NEXT_RING_ID: AtomicU64 = AtomicU64::new(0);

struct Cursors {
    states: Box<[SlotState]>,
    /// Number of slots committed by the producer
    committed: u64,
    /// Number of committed slots handed to the consumer
    retrieved: u64,
    closed: bool,
    free_on_destruct: bool,
}

/// Fixed-capacity ring of reusable example slots.
///
/// The ring hands one slot at a time to the producer ([`LocalSlot`]) and
/// committed slots to the consumer in commit order ([`ForeignSlot`]). A slot
/// returns to the producer only after the consumer releases it, so a
/// consumer that never releases eventually stalls the producer rather than
/// losing an example.
pub struct SlotRing<T> {
    cursors: Mutex<Cursors>,
    /// Signalled when a slot becomes `Empty` or the ring closes
    slot_freed: Condvar,
    slots: Box<[UnsafeCell<Example<T>>]>,
    producer_waits: AtomicU64,
    id: u64,
}

// Safety: payload access is serialised by the slot tags (see protocol above),
// so sharing the ring only requires that examples can move between threads.
unsafe impl<T: Send> Send for SlotRing<T> {}
unsafe impl<T: Send> Sync for SlotRing<T> {}

impl<T> SlotRing<T> {
    /// Creates a ring with `capacity` empty slots.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "slot ring capacity must be at least 1");

        let slots = (0..capacity)
            .map(|_| UnsafeCell::new(Example::default()))
            .collect::<Vec<_>>()
            .into_boxed_slice();

        Self {
            cursors: Mutex::new(Cursors {
                states: vec![SlotState::Empty; capacity].into_boxed_slice(),
                committed: 0,
                retrieved: 0,
                closed: false,
                free_on_destruct: true,
            }),
            slot_freed: Condvar::new(),
            slots,
            producer_waits: AtomicU64::new(0),
            id: NEXT_RING_ID.fetch_add(1, Ordering::Relaxed),
        }
    }

    // ---------------------------------------------------------------------
    // STATUS
    // ---------------------------------------------------------------------

    /// Returns the number of slots.
    #[inline]
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Returns the number of committed examples not yet retrieved.
    pub fn len(&self) -> usize {
        let cursors = self.lock();
        cursors.committed.wrapping_sub(cursors.retrieved) as usize
    }

    /// Returns true if no committed example is waiting for retrieval.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the tag of slot `index`.
    pub fn state(&self, index: usize) -> SlotState {
        self.lock().states[index]
    }

    /// Returns true if the ring is closed.
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// Number of times the producer had to wait for a free slot.
    pub fn producer_waits(&self) -> u64 {
        self.producer_waits.load(Ordering::Relaxed)
    }

    /// Sets whether dropping the ring runs an explicit pass that releases the
    /// vectors of all held slots.
    ///
    /// Only the pass and its trace event are skipped when `false`; the
    /// vectors are still dropped with the ring. Nothing held by the ring
    /// outlives it either way.
    pub fn set_free_vectors_on_destruct(&self, free: bool) {
        self.lock().free_on_destruct = free;
    }

    #[inline]
    fn lock(&self) -> MutexGuard<'_, Cursors> {
        self.cursors.lock().unwrap_or_else(PoisonError::into_inner)
    }

    #[inline]
    fn index(&self, sequence: u64) -> usize {
        (sequence % self.slots.len() as u64) as usize
    }

    #[inline]
    fn id(&self) -> u64 {
        self.id
    }

    // ---------------------------------------------------------------------
    // PRODUCER API
    // ---------------------------------------------------------------------

    /// Acquires the next slot in producer order, waiting while the consumer
    /// still holds it.
    ///
    /// Returns `None` once the ring is closed.
    pub fn acquire_free_slot(&self) -> Option<LocalSlot<'_, T>> {
        let mut cursors = self.lock();
        loop {
            if cursors.closed {
                return None;
            }
            if let Some(slot) = self.try_claim(&mut cursors) {
                return Some(slot);
            }
            self.producer_waits.fetch_add(1, Ordering::Relaxed);
            cursors = self
                .slot_freed
                .wait(cursors)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Acquires the next slot in producer order without waiting.
    ///
    /// Returns `None` if the ring is closed or the consumer still holds the slot.
    pub fn try_acquire_free_slot(&self) -> Option<LocalSlot<'_, T>> {
        let mut cursors = self.lock();
        if cursors.closed {
            return None;
        }
        self.try_claim(&mut cursors)
    }

    fn try_claim(&self, cursors: &mut Cursors) -> Option<LocalSlot<'_, T>> {
        let index = self.index(cursors.committed);
        debug_assert_ne!(
            cursors.states[index],
            SlotState::ForLocalUse,
            "producer already holds slot {}",
            index
        );
        if cursors.states[index] != SlotState::Empty {
            return None;
        }
        cursors.states[index] = SlotState::ForLocalUse;
        Some(LocalSlot { ring: self, index })
    }

    fn commit_slot(&self, index: usize) {
        let mut cursors = self.lock();
        debug_assert_slot_state!(
            "commit",
            index,
            cursors.states[index],
            SlotState::ForLocalUse
        );
        debug_assert_eq!(index, self.index(cursors.committed));

        cursors.states[index] = SlotState::ForForeignUse;
        cursors.committed = cursors.committed.wrapping_add(1);

        debug_assert_bounded_count!(
            cursors.committed.wrapping_sub(cursors.retrieved) as usize,
            self.capacity()
        );
    }

    fn abandon_slot(&self, index: usize) {
        let mut cursors = self.lock();
        debug_assert_slot_state!(
            "abandon",
            index,
            cursors.states[index],
            SlotState::ForLocalUse
        );
        cursors.states[index] = SlotState::Empty;
    }

    // ---------------------------------------------------------------------
    // CONSUMER API
    // ---------------------------------------------------------------------

    /// Returns the oldest committed slot not yet retrieved, or `None` if no
    /// committed slot is ready.
    pub fn retrieve_committed_slot(&self) -> Option<ForeignSlot> {
        let mut cursors = self.lock();
        if cursors.retrieved == cursors.committed {
            return None;
        }

        let index = self.index(cursors.retrieved);
        debug_assert_slot_state!(
            "be retrieved",
            index,
            cursors.states[index],
            SlotState::ForForeignUse
        );

        cursors.retrieved = cursors.retrieved.wrapping_add(1);
        debug_assert_read_not_past_commit!(cursors.retrieved, cursors.committed);

        Some(ForeignSlot {
            ring_id: self.id(),
            index,
        })
    }

    /// Returns the example stored in a retrieved slot.
    ///
    /// # Panics
    ///
    /// Panics if `slot` was retrieved from a different ring.
    pub fn example<'a>(&'a self, slot: &'a ForeignSlot) -> &'a Example<T> {
        assert_eq!(slot.ring_id, self.id(), "slot belongs to another ring");
        // SAFETY: a ForeignSlot exists only while its slot is tagged
        // ForForeignUse, and is consumed by `release`. The producer never
        // touches a ForForeignUse slot, so no mutable access can overlap
        // with the returned reference.
        unsafe { &*self.slots[slot.index].get() }
    }

    /// Returns the slot to the producer, optionally dropping its vector storage.
    ///
    /// # Panics
    ///
    /// Panics if `slot` was retrieved from a different ring.
    pub fn release(&self, slot: ForeignSlot, free_vector: bool) {
        assert_eq!(slot.ring_id, self.id(), "slot belongs to another ring");

        // Taken while the slot is still ours; dropped after the lock is released.
        let freed = if free_vector {
            // SAFETY: the slot is still ForForeignUse and we hold its only handle.
            let example = unsafe { &mut *self.slots[slot.index].get() };
            Some(mem::take(&mut example.vector))
        } else {
            None
        };

        {
            let mut cursors = self.lock();
            debug_assert_slot_state!(
                "be released",
                slot.index,
                cursors.states[slot.index],
                SlotState::ForForeignUse
            );
            cursors.states[slot.index] = SlotState::Empty;
        }
        self.slot_freed.notify_all();

        drop(freed);
    }

    // ---------------------------------------------------------------------
    // LIFECYCLE
    // ---------------------------------------------------------------------

    /// Closes the ring and wakes a producer waiting for a free slot.
    ///
    /// Committed slots can still be retrieved and released.
    pub fn close(&self) {
        self.lock().closed = true;
        self.slot_freed.notify_all();
    }
}

impl<T> Drop for SlotRing<T> {
    fn drop(&mut self) {
        let cursors = self
            .cursors
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner);
        if !cursors.free_on_destruct {
            return;
        }

        let mut freed = 0usize;
        for (state, slot) in cursors.states.iter_mut().zip(self.slots.iter_mut()) {
            if *state != SlotState::Empty {
                slot.get_mut().free_vector();
                *state = SlotState::Empty;
                freed += 1;
            }
        }
        if freed > 0 {
            tracing::trace!(freed, "released vectors held by slot ring");
        }
    }
}

/// A slot held by the producer while it is being filled.
///
/// Dropping a `LocalSlot` without committing returns the slot to `Empty`.
pub struct LocalSlot<'a, T> {
    ring: &'a SlotRing<T>,
    index: usize,
}

impl<'a, T> LocalSlot<'a, T> {
    /// Index of the slot in the ring.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }

    /// The slot's example storage.
    ///
    /// Holds whatever the slot contained last; the vector allocation is
    /// reused unless the consumer freed it on release.
    #[inline]
    pub fn example_mut(&mut self) -> &mut Example<T> {
        // SAFETY: the slot is tagged ForLocalUse and this handle is the only
        // one for it; the consumer never touches a ForLocalUse slot.
        unsafe { &mut *self.ring.slots[self.index].get() }
    }

    /// Marks the slot `ForForeignUse`, making it visible to the consumer.
    pub fn commit(self) {
        self.ring.commit_slot(self.index);
        mem::forget(self);
    }

    /// Moves `example` into the slot, replacing its contents, and commits.
    pub fn commit_example(mut self, example: Example<T>) {
        *self.example_mut() = example;
        self.commit();
    }
}

impl<T> Drop for LocalSlot<'_, T> {
    fn drop(&mut self) {
        self.ring.abandon_slot(self.index);
    }
}

/// A committed slot handed to the consumer.
///
/// Must be passed back to [`SlotRing::release`] once the example is consumed.
#[derive(Debug)]
pub struct ForeignSlot {
    ring_id: u64,
    index: usize,
}

impl ForeignSlot {
    /// Index of the slot in the ring.
    #[inline]
    pub fn index(&self) -> usize {
        self.index
    }
}
