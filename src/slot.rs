//! Per-resource slot and its state machine.
//!
//! A [`Slot`] owns one resource of type `R` plus the bookkeeping the pool
//! needs to decide whether it is idle, lent out, or being examined by the
//! background evictor. All mutation happens under a single per-slot lock;
//! callers never see two threads racing on the same slot's state.

use std::time::{Duration, Instant};

use parking_lot::Mutex;

/// Where a slot currently sits in its lifecycle.
///
/// See the transition table on [`Slot`]'s methods for the only legal moves
/// between these states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotState {
    /// Resident in the idle queue, available to be borrowed.
    Idle,
    /// Lent to a caller.
    Allocated,
    /// The evictor is running the idle-time check; still queue-resident.
    EvictTesting,
    /// A borrower raced the evictor and pulled the slot out of the queue
    /// while it was under eviction test. Must be re-enqueued at the head
    /// once the evictor finishes.
    EvictOut,
    /// The evictor is running a `testWhileIdle` validation pass.
    ValidationTesting,
    /// A borrower pulled the slot during validation and intends to claim
    /// it once validation succeeds.
    ValidationPrealloc,
    /// Analogue of `EvictOut` for the validation phase.
    ValidationOut,
    /// Terminal: the slot will be (or has been) destroyed.
    Invalid,
}

/// Outcome of ending an eviction or validation test: either the slot goes
/// straight back to `Idle` in place, or a racing borrower pulled it out and
/// it must be pushed back onto the head of the idle queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestEndOutcome {
    /// The slot returned to `Idle` without ever leaving the queue.
    StillQueued,
    /// A borrower raced in; re-enqueue the slot at the queue head.
    ReenqueueHead,
}

struct SlotInner<R> {
    state: SlotState,
    resource: Option<Box<R>>,
    created_at: Instant,
    last_borrowed_at: Instant,
    last_returned_at: Instant,
}

/// Wrapper owning one pooled resource and its lifecycle state.
///
/// `id` is a monotonically-assigned identity, stable for the lifetime of the
/// slot and never reused. The resource itself is boxed so its heap address
/// (`addr`) is *also* stable for the slot's whole lifetime, even while the
/// resource is checked out to a borrower and moved around inside a `Guard`:
/// moving a `Box<R>` moves the pointer, never the pointee. That address is
/// the registry's "resource identity, not value equality" lookup key, per
/// the spec.
pub struct Slot<R> {
    id: u64,
    addr: usize,
    inner: Mutex<SlotInner<R>>,
}

impl<R> Slot<R> {
    /// Construct a fresh, idle slot wrapping `resource`.
    ///
    /// `last_returned_at` is initialised to the creation instant so a
    /// brand-new slot is immediately eligible to be considered "idle since
    /// now" by the evictor.
    pub fn new(id: u64, resource: R) -> Self {
        let now = Instant::now();
        let boxed = Box::new(resource);
        let addr = Box::as_ref(&boxed) as *const R as usize;
        Self {
            id,
            addr,
            inner: Mutex::new(SlotInner {
                state: SlotState::Idle,
                resource: Some(boxed),
                created_at: now,
                last_borrowed_at: now,
                last_returned_at: now,
            }),
        }
    }

    /// Stable, never-reused identity of this slot.
    pub fn id(&self) -> u64 {
        self.id
    }

    /// Stable heap address of the boxed resource, used as the registry's
    /// secondary identity key so a bare returned resource can be mapped
    /// back to its owning slot.
    pub fn addr(&self) -> usize {
        self.addr
    }

    pub fn state(&self) -> SlotState {
        self.inner.lock().state
    }

    /// How long this slot has been sitting idle.
    pub fn idle_time(&self) -> Duration {
        self.inner.lock().last_returned_at.elapsed()
    }

    /// How long this slot has been (or was) actively lent out.
    pub fn active_time(&self) -> Duration {
        let inner = self.inner.lock();
        if inner.last_returned_at > inner.last_borrowed_at {
            inner
                .last_returned_at
                .duration_since(inner.last_borrowed_at)
        } else {
            inner.last_borrowed_at.elapsed()
        }
    }

    pub fn created_at(&self) -> Instant {
        self.inner.lock().created_at
    }

    /// `IDLE -> ALLOCATED`. Returns the resource and stamps `last_borrowed`
    /// on success; returns `None` ("not yours, find another") from any
    /// other state.
    pub fn allocate(&self) -> Option<Box<R>> {
        let mut inner = self.inner.lock();
        match inner.state {
            SlotState::Idle => {
                inner.state = SlotState::Allocated;
                inner.last_borrowed_at = Instant::now();
                inner.resource.take()
            }
            SlotState::EvictTesting => {
                inner.state = SlotState::EvictOut;
                None
            }
            SlotState::ValidationTesting => {
                inner.state = SlotState::ValidationPrealloc;
                None
            }
            _ => None,
        }
    }

    /// `ALLOCATED -> IDLE`, stamping `last_returned`. Returns `false`
    /// (double-return) for any other state.
    ///
    /// Split from storing the resource itself (see [`Slot::store_idle`])
    /// so a caller can run factory validation/passivation on the owned
    /// resource *after* this check — detecting a double-return before any
    /// factory call runs, per the corrected ordering noted in the spec
    /// (the flagged source bug passivated before checking, letting a
    /// double-return passivate twice).
    pub fn begin_return(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state != SlotState::Allocated {
            return false;
        }
        inner.state = SlotState::Idle;
        inner.last_returned_at = Instant::now();
        true
    }

    /// Places `resource` back into a slot already flipped to `Idle` by
    /// [`Slot::begin_return`], making it visible to subsequent `allocate`
    /// calls once pushed onto the idle queue.
    pub fn store_idle(&self, resource: Box<R>) {
        self.inner.lock().resource = Some(resource);
    }

    /// `IDLE -> EVICT_TESTING`. Returns `false` if the slot wasn't idle
    /// (e.g. a borrower got there first).
    pub fn start_eviction_test(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == SlotState::Idle {
            inner.state = SlotState::EvictTesting;
            true
        } else {
            false
        }
    }

    /// Ends an eviction test. `EVICT_TESTING -> IDLE` in place, or
    /// `EVICT_OUT -> IDLE` with a re-enqueue instruction for the caller.
    pub fn end_eviction_test(&self) -> TestEndOutcome {
        let mut inner = self.inner.lock();
        match inner.state {
            SlotState::EvictOut => {
                inner.state = SlotState::Idle;
                TestEndOutcome::ReenqueueHead
            }
            _ => {
                inner.state = SlotState::Idle;
                TestEndOutcome::StillQueued
            }
        }
    }

    /// Take the resource out of a slot currently under eviction test, so
    /// the caller can run `activate`/`validate`/`passivate` on it outside
    /// any lock. `None` if the slot isn't in `EVICT_TESTING`.
    pub fn take_for_test(&self) -> Option<Box<R>> {
        let mut inner = self.inner.lock();
        if inner.state == SlotState::EvictTesting {
            inner.resource.take()
        } else {
            None
        }
    }

    /// Place a resource back into a slot that is still under eviction
    /// test, after [`Slot::take_for_test`] succeeded and the
    /// `testWhileIdle` checks passed.
    pub fn put_back_after_test(&self, resource: Box<R>) {
        self.inner.lock().resource = Some(resource);
    }

    /// `IDLE -> VALIDATION_TESTING`. Returns `false` if not idle.
    pub fn start_validation_test(&self) -> bool {
        let mut inner = self.inner.lock();
        if inner.state == SlotState::Idle {
            inner.state = SlotState::ValidationTesting;
            true
        } else {
            false
        }
    }

    /// Ends a `testWhileIdle` validation pass, symmetric to
    /// [`Slot::end_eviction_test`].
    pub fn end_validation_test(&self) -> TestEndOutcome {
        let mut inner = self.inner.lock();
        match inner.state {
            SlotState::ValidationOut => {
                inner.state = SlotState::Idle;
                TestEndOutcome::ReenqueueHead
            }
            _ => {
                inner.state = SlotState::Idle;
                TestEndOutcome::StillQueued
            }
        }
    }

    /// Terminal transition from any state. Returns the resource if one was
    /// present (it won't be, if the slot is currently `ALLOCATED` and the
    /// caller is invalidating via the borrower's own handle — in that case
    /// the caller already holds the resource and passes it back in
    /// separately).
    pub fn invalidate(&self) -> Option<Box<R>> {
        let mut inner = self.inner.lock();
        inner.state = SlotState::Invalid;
        inner.resource.take()
    }

    /// Force the slot straight to `Invalid` and hand back a resource the
    /// caller already owns (used when destroying a just-allocated or
    /// freshly-created slot whose resource was never placed back inside).
    pub fn mark_invalid(&self) {
        self.inner.lock().state = SlotState::Invalid;
    }
}

impl<R: std::fmt::Debug> std::fmt::Debug for Slot<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("Slot")
            .field("id", &self.id)
            .field("state", &inner.state)
            .field("resource", &inner.resource)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn allocate_from_idle_succeeds() {
        let slot = Slot::new(1, "r".to_string());
        assert_eq!(slot.allocate(), Some(Box::new("r".to_string())));
        assert_eq!(slot.state(), SlotState::Allocated);
    }

    #[test]
    fn addr_is_stable_across_allocate_and_store_idle() {
        let slot = Slot::new(1, "r".to_string());
        let addr = slot.addr();
        let r = slot.allocate().unwrap();
        assert_eq!(Box::as_ref(&r) as *const String as usize, addr);
        assert!(slot.begin_return());
        slot.store_idle(r);
        assert_eq!(slot.addr(), addr);
    }

    #[test]
    fn allocate_twice_fails() {
        let slot = Slot::new(1, "r".to_string());
        assert!(slot.allocate().is_some());
        assert_eq!(slot.allocate(), None);
    }

    #[test]
    fn return_roundtrip() {
        let slot = Slot::new(1, "r".to_string());
        let r = slot.allocate().unwrap();
        assert!(slot.begin_return());
        slot.store_idle(r);
        assert_eq!(slot.state(), SlotState::Idle);
    }

    #[test]
    fn double_return_fails() {
        let slot = Slot::new(1, "r".to_string());
        let r = slot.allocate().unwrap();
        assert!(slot.begin_return());
        slot.store_idle(r);
        assert!(!slot.begin_return());
    }

    #[test]
    fn eviction_test_blocks_allocate_and_flags_evict_out() {
        let slot = Slot::new(1, "r".to_string());
        assert!(slot.start_eviction_test());
        assert_eq!(slot.allocate(), None);
        assert_eq!(slot.state(), SlotState::EvictOut);
        assert_eq!(slot.end_eviction_test(), TestEndOutcome::ReenqueueHead);
        assert_eq!(slot.state(), SlotState::Idle);
    }

    #[test]
    fn eviction_test_without_race_ends_in_place() {
        let slot = Slot::new(1, "r".to_string());
        assert!(slot.start_eviction_test());
        assert_eq!(slot.end_eviction_test(), TestEndOutcome::StillQueued);
        assert_eq!(slot.state(), SlotState::Idle);
    }

    #[test]
    fn take_and_put_back_during_eviction_test() {
        let slot = Slot::new(1, "r".to_string());
        assert!(slot.start_eviction_test());
        let r = slot.take_for_test().unwrap();
        assert_eq!(slot.take_for_test(), None);
        slot.put_back_after_test(r);
        assert_eq!(slot.end_eviction_test(), TestEndOutcome::StillQueued);
        assert_eq!(slot.state(), SlotState::Idle);
    }

    #[test]
    fn invalidate_from_idle_returns_resource() {
        let slot = Slot::new(1, "r".to_string());
        assert_eq!(slot.invalidate(), Some(Box::new("r".to_string())));
        assert_eq!(slot.state(), SlotState::Invalid);
    }

    #[test]
    fn idle_time_grows_from_creation() {
        let slot = Slot::new(1, "r".to_string());
        std::thread::sleep(Duration::from_millis(5));
        assert!(slot.idle_time() >= Duration::from_millis(5));
    }
}
