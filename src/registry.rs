//! Registry of all slots currently admitted into a pool.
//!
//! Tracks every [`Slot`] the pool has created (idle or allocated) so the
//! pool can enforce `maxTotal`, answer `idle_count`/`active_count`, and
//! render the debug dump, without walking the idle queue for slots that
//! are currently lent out. Also maintains a secondary, address-keyed
//! index so a bare resource handed back outside of its `Guard` (see
//! [`crate::Pool::return_resource`]) can be mapped back to its owning
//! slot by identity rather than value equality.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;

use crate::slot::Slot;

/// Identity-keyed map from slot id to the owning [`Slot`], plus a
/// secondary map from resource address to slot id.
pub struct Registry<R> {
    slots: DashMap<u64, Arc<Slot<R>>>,
    by_addr: DashMap<usize, u64>,
    next_id: AtomicU64,
}

impl<R> Registry<R> {
    pub fn new() -> Self {
        Self {
            slots: DashMap::new(),
            by_addr: DashMap::new(),
            next_id: AtomicU64::new(0),
        }
    }

    /// Allocate the next slot identity. Used by the caller to build the
    /// `Slot` before inserting it.
    pub fn next_id(&self) -> u64 {
        self.next_id.fetch_add(1, Ordering::Relaxed)
    }

    pub fn insert(&self, slot: Arc<Slot<R>>) {
        self.by_addr.insert(slot.addr(), slot.id());
        self.slots.insert(slot.id(), slot);
    }

    pub fn remove(&self, id: u64) -> Option<Arc<Slot<R>>> {
        let removed = self.slots.remove(&id).map(|(_, slot)| slot)?;
        self.by_addr.remove(&removed.addr());
        Some(removed)
    }

    pub fn get(&self, id: u64) -> Option<Arc<Slot<R>>> {
        self.slots.get(&id).map(|entry| entry.clone())
    }

    /// Look up the slot that owns the resource currently living at `addr`,
    /// the resource-identity lookup the spec's registry mandates.
    pub fn get_by_addr(&self, addr: usize) -> Option<Arc<Slot<R>>> {
        let id = *self.by_addr.get(&addr)?;
        self.get(id)
    }

    pub fn len(&self) -> usize {
        self.slots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Snapshot of every registered slot, for `debug_dump`.
    pub fn all(&self) -> Vec<Arc<Slot<R>>> {
        self.slots.iter().map(|entry| entry.value().clone()).collect()
    }
}

impl<R> Default for Registry<R> {
    fn default() -> Self {
        Self::new()
    }
}
