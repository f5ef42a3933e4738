//! RAII handle returned by [`crate::Pool::borrow`].
//!
//! Dereferences to the borrowed resource. Dropping the guard hands the
//! resource back to the pool; because the real return path is async (it
//! may run `validate`/`passivate`), `Drop` spawns the return as a
//! background task on the pool's runtime — the same sync/async mismatch
//! the teacher's original pool resolved the same way. Call
//! [`Pool::release`](crate::Pool::release) instead when the caller needs
//! to observe the return complete (tests, graceful shutdown paths).
//!
//! The resource is stored boxed, not inline: its heap address is the
//! registry's resource-identity key (see [`crate::registry::Registry`]),
//! and that address must stay fixed for as long as the resource is
//! checked out, including while it sits inside this guard.

use std::sync::Arc;

use crate::factory::Factory;
use crate::pool::Pool;
use crate::slot::Slot;

/// Borrowed resource, returned to its pool on drop.
pub struct Guard<F: Factory> {
    pool: Pool<F>,
    slot: Option<Arc<Slot<F::Resource>>>,
    resource: Option<Box<F::Resource>>,
}

impl<F: Factory> Guard<F> {
    pub(crate) fn new(
        pool: Pool<F>,
        slot: Arc<Slot<F::Resource>>,
        resource: Box<F::Resource>,
    ) -> Self {
        Self {
            pool,
            slot: Some(slot),
            resource: Some(resource),
        }
    }

    /// Take the slot and resource out of the guard without running the
    /// drop callback, for callers (`Pool::release`, `Pool::invalidate`)
    /// that will finish the return/destroy themselves.
    pub(crate) fn disarm(mut self) -> (Pool<F>, Arc<Slot<F::Resource>>, Box<F::Resource>) {
        let slot = self.slot.take().expect("guard used after disarm");
        let resource = self.resource.take().expect("guard used after disarm");
        (self.pool.clone(), slot, resource)
    }

    /// Take the bare, boxed resource out of the guard, abandoning
    /// automatic return-on-drop. The slot stays `ALLOCATED` until the
    /// caller hands the resource back via [`Pool::return_resource`] or
    /// [`Pool::invalidate_resource`], looked up by resource identity
    /// rather than through this guard's attached slot — the Rust shape
    /// of the spec's bare `return(r)`/`invalidate(r)` operations.
    pub fn into_resource(mut self) -> Box<F::Resource> {
        self.slot.take();
        self.resource.take().expect("guard used after disarm")
    }
}

impl<F: Factory> std::ops::Deref for Guard<F> {
    type Target = F::Resource;

    fn deref(&self) -> &F::Resource {
        self.resource.as_deref().expect("guard used after disarm")
    }
}

impl<F: Factory> std::ops::DerefMut for Guard<F> {
    fn deref_mut(&mut self) -> &mut F::Resource {
        self.resource.as_deref_mut().expect("guard used after disarm")
    }
}

impl<F: Factory> Drop for Guard<F> {
    fn drop(&mut self) {
        if let (Some(slot), Some(resource)) = (self.slot.take(), self.resource.take()) {
            let pool = self.pool.clone();
            tokio::spawn(async move {
                pool.return_object(slot, resource).await;
            });
        }
    }
}

impl<F> std::fmt::Debug for Guard<F>
where
    F: Factory,
    F::Resource: std::fmt::Debug,
{
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Guard").field("resource", &self.resource).finish()
    }
}
