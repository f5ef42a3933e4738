//! The resource factory contract the pool is driven by.
//!
//! Grounded in the teacher's `Resource` trait (`create`/`is_valid`/
//! `recycle`/`cleanup` as plain `async fn`s on a trait, no `async_trait`
//! macro needed), renamed to the vocabulary the spec uses throughout:
//! `create`/`destroy`/`validate`/`activate`/`passivate`. The pool never
//! calls any of these while holding a per-slot lock.

use std::future::Future;

use crate::error::Result;

/// Creates, destroys, validates, activates and passivates resources of one
/// kind for a [`crate::Pool`].
pub trait Factory: Send + Sync + 'static {
    /// The resource type this factory produces.
    type Resource: Send + 'static;

    /// Construct a brand-new resource. May fail.
    fn create(&self) -> impl Future<Output = Result<Self::Resource>> + Send;

    /// Best-effort teardown of a resource being permanently removed.
    /// Failures are always swallowed by the pool.
    fn destroy(&self, resource: Self::Resource) -> impl Future<Output = ()> + Send {
        async {
            drop(resource);
        }
    }

    /// Probe whether `resource` is still usable. A non-fatal `Err` is
    /// treated the same as `Ok(false)`: the resource is invalid. An `Err`
    /// wrapped in [`crate::Error::Fatal`] is rethrown instead of
    /// swallowed.
    fn validate(&self, _resource: &mut Self::Resource) -> impl Future<Output = Result<bool>> + Send {
        async { Ok(true) }
    }

    /// Prepare a resource for use after idle storage (or right after
    /// creation). May fail.
    fn activate(&self, _resource: &mut Self::Resource) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }

    /// Prepare a resource for idle storage before it re-enters the queue
    /// ("suspend"). May fail.
    fn passivate(&self, _resource: &mut Self::Resource) -> impl Future<Output = Result<()>> + Send {
        async { Ok(()) }
    }
}
