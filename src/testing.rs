//! In-crate test tooling: a configurable mock [`Factory`].
//!
//! Mirrors the shape of the teacher's own mock collaborators — plain
//! atomic counters for call tallies, and a small set of `AtomicBool`
//! switches for injecting failures — rather than pulling in a mocking
//! framework the teacher's dependency graph doesn't already carry.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};

use crate::error::{Error, Result};
use crate::factory::Factory;

#[derive(Debug, thiserror::Error)]
#[error("mock factory failure: {0}")]
struct MockFailure(&'static str);

/// Call counters recorded by [`MockFactory`], shared via `Arc` so a test
/// can keep a handle after moving the factory into a [`crate::Pool`].
#[derive(Debug, Default)]
pub struct MockCounters {
    pub created: AtomicUsize,
    pub destroyed: AtomicUsize,
    pub validated: AtomicUsize,
    pub activated: AtomicUsize,
    pub passivated: AtomicUsize,
}

/// A [`Factory`] over `u64` handles, for tests and doctests.
///
/// Every produced resource is a fresh, monotonically increasing `u64`.
/// Failures can be injected on demand via `fail_next_*`, or permanently
/// via `fail_validate_always`, without needing a trait-object mock
/// library.
#[derive(Debug)]
pub struct MockFactory {
    next: AtomicU64,
    pub counters: Arc<MockCounters>,
    fail_next_create: AtomicBool,
    fail_next_activate: AtomicBool,
    fail_next_validate: AtomicBool,
    fail_next_passivate: AtomicBool,
    fail_validate_always: AtomicBool,
}

impl Default for MockFactory {
    fn default() -> Self {
        Self::new()
    }
}

impl MockFactory {
    pub fn new() -> Self {
        Self {
            next: AtomicU64::new(0),
            counters: Arc::new(MockCounters::default()),
            fail_next_create: AtomicBool::new(false),
            fail_next_activate: AtomicBool::new(false),
            fail_next_validate: AtomicBool::new(false),
            fail_next_passivate: AtomicBool::new(false),
            fail_validate_always: AtomicBool::new(false),
        }
    }

    pub fn counters(&self) -> Arc<MockCounters> {
        self.counters.clone()
    }

    pub fn fail_next_create(&self) {
        self.fail_next_create.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_activate(&self) {
        self.fail_next_activate.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_validate(&self) {
        self.fail_next_validate.store(true, Ordering::SeqCst);
    }

    pub fn fail_next_passivate(&self) {
        self.fail_next_passivate.store(true, Ordering::SeqCst);
    }

    pub fn fail_validate_always(&self, fail: bool) {
        self.fail_validate_always.store(fail, Ordering::SeqCst);
    }
}

impl Factory for MockFactory {
    type Resource = u64;

    async fn create(&self) -> Result<u64> {
        if self.fail_next_create.swap(false, Ordering::SeqCst) {
            return Err(Error::factory(MockFailure("create")));
        }
        self.counters.created.fetch_add(1, Ordering::SeqCst);
        Ok(self.next.fetch_add(1, Ordering::SeqCst))
    }

    async fn destroy(&self, _resource: u64) {
        self.counters.destroyed.fetch_add(1, Ordering::SeqCst);
    }

    async fn validate(&self, _resource: &mut u64) -> Result<bool> {
        self.counters.validated.fetch_add(1, Ordering::SeqCst);
        if self.fail_next_validate.swap(false, Ordering::SeqCst) {
            return Ok(false);
        }
        if self.fail_validate_always.load(Ordering::SeqCst) {
            return Ok(false);
        }
        Ok(true)
    }

    async fn activate(&self, _resource: &mut u64) -> Result<()> {
        if self.fail_next_activate.swap(false, Ordering::SeqCst) {
            return Err(Error::factory(MockFailure("activate")));
        }
        self.counters.activated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn passivate(&self, _resource: &mut u64) -> Result<()> {
        if self.fail_next_passivate.swap(false, Ordering::SeqCst) {
            return Err(Error::factory(MockFailure("passivate")));
        }
        self.counters.passivated.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
