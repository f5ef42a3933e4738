//! Generic object pool — the borrow/return/invalidate state machine,
//! admission control, and the background maintenance sweep.
//!
//! `Pool<F>` is generic over a [`Factory`]; it borrows, returns, and
//! evicts `F::Resource` values according to the [`PoolConfig`] it was
//! built with. Grounded in the teacher's `pool.rs` for the overall shape
//! (an `Arc<PoolInner>` behind a cheap-to-clone `Pool` handle, a
//! `parking_lot::Mutex` for fast-path state, `tracing` gated behind the
//! `tracing` feature, a `Guard` whose drop spawns the async return), with
//! the borrow/return/eviction logic itself replaced by the slot
//! state machine and idle-queue discipline the spec describes.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, Ordering};
use std::time::Duration;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;

use crate::error::{Error, FieldViolation, Result};
use crate::factory::Factory;
use crate::guard::Guard;
use crate::idle_queue::IdleQueue;
use crate::registry::Registry;
use crate::slot::{Slot, TestEndOutcome};

// ---------------------------------------------------------------------------
// PoolConfig
// ---------------------------------------------------------------------------

/// Configuration for a [`Pool`].
///
/// `None` is used throughout in place of the source's sentinel negative
/// values: `max_total`/`max_idle` of `None` means unbounded, `max_wait` of
/// `None` means block forever, `min_evictable_idle_time`/
/// `soft_min_evictable_idle_time` of `None` means that threshold is
/// disabled. A present `Duration::ZERO` for `max_wait` is still an
/// immediate, non-blocking poll — not "unbounded".
#[derive(Debug, Clone)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct PoolConfig {
    /// Upper bound on admitted resources. `None` means unlimited.
    pub max_total: Option<usize>,
    /// Upper bound on idle-queue occupancy at return time; excess
    /// returnees are destroyed instead of re-queued. `None` means
    /// unbounded.
    pub max_idle: Option<usize>,
    /// Replenishment floor maintained by the background sweep.
    pub min_idle: usize,
    /// Whether `borrow` blocks (up to `max_wait`) on exhaustion, or fails
    /// fast.
    pub block_when_exhausted: bool,
    /// Borrow timeout when blocking. `None` blocks forever;
    /// `Some(Duration::ZERO)` is a non-blocking poll.
    pub max_wait: Option<Duration>,
    /// Idle-queue discipline: `true` for LIFO (push/pop the head), `false`
    /// for FIFO (push the tail, pop the head).
    pub lifo: bool,
    /// Validate a resource before handing it to a borrower.
    pub test_on_borrow: bool,
    /// Validate a resource before accepting it back.
    pub test_on_return: bool,
    /// Maintenance re-validates idle resources each sweep.
    pub test_while_idle: bool,
    /// Period of the background maintenance task. `None` disables it.
    pub time_between_eviction_runs: Option<Duration>,
    /// Per-run examination budget. Negative means
    /// `ceil(idle_size / |n|)`.
    pub num_tests_per_eviction_run: i64,
    /// Unconditional idle-time eviction threshold. `None` disables it.
    pub min_evictable_idle_time: Option<Duration>,
    /// Soft idle-time threshold, applied only while `idle_count >
    /// min_idle`. `None` disables it.
    pub soft_min_evictable_idle_time: Option<Duration>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_total: Some(8),
            max_idle: Some(8),
            min_idle: 0,
            block_when_exhausted: true,
            max_wait: None,
            lifo: true,
            test_on_borrow: false,
            test_on_return: false,
            test_while_idle: false,
            time_between_eviction_runs: None,
            num_tests_per_eviction_run: 3,
            min_evictable_idle_time: Some(Duration::from_secs(30 * 60)),
            soft_min_evictable_idle_time: None,
        }
    }
}

impl PoolConfig {
    /// Validate this configuration, collecting every violated field
    /// rather than stopping at the first.
    pub fn validate(&self) -> Result<()> {
        let mut violations = Vec::new();

        if let Some(max_total) = self.max_total
            && self.min_idle > max_total
        {
            violations.push(FieldViolation::new(
                "min_idle",
                "must not exceed max_total",
                self.min_idle.to_string(),
            ));
        }

        if self.num_tests_per_eviction_run == 0 {
            violations.push(FieldViolation::new(
                "num_tests_per_eviction_run",
                "must not be zero",
                "0",
            ));
        }

        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::configuration(
                "invalid pool configuration",
                violations,
            ))
        }
    }
}

// ---------------------------------------------------------------------------
// Pool internals
// ---------------------------------------------------------------------------

struct MaintenanceHandle {
    cancel: CancellationToken,
    task: tokio::task::JoinHandle<()>,
}

struct PoolInner<F: Factory> {
    factory: F,
    config: RwLock<PoolConfig>,
    idle: IdleQueue<F::Resource>,
    registry: Registry<F::Resource>,
    /// Pre-increment/fail-rollback counter enforcing `max_total` across
    /// racing creators.
    create_count: AtomicI64,
    closed: AtomicBool,
    maintenance: parking_lot::Mutex<Option<MaintenanceHandle>>,
}

/// A generic, async, bounded pool of `F::Resource` values driven by a
/// [`Factory`].
pub struct Pool<F: Factory> {
    inner: Arc<PoolInner<F>>,
}

impl<F: Factory> Clone for Pool<F> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<F: Factory> std::fmt::Debug for Pool<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pool")
            .field("idle", &self.idle_count())
            .field("active", &self.active_count())
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl<F: Factory> Pool<F> {
    /// Construct a new pool. Spawns the background maintenance task
    /// immediately if `config.time_between_eviction_runs` is set.
    ///
    /// # Errors
    /// Returns `Error::Configuration` if `config` fails validation.
    pub fn new(factory: F, config: PoolConfig) -> Result<Self> {
        config.validate()?;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            max_total = ?config.max_total,
            max_idle = ?config.max_idle,
            min_idle = config.min_idle,
            lifo = config.lifo,
            "created new pool"
        );

        let pool = Self {
            inner: Arc::new(PoolInner {
                factory,
                idle: IdleQueue::new(),
                registry: Registry::new(),
                create_count: AtomicI64::new(0),
                closed: AtomicBool::new(false),
                maintenance: parking_lot::Mutex::new(None),
                config: RwLock::new(config),
            }),
        };

        let period = pool.inner.config.read().time_between_eviction_runs;
        if let Some(period) = period {
            pool.start_maintenance(period);
        }

        Ok(pool)
    }

    /// Replace the maintenance period, restarting the background task.
    /// Passing `None` (or a non-positive period through the helper
    /// constructors) stops it.
    pub fn set_time_between_eviction_runs(&self, period: Option<Duration>) {
        self.inner.config.write().time_between_eviction_runs = period;
        self.stop_maintenance();
        if let Some(period) = period {
            self.start_maintenance(period);
        }
    }

    fn start_maintenance(&self, period: Duration) {
        let cancel = CancellationToken::new();
        let pool = self.clone();
        let task_cancel = cancel.clone();
        let task = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            ticker.tick().await; // first tick fires immediately; skip it
            loop {
                tokio::select! {
                    () = task_cancel.cancelled() => return,
                    _ = ticker.tick() => {
                        pool.run_maintenance_once().await;
                    }
                }
            }
        });
        *self.inner.maintenance.lock() = Some(MaintenanceHandle { cancel, task });
    }

    fn stop_maintenance(&self) {
        if let Some(handle) = self.inner.maintenance.lock().take() {
            handle.cancel.cancel();
            handle.task.abort();
        }
    }

    // -- Borrow --------------------------------------------------------

    /// Borrow a resource, waiting according to `config.max_wait` if the
    /// pool is exhausted and `config.block_when_exhausted` is set.
    pub async fn borrow(&self) -> Result<Guard<F>> {
        let wait = self.inner.config.read().max_wait;
        self.borrow_with(wait).await
    }

    /// Borrow a resource, overriding the configured `max_wait` for this
    /// call only.
    pub async fn borrow_for(&self, timeout: Duration) -> Result<Guard<F>> {
        self.borrow_with(Some(timeout)).await
    }

    async fn borrow_with(&self, wait: Option<Duration>) -> Result<Guard<F>> {
        loop {
            if self.inner.closed.load(Ordering::Acquire) {
                return Err(Error::PoolClosed);
            }

            let (slot, just_created) = if let Some(slot) = self.inner.idle.poll_first() {
                (slot, false)
            } else if let Some(slot) = self.try_create().await? {
                (slot, true)
            } else {
                let block = self.inner.config.read().block_when_exhausted;
                if !block {
                    return Err(Error::no_such_element("Pool exhausted"));
                }
                (self.wait_for_idle(wait).await?, false)
            };

            let Some(mut resource) = slot.allocate() else {
                // Raced the evictor: this slot isn't ours, try again.
                continue;
            };

            if let Err(e) = self.inner.factory.activate(&mut *resource).await {
                self.destroy_held(&slot, resource).await;
                if just_created {
                    return Err(Error::no_such_element_caused_by(
                        "Unable to activate object",
                        e,
                    ));
                }
                continue;
            }

            if self.inner.config.read().test_on_borrow {
                match self.inner.factory.validate(&mut *resource).await {
                    Ok(true) => {}
                    Ok(false) => {
                        self.destroy_held(&slot, resource).await;
                        if just_created {
                            return Err(Error::no_such_element(
                                "Unable to validate object",
                            ));
                        }
                        continue;
                    }
                    Err(e) if e.is_fatal() => return Err(e),
                    Err(e) => {
                        self.destroy_held(&slot, resource).await;
                        if just_created {
                            return Err(Error::no_such_element_caused_by(
                                "Unable to validate object",
                                e,
                            ));
                        }
                        continue;
                    }
                }
            }

            #[cfg(feature = "tracing")]
            tracing::trace!(slot_id = slot.id(), "borrow");

            return Ok(Guard::new(self.clone(), slot, resource));
        }
    }

    async fn wait_for_idle(&self, wait: Option<Duration>) -> Result<Arc<Slot<F::Resource>>> {
        let deadline = wait.map(|d| tokio::time::Instant::now() + d);
        loop {
            if self.inner.closed.load(Ordering::Acquire) {
                return Err(Error::PoolClosed);
            }
            if let Some(slot) = self.inner.idle.poll_first() {
                return Ok(slot);
            }
            if wait == Some(Duration::ZERO) {
                return Err(Error::no_such_element("Timeout waiting for idle object"));
            }

            let notified = self.inner.idle.notified();
            tokio::pin!(notified);
            match deadline {
                Some(dl) => {
                    tokio::select! {
                        () = &mut notified => {}
                        () = tokio::time::sleep_until(dl) => {
                            if self.inner.closed.load(Ordering::Acquire) {
                                return Err(Error::PoolClosed);
                            }
                            return self
                                .inner
                                .idle
                                .poll_first()
                                .ok_or_else(|| Error::no_such_element("Timeout waiting for idle object"));
                        }
                    }
                }
                None => notified.await,
            }
        }
    }

    // -- Return / invalidate --------------------------------------------

    /// Return a borrowed resource to the pool. Called by `Guard`'s drop
    /// (spawned as a background task) and by [`Pool::release`].
    pub(crate) async fn return_object(&self, slot: Arc<Slot<F::Resource>>, resource: Box<F::Resource>) {
        if let Err(e) = self.return_object_inner(slot, resource).await {
            #[cfg(feature = "tracing")]
            tracing::debug!(error = %e, "error while returning object to pool");
            #[cfg(not(feature = "tracing"))]
            let _ = e;
        }
    }

    async fn return_object_inner(
        &self,
        slot: Arc<Slot<F::Resource>>,
        mut resource: Box<F::Resource>,
    ) -> Result<()> {
        if !slot.begin_return() {
            return Err(Error::illegal_state("Object has already been returned"));
        }

        if self.inner.config.read().test_on_return {
            match self.inner.factory.validate(&mut *resource).await {
                Ok(true) => {}
                _ => {
                    self.destroy_held(&slot, resource).await;
                    return Ok(());
                }
            }
        }

        if let Err(_e) = self.inner.factory.passivate(&mut *resource).await {
            self.destroy_held(&slot, resource).await;
            return Ok(());
        }

        let max_idle = self.inner.config.read().max_idle;
        let over_capacity = max_idle.is_some_and(|max| self.inner.idle.len() >= max);
        if self.inner.closed.load(Ordering::Acquire) || over_capacity {
            self.destroy_held(&slot, resource).await;
            return Ok(());
        }

        #[cfg(feature = "tracing")]
        tracing::trace!(slot_id = slot.id(), "returned to idle queue");

        slot.store_idle(resource);
        self.enqueue_idle(slot);
        Ok(())
    }

    /// Await a guard's return completing, rather than letting `Drop`
    /// spawn it in the background.
    pub async fn release(&self, guard: Guard<F>) {
        let (pool, slot, resource) = guard.disarm();
        pool.return_object(slot, resource).await;
    }

    /// Unconditionally destroy a borrowed resource instead of returning
    /// it to the idle queue.
    pub async fn invalidate(&self, guard: Guard<F>) {
        let (pool, slot, resource) = guard.disarm();
        #[cfg(feature = "tracing")]
        tracing::trace!(slot_id = slot.id(), "invalidate");
        pool.destroy_held(&slot, resource).await;
    }

    /// Return a bare, previously-checked-out resource to the pool by
    /// identity lookup rather than through its `Guard`'s attached slot —
    /// obtained via [`Guard::into_resource`]. Fails with
    /// `Error::IllegalState` if `resource` isn't currently checked out of
    /// this pool: either it was never produced by this pool, or it was
    /// already returned.
    pub async fn return_resource(&self, resource: Box<F::Resource>) -> Result<()> {
        let slot = self.slot_by_resource(&resource)?;
        #[cfg(feature = "tracing")]
        tracing::trace!(slot_id = slot.id(), "return_resource via identity lookup");
        self.return_object_inner(slot, resource).await
    }

    /// Destroy a bare, previously-checked-out resource by identity
    /// lookup, the `Guard`-free analogue of [`Pool::invalidate`]. Same
    /// `Error::IllegalState` conditions as [`Pool::return_resource`].
    pub async fn invalidate_resource(&self, resource: Box<F::Resource>) -> Result<()> {
        let slot = self.slot_by_resource(&resource)?;
        #[cfg(feature = "tracing")]
        tracing::trace!(slot_id = slot.id(), "invalidate_resource via identity lookup");
        self.destroy_held(&slot, resource).await;
        Ok(())
    }

    fn slot_by_resource(&self, resource: &F::Resource) -> Result<Arc<Slot<F::Resource>>> {
        let addr = resource as *const F::Resource as usize;
        self.inner.registry.get_by_addr(addr).ok_or_else(|| {
            Error::illegal_state("Returned object not currently part of this pool")
        })
    }

    /// Destroy a slot whose resource the caller already holds outside the
    /// slot (just allocated, or pulled out for validation/passivation).
    async fn destroy_held(&self, slot: &Arc<Slot<F::Resource>>, resource: Box<F::Resource>) {
        #[cfg(feature = "tracing")]
        tracing::debug!(slot_id = slot.id(), "destroying held resource");
        self.inner.idle.remove(slot);
        self.inner.registry.remove(slot.id());
        slot.mark_invalid();
        self.inner.create_count.fetch_sub(1, Ordering::SeqCst);
        self.inner.factory.destroy(*resource).await;
    }

    /// Destroy a queue-resident slot, pulling its resource out first.
    async fn destroy_idle_slot(&self, slot: &Arc<Slot<F::Resource>>) {
        #[cfg(feature = "tracing")]
        tracing::debug!(slot_id = slot.id(), "destroying idle slot");
        self.inner.idle.remove(slot);
        self.inner.registry.remove(slot.id());
        let resource = slot.invalidate();
        self.inner.create_count.fetch_sub(1, Ordering::SeqCst);
        if let Some(resource) = resource {
            self.inner.factory.destroy(*resource).await;
        }
    }

    fn enqueue_idle(&self, slot: Arc<Slot<F::Resource>>) {
        if self.inner.config.read().lifo {
            self.inner.idle.push_front(slot);
        } else {
            self.inner.idle.push_back(slot);
        }
    }

    // -- Admission control -----------------------------------------------

    async fn try_create(&self) -> Result<Option<Arc<Slot<F::Resource>>>> {
        let max_total = self.inner.config.read().max_total;
        let reserved = self.inner.create_count.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(max) = max_total
            && reserved as usize > max
        {
            self.inner.create_count.fetch_sub(1, Ordering::SeqCst);
            return Ok(None);
        }

        match self.inner.factory.create().await {
            Ok(resource) => {
                let id = self.inner.registry.next_id();
                let slot = Arc::new(Slot::new(id, resource));
                self.inner.registry.insert(slot.clone());
                Ok(Some(slot))
            }
            Err(e) => {
                self.inner.create_count.fetch_sub(1, Ordering::SeqCst);
                Err(e)
            }
        }
    }

    // -- Pool-level operations --------------------------------------------

    /// Create a resource and add it directly to the idle queue.
    pub async fn add_object(&self) -> Result<()> {
        if self.inner.closed.load(Ordering::Acquire) {
            return Err(Error::PoolClosed);
        }
        let slot = self
            .try_create()
            .await?
            .ok_or_else(|| Error::no_such_element("Pool exhausted"))?;
        let mut resource = slot.allocate().expect("freshly created slot is idle");
        if let Err(e) = self.inner.factory.passivate(&mut *resource).await {
            self.destroy_held(&slot, resource).await;
            return Err(e);
        }
        slot.begin_return();
        slot.store_idle(resource);

        #[cfg(feature = "tracing")]
        tracing::trace!(slot_id = slot.id(), "added object directly to idle queue");

        self.enqueue_idle(slot);
        Ok(())
    }

    /// Destroy every currently-idle resource. Does not affect resources
    /// that are currently borrowed.
    pub async fn clear(&self) {
        while let Some(slot) = self.inner.idle.poll_first() {
            self.destroy_idle_slot(&slot).await;
        }
    }

    /// Close the pool. One-shot: only the first caller runs the close
    /// path. Stops maintenance, destroys idle resources, and wakes any
    /// borrower blocked in `borrow` so it observes `Error::PoolClosed`
    /// instead of waiting out `max_wait`.
    pub async fn close(&self) {
        if self
            .inner
            .closed
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            return;
        }

        #[cfg(feature = "tracing")]
        tracing::debug!("closing pool");

        self.stop_maintenance();
        self.inner.idle.notify_all();
        self.clear().await;
    }

    pub fn idle_count(&self) -> usize {
        self.inner.idle.len()
    }

    /// `registry_size - idle_count`. Transiently over-counts slots under
    /// eviction/validation test as active — acceptable for metrics, per
    /// the spec's own design note.
    pub fn active_count(&self) -> usize {
        self.inner
            .registry
            .len()
            .saturating_sub(self.idle_count())
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// Textual dump of every registered slot, suitable for logs. Not
    /// machine-parsed.
    pub fn debug_dump(&self) -> String
    where
        F::Resource: std::fmt::Debug,
    {
        let mut out = format!(
            "active: {}, idle: {}\n",
            self.active_count(),
            self.idle_count()
        );
        for slot in self.inner.registry.all() {
            out.push_str(&format!("{:?}\n", slot));
        }
        out
    }

    // -- Maintenance -------------------------------------------------------

    async fn run_maintenance_once(&self) {
        if let Err(e) = self.evict_sweep().await {
            #[cfg(feature = "tracing")]
            tracing::debug!(error = %e, "maintenance evict sweep failed");
            let _ = e;
        }
        self.ensure_min_idle().await;

        #[cfg(feature = "tracing")]
        tracing::debug!(
            idle = self.idle_count(),
            active = self.active_count(),
            "maintenance sweep complete"
        );
    }

    async fn evict_sweep(&self) -> Result<()> {
        let config = self.inner.config.read().clone();
        let idle_size = self.idle_count();
        if idle_size == 0 {
            return Ok(());
        }

        let m = if config.num_tests_per_eviction_run >= 0 {
            (config.num_tests_per_eviction_run as usize).min(idle_size)
        } else {
            let n = config.num_tests_per_eviction_run.unsigned_abs() as usize;
            idle_size.div_ceil(n)
        };

        let snapshot = if config.lifo {
            self.inner.idle.snapshot_reverse()
        } else {
            self.inner.idle.snapshot_forward()
        };

        let idle_evict_time = config
            .min_evictable_idle_time
            .filter(|d| !d.is_zero());
        let idle_soft_evict_time = config
            .soft_min_evictable_idle_time
            .filter(|d| !d.is_zero());

        let mut tested = 0usize;
        let mut fatal: Option<Error> = None;
        for slot in snapshot {
            if tested >= m {
                break;
            }
            if !slot.start_eviction_test() {
                continue;
            }
            tested += 1;

            let idle_time = slot.idle_time();
            let current_idle = self.idle_count();
            let should_evict = idle_evict_time.is_some_and(|t| idle_time > t)
                || (idle_soft_evict_time.is_some_and(|t| idle_time > t)
                    && current_idle > config.min_idle);

            if should_evict {
                #[cfg(feature = "tracing")]
                tracing::trace!(slot_id = slot.id(), idle_ms = idle_time.as_millis() as u64, "evicting idle slot");
                self.destroy_idle_slot(&slot).await;
                continue;
            }

            if config.test_while_idle
                && let Some(mut resource) = slot.take_for_test()
            {
                let mut failed = false;
                if let Err(e) = self.inner.factory.activate(&mut *resource).await {
                    if e.is_fatal() {
                        fatal = Some(e);
                    }
                    failed = true;
                }
                if !failed {
                    match self.inner.factory.validate(&mut *resource).await {
                        Ok(true) => {}
                        Ok(false) => failed = true,
                        Err(e) => {
                            if e.is_fatal() {
                                fatal = Some(e);
                            }
                            failed = true;
                        }
                    }
                }
                if !failed
                    && let Err(e) = self.inner.factory.passivate(&mut *resource).await
                {
                    if e.is_fatal() {
                        fatal = Some(e);
                    }
                    failed = true;
                }
                if failed {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(slot_id = slot.id(), "testWhileIdle check failed, destroying slot");
                    self.destroy_held(&slot, resource).await;
                    continue;
                }
                slot.put_back_after_test(resource);
            }

            match slot.end_eviction_test() {
                TestEndOutcome::StillQueued => {}
                TestEndOutcome::ReenqueueHead => self.inner.idle.push_front(slot),
            }
        }

        match fatal {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn ensure_min_idle(&self) {
        let min_idle = self.inner.config.read().min_idle;
        while self.idle_count() < min_idle {
            match self.try_create().await {
                Ok(Some(slot)) => {
                    let resource = slot.allocate().expect("freshly created slot is idle");
                    slot.begin_return();
                    slot.store_idle(resource);
                    self.enqueue_idle(slot);
                }
                _ => break,
            }
        }
    }
}
