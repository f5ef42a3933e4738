// Guard RAII behaviour: drop returns the resource in the background, and
// `invalidate` destroys instead of requeueing. Ownership means a `Guard`
// can't be returned twice through this API (see pool.rs's own
// `double_return_is_rejected_with_illegal_state` unit test, and
// pool_identity.rs, for the double-return and foreign-resource paths
// reachable through the bare identity-lookup API).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use quarrypool::{Factory, Pool, PoolConfig, Result};

struct CountingFactory {
    next_id: AtomicU64,
    destroyed: Arc<AtomicU64>,
}

impl Factory for CountingFactory {
    type Resource = u64;

    async fn create(&self) -> Result<u64> {
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }

    async fn destroy(&self, _resource: u64) {
        self.destroyed.fetch_add(1, Ordering::SeqCst);
    }
}

fn pool(destroyed: Arc<AtomicU64>) -> Pool<CountingFactory> {
    Pool::new(
        CountingFactory {
            next_id: AtomicU64::new(0),
            destroyed,
        },
        PoolConfig {
            max_total: Some(4),
            min_idle: 0,
            time_between_eviction_runs: None,
            ..Default::default()
        },
    )
    .unwrap()
}

#[tokio::test]
async fn dropping_a_guard_returns_it_to_the_idle_queue() {
    let destroyed = Arc::new(AtomicU64::new(0));
    let pool = pool(destroyed);

    let guard = pool.borrow().await.unwrap();
    assert_eq!(pool.active_count(), 1);
    drop(guard);

    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(pool.idle_count(), 1);
    assert_eq!(pool.active_count(), 0);
}

#[tokio::test]
async fn release_awaits_the_return_synchronously() {
    let destroyed = Arc::new(AtomicU64::new(0));
    let pool = pool(destroyed);

    let guard = pool.borrow().await.unwrap();
    pool.release(guard).await;

    // No sleep needed: release() doesn't return until the object is idle.
    assert_eq!(pool.idle_count(), 1);
}

#[tokio::test]
async fn invalidate_destroys_instead_of_requeueing() {
    let destroyed = Arc::new(AtomicU64::new(0));
    let pool = pool(destroyed.clone());

    let guard = pool.borrow().await.unwrap();
    pool.invalidate(guard).await;

    assert_eq!(pool.idle_count(), 0);
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
}
