// Resource-identity lookup: `Pool::return_resource`/`invalidate_resource`
// operate on a bare resource (obtained via `Guard::into_resource`) rather
// than a `Guard`'s attached slot, by looking the owning slot up via the
// registry's address-keyed index (spec.md §3/§4.3).

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use quarrypool::{Error, Factory, Pool, PoolConfig, Result};

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
async fn return_resource_requeues_by_identity() {
    let destroyed = Arc::new(AtomicU64::new(0));
    let pool = pool(destroyed);

    let guard = pool.borrow().await.unwrap();
    assert_eq!(pool.active_count(), 1);

    let resource = guard.into_resource();
    pool.return_resource(resource).await.unwrap();

    assert_eq!(pool.idle_count(), 1);
    assert_eq!(pool.active_count(), 0);
}

#[tokio::test]
async fn invalidate_resource_destroys_by_identity() {
    let destroyed = Arc::new(AtomicU64::new(0));
    let pool = pool(destroyed.clone());

    let guard = pool.borrow().await.unwrap();
    let resource = guard.into_resource();
    pool.invalidate_resource(resource).await.unwrap();

    assert_eq!(pool.idle_count(), 0);
    assert_eq!(pool.active_count(), 0);
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn return_resource_rejects_a_value_the_pool_never_created() {
    let destroyed = Arc::new(AtomicU64::new(0));
    let pool = pool(destroyed);

    let foreign = Box::new(999u64);
    let err = pool.return_resource(foreign).await.unwrap_err();
    assert!(matches!(err, Error::IllegalState { .. }));
}

#[tokio::test]
async fn invalidate_resource_rejects_a_value_the_pool_never_created() {
    let destroyed = Arc::new(AtomicU64::new(0));
    let pool = pool(destroyed);

    let foreign = Box::new(999u64);
    let err = pool.invalidate_resource(foreign).await.unwrap_err();
    assert!(matches!(err, Error::IllegalState { .. }));
}
