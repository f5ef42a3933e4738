// `close()` semantics (spec invariant 3) and `clear()`.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

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

#[tokio::test]
async fn close_is_one_shot_and_rejects_subsequent_borrows() {
    let destroyed = Arc::new(AtomicU64::new(0));
    let config = PoolConfig {
        max_total: Some(4),
        min_idle: 0,
        time_between_eviction_runs: None,
        ..Default::default()
    };
    let pool = Pool::new(
        CountingFactory {
            next_id: AtomicU64::new(0),
            destroyed: destroyed.clone(),
        },
        config,
    )
    .unwrap();

    pool.add_object().await.unwrap();
    pool.add_object().await.unwrap();
    assert_eq!(pool.idle_count(), 2);

    pool.close().await;
    assert!(pool.is_closed());
    assert_eq!(pool.idle_count(), 0);
    assert_eq!(destroyed.load(Ordering::SeqCst), 2);

    let err = pool.borrow().await.unwrap_err();
    assert!(matches!(err, Error::PoolClosed));

    // Idempotent: a second close doesn't double-destroy or panic.
    pool.close().await;
    assert_eq!(destroyed.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn close_wakes_a_borrower_blocked_on_exhaustion() {
    let destroyed = Arc::new(AtomicU64::new(0));
    let config = PoolConfig {
        max_total: Some(1),
        min_idle: 0,
        block_when_exhausted: true,
        max_wait: Some(Duration::from_secs(10)),
        time_between_eviction_runs: None,
        ..Default::default()
    };
    let pool = Pool::new(
        CountingFactory {
            next_id: AtomicU64::new(0),
            destroyed,
        },
        config,
    )
    .unwrap();

    let _guard = pool.borrow().await.unwrap();

    let waiter_pool = pool.clone();
    let waiter = tokio::spawn(async move { waiter_pool.borrow().await });

    tokio::time::sleep(Duration::from_millis(30)).await;
    let started = tokio::time::Instant::now();
    pool.close().await;

    let result = tokio::time::timeout(Duration::from_secs(1), waiter)
        .await
        .expect("waiter should wake promptly on close")
        .unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(matches!(result, Err(Error::PoolClosed)));
}

#[tokio::test]
async fn clear_destroys_idle_but_not_allocated_resources() {
    let destroyed = Arc::new(AtomicU64::new(0));
    let config = PoolConfig {
        max_total: Some(4),
        min_idle: 0,
        time_between_eviction_runs: None,
        ..Default::default()
    };
    let pool = Pool::new(
        CountingFactory {
            next_id: AtomicU64::new(0),
            destroyed: destroyed.clone(),
        },
        config,
    )
    .unwrap();

    let guard = pool.borrow().await.unwrap();
    pool.add_object().await.unwrap();
    assert_eq!(pool.idle_count(), 1);

    pool.clear().await;

    assert_eq!(pool.idle_count(), 0);
    assert_eq!(destroyed.load(Ordering::SeqCst), 1);
    assert_eq!(pool.active_count(), 1, "allocated slot untouched by clear");
    drop(guard);
}
