// LIFO/FIFO discipline laws (spec "Laws").

use std::sync::atomic::{AtomicU64, Ordering};

use quarrypool::{Factory, Pool, PoolConfig, Result};

struct CountingFactory {
    next_id: AtomicU64,
}

impl Factory for CountingFactory {
    type Resource = u64;

    async fn create(&self) -> Result<u64> {
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

fn config(lifo: bool) -> PoolConfig {
    PoolConfig {
        max_total: Some(8),
        min_idle: 0,
        lifo,
        time_between_eviction_runs: None,
        ..Default::default()
    }
}

#[tokio::test]
async fn lifo_returns_most_recently_added_first() {
    let pool = Pool::new(
        CountingFactory {
            next_id: AtomicU64::new(0),
        },
        config(true),
    )
    .unwrap();

    pool.add_object().await.unwrap(); // id 0
    pool.add_object().await.unwrap(); // id 1

    let first = *pool.borrow().await.unwrap();
    let second = *pool.borrow().await.unwrap();
    assert_eq!((first, second), (1, 0));
}

#[tokio::test]
async fn fifo_returns_in_insertion_order() {
    let pool = Pool::new(
        CountingFactory {
            next_id: AtomicU64::new(0),
        },
        config(false),
    )
    .unwrap();

    pool.add_object().await.unwrap(); // id 0
    pool.add_object().await.unwrap(); // id 1

    let first = *pool.borrow().await.unwrap();
    let second = *pool.borrow().await.unwrap();
    assert_eq!((first, second), (0, 1));
}
