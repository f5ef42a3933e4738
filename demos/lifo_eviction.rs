// Demonstrates LIFO borrow order and the background maintenance sweep
// evicting resources that have been idle past `min_evictable_idle_time`.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use quarrypool::{Factory, Pool, PoolConfig, Result};

struct Connections {
    next_id: AtomicU64,
}

impl Factory for Connections {
    type Resource = u64;

    async fn create(&self) -> Result<u64> {
        Ok(self.next_id.fetch_add(1, Ordering::SeqCst))
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    println!("=== LIFO + Eviction Example ===\n");

    let config = PoolConfig {
        max_total: Some(8),
        min_idle: 0,
        lifo: true,
        time_between_eviction_runs: Some(Duration::from_millis(50)),
        min_evictable_idle_time: Some(Duration::from_millis(100)),
        num_tests_per_eviction_run: -1,
        ..Default::default()
    };

    let pool = Pool::new(
        Connections {
            next_id: AtomicU64::new(0),
        },
        config,
    )?;

    let a = pool.borrow().await?;
    let id_a = *a;
    drop(a);
    let b = pool.borrow().await?;
    let id_b = *b;
    drop(b);

    tokio::time::sleep(Duration::from_millis(20)).await;

    // LIFO: the most recently returned connection (`b`) comes back first.
    let reborrowed = pool.borrow().await?;
    println!("LIFO re-borrow: expected {id_b}, got {}", *reborrowed);
    drop(reborrowed);

    println!("Idle before eviction: {}", pool.idle_count());
    tokio::time::sleep(Duration::from_millis(300)).await;
    println!("Idle after eviction sweep: {}", pool.idle_count());
    let _ = id_a;

    pool.close().await;
    Ok(())
}
