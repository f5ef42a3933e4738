// Minimal pool example: a factory of `String` "connections".
//
// Shows the smallest possible Factory implementation and a borrow/use/
// return cycle through a Pool.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use quarrypool::{Factory, Pool, PoolConfig, Result};

struct Connections {
    next_id: AtomicU64,
}

impl Factory for Connections {
    type Resource = String;

    async fn create(&self) -> Result<String> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        println!("  [create] connection-{id}");
        Ok(format!("connection-{id}"))
    }

    async fn destroy(&self, resource: String) {
        println!("  [destroy] {resource}");
    }
}

#[tokio::main]
async fn main() -> std::result::Result<(), Box<dyn std::error::Error>> {
    println!("=== Basic Pool Example ===\n");

    let config = PoolConfig {
        max_total: Some(4),
        min_idle: 1,
        max_wait: Some(Duration::from_secs(5)),
        ..Default::default()
    };

    let pool = Pool::new(
        Connections {
            next_id: AtomicU64::new(0),
        },
        config,
    )?;
    println!("Pool created (max_total=4, min_idle=1)");

    let guard = pool.borrow().await?;
    println!("Borrowed: {}", *guard);

    drop(guard);
    tokio::time::sleep(Duration::from_millis(20)).await;
    println!(
        "Returned to pool (idle={}, active={})",
        pool.idle_count(),
        pool.active_count()
    );

    pool.close().await;
    println!("Pool closed");

    Ok(())
}
