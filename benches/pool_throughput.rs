// Pool throughput benchmarks.
//
// Measures raw pool borrow/return overhead with a zero-cost resource
// (no I/O, instant create/validate/activate/passivate).

use std::hint::black_box;
use std::time::Duration;

use criterion::{Criterion, criterion_group, criterion_main};
use quarrypool::{Factory, Pool, PoolConfig, Result};

struct NoOpFactory;

impl Factory for NoOpFactory {
    type Resource = u64;

    async fn create(&self) -> Result<u64> {
        Ok(0)
    }
}

fn pool_config(max_total: usize) -> PoolConfig {
    PoolConfig {
        max_total: Some(max_total),
        min_idle: 0,
        max_wait: Some(Duration::from_secs(5)),
        time_between_eviction_runs: None,
        ..Default::default()
    }
}

fn single_thread_throughput(c: &mut Criterion) {
    let rt = tokio::runtime::Runtime::new().expect("failed to build runtime");

    let pool = Pool::new(NoOpFactory, pool_config(64)).expect("failed to create pool");

    rt.block_on(async {
        let g = pool.borrow().await.unwrap();
        drop(g);
        tokio::time::sleep(Duration::from_millis(10)).await;
    });

    c.bench_function("single_thread_borrow_return", |b| {
        b.to_async(&rt).iter(|| {
            let pool = pool.clone();
            async move {
                let guard = pool.borrow().await.unwrap();
                drop(guard);
                tokio::task::yield_now().await;
                black_box(())
            }
        });
    });
}

fn multi_thread_throughput(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .expect("failed to build runtime");

    let pool = Pool::new(NoOpFactory, pool_config(64)).expect("failed to create pool");

    rt.block_on(async {
        let mut guards = Vec::new();
        for _ in 0..8 {
            guards.push(pool.borrow().await.unwrap());
        }
        drop(guards);
        tokio::time::sleep(Duration::from_millis(20)).await;
    });

    c.bench_function("multi_thread_borrow_return", |b| {
        b.to_async(&rt).iter(|| {
            let pool = pool.clone();
            async move {
                let guard = pool.borrow().await.unwrap();
                drop(guard);
                tokio::task::yield_now().await;
                black_box(())
            }
        });
    });
}

fn concurrent_contention(c: &mut Criterion) {
    let rt = tokio::runtime::Builder::new_multi_thread()
        .worker_threads(4)
        .enable_all()
        .build()
        .expect("failed to build runtime");

    // Small pool to create contention.
    let pool = Pool::new(NoOpFactory, pool_config(4)).expect("failed to create pool");

    c.bench_function("contended_borrow_return_4slots", |b| {
        b.to_async(&rt).iter(|| {
            let pool = pool.clone();
            async move {
                let guard = pool.borrow().await.unwrap();
                drop(guard);
                tokio::task::yield_now().await;
                black_box(())
            }
        });
    });
}

criterion_group!(
    benches,
    single_thread_throughput,
    multi_thread_throughput,
    concurrent_contention,
);
criterion_main!(benches);
