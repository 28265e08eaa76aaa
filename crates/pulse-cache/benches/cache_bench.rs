use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::runtime::Runtime;

use pulse_cache::{CacheClient, CacheConfig, CacheEntry, MemoryStore, SetOptions};

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Transaction {
    id: u64,
    account_id: u64,
    amount: f64,
    category: String,
}

/// Crea N transacciones de prueba
fn create_transactions(n: usize) -> Vec<Transaction> {
    (0..n as u64)
        .map(|i| Transaction {
            id: i,
            account_id: i % 7,
            amount: i as f64 * 1.25,
            category: format!("category-{}", i % 12),
        })
        .collect()
}

fn connected_client(rt: &Runtime) -> CacheClient {
    let cache = CacheClient::new(Arc::new(MemoryStore::default()), CacheConfig::default());
    rt.block_on(cache.connect()).unwrap();
    cache
}

/// Benchmark: get (hit)
fn bench_cache_get_hit(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let cache = connected_client(&rt);
    let transactions = create_transactions(100);

    rt.block_on(async {
        cache
            .set("transactions:user:1", &transactions, &SetOptions::new())
            .await;
    });

    c.bench_function("cache_get_hit", |b| {
        b.to_async(&rt).iter(|| async {
            let result: Option<Vec<Transaction>> = cache.get("transactions:user:1").await;
            std::hint::black_box(result)
        });
    });
}

/// Benchmark: get (miss)
fn bench_cache_get_miss(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let cache = connected_client(&rt);

    c.bench_function("cache_get_miss", |b| {
        b.to_async(&rt).iter(|| async {
            let result: Option<Vec<Transaction>> = cache.get("transactions:nobody").await;
            std::hint::black_box(result)
        });
    });
}

/// Benchmark: set con diferentes tamanos de payload
fn bench_cache_set_varying_sizes(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let mut group = c.benchmark_group("cache_set_sizes");

    for size in [10, 100, 1000].iter() {
        let cache = connected_client(&rt);
        let transactions = Arc::new(create_transactions(*size));

        group.throughput(Throughput::Elements(1));
        group.bench_with_input(BenchmarkId::from_parameter(size), size, |b, _size| {
            let counter = Arc::new(AtomicU64::new(0));
            b.to_async(&rt).iter(|| {
                let cache = cache.clone();
                let transactions = Arc::clone(&transactions);
                let counter = Arc::clone(&counter);
                async move {
                    let n = counter.fetch_add(1, Ordering::Relaxed);
                    cache
                        .set(&format!("transactions:user:{n}"), &*transactions, &SetOptions::new())
                        .await;
                }
            });
        });
    }

    group.finish();
}

/// Benchmark: batch_set + batch_get de 50 keys
fn bench_cache_batch(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let cache = connected_client(&rt);
    let entries: Vec<CacheEntry<Transaction>> = create_transactions(50)
        .into_iter()
        .map(|t| CacheEntry::new(format!("transaction:{}", t.id), t))
        .collect();
    let keys: Vec<String> = entries.iter().map(|e| e.key.clone()).collect();

    c.bench_function("cache_batch_set_get_50", |b| {
        b.to_async(&rt).iter(|| async {
            cache.batch_set(&entries).await;
            let values: Vec<Option<Transaction>> = cache.batch_get(&keys).await;
            std::hint::black_box(values)
        });
    });
}

/// Benchmark: invalidacion por tag de 100 keys
fn bench_invalidate_by_tag(c: &mut Criterion) {
    let rt = Runtime::new().unwrap();
    let cache = connected_client(&rt);
    let options = SetOptions::new().with_tags(["reports"]);

    c.bench_function("cache_invalidate_tag_100", |b| {
        b.to_async(&rt).iter(|| async {
            for i in 0..100 {
                cache.set(&format!("report:{i}"), &i, &options).await;
            }
            std::hint::black_box(cache.invalidate_by_tags(&["reports"]).await)
        });
    });
}

criterion_group!(
    benches,
    bench_cache_get_hit,
    bench_cache_get_miss,
    bench_cache_set_varying_sizes,
    bench_cache_batch,
    bench_invalidate_by_tag,
);

criterion_main!(benches);
