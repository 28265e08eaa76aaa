use std::hint::black_box;
use std::sync::Arc;
use std::time::Duration;

use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

use pulse_cache::{CacheClient, CacheConfig, MemoryStore};
use pulse_core::{RequestSample, percentile};
use pulse_server::{MonitorConfig, PerformanceMonitor, ProcessProbe};

const ENDPOINTS: [&str; 6] = [
    "/api/transactions",
    "/api/transactions/:id",
    "/api/accounts",
    "/api/budgets",
    "/api/reports/monthly",
    "/api/users/me",
];

/// Monitor con N requests repartidas entre los endpoints
fn filled_monitor(n: usize) -> PerformanceMonitor {
    let cache = CacheClient::new(Arc::new(MemoryStore::default()), CacheConfig::default());
    let monitor = PerformanceMonitor::new(
        MonitorConfig::default(),
        Arc::new(ProcessProbe::new()),
        cache,
    );

    for i in 0..n {
        let status = if i % 50 == 0 { 500 } else { 200 };
        let duration = (i % 997) as f64 * 1.5;
        monitor.record(RequestSample::new(
            "GET",
            ENDPOINTS[i % ENDPOINTS.len()],
            status,
            duration,
        ));
    }
    monitor
}

fn bench_endpoint_stats(c: &mut Criterion) {
    let mut group = c.benchmark_group("endpoint_stats");

    for size in [1_000, 10_000] {
        let monitor = filled_monitor(size);
        group.throughput(Throughput::Elements(size as u64));
        group.bench_with_input(BenchmarkId::from_parameter(size), &monitor, |b, monitor| {
            b.iter(|| black_box(monitor.endpoint_stats(Duration::from_secs(3600))))
        });
    }

    group.finish();
}

fn bench_record(c: &mut Criterion) {
    // Ring lleno: cada insert descarta la mas vieja
    let monitor = filled_monitor(10_000);

    c.bench_function("record_at_capacity", |b| {
        b.iter(|| {
            monitor.record(RequestSample::new("POST", "/api/transactions", 201, 12.5));
        })
    });
}

fn bench_percentile(c: &mut Criterion) {
    let mut sorted: Vec<f64> = (0..10_000).map(|i| ((i * 7919) % 10_000) as f64).collect();
    sorted.sort_by(f64::total_cmp);

    c.bench_function("percentile_p99_10k", |b| {
        b.iter(|| percentile(black_box(&sorted), 0.99))
    });
}

criterion_group!(benches, bench_endpoint_stats, bench_record, bench_percentile);
criterion_main!(benches);
