//! Cache metrics recording.

use metrics::{counter, histogram};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

/// Registra las metricas de cache.
/// Llamar una vez al inicio para registrar las metricas.
pub fn register_cache_metrics() {
    metrics::describe_counter!("pulse_cache_hits_total", "Total number of cache hits");
    metrics::describe_counter!("pulse_cache_misses_total", "Total number of cache misses");
    metrics::describe_counter!(
        "pulse_cache_errors_total",
        "Cache operations degraded by a store failure"
    );
    metrics::describe_counter!(
        "pulse_cache_invalidated_keys_total",
        "Keys removed through tag invalidation"
    );
    metrics::describe_histogram!(
        "pulse_cache_operation_seconds",
        "Time spent on cache operations"
    );
}

/// Recorder de metricas de cache.
/// Usa atomic counters internos para leer el hit rate sin pasar por el exporter.
#[derive(Debug, Clone)]
pub struct CacheMetrics {
    hits: Arc<AtomicU64>,
    misses: Arc<AtomicU64>,
    errors: Arc<AtomicU64>,
}

impl CacheMetrics {
    pub fn new() -> Self {
        Self {
            hits: Arc::new(AtomicU64::new(0)),
            misses: Arc::new(AtomicU64::new(0)),
            errors: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Registra un cache hit
    pub fn record_hit(&self) {
        self.hits.fetch_add(1, Ordering::Relaxed);
        counter!("pulse_cache_hits_total").increment(1);
    }

    /// Registra un cache miss
    pub fn record_miss(&self) {
        self.misses.fetch_add(1, Ordering::Relaxed);
        counter!("pulse_cache_misses_total").increment(1);
    }

    /// Registra una operacion degradada por fallo del store
    pub fn record_error(&self, operation: &str) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        counter!("pulse_cache_errors_total", "operation" => operation.to_string()).increment(1);
    }

    pub fn record_invalidated(&self, count: u64) {
        counter!("pulse_cache_invalidated_keys_total").increment(count);
    }

    /// Registra la duracion de una operacion
    pub fn record_operation_duration(&self, operation: &str, duration: Duration) {
        histogram!(
            "pulse_cache_operation_seconds",
            "operation" => operation.to_string()
        )
        .record(duration.as_secs_f64());
    }

    /// Calcula hit rate local (0.0 - 1.0)
    pub fn hit_rate(&self) -> f64 {
        let hits = self.hits.load(Ordering::Relaxed) as f64;
        let misses = self.misses.load(Ordering::Relaxed) as f64;
        let total = hits + misses;
        if total == 0.0 { 0.0 } else { hits / total }
    }

    pub fn hits(&self) -> u64 {
        self.hits.load(Ordering::Relaxed)
    }

    pub fn misses(&self) -> u64 {
        self.misses.load(Ordering::Relaxed)
    }

    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }
}

impl Default for CacheMetrics {
    fn default() -> Self {
        Self::new()
    }
}
