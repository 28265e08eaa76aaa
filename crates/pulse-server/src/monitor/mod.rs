//! HTTP performance monitoring.

mod probe;
mod resources;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::Serialize;
use tracing::{debug, error, warn};

use pulse_cache::{CacheClient, CacheStats};
use pulse_core::{
    MemorySnapshot, RequestSample, Ring, cutoff, mean, percentile, ratio_percent,
};

pub use probe::{ProcessProbe, ProcessReading};
pub use resources::{LoadAlert, MemoryAlert, ResourceAlerts, ResourceConfig, ResourceMonitor};

/// Requests listed in the slow and error sections of a report.
const REPORT_LIST_LEN: usize = 10;

/// Configuracion del monitor de performance.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Umbral de request lenta en ms (default: 1000)
    pub slow_request_ms: f64,
    /// Maximo de muestras en memoria (default: 10000)
    pub max_samples: usize,
    /// Edad maxima de una muestra (default: 24h)
    pub max_age: Duration,
    pub health_max_error_rate: f64,
    pub health_max_avg_ms: f64,
    /// Ventana del health check (default: 60s)
    pub health_window: Duration,
    /// Ventana de las estadisticas por endpoint (default: 1h)
    pub default_window: Duration,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            slow_request_ms: 1000.0,
            max_samples: 10_000,
            max_age: Duration::from_secs(86_400),
            health_max_error_rate: 5.0,
            health_max_avg_ms: 1000.0,
            health_window: Duration::from_secs(60),
            default_window: Duration::from_secs(3600),
        }
    }
}

/// Aggregates of one `method + endpoint` pair.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EndpointStats {
    pub endpoint: String,
    pub method: String,
    pub total_requests: usize,
    pub average_response_time: f64,
    pub min_response_time: f64,
    pub max_response_time: f64,
    pub error_rate: f64,
    pub p95_response_time: f64,
    pub p99_response_time: f64,
}

/// Live figures over the health window.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SystemHealth {
    /// Requests completed inside the health window.
    pub total_requests: usize,
    pub average_response_time: f64,
    pub error_rate: f64,
    pub requests_per_minute: f64,
    pub memory_usage: MemorySnapshot,
    /// Seconds since the monitor was created.
    pub uptime: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Unhealthy,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthMetrics {
    pub average_response_time: f64,
    pub error_rate: f64,
    pub requests_per_minute: f64,
}

/// Body of the health endpoint.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthReport {
    pub status: HealthStatus,
    pub timestamp: DateTime<Utc>,
    pub uptime: f64,
    pub memory_usage: MemorySnapshot,
    pub metrics: HealthMetrics,
}

impl HealthReport {
    pub fn is_healthy(&self) -> bool {
        self.status == HealthStatus::Healthy
    }
}

/// Snapshot for operational dashboards.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceReport {
    pub overview: SystemHealth,
    pub top_endpoints: Vec<EndpointStats>,
    pub slow_requests: Vec<RequestSample>,
    pub error_requests: Vec<RequestSample>,
    pub cache_stats: CacheStats,
}

/// Bounded history of completed requests.
///
/// Samples live in one ring capped at `max_samples`; the oldest sample is
/// dropped on every insert past the cap.
pub struct PerformanceMonitor {
    samples: Mutex<Ring<RequestSample>>,
    config: MonitorConfig,
    probe: Arc<ProcessProbe>,
    cache: CacheClient,
}

impl PerformanceMonitor {
    pub fn new(config: MonitorConfig, probe: Arc<ProcessProbe>, cache: CacheClient) -> Self {
        Self {
            samples: Mutex::new(Ring::new(config.max_samples)),
            config,
            probe,
            cache,
        }
    }

    pub fn config(&self) -> &MonitorConfig {
        &self.config
    }

    pub fn probe(&self) -> &Arc<ProcessProbe> {
        &self.probe
    }

    pub fn len(&self) -> usize {
        self.samples.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.lock().is_empty()
    }

    /// Stores a finished request, logging slow and failed ones.
    pub fn record(&self, sample: RequestSample) {
        if sample.duration_ms > self.config.slow_request_ms {
            warn!(
                method = %sample.method,
                endpoint = %sample.endpoint,
                duration_ms = sample.duration_ms,
                "Slow request detected"
            );
        }
        if sample.is_error() {
            error!(
                method = %sample.method,
                endpoint = %sample.endpoint,
                status = sample.status_code,
                "Error request"
            );
        }

        self.samples.lock().push(sample);
    }

    /// Clones the samples newer than `window`.
    fn recent(&self, window: Duration) -> Vec<RequestSample> {
        let since = cutoff(Utc::now(), window);
        self.samples
            .lock()
            .iter()
            .filter(|s| s.timestamp > since)
            .cloned()
            .collect()
    }

    /// Per-endpoint aggregates over `window`, busiest endpoint first.
    pub fn endpoint_stats(&self, window: Duration) -> Vec<EndpointStats> {
        let mut groups: HashMap<(String, String), Vec<RequestSample>> = HashMap::new();
        for sample in self.recent(window) {
            groups
                .entry((sample.method.clone(), sample.endpoint.clone()))
                .or_default()
                .push(sample);
        }

        let mut stats: Vec<EndpointStats> = groups
            .into_iter()
            .map(|((method, endpoint), samples)| {
                let mut durations: Vec<f64> = samples.iter().map(|s| s.duration_ms).collect();
                durations.sort_by(f64::total_cmp);
                let errors = samples.iter().filter(|s| s.is_error()).count();

                EndpointStats {
                    endpoint,
                    method,
                    total_requests: durations.len(),
                    average_response_time: mean(&durations),
                    min_response_time: durations.first().copied().unwrap_or(0.0),
                    max_response_time: durations.last().copied().unwrap_or(0.0),
                    error_rate: ratio_percent(errors, durations.len()),
                    p95_response_time: percentile(&durations, 0.95),
                    p99_response_time: percentile(&durations, 0.99),
                }
            })
            .collect();

        stats.sort_by(|a, b| {
            b.total_requests
                .cmp(&a.total_requests)
                .then_with(|| a.endpoint.cmp(&b.endpoint))
                .then_with(|| a.method.cmp(&b.method))
        });
        stats
    }

    /// Slowest retained requests above the slow threshold, slowest first.
    pub fn slow_requests(&self, limit: usize) -> Vec<RequestSample> {
        let mut slow: Vec<RequestSample> = self
            .samples
            .lock()
            .iter()
            .filter(|s| s.duration_ms > self.config.slow_request_ms)
            .cloned()
            .collect();

        slow.sort_by(|a, b| b.duration_ms.total_cmp(&a.duration_ms));
        slow.truncate(limit);
        slow
    }

    /// Most recent failed requests, newest first.
    pub fn error_requests(&self, limit: usize) -> Vec<RequestSample> {
        let mut errors: Vec<RequestSample> = self
            .samples
            .lock()
            .iter()
            .filter(|s| s.is_error())
            .cloned()
            .collect();

        errors.sort_by(|a, b| b.timestamp.cmp(&a.timestamp));
        errors.truncate(limit);
        errors
    }

    /// Request figures over the health window plus the latest process reading.
    pub fn system_health(&self) -> SystemHealth {
        let window = self.config.health_window;
        let recent = self.recent(window);
        let durations: Vec<f64> = recent.iter().map(|s| s.duration_ms).collect();
        let errors = recent.iter().filter(|s| s.is_error()).count();

        let minutes = window.as_secs_f64() / 60.0;
        let requests_per_minute = if minutes > 0.0 {
            recent.len() as f64 / minutes
        } else {
            0.0
        };

        SystemHealth {
            total_requests: recent.len(),
            average_response_time: mean(&durations),
            error_rate: ratio_percent(errors, recent.len()),
            requests_per_minute,
            memory_usage: self.probe.latest().memory,
            uptime: self.probe.uptime().as_secs_f64(),
        }
    }

    /// Healthy iff the error rate and the average latency are both under their limits.
    pub fn health_check(&self) -> HealthReport {
        let health = self.system_health();
        let healthy = health.error_rate < self.config.health_max_error_rate
            && health.average_response_time < self.config.health_max_avg_ms;

        HealthReport {
            status: if healthy {
                HealthStatus::Healthy
            } else {
                HealthStatus::Unhealthy
            },
            timestamp: Utc::now(),
            uptime: health.uptime,
            memory_usage: health.memory_usage,
            metrics: HealthMetrics {
                average_response_time: health.average_response_time,
                error_rate: health.error_rate,
                requests_per_minute: health.requests_per_minute,
            },
        }
    }

    pub async fn generate_report(&self) -> PerformanceReport {
        let overview = self.system_health();
        let top_endpoints = self.endpoint_stats(self.config.default_window);
        let slow_requests = self.slow_requests(REPORT_LIST_LEN);
        let error_requests = self.error_requests(REPORT_LIST_LEN);
        let cache_stats = self.cache.stats().await;

        PerformanceReport {
            overview,
            top_endpoints,
            slow_requests,
            error_requests,
            cache_stats,
        }
    }

    /// Drops samples past the max age, then the oldest past the cap.
    ///
    /// Returns how many samples were dropped.
    pub fn cleanup(&self) -> usize {
        let since = cutoff(Utc::now(), self.config.max_age);
        let mut samples = self.samples.lock();

        let aged = samples.retain(|s| s.timestamp > since);
        let excess = samples.truncate_oldest(self.config.max_samples);

        if aged + excess > 0 {
            debug!(aged, excess, remaining = samples.len(), "Pruned request samples");
        }
        aged + excess
    }
}
