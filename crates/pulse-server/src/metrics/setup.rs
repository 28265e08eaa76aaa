use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use tracing::info;

use crate::middleware::register_http_metrics;
use crate::query::register_query_metrics;

/// Buckets de los histogramas, en segundos (100us a 10s).
pub const HISTOGRAM_BUCKETS: &[f64] = &[
    0.0001, 0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Installs the global Prometheus recorder and describes every metric the
/// service emits. Returns the handle rendered by `GET /metrics`.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    let handle = PrometheusBuilder::new()
        .set_buckets(HISTOGRAM_BUCKETS)?
        .install_recorder()?;

    pulse_cache::register_cache_metrics();
    register_query_metrics();
    register_http_metrics();
    metrics::describe_counter!(
        "pulse_resource_alerts_total",
        "Resource threshold breaches by kind"
    );

    info!("Metrics system initialized");
    Ok(handle)
}
