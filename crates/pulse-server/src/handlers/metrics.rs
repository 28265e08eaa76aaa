use axum::extract::State;
use metrics_exporter_prometheus::PrometheusHandle;

/// `GET /metrics` in the Prometheus text format.
pub async fn metrics_handler(State(prometheus): State<PrometheusHandle>) -> String {
    prometheus.render()
}
