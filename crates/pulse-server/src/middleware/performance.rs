//! Registro de cada request en el monitor de rendimiento.

use std::net::SocketAddr;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{ConnectInfo, MatchedPath, State};
use axum::http::{HeaderMap, Request, header};
use axum::middleware::Next;
use axum::response::Response;
use metrics::{counter, histogram};

use pulse_core::{CpuSnapshot, RequestSample};

use crate::state::AppState;

/// Authenticated user, inserted as a request extension by an upstream auth layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserId(pub String);

pub fn register_http_metrics() {
    metrics::describe_counter!(
        "pulse_http_requests_total",
        "Total number of HTTP requests"
    );
    metrics::describe_histogram!(
        "pulse_http_request_duration_seconds",
        "HTTP request duration in seconds"
    );
}

/// First `X-Forwarded-For` hop, else the peer address.
fn client_ip(headers: &HeaderMap, peer: Option<SocketAddr>) -> Option<String> {
    headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty())
        .map(String::from)
        .or_else(|| peer.map(|addr| addr.ip().to_string()))
}

/// Times the request and stores a [`RequestSample`] once the response is ready.
///
/// Memory and CPU come from the probe's cached reading; the resource monitor
/// refreshes it, never the request.
pub async fn track_performance(
    State(state): State<AppState>,
    request: Request<Body>,
    next: Next,
) -> Response {
    let started = Instant::now();
    let probe = state.monitor.probe();
    let cpu_start = probe.latest().cpu_percent;

    let method = request.method().to_string();
    // Template de la ruta para no crear una serie por cada id
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|p| p.as_str().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr);
    let ip = client_ip(request.headers(), peer);
    let user_agent = request
        .headers()
        .get(header::USER_AGENT)
        .and_then(|v| v.to_str().ok())
        .map(String::from);
    let user_id = request
        .extensions()
        .get::<UserId>()
        .map(|UserId(id)| id.clone());

    let response = next.run(request).await;

    let elapsed = started.elapsed();
    let status = response.status().as_u16();
    let end = probe.latest();

    counter!(
        "pulse_http_requests_total",
        "method" => method.clone(),
        "path" => endpoint.clone(),
        "status" => status.to_string()
    )
    .increment(1);
    histogram!(
        "pulse_http_request_duration_seconds",
        "method" => method.clone(),
        "path" => endpoint.clone()
    )
    .record(elapsed.as_secs_f64());

    let mut sample = RequestSample::new(method, endpoint, status, elapsed.as_secs_f64() * 1000.0);
    sample.ip = ip;
    sample.user_agent = user_agent;
    sample.user_id = user_id;
    sample.memory = end.memory;
    sample.cpu = CpuSnapshot {
        start_percent: cpu_start,
        end_percent: end.cpu_percent,
    };
    state.monitor.record(sample);

    response
}
