//! Endpoints de solo lectura sobre el monitor y la instrumentacion de queries.

use axum::Json;
use axum::extract::{Query, State};

use pulse_core::RequestSample;

use crate::error::AppError;
use crate::extractors::{LimitQuery, WindowQuery};
use crate::monitor::{EndpointStats, PerformanceReport, ResourceAlerts};
use crate::query::QueryPerformanceReport;
use crate::state::AppState;

pub async fn report(State(state): State<AppState>) -> Json<PerformanceReport> {
    Json(state.monitor.generate_report().await)
}

pub async fn endpoints(
    State(state): State<AppState>,
    Query(query): Query<WindowQuery>,
) -> Result<Json<Vec<EndpointStats>>, AppError> {
    let window = query.resolve(state.monitor.config().default_window)?;
    Ok(Json(state.monitor.endpoint_stats(window)))
}

pub async fn slow_requests(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<RequestSample>>, AppError> {
    Ok(Json(state.monitor.slow_requests(query.resolve()?)))
}

pub async fn error_requests(
    State(state): State<AppState>,
    Query(query): Query<LimitQuery>,
) -> Result<Json<Vec<RequestSample>>, AppError> {
    Ok(Json(state.monitor.error_requests(query.resolve()?)))
}

pub async fn alerts(State(state): State<AppState>) -> Json<ResourceAlerts> {
    Json(state.resources.alerts())
}

pub async fn queries(State(state): State<AppState>) -> Json<QueryPerformanceReport> {
    Json(state.queries.performance_report().await)
}
