use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;

use crate::monitor::HealthReport;
use crate::state::AppState;

/// `GET /health`: 200 when healthy, 503 otherwise, with the window metrics
/// in the body either way.
pub async fn health_check(State(state): State<AppState>) -> (StatusCode, Json<HealthReport>) {
    let report = state.monitor.health_check();
    let status = if report.is_healthy() {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status, Json(report))
}
