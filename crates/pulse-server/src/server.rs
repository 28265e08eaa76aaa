use std::net::SocketAddr;

use axum::routing::get;
use axum::{Router, middleware};
use metrics_exporter_prometheus::PrometheusHandle;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;

use crate::handlers::{health::health_check, metrics::metrics_handler, performance};
use crate::middleware::{LoggingLayer, RequestIdLayer, track_performance};
use crate::state::AppState;

/// Builds the full router: health, performance reports and `/metrics`.
pub fn create_router(
    state: AppState,
    prometheus_handle: PrometheusHandle,
    cors: CorsLayer,
) -> Router {
    // /metrics usa otro estado
    let metrics_router = Router::new()
        .route("/metrics", get(metrics_handler))
        .with_state(prometheus_handle);

    let app_router = Router::new()
        .route("/health", get(health_check))
        .route("/performance/report", get(performance::report))
        .route("/performance/endpoints", get(performance::endpoints))
        .route("/performance/slow", get(performance::slow_requests))
        .route("/performance/errors", get(performance::error_requests))
        .route("/performance/alerts", get(performance::alerts))
        .route("/performance/queries", get(performance::queries))
        .with_state(state.clone());

    Router::new()
        .merge(app_router)
        .merge(metrics_router)
        .layer(middleware::from_fn_with_state(state, track_performance))
        .layer(cors)
        .layer(
            ServiceBuilder::new()
                .layer(RequestIdLayer)
                .layer(LoggingLayer),
        )
}

/// Serves until Ctrl+C or SIGTERM.
pub async fn run_server(
    addr: SocketAddr,
    state: AppState,
    prometheus_handle: PrometheusHandle,
    cors: CorsLayer,
) -> Result<(), std::io::Error> {
    let app = create_router(state, prometheus_handle, cors);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "Server listening");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{SignalKind, signal};

        match signal(SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            },
            Err(e) => {
                tracing::error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            },
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
