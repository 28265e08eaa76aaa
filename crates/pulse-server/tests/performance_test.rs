mod helpers;

use axum::http::StatusCode;
use helpers::{client, client_with_settings};
use pulse_core::RequestSample;
use pulse_server::Settings;

#[tokio::test]
async fn report_includes_overview_and_cache_stats() {
    let client = client().await;
    client
        .state
        .monitor
        .record(RequestSample::new("GET", "/api/budgets", 200, 42.0));

    let response = client.get("/performance/report").await;
    response.assert_status(StatusCode::OK);

    let body: serde_json::Value = response.json();
    assert_eq!(body["overview"]["totalRequests"], 1);
    assert_eq!(body["overview"]["averageResponseTime"], 42.0);
    assert_eq!(body["topEndpoints"][0]["endpoint"], "/api/budgets");
    assert!(body["slowRequests"].as_array().unwrap().is_empty());
    assert!(body["cacheStats"].is_object());
}

#[tokio::test]
async fn endpoints_report_percentiles() {
    let client = client().await;
    for ms in 1..=100 {
        client
            .state
            .monitor
            .record(RequestSample::new("GET", "/api/transactions", 200, ms as f64));
    }

    let response = client.get("/performance/endpoints?windowSecs=300").await;
    response.assert_status(StatusCode::OK);

    let body: serde_json::Value = response.json();
    let stats = &body[0];
    assert_eq!(stats["totalRequests"], 100);
    assert_eq!(stats["p95ResponseTime"], 96.0);
    assert_eq!(stats["p99ResponseTime"], 100.0);
    assert_eq!(stats["minResponseTime"], 1.0);
    assert_eq!(stats["maxResponseTime"], 100.0);
}

#[tokio::test]
async fn endpoints_rejects_zero_window() {
    let response = client().await.get("/performance/endpoints?windowSecs=0").await;
    response.assert_status(StatusCode::BAD_REQUEST);

    let body: serde_json::Value = response.json();
    assert_eq!(body["error"], "Bad Request");
}

#[tokio::test]
async fn slow_requests_are_sorted_and_limited() {
    let client = client().await;
    for ms in [1200.0, 3400.0, 2100.0, 80.0] {
        client
            .state
            .monitor
            .record(RequestSample::new("POST", "/api/imports", 200, ms));
    }

    let body: Vec<serde_json::Value> = client.get("/performance/slow?limit=2").await.json();
    assert_eq!(body.len(), 2);
    assert_eq!(body[0]["durationMs"], 3400.0);
    assert_eq!(body[1]["durationMs"], 2100.0);
}

#[tokio::test]
async fn list_endpoints_validate_limit() {
    let client = client().await;

    for uri in [
        "/performance/slow?limit=0",
        "/performance/errors?limit=1001",
    ] {
        client.get(uri).await.assert_status(StatusCode::BAD_REQUEST);
    }
    client
        .get("/performance/errors?limit=1000")
        .await
        .assert_status(StatusCode::OK);
}

#[tokio::test]
async fn error_requests_newest_first() {
    let client = client().await;
    let now = chrono::Utc::now();
    let earlier = now - chrono::Duration::seconds(30);
    client
        .state
        .monitor
        .record(RequestSample::new("GET", "/api/accounts", 500, 10.0).at(earlier));
    client
        .state
        .monitor
        .record(RequestSample::new("DELETE", "/api/accounts", 403, 10.0).at(now));

    let body: Vec<serde_json::Value> = client.get("/performance/errors").await.json();
    assert_eq!(body.len(), 2);
    assert_eq!(body[0]["statusCode"], 403);
    assert_eq!(body[1]["statusCode"], 500);
}

#[tokio::test]
async fn alerts_lists_both_rings() {
    let client = client().await;
    client.state.resources.check_load(250.0);

    let body: serde_json::Value = client.get("/performance/alerts").await.json();
    assert!(body["memoryAlerts"].as_array().unwrap().is_empty());
    assert_eq!(body["cpuAlerts"][0]["usage"], 250.0);
}

#[tokio::test]
async fn queries_report_suggests_indexes_for_slow_lookups() {
    let mut settings = Settings::default();
    settings.query.slow_query_ms = 100;
    let client = client_with_settings(settings).await;

    for _ in 0..3 {
        client.state.queries.record_query(
            "SELECT * FROM users WHERE email = 'ana@example.com'",
            700.0,
            1,
            None,
        );
    }

    let response = client.get("/performance/queries").await;
    response.assert_status(StatusCode::OK);

    let body: serde_json::Value = response.json();
    assert_eq!(body["totalQueries"], 3);
    assert_eq!(body["averageExecutionTime"], 700.0);
    assert_eq!(body["slowQueries"].as_array().unwrap().len(), 3);
    assert_eq!(body["indexSuggestions"][0]["table"], "User");
    assert_eq!(body["indexSuggestions"][0]["columns"][0], "email");
}

#[tokio::test]
async fn metrics_endpoint_renders_text() {
    client()
        .await
        .get("/metrics")
        .await
        .assert_status(StatusCode::OK)
        .assert_content_type_contains("text/plain");
}
