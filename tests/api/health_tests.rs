//! Health Check API Tests

use axum::http::StatusCode;
use serde_json::Value;

use crate::common::*;

/// Test basic health check endpoint returns 200 OK
#[tokio::test]
async fn test_health_check_returns_ok() {
    let app = TestApp::new();
    let response = app.server().get("/health").await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["status"], "healthy");
    assert!(json.get("version").is_some());
}

/// Test liveness probe endpoint
#[tokio::test]
async fn test_liveness_probe() {
    let app = TestApp::new();
    let response = app.server().get("/health/live").await;

    response.assert_status_ok();
    assert_eq!(response.json::<Value>()["status"], "alive");
}

/// Readiness reports broker, directory and live connection counts
#[tokio::test]
async fn test_readiness_probe_reports_checks() {
    let app = TestApp::new();
    let _a1 = app.connect(&alice()).await;
    let _a2 = app.connect(&alice()).await;

    let response = app.server().get("/health/ready").await;

    response.assert_status_ok();
    let json: Value = response.json();
    assert_eq!(json["checks"]["broker"]["status"], "healthy");
    assert_eq!(json["checks"]["directory"]["status"], "healthy");
    assert_eq!(json["checks"]["relay"]["active_connections"], 2);
    assert_eq!(json["checks"]["relay"]["online_identities"], 1);
}

/// Readiness fails while the broker is unreachable
#[tokio::test]
async fn test_readiness_probe_unavailable_without_broker() {
    let app = TestApp::new();
    app.broker.set_unavailable(true);

    let response = app.server().get("/health/ready").await;

    response.assert_status(StatusCode::SERVICE_UNAVAILABLE);
    assert_eq!(response.json::<Value>()["status"], "unhealthy");
}

#[tokio::test]
async fn test_metrics_endpoint_exposes_relay_metrics() {
    let app = TestApp::new();
    let _a = app.connect(&alice()).await;

    let response = app.server().get("/metrics").await;

    response.assert_status_ok();
    assert!(response.text().contains("chat_relay_connections_active"));
}
