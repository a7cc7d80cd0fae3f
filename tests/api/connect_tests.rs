//! Connection Authentication Tests

use axum::http::StatusCode;

use crate::common::*;

#[tokio::test]
async fn test_connect_without_token_is_unauthorized() {
    let app = TestApp::new();
    let response = app.server().get("/chat").await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_connect_with_bad_token_is_unauthorized() {
    let app = TestApp::new();
    let response = app
        .server()
        .get("/chat")
        .add_query_param("access_token", "not-a-jwt")
        .await;

    response.assert_status(StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_valid_token_passes_authentication() {
    let app = TestApp::new();
    let response = app
        .server()
        .get("/chat")
        .add_query_param("access_token", token_for(&alice()))
        .await;

    // Not a real upgrade request, so the upgrade itself is refused.
    assert_ne!(response.status_code(), StatusCode::UNAUTHORIZED);
    assert!(response.status_code().is_client_error());
    assert!(!app.state.registry.is_online(&alice().user_id));
}
