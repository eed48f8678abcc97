/// Integration tests for the health check and cross-cutting middleware
///
/// Requires PostgreSQL (`DATABASE_URL`) and Redis (`REDIS_URL`).

mod common;

use axum::body::Body;
use axum::http::{header, Method, Request, StatusCode};
use common::TestContext;
use tower::ServiceExt;

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_health_check() {
    let ctx = TestContext::new().await.unwrap();

    let (status, body) = ctx
        .json(Method::GET, "/api/healthchecker", None, None)
        .await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Welcome to PhotoShare!");
    assert_eq!(body["database"], "connected");
    assert_eq!(body["redis"], "connected");
    assert!(body["version"].is_string());

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_security_headers_present() {
    let ctx = TestContext::new().await.unwrap();

    let request = Request::builder()
        .uri("/api/healthchecker")
        .body(Body::empty())
        .unwrap();
    let response = ctx.app.clone().oneshot(request).await.unwrap();

    let headers = response.headers();
    assert_eq!(headers["x-content-type-options"], "nosniff");
    assert_eq!(headers["x-frame-options"], "DENY");
    assert_eq!(headers[header::CACHE_CONTROL], "no-store");
    assert!(headers.get("strict-transport-security").is_none());

    ctx.cleanup().await.unwrap();
}

#[tokio::test]
#[ignore] // Requires PostgreSQL and Redis
async fn test_unknown_route() {
    let ctx = TestContext::new().await.unwrap();

    let (status, _) = ctx.json(Method::GET, "/api/nope", None, None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    ctx.cleanup().await.unwrap();
}
