//! E2E tests for health check and basic server functionality

mod common;

use common::{TestServer, location};

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(&server.url("/health"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert_eq!(body, "OK");
}

#[tokio::test]
async fn test_404_for_unknown_routes() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(&server.url("/unknown/route"))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}

#[tokio::test]
async fn test_metrics_requires_authentication() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(&server.url("/metrics"))
        .send()
        .await
        .unwrap();

    assert!(response.status().is_redirection());
    assert_eq!(location(&response), "/login?next=%2Fmetrics");
}

#[tokio::test]
async fn test_metrics_exposes_prometheus_text() {
    let server = TestServer::new().await;
    let user = server.create_user("alice").await;

    // Touch a board route so the request counter has a sample
    server
        .client
        .get(server.url("/"))
        .header("Cookie", server.session_cookie(&user))
        .send()
        .await
        .unwrap();

    let response = server
        .client
        .get(server.url("/metrics"))
        .header("Cookie", server.session_cookie(&user))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 200);
    let body = response.text().await.unwrap();
    assert!(body.contains("imageboard_http_requests_total"));
    assert!(body.contains("imageboard_posts_total"));
}

#[tokio::test]
async fn test_missing_media_is_404() {
    let server = TestServer::new().await;

    let response = server
        .client
        .get(server.url(&format!("/media/{}.png", "0".repeat(64))))
        .send()
        .await
        .unwrap();

    assert_eq!(response.status(), 404);
}
