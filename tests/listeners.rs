//! Named listener isolation and primary service mounting.

use reqwest::StatusCode;
use serde_json::Value;
use service_bootstrap::net::listener::{HEALTH, WEB};

mod common;

#[tokio::test]
async fn health_and_service_are_isolated() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::local_config(dir.path());
    config.health.enabled = true;
    let server = common::start(config).await;
    let web = server.local_addr(WEB).unwrap();
    let health = server.local_addr(HEALTH).unwrap();
    let client = common::client();

    let response = client.get(common::url(health, "/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], "UP");

    let response = client.get(common::url(web, "/health")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client.get(common::url(health, "/service")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let response = client.get(common::url(web, "/service")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response.headers().contains_key("x-request-id"));
    assert!(!response.headers().contains_key("server"));

    common::stop(server).await;
}

#[tokio::test]
async fn service_is_mounted_under_path() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = common::local_config(dir.path());
    config.listener.path = "/files".to_string();
    let server = common::start(config).await;
    let web = server.local_addr(WEB).unwrap();
    let client = common::client();

    let response = client.get(common::url(web, "/files/service")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["service"], "service-bootstrap");
    assert!(body["principal"].is_null());

    let response = client.get(common::url(web, "/elsewhere")).send().await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let body: Value = response.json().await.unwrap();
    assert_eq!(body["status"], 404);

    common::stop(server).await;
}

#[tokio::test]
async fn custom_service_router() {
    use axum::routing::get;

    let dir = tempfile::tempdir().unwrap();
    let service = axum::Router::new().route("/echo", get(|| async { "echo" }));
    let server = service_bootstrap::Bootstrap::new(common::local_config(dir.path()))
        .with_service(service)
        .start(&mut common::NoPrompt)
        .await
        .unwrap();
    let web = server.local_addr(WEB).unwrap();

    let response = common::client()
        .get(common::url(web, "/service/echo"))
        .send()
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.text().await.unwrap(), "echo");

    common::stop(server).await;
}

#[tokio::test]
async fn stops_accepting_after_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let server = common::start(common::local_config(dir.path())).await;
    let web = server.local_addr(WEB).unwrap();

    common::stop(server).await;
    assert!(tokio::net::TcpStream::connect(web).await.is_err());
}
