//! Integration Tests for API Endpoints
//!
//! Tests full request/response cycle for each endpoint.

use std::time::Duration;

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use kvcache::cache::{CacheConfig, CacheEngine, Capacity};
use kvcache::{api::create_router, AppState};
use serde_json::Value;
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app() -> Router {
    app_with(CacheConfig::default())
}

fn app_with(config: CacheConfig) -> Router {
    let cache = CacheEngine::new(config).unwrap();
    create_router(AppState::new(cache))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

fn json_request(method: &str, uri: &str, body: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

fn empty_request(method: &str, uri: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

// == ROOT Endpoint Tests ==

#[tokio::test]
async fn test_home_endpoint() {
    let response = create_test_app()
        .oneshot(empty_request("GET", "/"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert!(json["message"].as_str().unwrap().contains("working"));
}

// == SET Endpoint Tests ==

#[tokio::test]
async fn test_set_endpoint_success() {
    let response = create_test_app()
        .oneshot(json_request(
            "PUT",
            "/set",
            r#"{"key":"test_key","value":"test_value"}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_to_json(response.into_body()).await;
    assert!(json["message"].as_str().unwrap().contains("test_key"));
}

#[tokio::test]
async fn test_set_endpoint_with_ttl() {
    let response = create_test_app()
        .oneshot(json_request(
            "PUT",
            "/set",
            r#"{"key":"ttl_key","value":"ttl_value","ttl":60}"#,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_set_by_path_then_get_by_json() {
    let app = create_test_app();

    let set_response = app
        .clone()
        .oneshot(empty_request("POST", "/set/color/blue"))
        .await
        .unwrap();
    assert_eq!(set_response.status(), StatusCode::OK);

    let get_response = app
        .oneshot(json_request("POST", "/get", r#"{"key":"color"}"#))
        .await
        .unwrap();

    assert_eq!(get_response.status(), StatusCode::OK);
    let json = body_to_json(get_response.into_body()).await;
    assert_eq!(json["key"], "color");
    assert_eq!(json["value"], "blue");
}

// == GET Endpoint Tests ==

#[tokio::test]
async fn test_get_endpoint_success() {
    let app = create_test_app();

    let set_response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/set",
            r#"{"key":"get_key","value":"get_value"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(set_response.status(), StatusCode::OK);

    let get_response = app
        .oneshot(empty_request("GET", "/get/get_key"))
        .await
        .unwrap();

    assert_eq!(get_response.status(), StatusCode::OK);
    let json = body_to_json(get_response.into_body()).await;
    assert_eq!(json["key"].as_str().unwrap(), "get_key");
    assert_eq!(json["value"].as_str().unwrap(), "get_value");
}

#[tokio::test]
async fn test_get_endpoint_not_found() {
    let response = create_test_app()
        .oneshot(empty_request("GET", "/get/nonexistent_key"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].as_str().unwrap().contains("nonexistent_key"));
}

#[tokio::test]
async fn test_post_get_not_found() {
    let response = create_test_app()
        .oneshot(json_request("POST", "/get", r#"{"key":"missing"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == DELETE Endpoint Tests ==

#[tokio::test]
async fn test_delete_endpoint_success() {
    let app = create_test_app();

    let set_response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/set",
            r#"{"key":"delete_key","value":"delete_value"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(set_response.status(), StatusCode::OK);

    let del_response = app
        .clone()
        .oneshot(empty_request("DELETE", "/del/delete_key"))
        .await
        .unwrap();
    assert_eq!(del_response.status(), StatusCode::OK);

    let get_response = app
        .oneshot(empty_request("GET", "/get/delete_key"))
        .await
        .unwrap();
    assert_eq!(get_response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_endpoint_not_found() {
    let response = create_test_app()
        .oneshot(empty_request("DELETE", "/del/nonexistent_key"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// == STATS Endpoint Tests ==

#[tokio::test]
async fn test_stats_endpoint() {
    let app = create_test_app();

    let _ = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/set",
            r#"{"key":"stats_key","value":"stats_value"}"#,
        ))
        .await
        .unwrap();

    // Get (hit)
    let _ = app
        .clone()
        .oneshot(empty_request("GET", "/get/stats_key"))
        .await
        .unwrap();

    // Get (miss)
    let _ = app
        .clone()
        .oneshot(empty_request("GET", "/get/nonexistent"))
        .await
        .unwrap();

    let response = app.oneshot(empty_request("GET", "/stats")).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;

    assert_eq!(json["hits"].as_u64().unwrap(), 1);
    assert_eq!(json["misses"].as_u64().unwrap(), 1);
    assert_eq!(json["entries"].as_u64().unwrap(), 1);
    assert_eq!(json["capacity"].as_u64().unwrap(), 1000);
    assert_eq!(json["unit"].as_str().unwrap(), "entries");
    assert!(json.get("hit_rate").is_some());
}

#[tokio::test]
async fn test_lru_eviction_via_api() {
    let app = app_with(CacheConfig {
        capacity: Capacity::Entries(2),
        ..CacheConfig::default()
    });

    for (key, value) in [("a", "1"), ("b", "2")] {
        let body = format!(r#"{{"key":"{}","value":"{}"}}"#, key, value);
        let response = app
            .clone()
            .oneshot(json_request("PUT", "/set", &body))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
    }

    let touch = app
        .clone()
        .oneshot(empty_request("GET", "/get/a"))
        .await
        .unwrap();
    assert_eq!(touch.status(), StatusCode::OK);

    let _ = app
        .clone()
        .oneshot(json_request("PUT", "/set", r#"{"key":"c","value":"3"}"#))
        .await
        .unwrap();

    let evicted = app
        .clone()
        .oneshot(empty_request("GET", "/get/b"))
        .await
        .unwrap();
    assert_eq!(evicted.status(), StatusCode::NOT_FOUND);

    let stats = app.oneshot(empty_request("GET", "/stats")).await.unwrap();
    let json = body_to_json(stats.into_body()).await;
    assert_eq!(json["evictions"].as_u64().unwrap(), 1);
}

// == HEALTH Endpoint Tests ==

#[tokio::test]
async fn test_health_endpoint() {
    let response = create_test_app()
        .oneshot(empty_request("GET", "/health"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["status"].as_str().unwrap(), "healthy");
    assert!(json.get("timestamp").is_some());
}

// == Error Response Tests ==

#[tokio::test]
async fn test_invalid_json_request() {
    let response = create_test_app()
        .oneshot(json_request("PUT", "/set", r#"{"invalid json"#))
        .await
        .unwrap();

    assert!(
        response.status() == StatusCode::BAD_REQUEST
            || response.status() == StatusCode::UNPROCESSABLE_ENTITY
    );
}

#[tokio::test]
async fn test_empty_key_request() {
    let response = create_test_app()
        .oneshot(json_request("PUT", "/set", r#"{"key":"","value":"test"}"#))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_to_json(response.into_body()).await;
    assert!(json["error"].is_string());
}

#[tokio::test]
async fn test_oversized_value_keeps_previous() {
    let app = app_with(CacheConfig {
        max_value_size: 8,
        ..CacheConfig::default()
    });

    let _ = app
        .clone()
        .oneshot(json_request("PUT", "/set", r#"{"key":"k","value":"small"}"#))
        .await
        .unwrap();

    let rejected = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/set",
            r#"{"key":"k","value":"much too large"}"#,
        ))
        .await
        .unwrap();
    assert_eq!(rejected.status(), StatusCode::PAYLOAD_TOO_LARGE);

    let response = app.oneshot(empty_request("GET", "/get/k")).await.unwrap();
    let json = body_to_json(response.into_body()).await;
    assert_eq!(json["value"], "small");
}

// == TTL Tests ==

#[tokio::test]
async fn test_ttl_expiration_via_api() {
    let app = create_test_app();

    let set_response = app
        .clone()
        .oneshot(json_request(
            "PUT",
            "/set",
            r#"{"key":"ttl_test","value":"expires_soon","ttl":1}"#,
        ))
        .await
        .unwrap();
    assert_eq!(set_response.status(), StatusCode::OK);

    let get_response = app
        .clone()
        .oneshot(empty_request("GET", "/get/ttl_test"))
        .await
        .unwrap();
    assert_eq!(get_response.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(1100)).await;

    let get_response = app
        .oneshot(empty_request("GET", "/get/ttl_test"))
        .await
        .unwrap();
    assert_eq!(get_response.status(), StatusCode::NOT_FOUND);
}
