//! Integration Tests for API Endpoints
//!
//! Tests the full request/response cycle for each endpoint.

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use dynamo_cache::{api::create_router, AppState, Config};
use serde_json::{json, Value};
use tower::ServiceExt;

// == Helper Functions ==

fn create_test_app() -> Router {
    create_router(AppState::from_config(&Config::default()))
}

async fn body_to_json(body: Body) -> Value {
    let bytes = axum::body::to_bytes(body, usize::MAX).await.unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let builder = Request::builder().method(method).uri(uri);
    let request = match body {
        Some(body) => builder
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    };

    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    (status, body_to_json(response.into_body()).await)
}

// == SET / GET / DEL ==

#[tokio::test]
async fn test_set_and_get() {
    let app = create_test_app();

    let (status, json) = send(&app, "PUT", "/set", Some(json!({"key": "123+foo", "value": {"a": 1}}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(json["message"].as_str().unwrap().contains("123+foo"));

    let (status, json) = send(&app, "GET", "/get/123+foo", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["key"], "123+foo");
    assert_eq!(json["value"], json!({"a": 1}));
}

#[tokio::test]
async fn test_get_missing_key() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/get/123+missing", None).await;

    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(json["error"].as_str().unwrap().contains("123+missing"));
}

#[tokio::test]
async fn test_delete_then_get() {
    let app = create_test_app();
    send(&app, "PUT", "/set", Some(json!({"key": "k+1", "value": "v"}))).await;

    let (status, _) = send(&app, "DELETE", "/del/k+1", None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, "GET", "/get/k+1", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_malformed_key_is_bad_request() {
    let app = create_test_app();

    let (status, json) = send(&app, "PUT", "/set", Some(json!({"key": "+foo", "value": 1}))).await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(json["error"].as_str().unwrap().starts_with("Malformed key"));
}

#[tokio::test]
async fn test_invalid_json_body() {
    let app = create_test_app();

    let response = app
        .oneshot(
            Request::builder()
                .method("PUT")
                .uri("/set")
                .header("content-type", "application/json")
                .body(Body::from("not json"))
                .unwrap(),
        )
        .await
        .unwrap();

    assert!(response.status().is_client_error());
}

// == Batch Endpoints ==

#[tokio::test]
async fn test_mset_mget_keys_scenario() {
    let app = create_test_app();

    send(&app, "PUT", "/set", Some(json!({"key": "123+bar", "value": "b"}))).await;
    let (status, _) = send(
        &app,
        "PUT",
        "/mset",
        Some(json!({"entries": [["123+foo", 1], ["123+baz", null]]})),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, json) = send(&app, "POST", "/mget", Some(json!({"keys": ["123+foo", "123+baz", "123+nope"]}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["values"], json!([1, null, null]));

    // "+" must be percent-encoded inside a query string
    let (status, json) = send(&app, "GET", "/keys?pattern=123%2Bb*", None).await;
    assert_eq!(status, StatusCode::OK);
    let mut keys: Vec<String> = serde_json::from_value(json["keys"].clone()).unwrap();
    keys.sort();
    assert_eq!(keys, vec!["123+bar", "123+baz"]);
}

#[tokio::test]
async fn test_mdel_and_reset() {
    let app = create_test_app();
    let entries: Vec<Value> = (0..40).map(|i| json!([format!("p+{}", i), i])).collect();
    send(&app, "PUT", "/mset", Some(json!({"entries": entries}))).await;

    let (status, json) = send(&app, "POST", "/mdel", Some(json!({"keys": ["p+0", "p+1"]}))).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["count"], 2);

    let (_, json) = send(&app, "GET", "/keys", None).await;
    assert_eq!(json["keys"].as_array().unwrap().len(), 38);

    let (status, _) = send(&app, "POST", "/reset", None).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = send(&app, "GET", "/keys", None).await;
    assert_eq!(json["keys"], json!([]));
}

#[tokio::test]
async fn test_keys_invalid_pattern() {
    let app = create_test_app();

    for pattern in ["bar*", "bar%2Bfo**", "bar%2Bfo*%2Bbaz*"] {
        let (status, json) = send(&app, "GET", &format!("/keys?pattern={}", pattern), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST, "pattern {}", pattern);
        assert!(json["error"].as_str().unwrap().starts_with("Invalid pattern"));
    }
}

// == TTL / Touch ==

#[tokio::test]
async fn test_ttl_and_touch() {
    let app = create_test_app();
    send(&app, "PUT", "/set", Some(json!({"key": "t+1", "value": true, "ttl": 5000}))).await;

    let (status, json) = send(&app, "GET", "/ttl/t+1", None).await;
    assert_eq!(status, StatusCode::OK);
    let before = json["ttl"].as_i64().unwrap();
    assert!(before > 0 && before <= 5500);

    let (status, _) = send(&app, "POST", "/touch", Some(json!({"key": "t+1", "ttl": 600000}))).await;
    assert_eq!(status, StatusCode::OK);

    let (_, json) = send(&app, "GET", "/ttl/t+1", None).await;
    assert!(json["ttl"].as_i64().unwrap() > before);

    let (_, json) = send(&app, "GET", "/get/t+1", None).await;
    assert_eq!(json["value"], true);
}

#[tokio::test]
async fn test_ttl_missing_key() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/ttl/t+none", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json, json!({"key": "t+none", "ttl": -1}));
}

// == Stats / Health ==

#[tokio::test]
async fn test_stats_counts_hits_and_misses() {
    let app = create_test_app();
    send(&app, "PUT", "/set", Some(json!({"key": "s+1", "value": 1}))).await;
    send(&app, "GET", "/get/s+1", None).await;
    send(&app, "GET", "/get/s+2", None).await;
    send(&app, "POST", "/mget", Some(json!({"keys": ["s+1", "s+3"]}))).await;

    let (status, json) = send(&app, "GET", "/stats", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["hits"], 2);
    assert_eq!(json["misses"], 2);
    assert_eq!(json["total_records"], 1);
    assert_eq!(json["hit_rate"], 0.5);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = create_test_app();

    let (status, json) = send(&app, "GET", "/health", None).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
    assert!(json.get("timestamp").is_some());
}
