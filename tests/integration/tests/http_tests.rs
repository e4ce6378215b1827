//! REST Integration Tests
//!
//! Exercise `HttpClient` and its rate limiter against the mock REST server
//! over real HTTP.
//!
//! Run with: cargo test -p integration-tests --test http_tests

use chatlink_core::Snowflake;
use chatlink_http::{HttpClient, HttpError, Route};
use integration_tests::rest::{EXHAUSTED_CHANNEL, RATE_LIMIT_RETRY_AFTER};
use integration_tests::{test_config, MockRest};
use serde_json::json;
use std::time::{Duration, Instant};

async fn setup() -> (MockRest, HttpClient) {
    let rest = MockRest::start("ws://127.0.0.1:1").await.unwrap();
    let http = HttpClient::new(&test_config(&rest)).unwrap();
    (rest, http)
}

#[tokio::test]
async fn test_rate_limited_request_is_retried() {
    let (rest, http) = setup().await;

    let started = Instant::now();
    let user = http.get_current_user().await.unwrap();
    assert_eq!(user["username"], "chatlink");
    assert!(started.elapsed() >= Duration::from_secs_f64(RATE_LIMIT_RETRY_AFTER));
    assert_eq!(rest.requests_to("/users/@me").len(), 2);
}

#[tokio::test]
async fn test_exhausted_bucket_waits_for_reset() {
    let (rest, http) = setup().await;
    let channel = Snowflake::parse(EXHAUSTED_CHANNEL).unwrap();

    http.create_message(channel, json!({"content": "one"}))
        .await
        .unwrap();
    let key = Route::post("/channels/{channel_id}/messages")
        .channel_id(channel)
        .bucket_key();
    let snapshot = http.rate_limiter().snapshot(&key).await.unwrap();
    assert_eq!(snapshot.remaining, Some(0));

    let started = Instant::now();
    http.create_message(channel, json!({"content": "two"}))
        .await
        .unwrap();
    assert!(started.elapsed() >= Duration::from_millis(250));
    assert_eq!(rest.requests_to("/messages").len(), 2);
}

#[tokio::test]
async fn test_bad_request_carries_field_errors() {
    let (_rest, http) = setup().await;

    let err = http
        .create_message(Snowflake::new(5), json!({"content": ""}))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), Some(400));
    let fields = err.field_errors();
    assert_eq!(fields.len(), 1);
    assert_eq!(fields[0].path, "content");
    assert_eq!(fields[0].code, "BASE_TYPE_REQUIRED");
}

#[tokio::test]
async fn test_not_found() {
    let (_rest, http) = setup().await;

    let err = http.get_channel(Snowflake::new(404)).await.unwrap_err();
    assert!(matches!(err, HttpError::NotFound(ref message) if message.contains("Unknown Channel")));

    let channel = http.get_channel(Snowflake::new(12)).await.unwrap();
    assert_eq!(channel["id"], "12");
}

#[tokio::test]
async fn test_audit_reason_and_auth_headers() {
    let (rest, http) = setup().await;

    http.delete_message(Snowflake::new(5), Snowflake::new(6), Some("spam cleanup"))
        .await
        .unwrap();

    let requests = rest.requests_to("/channels/5/messages/6");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].method, "DELETE");
    assert_eq!(requests[0].authorization.as_deref(), Some("Bot test-token"));
    assert_eq!(requests[0].audit_reason.as_deref(), Some("spam%20cleanup"));
}

#[tokio::test]
async fn test_closed_client_rejects_requests() {
    let (rest, http) = setup().await;
    http.close();

    let err = http.get_channel(Snowflake::new(1)).await.unwrap_err();
    assert!(matches!(err, HttpError::Closed));
    assert!(rest.requests().is_empty());
}
