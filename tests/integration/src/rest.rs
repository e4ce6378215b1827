//! Mock REST API
//!
//! Serves the handful of routes the client touches, records every request,
//! and misbehaves on cue: `/users/@me` is rate limited once, channel `404`
//! does not exist, channel `77` reports an exhausted bucket, and an empty
//! message body is rejected with field errors.

use anyhow::Result;
use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use parking_lot::Mutex;
use serde_json::{json, Value};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

/// Channel whose message bucket is always exhausted
pub const EXHAUSTED_CHANNEL: &str = "77";

/// Seconds until the exhausted bucket resets
pub const EXHAUSTED_RESET_AFTER: f64 = 0.3;

/// Seconds the first `/users/@me` call is told to wait
pub const RATE_LIMIT_RETRY_AFTER: f64 = 0.2;

/// A request as the mock server saw it
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub authorization: Option<String>,
    pub audit_reason: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct RestState {
    gateway_url: Arc<String>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    me_calls: Arc<AtomicUsize>,
}

impl RestState {
    fn record(&self, method: &Method, uri: &Uri, headers: &HeaderMap, body: &[u8]) {
        let header = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(ToString::to_string)
        };
        self.requests.lock().push(RecordedRequest {
            method: method.to_string(),
            path: uri.path().to_string(),
            authorization: header("authorization"),
            audit_reason: header("x-audit-log-reason"),
            body: serde_json::from_slice(body).unwrap_or(Value::Null),
        });
    }
}

/// Running mock REST server
pub struct MockRest {
    addr: SocketAddr,
    state: RestState,
    _handle: JoinHandle<()>,
}

impl MockRest {
    /// Start a server that hands out `gateway_url` from `/gateway/bot`
    pub async fn start(gateway_url: impl Into<String>) -> Result<Self> {
        let state = RestState {
            gateway_url: Arc::new(gateway_url.into()),
            requests: Arc::default(),
            me_calls: Arc::default(),
        };

        let app = Router::new()
            .route("/api/v10/gateway/bot", get(gateway_bot))
            .route("/api/v10/users/@me", get(current_user))
            .route("/api/v10/channels/:channel_id", get(channel))
            .route("/api/v10/channels/:channel_id/messages", post(create_message))
            .route(
                "/api/v10/channels/:channel_id/messages/:message_id",
                delete(delete_message),
            )
            .with_state(state.clone());

        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let handle = tokio::spawn(async move {
            axum::serve(listener, app).await.ok();
        });

        Ok(Self {
            addr,
            state,
            _handle: handle,
        })
    }

    /// Value for `ClientConfig::with_api_base`
    pub fn api_base(&self) -> String {
        format!("http://{}/api", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.state.requests.lock().clone()
    }

    /// Requests whose path ends with `suffix`
    pub fn requests_to(&self, suffix: &str) -> Vec<RecordedRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.path.ends_with(suffix))
            .collect()
    }
}

async fn gateway_bot(
    State(state): State<RestState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Json<Value> {
    state.record(&method, &uri, &headers, b"");
    Json(json!({
        "url": state.gateway_url.as_str(),
        "shards": 1,
        "session_start_limit": {"total": 1000, "remaining": 999, "reset_after": 0, "max_concurrency": 1}
    }))
}

async fn current_user(
    State(state): State<RestState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    state.record(&method, &uri, &headers, b"");
    if state.me_calls.fetch_add(1, Ordering::SeqCst) == 0 {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            [("retry-after", RATE_LIMIT_RETRY_AFTER.to_string())],
            Json(json!({
                "message": "You are being rate limited.",
                "retry_after": RATE_LIMIT_RETRY_AFTER,
                "global": false
            })),
        )
            .into_response();
    }
    Json(json!({"id": "1", "username": "chatlink", "bot": true})).into_response()
}

async fn channel(
    State(state): State<RestState>,
    Path(channel_id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> Response {
    state.record(&method, &uri, &headers, b"");
    if channel_id == "404" {
        return (
            StatusCode::NOT_FOUND,
            Json(json!({"message": "Unknown Channel", "code": 10003})),
        )
            .into_response();
    }
    Json(json!({"id": channel_id, "type": 0})).into_response()
}

async fn create_message(
    State(state): State<RestState>,
    Path(channel_id): Path<String>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    state.record(&method, &uri, &headers, &body);
    let payload: Value = serde_json::from_slice(&body).unwrap_or(Value::Null);

    let content = payload.get("content").and_then(Value::as_str).unwrap_or("");
    if content.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            Json(json!({
                "message": "Invalid Form Body",
                "code": 50035,
                "errors": {
                    "content": {
                        "_errors": [{"code": "BASE_TYPE_REQUIRED", "message": "This field is required"}]
                    }
                }
            })),
        )
            .into_response();
    }

    let remaining = if channel_id == EXHAUSTED_CHANNEL { "0" } else { "4" };
    (
        StatusCode::OK,
        [
            ("x-ratelimit-remaining", remaining.to_string()),
            ("x-ratelimit-reset-after", EXHAUSTED_RESET_AFTER.to_string()),
        ],
        Json(json!({"id": "900", "channel_id": channel_id, "content": content})),
    )
        .into_response()
}

async fn delete_message(
    State(state): State<RestState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
) -> StatusCode {
    state.record(&method, &uri, &headers, b"");
    StatusCode::NO_CONTENT
}
