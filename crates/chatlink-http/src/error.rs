//! REST error types
//!
//! Every non-retryable response status maps to a variant here. Rate limits
//! and server errors never surface: the rate limiter retries them.

use serde_json::Value;

/// Result type for REST operations
pub type HttpResult<T> = Result<T, HttpError>;

/// REST layer error type
#[derive(Debug, thiserror::Error)]
pub enum HttpError {
    // Response statuses
    #[error("Bad request: {message}")]
    BadRequest {
        message: String,
        code: Option<u64>,
        errors: Vec<FieldError>,
        body: Value,
    },

    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Unexpected status {status}: {body}")]
    Status { status: u16, body: String },

    // Request construction
    #[error("Route parameter missing: {0}")]
    MissingParam(&'static str),

    // Transport and decoding
    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("Invalid response body: {0}")]
    Decode(#[from] serde_json::Error),

    #[error("HTTP client is closed")]
    Closed,
}

/// One field-level validation failure from a 400 body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldError {
    /// Dotted path to the offending field, e.g. `embeds.0.title`
    pub path: String,
    pub code: String,
    pub message: String,
}

impl HttpError {
    /// Build a `BadRequest` from a raw 400 body
    #[must_use]
    pub fn bad_request(body: &[u8]) -> Self {
        let body: Value = serde_json::from_slice(body)
            .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(body).into_owned()));

        let message = error_message(&body);
        let code = body.get("code").and_then(Value::as_u64);
        let mut errors = Vec::new();
        if let Some(tree) = body.get("errors") {
            collect_field_errors(tree, &mut Vec::new(), &mut errors);
        }

        Self::BadRequest {
            message,
            code,
            errors,
            body,
        }
    }

    /// Map a non-success status to the matching variant
    ///
    /// 429 and 5xx are handled by the rate limiter and never reach here.
    #[must_use]
    pub fn from_status(status: u16, body: &[u8]) -> Self {
        let text = || {
            serde_json::from_slice::<Value>(body)
                .map(|v| error_message(&v))
                .unwrap_or_else(|_| String::from_utf8_lossy(body).into_owned())
        };

        match status {
            400 => Self::bad_request(body),
            401 => Self::Unauthorized(text()),
            403 => Self::Forbidden(text()),
            404 => Self::NotFound(text()),
            _ => Self::Status {
                status,
                body: String::from_utf8_lossy(body).into_owned(),
            },
        }
    }

    /// HTTP status this error was built from, if any
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::BadRequest { .. } => Some(400),
            Self::Unauthorized(_) => Some(401),
            Self::Forbidden(_) => Some(403),
            Self::NotFound(_) => Some(404),
            Self::Status { status, .. } => Some(*status),
            Self::Transport(e) => e.status().map(|s| s.as_u16()),
            Self::MissingParam(_) | Self::Decode(_) | Self::Closed => None,
        }
    }

    /// Check if the request can be retried as-is
    ///
    /// Only connection-level failures qualify; a request that could not be
    /// built will fail the same way again.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_connect() || e.is_timeout() || e.is_request(),
            _ => false,
        }
    }

    /// Field-level errors carried by a 400 response
    #[must_use]
    pub fn field_errors(&self) -> &[FieldError] {
        match self {
            Self::BadRequest { errors, .. } => errors,
            _ => &[],
        }
    }
}

fn error_message(body: &Value) -> String {
    match body {
        Value::String(s) => s.clone(),
        _ => body
            .get("message")
            .and_then(Value::as_str)
            .map_or_else(|| body.to_string(), ToString::to_string),
    }
}

// The error tree nests objects keyed by field name (or array index) and
// stores leaf failures under `_errors`.
fn collect_field_errors(node: &Value, path: &mut Vec<String>, out: &mut Vec<FieldError>) {
    let Value::Object(map) = node else {
        return;
    };

    for (key, child) in map {
        if key == "_errors" {
            for entry in child.as_array().into_iter().flatten() {
                let field = |name: &str| {
                    entry
                        .get(name)
                        .and_then(Value::as_str)
                        .unwrap_or_default()
                        .to_string()
                };
                out.push(FieldError {
                    path: path.join("."),
                    code: field("code"),
                    message: field("message"),
                });
            }
        } else {
            path.push(key.clone());
            collect_field_errors(child, path, out);
            path.pop();
        }
    }
}
