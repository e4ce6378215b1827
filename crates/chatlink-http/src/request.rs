//! Resolved REST requests

use crate::route::BucketKey;
use reqwest::Method;
use serde_json::Value;

/// A fully resolved request, ready for the rate limiter
///
/// Requests are cloneable so a rate-limited attempt can be replayed.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the versioned API root
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: RequestBody,
    /// Sent as `X-Audit-Log-Reason`
    pub audit_reason: Option<String>,
    pub bucket: BucketKey,
}

/// Request payload
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    #[default]
    Empty,
    Json(Value),
    /// Files plus an optional `payload_json` part
    Multipart {
        payload: Option<Value>,
        files: Vec<FileAttachment>,
    },
}

/// A file uploaded in a multipart request
#[derive(Debug, Clone)]
pub struct FileAttachment {
    pub filename: String,
    pub data: Vec<u8>,
    pub content_type: Option<String>,
}

impl FileAttachment {
    pub fn new(filename: impl Into<String>, data: impl Into<Vec<u8>>) -> Self {
        Self {
            filename: filename.into(),
            data: data.into(),
            content_type: None,
        }
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: String, bucket: BucketKey) -> Self {
        Self {
            method,
            path,
            query: Vec::new(),
            body: RequestBody::Empty,
            audit_reason: None,
            bucket,
        }
    }

    pub fn query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Set a JSON body, keeping any files already attached
    pub fn json(mut self, value: Value) -> Self {
        self.body = match self.body {
            RequestBody::Multipart { files, .. } => RequestBody::Multipart {
                payload: Some(value),
                files,
            },
            _ => RequestBody::Json(value),
        };
        self
    }

    /// Attach a file, switching the body to multipart
    pub fn file(mut self, file: FileAttachment) -> Self {
        self.body = match self.body {
            RequestBody::Empty => RequestBody::Multipart {
                payload: None,
                files: vec![file],
            },
            RequestBody::Json(value) => RequestBody::Multipart {
                payload: Some(value),
                files: vec![file],
            },
            RequestBody::Multipart { payload, mut files } => {
                files.push(file);
                RequestBody::Multipart { payload, files }
            }
        };
        self
    }

    /// Record an audit-log reason
    pub fn reason(mut self, reason: impl Into<String>) -> Self {
        self.audit_reason = Some(reason.into());
        self
    }

    /// Whether the route carries the extra reaction cooldown
    #[must_use]
    pub fn is_reaction_route(&self) -> bool {
        self.path.contains("reaction")
    }
}
