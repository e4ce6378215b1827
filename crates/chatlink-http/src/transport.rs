//! HTTP transport port
//!
//! The rate limiter talks to the network through [`Transport`] so that the
//! admission logic does not depend on a concrete HTTP client.

use crate::error::HttpResult;
use crate::request::{ApiRequest, FileAttachment, RequestBody};
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use reqwest::multipart::{Form, Part};
use reqwest::Client;

/// Header carrying the audit-log reason
pub const AUDIT_LOG_REASON: &str = "x-audit-log-reason";

/// Status, headers and body of a completed exchange
#[derive(Debug, Clone)]
pub struct RawResponse {
    pub status: u16,
    pub headers: HeaderMap,
    pub body: Vec<u8>,
}

impl RawResponse {
    pub fn new(status: u16) -> Self {
        Self {
            status,
            headers: HeaderMap::new(),
            body: Vec::new(),
        }
    }

    pub fn header(mut self, name: &'static str, value: impl ToString) -> Self {
        if let Ok(value) = HeaderValue::from_str(&value.to_string()) {
            self.headers.insert(name, value);
        }
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }
}

/// Sends one request, without any retry or rate-limit handling
#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: &ApiRequest) -> HttpResult<RawResponse>;
}

/// `reqwest`-backed transport bound to an API root and bot token
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: Client,
    api_url: String,
    authorization: String,
}

impl ReqwestTransport {
    /// Build a transport for `api_url` (the versioned root, no trailing slash)
    pub fn new(api_url: impl Into<String>, token: &str) -> HttpResult<Self> {
        let client = Client::builder()
            .user_agent(concat!(
                "DiscordBot (https://github.com/chatlink/chatlink, ",
                env!("CARGO_PKG_VERSION"),
                ")"
            ))
            .build()?;

        Ok(Self {
            client,
            api_url: api_url.into().trim_end_matches('/').to_string(),
            authorization: format!("Bot {token}"),
        })
    }

    fn build_form(payload: Option<&serde_json::Value>, files: &[FileAttachment]) -> HttpResult<Form> {
        let mut form = Form::new();
        for (index, file) in files.iter().enumerate() {
            let mut part = Part::bytes(file.data.clone()).file_name(file.filename.clone());
            if let Some(content_type) = &file.content_type {
                part = part.mime_str(content_type)?;
            }
            form = form.part(format!("files[{index}]"), part);
        }
        if let Some(payload) = payload {
            let part = Part::text(serde_json::to_string(payload)?).mime_str("application/json")?;
            form = form.part("payload_json", part);
        }
        Ok(form)
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: &ApiRequest) -> HttpResult<RawResponse> {
        let url = format!("{}{}", self.api_url, request.path);
        let mut builder = self
            .client
            .request(request.method.clone(), url)
            .header(AUTHORIZATION, &self.authorization);

        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(reason) = &request.audit_reason {
            builder = builder.header(AUDIT_LOG_REASON, urlencoding::encode(reason).into_owned());
        }

        builder = match &request.body {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart { payload, files } => {
                builder.multipart(Self::build_form(payload.as_ref(), files)?)
            }
        };

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let headers = response.headers().clone();
        let body = response.bytes().await?.to_vec();

        Ok(RawResponse {
            status,
            headers,
            body,
        })
    }
}
