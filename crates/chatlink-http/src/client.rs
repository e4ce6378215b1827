//! REST client
//!
//! [`HttpClient`] is a cheaply cloneable handle shared by the gateway and
//! event handlers. All clones share one rate limiter.

use crate::error::{HttpError, HttpResult};
use crate::ratelimit::RateLimiter;
use crate::request::ApiRequest;
use crate::transport::{ReqwestTransport, Transport};
use chatlink_common::ClientConfig;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::info;

/// Rate-limited REST client
#[derive(Clone)]
pub struct HttpClient {
    inner: Arc<Inner>,
}

struct Inner {
    transport: Arc<dyn Transport>,
    limiter: RateLimiter,
    closed: AtomicBool,
}

impl HttpClient {
    /// Create a client for the configured API root and token
    pub fn new(config: &ClientConfig) -> HttpResult<Self> {
        let transport = ReqwestTransport::new(config.api_url(), &config.token)?;
        Ok(Self::with_transport(Arc::new(transport)))
    }

    /// Create a client over a custom transport
    #[must_use]
    pub fn with_transport(transport: Arc<dyn Transport>) -> Self {
        Self {
            inner: Arc::new(Inner {
                transport,
                limiter: RateLimiter::new(),
                closed: AtomicBool::new(false),
            }),
        }
    }

    /// Send a request through the rate limiter
    pub async fn request(&self, request: ApiRequest) -> HttpResult<Option<Value>> {
        if self.is_closed() {
            return Err(HttpError::Closed);
        }
        self.inner
            .limiter
            .execute(self.inner.transport.as_ref(), &request)
            .await
    }

    /// Send a request and deserialize the response body
    pub async fn request_json<T: DeserializeOwned>(&self, request: ApiRequest) -> HttpResult<T> {
        let body = self.request(request).await?.unwrap_or(Value::Null);
        Ok(serde_json::from_value(body)?)
    }

    #[must_use]
    pub fn rate_limiter(&self) -> &RateLimiter {
        &self.inner.limiter
    }

    /// Refuse further requests from every clone of this client
    pub fn close(&self) {
        if !self.inner.closed.swap(true, Ordering::AcqRel) {
            info!("HTTP client closed");
        }
    }

    #[must_use]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpClient")
            .field("buckets", &self.inner.limiter.bucket_count())
            .field("closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}
