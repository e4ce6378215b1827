//! Rate-limit coordination
//!
//! Every REST call goes through [`RateLimiter::execute`], which waits for the
//! global and per-bucket limits, sends the request, learns the new limits
//! from the response headers and retries 429 and 5xx responses.

mod bucket;
pub mod headers;

pub use bucket::{BucketSnapshot, BucketState};
pub use headers::{RateLimitHeaders, RetryHint};

use crate::error::{HttpError, HttpResult};
use crate::request::ApiRequest;
use crate::route::BucketKey;
use crate::transport::Transport;
use bucket::Bucket;
use dashmap::DashMap;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, instrument, warn};

/// Poll interval while a bucket or the global limit is cooling down
pub const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(50);

/// Fixed wait before retrying a 5xx or a dropped connection
pub const SERVER_ERROR_BACKOFF: Duration = Duration::from_secs(1);

/// Extra cooldown applied to reaction routes after a 429
pub const REACTION_PENALTY: Duration = Duration::from_millis(750);

/// Coordinates REST requests against per-bucket and global limits
#[derive(Debug)]
pub struct RateLimiter {
    buckets: DashMap<BucketKey, Arc<Bucket>>,
}

impl Default for RateLimiter {
    fn default() -> Self {
        Self::new()
    }
}

impl RateLimiter {
    #[must_use]
    pub fn new() -> Self {
        let buckets = DashMap::new();
        buckets.insert(BucketKey::Global, Arc::new(Bucket::default()));
        Self { buckets }
    }

    /// Get or lazily create the bucket for a key
    fn bucket(&self, key: &BucketKey) -> Arc<Bucket> {
        if let Some(bucket) = self.buckets.get(key) {
            return Arc::clone(bucket.value());
        }
        Arc::clone(self.buckets.entry(key.clone()).or_default().value())
    }

    /// Number of buckets seen so far, the global one included
    #[must_use]
    pub fn bucket_count(&self) -> usize {
        self.buckets.len()
    }

    /// Current view of a bucket, if it exists
    pub async fn snapshot(&self, key: &BucketKey) -> Option<BucketSnapshot> {
        let bucket = self.buckets.get(key).map(|b| Arc::clone(b.value()))?;
        Some(bucket.snapshot().await)
    }

    /// Whether the global limit is cooling down
    #[must_use]
    pub fn is_globally_locked(&self) -> bool {
        self.buckets
            .get(&BucketKey::Global)
            .is_some_and(|b| b.is_locked())
    }

    /// Send a request, waiting out rate limits and retrying 429 and 5xx
    ///
    /// Returns `Ok(None)` for responses without a body. The loop has no
    /// ceiling of its own; wrap the call in `tokio::time::timeout` to bound it.
    #[instrument(skip_all, fields(method = %request.method, path = %request.path, bucket = %request.bucket))]
    pub async fn execute<T>(&self, transport: &T, request: &ApiRequest) -> HttpResult<Option<Value>>
    where
        T: Transport + ?Sized,
    {
        let global = self.bucket(&BucketKey::Global);
        let bucket = self.bucket(&request.bucket);

        loop {
            if global.is_locked() {
                sleep(LOCK_POLL_INTERVAL).await;
                continue;
            }

            let mut state = bucket.state.lock().await;
            // A global 429 may have landed while this call queued on the bucket
            if global.is_locked() || bucket.is_locked() {
                drop(state);
                sleep(LOCK_POLL_INTERVAL).await;
                continue;
            }

            if let Some(wait) = state.admission_delay(Instant::now()) {
                debug!(wait_ms = wait.as_millis() as u64, "Bucket exhausted, waiting for reset");
                sleep(wait).await;
            }

            let response = match transport.send(request).await {
                Ok(response) => response,
                Err(e) if e.is_transient() => {
                    drop(state);
                    warn!(error = %e, "Request failed, retrying");
                    sleep(SERVER_ERROR_BACKOFF).await;
                    continue;
                }
                Err(e) => return Err(e),
            };

            let headers = RateLimitHeaders::from_headers(&response.headers);
            state.update(&headers, Instant::now(), epoch_seconds());

            match response.status {
                204 => return Ok(None),
                429 => {
                    let hint = RetryHint::from_response(&headers, &response.body);
                    let mut cooldown = hint.retry_after;
                    if request.is_reaction_route() {
                        cooldown += REACTION_PENALTY;
                    }

                    let locked = if hint.global { &global } else { &bucket };
                    locked.lock();
                    drop(state);

                    warn!(
                        status = 429,
                        global = hint.global,
                        retry_after_ms = cooldown.as_millis() as u64,
                        "Rate limited"
                    );
                    sleep(cooldown).await;
                    locked.unlock();
                }
                status if status >= 500 => {
                    drop(state);
                    warn!(status, "Server error, retrying");
                    sleep(SERVER_ERROR_BACKOFF).await;
                }
                status if status < 400 => {
                    if response.body.is_empty() {
                        return Ok(None);
                    }
                    return Ok(Some(serde_json::from_slice(&response.body)?));
                }
                status => {
                    debug!(status, "Request rejected");
                    return Err(HttpError::from_status(status, &response.body));
                }
            }
        }
    }
}

fn epoch_seconds() -> f64 {
    chrono::Utc::now().timestamp_millis() as f64 / 1000.0
}
