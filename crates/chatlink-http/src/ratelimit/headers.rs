//! Rate-limit response headers

use reqwest::header::HeaderMap;
use serde_json::Value;
use std::time::Duration;

pub const REMAINING: &str = "x-ratelimit-remaining";
pub const RESET: &str = "x-ratelimit-reset";
pub const RESET_AFTER: &str = "x-ratelimit-reset-after";
pub const GLOBAL: &str = "x-ratelimit-global";
pub const RETRY_AFTER: &str = "retry-after";

/// Cooldown used when a 429 carries no usable retry hint
const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(1);

/// Rate-limit headers of one response
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RateLimitHeaders {
    pub remaining: Option<u32>,
    /// Relative reset, preferred over the absolute one
    pub reset_after: Option<Duration>,
    /// Absolute reset as fractional epoch seconds
    pub reset_epoch: Option<f64>,
    pub retry_after: Option<Duration>,
    pub global: bool,
}

impl RateLimitHeaders {
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let text = |name: &str| headers.get(name).and_then(|v| v.to_str().ok()).map(str::trim);
        let number = |name: &str| text(name).and_then(|v| v.parse::<f64>().ok());

        Self {
            remaining: text(REMAINING).and_then(|v| v.parse().ok()),
            reset_after: number(RESET_AFTER).and_then(seconds),
            reset_epoch: number(RESET),
            retry_after: number(RETRY_AFTER).and_then(seconds),
            global: text(GLOBAL).is_some_and(|v| v.eq_ignore_ascii_case("true")),
        }
    }

    /// Time until the bucket resets, given the current epoch in seconds
    #[must_use]
    pub fn reset_delay(&self, now_epoch: f64) -> Option<Duration> {
        self.reset_after
            .or_else(|| self.reset_epoch.and_then(|reset| seconds((reset - now_epoch).max(0.0))))
    }
}

/// How long to back off after a 429, and whether the limit is global
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryHint {
    pub retry_after: Duration,
    pub global: bool,
}

impl RetryHint {
    /// Combine the headers with the JSON body, headers taking precedence
    #[must_use]
    pub fn from_response(headers: &RateLimitHeaders, body: &[u8]) -> Self {
        let body: Option<Value> = serde_json::from_slice(body).ok();
        let body_field = |name: &str| body.as_ref().and_then(|b| b.get(name).cloned());

        let retry_after = headers
            .retry_after
            .or_else(|| body_field("retry_after").and_then(|v| v.as_f64()).and_then(seconds))
            .or(headers.reset_after)
            .unwrap_or(DEFAULT_RETRY_AFTER);

        let global = headers.global
            || body_field("global")
                .and_then(|v| v.as_bool())
                .unwrap_or(false);

        Self {
            retry_after,
            global,
        }
    }
}

/// Out-of-range values (negative, NaN, too large for a `Duration`) are dropped
fn seconds(value: f64) -> Option<Duration> {
    Duration::try_from_secs_f64(value).ok()
}
