//! Per-bucket rate-limit state

use super::headers::RateLimitHeaders;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

/// Remaining quota and reset time learned from the last response
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BucketState {
    pub remaining: Option<u32>,
    pub reset_at: Option<Instant>,
}

impl BucketState {
    /// How long a new request has to wait before it may be sent
    #[must_use]
    pub fn admission_delay(&self, now: Instant) -> Option<Duration> {
        match (self.remaining, self.reset_at) {
            (Some(0), Some(reset_at)) if reset_at > now => Some(reset_at - now),
            _ => None,
        }
    }

    /// Refresh from response headers; absent headers keep the previous value
    pub fn update(&mut self, headers: &RateLimitHeaders, now: Instant, now_epoch: f64) {
        if let Some(remaining) = headers.remaining {
            self.remaining = Some(remaining);
        }
        if let Some(delay) = headers.reset_delay(now_epoch) {
            self.reset_at = Some(now + delay);
        }
    }
}

/// A rate-limit bucket
///
/// The mutex serializes requests sharing the bucket. `locked` is raised only
/// while a 429 cooldown runs, after the mutex has been released, so queued
/// requests can observe it without blocking on the sleeper.
#[derive(Debug, Default)]
pub(crate) struct Bucket {
    pub(crate) state: Mutex<BucketState>,
    locked: AtomicBool,
    cooldowns: AtomicU64,
}

impl Bucket {
    pub(crate) fn is_locked(&self) -> bool {
        self.locked.load(Ordering::Acquire)
    }

    pub(crate) fn lock(&self) {
        self.locked.store(true, Ordering::Release);
        self.cooldowns.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn unlock(&self) {
        self.locked.store(false, Ordering::Release);
    }

    pub(crate) async fn snapshot(&self) -> BucketSnapshot {
        let state = *self.state.lock().await;
        BucketSnapshot {
            remaining: state.remaining,
            reset_at: state.reset_at,
            locked: self.is_locked(),
            cooldowns: self.cooldowns.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time view of a bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BucketSnapshot {
    pub remaining: Option<u32>,
    pub reset_at: Option<Instant>,
    pub locked: bool,
    /// Number of 429 cooldowns this bucket has gone through
    pub cooldowns: u64,
}
