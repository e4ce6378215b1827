//! Handler context
//!
//! Everything a handler may touch while reacting to an event: REST, the
//! gateway command path, waiters and a read-only view of the session.

use super::predicate::Predicate;
use super::waiter::{WaitError, Waiters};
use crate::session::{GatewaySender, SessionState};
use chatlink_http::HttpClient;
use parking_lot::RwLock;
use serde_json::Value;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

/// Per-dispatch handle given to every handler
///
/// Cheap to clone; all clones share the same client.
#[derive(Clone)]
pub struct Context {
    http: HttpClient,
    sender: GatewaySender,
    waiters: Arc<Waiters>,
    state: Arc<RwLock<SessionState>>,
}

impl Context {
    pub(crate) fn new(
        http: HttpClient,
        sender: GatewaySender,
        waiters: Arc<Waiters>,
        state: Arc<RwLock<SessionState>>,
    ) -> Self {
        Self {
            http,
            sender,
            waiters,
            state,
        }
    }

    /// REST client, rate limited
    #[must_use]
    pub fn http(&self) -> &HttpClient {
        &self.http
    }

    /// Outbound gateway commands
    #[must_use]
    pub fn sender(&self) -> &GatewaySender {
        &self.sender
    }

    /// Wait for the next `event` whose payload satisfies `predicate`
    ///
    /// The name may carry tags (`DIRECT_MESSAGE_CREATE`) to only match
    /// tagged payloads.
    pub async fn wait_for(
        &self,
        event: impl AsRef<str>,
        predicate: Predicate,
        timeout: Duration,
    ) -> Result<Arc<Value>, WaitError> {
        self.waiters.wait_for(event.as_ref(), predicate, timeout).await
    }

    #[must_use]
    pub fn session_id(&self) -> Option<String> {
        self.state.read().session_id.clone()
    }

    /// Round trip of the last acknowledged heartbeat
    #[must_use]
    pub fn latency(&self) -> Option<Duration> {
        self.state.read().latency
    }

    #[must_use]
    pub fn last_sequence(&self) -> Option<u64> {
        self.state.read().last_sequence
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("session_id", &self.session_id())
            .field("sender", &self.sender)
            .finish_non_exhaustive()
    }
}
