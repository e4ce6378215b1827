//! Session state
//!
//! What the client remembers about its gateway session between connections.

use serde::Serialize;
use std::time::Duration;
use tokio::time::Instant;

/// Connection lifecycle phase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ConnectionPhase {
    /// Not connected; initial and terminal phase
    Disconnected,
    /// Resolving the URL and opening the socket
    Connecting,
    /// Socket open, waiting for Hello
    AwaitingHello,
    /// Identify sent, waiting for READY
    Identifying,
    /// Resume sent, waiting for RESUMED
    Resuming,
    /// Receiving events
    Connected,
    /// Socket lost, about to connect again
    Reconnecting,
}

/// Session state shared between the read loop and the heartbeat task
#[derive(Debug, Clone)]
pub struct SessionState {
    pub session_id: Option<String>,
    /// Host handed out in READY for resuming this session
    pub resume_url: Option<String>,
    pub last_sequence: Option<u64>,
    pub heartbeat_interval: Option<Duration>,
    pub heartbeat_sent_at: Option<Instant>,
    pub heartbeat_acked: bool,
    /// Round trip of the last acknowledged heartbeat
    pub latency: Option<Duration>,
    pub phase: ConnectionPhase,
}

impl Default for SessionState {
    fn default() -> Self {
        Self {
            session_id: None,
            resume_url: None,
            last_sequence: None,
            heartbeat_interval: None,
            heartbeat_sent_at: None,
            heartbeat_acked: true,
            latency: None,
            phase: ConnectionPhase::Disconnected,
        }
    }
}

impl SessionState {
    /// Whether the next Hello should be answered with Resume
    #[must_use]
    pub fn can_resume(&self) -> bool {
        self.session_id.is_some() && self.resume_url.is_some()
    }

    /// Record a dispatch sequence number
    pub fn observe_sequence(&mut self, sequence: u64) {
        self.last_sequence = Some(sequence);
    }

    /// Record a new session from READY
    pub fn start_session(&mut self, session_id: String, resume_url: Option<String>) {
        self.session_id = Some(session_id);
        self.resume_url = resume_url;
        self.phase = ConnectionPhase::Connected;
    }

    /// Forget the session so the next handshake identifies from scratch
    pub fn clear_session(&mut self) {
        self.session_id = None;
        self.resume_url = None;
        self.last_sequence = None;
    }

    /// Reset heartbeat bookkeeping for a fresh connection
    pub fn begin_heartbeat(&mut self, interval: Duration) {
        self.heartbeat_interval = Some(interval);
        self.heartbeat_sent_at = None;
        self.heartbeat_acked = true;
    }

    pub fn heartbeat_sent(&mut self, at: Instant) {
        self.heartbeat_sent_at = Some(at);
        self.heartbeat_acked = false;
    }

    pub fn heartbeat_ack(&mut self, at: Instant) {
        self.heartbeat_acked = true;
        if let Some(sent_at) = self.heartbeat_sent_at {
            self.latency = Some(at.saturating_duration_since(sent_at));
        }
    }
}
