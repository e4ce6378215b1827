//! Heartbeat task
//!
//! Started on Hello, aborted when the connection ends. The first beat is
//! delayed by a random fraction of the interval so that many clients
//! reconnecting together do not beat in lockstep.

use super::sender::GatewaySender;
use super::state::SessionState;
use crate::protocol::GatewayMessage;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::time::{interval, sleep, Instant, MissedTickBehavior};

/// Shortest period the ticker accepts
const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Why the heartbeat task stopped on its own
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeartbeatExit {
    /// A beat came due while the previous one was still unacknowledged
    Zombied,
    /// The writer is gone
    Disconnected,
}

/// Send one heartbeat carrying the last sequence seen
pub(crate) async fn beat(state: &RwLock<SessionState>, sender: &GatewaySender) -> bool {
    let sequence = state.read().last_sequence;
    let sent = sender.send(GatewayMessage::heartbeat(sequence)).await.is_ok();
    if sent {
        state.write().heartbeat_sent(Instant::now());
        tracing::trace!(seq = ?sequence, "Heartbeat sent");
    }
    sent
}

/// Beat every `period` until aborted; report a zombie or dead writer on `exit`
pub(crate) async fn run_heartbeat(
    period: Duration,
    jitter: f64,
    zombie_detection: bool,
    state: Arc<RwLock<SessionState>>,
    sender: GatewaySender,
    exit: mpsc::Sender<HeartbeatExit>,
) {
    let period = period.max(MIN_PERIOD);
    sleep(period.mul_f64(jitter.clamp(0.0, 1.0))).await;

    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        if zombie_detection && !state.read().heartbeat_acked {
            tracing::warn!(interval_ms = period.as_millis() as u64, "Heartbeat not acknowledged, connection zombied");
            let _ = exit.send(HeartbeatExit::Zombied).await;
            return;
        }

        if !beat(&state, &sender).await {
            let _ = exit.send(HeartbeatExit::Disconnected).await;
            return;
        }
    }
}
