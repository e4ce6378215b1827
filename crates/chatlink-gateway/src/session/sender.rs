//! Outbound command path
//!
//! Each connection has exactly one writer task owning the socket sink. Every
//! outbound command goes through [`GatewaySender`], which forwards it to the
//! writer of the current connection.

use crate::error::SendError;
use crate::protocol::{
    GatewayMessage, OpCode, PresenceUpdatePayload, RequestGuildMembersPayload,
    VoiceStateUpdatePayload,
};
use futures_util::{Sink, SinkExt};
use governor::{DefaultDirectRateLimiter, Quota, RateLimiter};
use parking_lot::RwLock;
use std::fmt;
use std::num::NonZeroU32;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode as WsCloseCode;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::{self, Message};

/// Commands (other than heartbeats) the gateway accepts per minute
pub const COMMANDS_PER_MINUTE: u32 = 120;

/// Channel buffer size for outgoing messages
pub(crate) const OUTBOUND_BUFFER_SIZE: usize = 100;

/// Work item for the writer task
#[derive(Debug)]
pub(crate) enum Outbound {
    Message(GatewayMessage),
    /// Send a close frame with this code and stop
    Close(u16),
}

/// Handle for sending commands on the current connection
///
/// Clones share the connection slot and the command rate limit.
#[derive(Clone)]
pub struct GatewaySender {
    inner: Arc<Inner>,
}

struct Inner {
    tx: RwLock<Option<mpsc::Sender<Outbound>>>,
    limiter: DefaultDirectRateLimiter,
}

impl Default for GatewaySender {
    fn default() -> Self {
        Self::new()
    }
}

impl GatewaySender {
    #[must_use]
    pub fn new() -> Self {
        let per_minute = NonZeroU32::new(COMMANDS_PER_MINUTE).unwrap_or(NonZeroU32::MIN);
        Self {
            inner: Arc::new(Inner {
                tx: RwLock::new(None),
                limiter: RateLimiter::direct(Quota::per_minute(per_minute)),
            }),
        }
    }

    /// Point the sender at a new connection's writer
    pub(crate) fn attach(&self, tx: mpsc::Sender<Outbound>) {
        *self.inner.tx.write() = Some(tx);
    }

    pub(crate) fn detach(&self) {
        self.inner.tx.write().take();
    }

    #[must_use]
    pub fn is_connected(&self) -> bool {
        self.inner
            .tx
            .read()
            .as_ref()
            .is_some_and(|tx| !tx.is_closed())
    }

    /// Send a command on the current connection
    ///
    /// Commands other than heartbeats wait for the send limit. A failed send
    /// is logged and returned; it is never retried.
    pub async fn send(&self, message: GatewayMessage) -> Result<(), SendError> {
        let op = message.op;
        if op.is_rate_limited() {
            self.inner.limiter.until_ready().await;
        }

        let result = self.enqueue(Outbound::Message(message)).await;
        if let Err(e) = &result {
            tracing::warn!(op = %op, error = %e, "Failed to send gateway command");
        }
        result
    }

    /// Update the client's presence (op 3)
    pub async fn update_presence(&self, payload: &PresenceUpdatePayload) -> Result<(), SendError> {
        self.send(GatewayMessage::presence_update(payload)?).await
    }

    /// Join, move or leave a voice channel (op 4)
    pub async fn update_voice_state(&self, payload: &VoiceStateUpdatePayload) -> Result<(), SendError> {
        self.send(GatewayMessage::voice_state_update(payload)?).await
    }

    /// Ask for guild members; they arrive as `GUILD_MEMBERS_CHUNK` events (op 8)
    pub async fn request_guild_members(
        &self,
        payload: &RequestGuildMembersPayload,
    ) -> Result<(), SendError> {
        self.send(GatewayMessage::request_guild_members(payload)?).await
    }

    /// Ask the writer to send a close frame and stop
    pub(crate) async fn close(&self, code: u16) {
        if self.enqueue(Outbound::Close(code)).await.is_err() {
            tracing::debug!(code, "Writer already gone, nothing to close");
        }
    }

    async fn enqueue(&self, outbound: Outbound) -> Result<(), SendError> {
        // Never hold the lock across the await
        let tx = self.inner.tx.read().clone().ok_or(SendError::NotConnected)?;
        tx.send(outbound).await.map_err(|_| SendError::NotConnected)
    }
}

impl fmt::Debug for GatewaySender {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GatewaySender")
            .field("connected", &self.is_connected())
            .finish_non_exhaustive()
    }
}

/// Drain the outbound channel into the socket until closed
pub(crate) async fn run_writer<S>(mut sink: S, mut rx: mpsc::Receiver<Outbound>)
where
    S: Sink<Message, Error = tungstenite::Error> + Unpin,
{
    while let Some(outbound) = rx.recv().await {
        match outbound {
            Outbound::Message(message) => {
                let json = match message.to_json() {
                    Ok(json) => json,
                    Err(e) => {
                        tracing::warn!(op = %message.op, error = %e, "Failed to encode gateway command");
                        continue;
                    }
                };
                tracing::trace!(op = %message.op, "Sending gateway command");
                if let Err(e) = sink.send(Message::Text(json.into())).await {
                    tracing::warn!(error = %e, "Failed to write to gateway socket");
                    break;
                }
            }
            Outbound::Close(code) => {
                let frame = CloseFrame {
                    code: WsCloseCode::from(code),
                    reason: "".into(),
                };
                if let Err(e) = sink.send(Message::Close(Some(frame))).await {
                    tracing::debug!(error = %e, "Failed to send close frame");
                }
                break;
            }
        }
    }

    let _ = sink.close().await;
}
