//! Gateway message envelope
//!
//! Every frame in either direction is `{"op": int, "d": any, "s": int|null, "t": string|null}`.

use super::{
    HelloPayload, IdentifyPayload, OpCode, PresenceUpdatePayload, RequestGuildMembersPayload,
    ResumePayload, VoiceStateUpdatePayload,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Gateway message envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GatewayMessage {
    /// Operation code
    pub op: OpCode,

    /// Event data
    #[serde(default)]
    pub d: Option<Value>,

    /// Sequence number (dispatch only)
    #[serde(default)]
    pub s: Option<u64>,

    /// Event name (dispatch only)
    #[serde(default)]
    pub t: Option<String>,
}

impl GatewayMessage {
    fn command(op: OpCode, d: Value) -> Self {
        Self {
            op,
            d: Some(d),
            s: None,
            t: None,
        }
    }

    fn command_with<T: Serialize>(op: OpCode, payload: &T) -> Result<Self, serde_json::Error> {
        Ok(Self::command(op, serde_json::to_value(payload)?))
    }

    // === Client Commands ===

    /// Heartbeat (op 1) carrying the last sequence seen
    #[must_use]
    pub fn heartbeat(last_sequence: Option<u64>) -> Self {
        Self::command(OpCode::Heartbeat, last_sequence.map_or(Value::Null, Value::from))
    }

    /// Identify (op 2)
    pub fn identify(payload: &IdentifyPayload) -> Result<Self, serde_json::Error> {
        Self::command_with(OpCode::Identify, payload)
    }

    /// Presence Update (op 3)
    pub fn presence_update(payload: &PresenceUpdatePayload) -> Result<Self, serde_json::Error> {
        Self::command_with(OpCode::PresenceUpdate, payload)
    }

    /// Voice State Update (op 4)
    pub fn voice_state_update(payload: &VoiceStateUpdatePayload) -> Result<Self, serde_json::Error> {
        Self::command_with(OpCode::VoiceStateUpdate, payload)
    }

    /// Resume (op 6)
    pub fn resume(payload: &ResumePayload) -> Result<Self, serde_json::Error> {
        Self::command_with(OpCode::Resume, payload)
    }

    /// Request Guild Members (op 8)
    pub fn request_guild_members(payload: &RequestGuildMembersPayload) -> Result<Self, serde_json::Error> {
        Self::command_with(OpCode::RequestGuildMembers, payload)
    }

    // === Server Messages ===

    /// Dispatch (op 0)
    #[must_use]
    pub fn dispatch(event: impl Into<String>, sequence: u64, data: Value) -> Self {
        Self {
            op: OpCode::Dispatch,
            d: Some(data),
            s: Some(sequence),
            t: Some(event.into()),
        }
    }

    /// Hello (op 10)
    #[must_use]
    pub fn hello(heartbeat_interval: u64) -> Self {
        Self::command(OpCode::Hello, serde_json::json!({ "heartbeat_interval": heartbeat_interval }))
    }

    /// Heartbeat ACK (op 11)
    #[must_use]
    pub fn heartbeat_ack() -> Self {
        Self {
            op: OpCode::HeartbeatAck,
            d: None,
            s: None,
            t: None,
        }
    }

    /// Reconnect (op 7)
    #[must_use]
    pub fn reconnect() -> Self {
        Self {
            op: OpCode::Reconnect,
            d: None,
            s: None,
            t: None,
        }
    }

    /// Invalid Session (op 9)
    #[must_use]
    pub fn invalid_session(resumable: bool) -> Self {
        Self::command(OpCode::InvalidSession, Value::Bool(resumable))
    }

    // === Parsing ===

    /// Deserialize `d` into a typed payload
    pub fn data_as<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(self.d.as_ref().unwrap_or(&Value::Null))
    }

    /// Hello payload, if this is op 10
    #[must_use]
    pub fn as_hello(&self) -> Option<HelloPayload> {
        (self.op == OpCode::Hello).then(|| self.data_as().ok()).flatten()
    }

    /// Whether an Invalid Session says the session can be resumed
    #[must_use]
    pub fn is_resumable(&self) -> bool {
        match &self.d {
            Some(Value::Bool(b)) => *b,
            Some(Value::Null) | None => false,
            Some(_) => true,
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }
}

impl std::fmt::Display for GatewayMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        if let Some(t) = &self.t {
            write!(f, "GatewayMessage(op={}, t={}", self.op, t)?;
            if let Some(s) = self.s {
                write!(f, ", s={s}")?;
            }
            write!(f, ")")
        } else {
            write!(f, "GatewayMessage(op={})", self.op)
        }
    }
}
