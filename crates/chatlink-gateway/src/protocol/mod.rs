//! Gateway protocol definitions
//!
//! Op codes, close codes, the message envelope and its payloads.

mod close_codes;
mod messages;
mod opcodes;
mod payloads;

pub use close_codes::{close_action, CloseAction, CloseCode};
pub use messages::GatewayMessage;
pub use opcodes::OpCode;
pub use payloads::{
    Activity, HelloPayload, IdentifyPayload, IdentifyProperties, PresenceUpdatePayload,
    ReadyPayload, RequestGuildMembersPayload, ResumePayload, Status, VoiceStateUpdatePayload,
};
