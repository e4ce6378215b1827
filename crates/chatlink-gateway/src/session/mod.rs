//! Gateway session
//!
//! Connection state machine, heartbeat and the outbound command path.

pub mod client;
pub mod heartbeat;
pub mod sender;
pub mod state;

pub use client::{GatewayClient, ShutdownHandle};
pub use heartbeat::HeartbeatExit;
pub use sender::{GatewaySender, COMMANDS_PER_MINUTE};
pub use state::{ConnectionPhase, SessionState};
