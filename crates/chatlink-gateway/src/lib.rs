//! # chatlink-gateway
//!
//! Gateway client: streaming frame decoding, the session state machine with
//! heartbeat and resume, and the event dispatch engine.

pub mod decoder;
pub mod dispatch;
pub mod error;
pub mod protocol;
pub mod session;

// Re-export commonly used types at crate root
pub use decoder::FrameDecoder;
pub use dispatch::{
    handler_fn, Context, EventHandler, EventRegistry, HandlerError, HandlerResult, Predicate,
    Propagation, Registration, WaitError,
};
pub use error::{DecodeError, GatewayError, GatewayResult, SendError};
pub use protocol::{CloseCode, GatewayMessage, OpCode};
pub use session::{ConnectionPhase, GatewayClient, GatewaySender, SessionState, ShutdownHandle};
