//! Integration test utilities for chatlink
//!
//! In-process stand-ins for the vendor's REST API and gateway, so the client
//! can be exercised end to end without network access.

pub mod gateway;
pub mod helpers;
pub mod rest;

pub use gateway::{GatewayConn, MockGateway};
pub use helpers::*;
pub use rest::{MockRest, RecordedRequest};
