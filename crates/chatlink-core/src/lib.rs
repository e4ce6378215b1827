//! # chatlink-core
//!
//! Domain layer: identifiers, gateway intents, and the catalogue of gateway
//! events with their naming and subscription rules.
//! This crate has no dependencies on I/O (HTTP, WebSocket, runtime).

pub mod events;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use events::{EventTags, EventType};
pub use value_objects::{Intents, Snowflake, SnowflakeParseError};
