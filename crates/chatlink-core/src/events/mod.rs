//! Gateway events
//!
//! Event names, their intent requirements, and the `DIRECT_`/`BOT_` tagging rules.

mod event_types;
mod tags;

pub use event_types::EventType;
pub use tags::EventTags;
