//! Event dispatch engine
//!
//! Priority-ordered, predicate-filtered fan-out of gateway events to user
//! handlers, plus one-shot waiters.

pub mod context;
pub mod handler;
pub mod predicate;
pub mod registry;
pub mod waiter;

pub use context::Context;
pub use handler::{
    handler_fn, EventHandler, FnHandler, HandlerError, HandlerResult, Propagation, Severity,
};
pub use predicate::{content_starts_with, from_user, id_at, in_channel, in_guild, predicate, Predicate};
pub use registry::{EventRegistry, Registration, DEFAULT_PRIORITY};
pub use waiter::WaitError;
