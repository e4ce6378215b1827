//! # chatlink-http
//!
//! REST layer: route templates and bucket keys, the rate limiter, and the
//! `reqwest`-backed client used by the gateway and event handlers.

pub mod client;
pub mod endpoints;
pub mod error;
pub mod ratelimit;
pub mod request;
pub mod route;
pub mod transport;

// Re-export commonly used types at crate root
pub use client::HttpClient;
pub use endpoints::{GatewayBot, SessionStartLimit};
pub use error::{FieldError, HttpError, HttpResult};
pub use ratelimit::{BucketSnapshot, RateLimiter};
pub use request::{ApiRequest, FileAttachment, RequestBody};
pub use route::{BucketKey, MajorParams, Route};
pub use transport::{RawResponse, ReqwestTransport, Transport};
