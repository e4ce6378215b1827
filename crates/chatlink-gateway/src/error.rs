//! Gateway error types

use crate::protocol::CloseCode;
use chatlink_http::HttpError;
use thiserror::Error;

/// Failure to turn inbound bytes into a gateway message
#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("Inflate failed: {0}")]
    Inflate(#[from] flate2::DecompressError),

    #[error("Payload is not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),

    #[error("Payload is not a gateway message: {0}")]
    Json(#[from] serde_json::Error),
}

/// Errors that end a gateway run
#[derive(Debug, Error)]
pub enum GatewayError {
    /// The server closed with a code that retrying cannot fix
    #[error("Gateway closed the connection: {0}")]
    FatalClose(CloseCode),

    /// The gateway URL could not be resolved over REST
    #[error("Failed to resolve gateway URL: {0}")]
    Http(#[from] HttpError),

    #[error("Invalid gateway URL: {0}")]
    InvalidUrl(String),

    #[error("Gateway client is already running")]
    AlreadyRunning,
}

/// Errors from the outbound command path
#[derive(Debug, Error)]
pub enum SendError {
    #[error("Not connected to the gateway")]
    NotConnected,

    #[error("Failed to encode command: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Result type for gateway runs
pub type GatewayResult<T> = Result<T, GatewayError>;
