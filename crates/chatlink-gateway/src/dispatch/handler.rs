//! Event handler trait and error types

use super::context::Context;
use crate::error::SendError;
use async_trait::async_trait;
use chatlink_http::HttpError;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use thiserror::Error;

/// Whether lower-priority handlers still run for this event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Propagation {
    #[default]
    Continue,
    /// Skip every remaining handler for this event
    Stop,
}

/// Handler error type
///
/// Errors never leave the dispatch engine; the variant decides how loudly
/// they are logged.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// The bot lacks permission for what the handler tried
    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Expected failure worth a note, not an alert
    #[error("{0}")]
    Soft(String),

    #[error(transparent)]
    Http(#[from] HttpError),

    #[error(transparent)]
    Send(#[from] SendError),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// How loudly a handler error is reported
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Info,
    Warn,
    Error,
}

impl HandlerError {
    pub fn soft(msg: impl Into<String>) -> Self {
        Self::Soft(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    #[must_use]
    pub fn severity(&self) -> Severity {
        match self {
            Self::Soft(_) => Severity::Info,
            Self::Forbidden(_) | Self::NotFound(_) | Self::BadRequest(_) | Self::Send(_) => {
                Severity::Warn
            }
            Self::Http(e) => match e {
                HttpError::BadRequest { .. }
                | HttpError::Unauthorized(_)
                | HttpError::Forbidden(_)
                | HttpError::NotFound(_) => Severity::Warn,
                _ => Severity::Error,
            },
            Self::Other(_) => Severity::Error,
        }
    }
}

/// Handler result type
pub type HandlerResult<T> = Result<T, HandlerError>;

/// Handles one kind of dispatched event
#[async_trait]
pub trait EventHandler: Send + Sync {
    async fn handle(&self, ctx: Context, data: Arc<Value>) -> HandlerResult<Propagation>;
}

/// Handler built from an async closure
pub struct FnHandler<F>(F);

/// Wrap an async closure as an [`EventHandler`]
pub fn handler_fn<F, Fut>(f: F) -> FnHandler<F>
where
    F: Fn(Context, Arc<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult<Propagation>> + Send,
{
    FnHandler(f)
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Context, Arc<Value>) -> Fut + Send + Sync,
    Fut: Future<Output = HandlerResult<Propagation>> + Send,
{
    async fn handle(&self, ctx: Context, data: Arc<Value>) -> HandlerResult<Propagation> {
        (self.0)(ctx, data).await
    }
}
