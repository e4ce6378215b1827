//! Log output for bots built on chatlink
//!
//! `RUST_LOG` wins when set. Otherwise the chatlink crates log at the
//! configured level and everything else (reqwest, tungstenite, hyper) is
//! held at `warn` so that frame-level chatter from dependencies stays out.

use crate::config::Environment;
use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

/// Crates whose events follow [`TracingConfig::level`]
const CHATLINK_TARGETS: [&str; 4] = [
    "chatlink_core",
    "chatlink_common",
    "chatlink_http",
    "chatlink_gateway",
];

/// How the subscriber renders events
#[derive(Debug, Clone)]
pub struct TracingConfig {
    /// Level for the chatlink crates
    pub level: Level,
    /// Level for every other crate
    pub dependency_level: Level,
    /// One JSON object per line instead of human-readable text
    pub json: bool,
    /// Emit span open/close events (one per connection and dispatch)
    pub span_events: bool,
    pub file_line: bool,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self {
            level: Level::INFO,
            dependency_level: Level::WARN,
            json: false,
            span_events: false,
            file_line: false,
        }
    }
}

impl TracingConfig {
    /// Verbose text output for local bot development
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: Level::DEBUG,
            span_events: true,
            file_line: true,
            ..Self::default()
        }
    }

    /// JSON output for log shippers
    #[must_use]
    pub fn production() -> Self {
        Self {
            json: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn for_environment(env: Environment) -> Self {
        match env {
            Environment::Production => Self::production(),
            Environment::Staging => Self::default(),
            Environment::Development => Self::development(),
        }
    }

    /// Filter directives used when `RUST_LOG` is unset
    #[must_use]
    pub fn directives(&self) -> String {
        let level = self.level.to_string().to_ascii_lowercase();
        let mut directives = vec![self.dependency_level.to_string().to_ascii_lowercase()];
        directives.extend(CHATLINK_TARGETS.iter().map(|target| format!("{target}={level}")));
        directives.join(",")
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.directives()))
    }
}

/// Install the global subscriber with the default configuration
pub fn try_init_tracing() -> Result<(), TracingError> {
    try_init_tracing_with_config(TracingConfig::default())
}

/// Install the global subscriber
///
/// Fails if a subscriber is already installed, which is harmless for a bot
/// embedded in a larger program that sets up its own logging.
pub fn try_init_tracing_with_config(config: TracingConfig) -> Result<(), TracingError> {
    let spans = if config.span_events {
        FmtSpan::NEW | FmtSpan::CLOSE
    } else {
        FmtSpan::NONE
    };
    let layer = fmt::layer()
        .with_file(config.file_line)
        .with_line_number(config.file_line)
        .with_span_events(spans);

    let registry = tracing_subscriber::registry().with(config.filter());
    let installed = if config.json {
        registry.with(layer.json()).try_init()
    } else {
        registry.with(layer).try_init()
    };
    installed.map_err(|_| TracingError::AlreadyInitialized)
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("a global tracing subscriber is already installed")]
    AlreadyInitialized,
}
