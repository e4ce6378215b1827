//! # chatlink-common
//!
//! Shared utilities: client configuration and telemetry.

pub mod config;
pub mod telemetry;

pub use config::{ClientConfig, ConfigError, Environment, ShardInfo};
pub use telemetry::{try_init_tracing, try_init_tracing_with_config, TracingConfig, TracingError};
