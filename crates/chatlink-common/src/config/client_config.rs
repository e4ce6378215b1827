//! Client configuration
//!
//! Loads configuration from environment variables (and a `.env` file when
//! present), or builds it in code.

use chatlink_core::Intents;
use serde::Deserialize;
use std::env;

/// Main client configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Runtime environment, drives the logging format
    #[serde(default = "default_env")]
    pub env: Environment,
    /// Bot token (sent as `Bot <token>`)
    pub token: String,
    /// REST API root, without the version segment
    #[serde(default = "default_api_base")]
    pub api_base: String,
    /// API version used for both REST and gateway
    #[serde(default = "default_api_version")]
    pub api_version: u8,
    /// Shard this connection serves
    #[serde(default)]
    pub shard: ShardInfo,
    /// Member count above which a guild is sent without offline members
    #[serde(default = "default_large_threshold")]
    pub large_threshold: u32,
    /// Intents requested in addition to the ones handlers need
    #[serde(default)]
    pub intents: Intents,
    /// Delay before reconnecting after a transport failure
    #[serde(default = "default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    /// Reconnect when a heartbeat goes unacknowledged for a full interval
    #[serde(default = "default_zombie_detection")]
    pub zombie_detection: bool,
    /// Lower bound of the random wait after an Invalid Session
    #[serde(default = "default_invalid_session_delay_min_ms")]
    pub invalid_session_delay_min_ms: u64,
    /// Upper bound of the random wait after an Invalid Session
    #[serde(default = "default_invalid_session_delay_max_ms")]
    pub invalid_session_delay_max_ms: u64,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    #[must_use]
    pub fn is_development(&self) -> bool {
        matches!(self, Self::Development)
    }

    fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Shard tuple sent in Identify as `[id, count]`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
pub struct ShardInfo {
    pub id: u32,
    pub count: u32,
}

impl ShardInfo {
    #[must_use]
    pub fn new(id: u32, count: u32) -> Self {
        Self { id, count }
    }

    /// Pair form used on the wire
    #[must_use]
    pub fn as_pair(&self) -> [u32; 2] {
        [self.id, self.count]
    }
}

impl Default for ShardInfo {
    fn default() -> Self {
        Self { id: 0, count: 1 }
    }
}

// Default value functions
fn default_env() -> Environment {
    Environment::Development
}

fn default_api_base() -> String {
    "https://discord.com/api".to_string()
}

fn default_api_version() -> u8 {
    10
}

fn default_large_threshold() -> u32 {
    250
}

fn default_reconnect_delay_ms() -> u64 {
    1000
}

fn default_zombie_detection() -> bool {
    true
}

fn default_invalid_session_delay_min_ms() -> u64 {
    1000
}

fn default_invalid_session_delay_max_ms() -> u64 {
    5000
}

impl ClientConfig {
    /// Create a configuration with defaults for everything but the token
    #[must_use]
    pub fn new(token: impl Into<String>) -> Self {
        Self {
            env: default_env(),
            token: token.into(),
            api_base: default_api_base(),
            api_version: default_api_version(),
            shard: ShardInfo::default(),
            large_threshold: default_large_threshold(),
            intents: Intents::empty(),
            reconnect_delay_ms: default_reconnect_delay_ms(),
            zombie_detection: default_zombie_detection(),
            invalid_session_delay_min_ms: default_invalid_session_delay_min_ms(),
            invalid_session_delay_max_ms: default_invalid_session_delay_max_ms(),
        }
    }

    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if `CHATLINK_TOKEN` is missing or a value does not parse
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let token = env::var("CHATLINK_TOKEN").map_err(|_| ConfigError::MissingVar("CHATLINK_TOKEN"))?;
        if token.trim().is_empty() {
            return Err(ConfigError::InvalidValue("CHATLINK_TOKEN", "empty token".to_string()));
        }

        let shard = ShardInfo {
            id: parse_var("CHATLINK_SHARD_ID")?.unwrap_or(0),
            count: parse_var("CHATLINK_SHARD_COUNT")?.unwrap_or(1),
        };
        if shard.count == 0 || shard.id >= shard.count {
            return Err(ConfigError::InvalidValue(
                "CHATLINK_SHARD_ID",
                format!("shard {} out of range for count {}", shard.id, shard.count),
            ));
        }

        let intents = match env::var("CHATLINK_INTENTS") {
            Ok(raw) => Intents::parse(&raw)
                .map_err(|e| ConfigError::InvalidValue("CHATLINK_INTENTS", e.to_string()))?,
            Err(_) => Intents::empty(),
        };

        Ok(Self {
            env: env::var("APP_ENV")
                .ok()
                .and_then(|s| Environment::parse(&s))
                .unwrap_or_default(),
            token,
            api_base: env::var("CHATLINK_API_BASE").unwrap_or_else(|_| default_api_base()),
            api_version: parse_var("CHATLINK_API_VERSION")?.unwrap_or_else(default_api_version),
            shard,
            large_threshold: parse_var("CHATLINK_LARGE_THRESHOLD")?
                .unwrap_or_else(default_large_threshold),
            intents,
            reconnect_delay_ms: parse_var("CHATLINK_RECONNECT_DELAY_MS")?
                .unwrap_or_else(default_reconnect_delay_ms),
            zombie_detection: parse_var("CHATLINK_ZOMBIE_DETECTION")?
                .unwrap_or_else(default_zombie_detection),
            invalid_session_delay_min_ms: default_invalid_session_delay_min_ms(),
            invalid_session_delay_max_ms: default_invalid_session_delay_max_ms(),
        })
    }

    /// Set the REST API root
    #[must_use]
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set the shard tuple
    #[must_use]
    pub fn with_shard(mut self, id: u32, count: u32) -> Self {
        self.shard = ShardInfo::new(id, count);
        self
    }

    /// Request extra intents on top of the registered handlers' needs
    #[must_use]
    pub fn with_intents(mut self, intents: Intents) -> Self {
        self.intents = intents;
        self
    }

    #[must_use]
    pub fn with_reconnect_delay_ms(mut self, delay_ms: u64) -> Self {
        self.reconnect_delay_ms = delay_ms;
        self
    }

    #[must_use]
    pub fn with_zombie_detection(mut self, enabled: bool) -> Self {
        self.zombie_detection = enabled;
        self
    }

    /// Set the random wait window after an Invalid Session
    #[must_use]
    pub fn with_invalid_session_delay_ms(mut self, min_ms: u64, max_ms: u64) -> Self {
        self.invalid_session_delay_min_ms = min_ms;
        self.invalid_session_delay_max_ms = max_ms.max(min_ms);
        self
    }

    /// Versioned REST root, e.g. `https://discord.com/api/v10`
    #[must_use]
    pub fn api_url(&self) -> String {
        format!("{}/v{}", self.api_base.trim_end_matches('/'), self.api_version)
    }
}

fn parse_var<T>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|e: T::Err| ConfigError::InvalidValue(name, e.to_string())),
        Err(_) => Ok(None),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_environment_is_production() {
        assert!(!Environment::Development.is_production());
        assert!(!Environment::Staging.is_production());
        assert!(Environment::Production.is_production());
    }

    #[test]
    fn test_environment_parse() {
        assert_eq!(Environment::parse("PRODUCTION"), Some(Environment::Production));
        assert_eq!(Environment::parse("staging"), Some(Environment::Staging));
        assert_eq!(Environment::parse("qa"), None);
    }

    #[test]
    fn test_new_uses_defaults() {
        let config = ClientConfig::new("abc");
        assert_eq!(config.token, "abc");
        assert_eq!(config.api_version, 10);
        assert_eq!(config.large_threshold, 250);
        assert_eq!(config.shard.as_pair(), [0, 1]);
        assert!(config.zombie_detection);
        assert!(config.intents.is_empty());
    }

    #[test]
    fn test_api_url() {
        let config = ClientConfig::new("abc").with_api_base("http://127.0.0.1:9000/api/");
        assert_eq!(config.api_url(), "http://127.0.0.1:9000/api/v10");
    }

    #[test]
    fn test_builder_methods() {
        let config = ClientConfig::new("abc")
            .with_shard(2, 4)
            .with_intents(Intents::GUILDS)
            .with_reconnect_delay_ms(5)
            .with_zombie_detection(false)
            .with_invalid_session_delay_ms(10, 1);

        assert_eq!(config.shard, ShardInfo::new(2, 4));
        assert_eq!(config.intents, Intents::GUILDS);
        assert_eq!(config.reconnect_delay_ms, 5);
        assert!(!config.zombie_detection);
        assert_eq!(config.invalid_session_delay_min_ms, 10);
        assert_eq!(config.invalid_session_delay_max_ms, 10);
    }

    #[test]
    fn test_deserialize_with_defaults() {
        let config: ClientConfig = serde_json::from_str(r#"{"token": "abc", "env": "production"}"#).unwrap();
        assert!(config.env.is_production());
        assert_eq!(config.api_base, "https://discord.com/api");
        assert_eq!(config.reconnect_delay_ms, 1000);
    }
}
