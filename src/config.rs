//! Configuration for the service desk
//!
//! Settings come from `DeskConfig::default()`, the [`ConfigBuilder`],
//! `AIRLINE_*` environment variables, or a TOML file. Durations are written
//! in milliseconds (`*_ms`) or seconds (`*_secs`) in TOML.

use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{AgentsError, Result};

/// Top-level desk configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeskConfig {
    /// Model used by the handlers
    pub model: String,

    /// Model used by the validation-gate checkers
    pub checker_model: String,

    pub temperature: Option<f32>,

    /// Maximum model rounds within one user turn
    pub max_turns: usize,

    /// Idle time after which a session is purged
    #[serde(rename = "session_ttl_secs", with = "duration_secs")]
    pub session_ttl: Duration,

    /// Address the HTTP server binds to
    pub bind_address: String,

    /// Reply sent when the validation gate blocks a turn
    pub refusal_message: String,

    /// Reply sent when the inference collaborator keeps failing
    pub apology_message: String,

    /// Reply sent on a fatal protocol error
    pub internal_error_message: String,

    pub retry: RetryConfig,
}

impl Default for DeskConfig {
    fn default() -> Self {
        Self {
            model: "gpt-4.1".to_string(),
            checker_model: "gpt-4.1-mini".to_string(),
            temperature: None,
            max_turns: 10,
            session_ttl: Duration::from_secs(30 * 60),
            bind_address: "127.0.0.1:8000".to_string(),
            refusal_message: "Sorry, I can only answer questions related to airline travel."
                .to_string(),
            apology_message:
                "Sorry, I'm having trouble answering right now. Please try again in a moment."
                    .to_string(),
            internal_error_message:
                "Sorry, something went wrong on our side. A human agent will follow up."
                    .to_string(),
            retry: RetryConfig::default(),
        }
    }
}

impl DeskConfig {
    /// Defaults overridden by any `AIRLINE_*` variables that are set and parse.
    pub fn from_env() -> Self {
        Self::default().with_env_overrides(|key| std::env::var(key).ok())
    }

    /// Load configuration from a TOML file. Missing keys keep their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents).map_err(|e| AgentsError::ConfigError(e.to_string()))
    }

    fn with_env_overrides<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(model) = lookup("AIRLINE_MODEL") {
            self.model = model;
        }

        if let Some(model) = lookup("AIRLINE_CHECKER_MODEL") {
            self.checker_model = model;
        }

        if let Some(temp) = lookup("AIRLINE_TEMPERATURE").and_then(|t| t.parse::<f32>().ok()) {
            self.temperature = Some(temp);
        }

        if let Some(max) = lookup("AIRLINE_MAX_TURNS").and_then(|t| t.parse::<usize>().ok()) {
            self.max_turns = max;
        }

        if let Some(bind) = lookup("AIRLINE_BIND") {
            self.bind_address = bind;
        }

        if let Some(ttl) = lookup("AIRLINE_SESSION_TTL_SECS").and_then(|t| t.parse::<u64>().ok()) {
            self.session_ttl = Duration::from_secs(ttl);
        }

        if let Some(retries) = lookup("AIRLINE_MAX_RETRIES").and_then(|t| t.parse::<usize>().ok()) {
            self.retry.max_retries = retries;
        }

        self
    }
}

/// Retry configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of retries
    pub max_retries: usize,

    /// Initial retry delay
    #[serde(rename = "initial_delay_ms", with = "duration_ms")]
    pub initial_delay: Duration,

    /// Maximum retry delay
    #[serde(rename = "max_delay_ms", with = "duration_ms")]
    pub max_delay: Duration,

    /// Exponential backoff multiplier
    pub backoff_multiplier: f32,

    /// Jitter to add randomness to retries
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 2,
            initial_delay: Duration::from_millis(200),
            max_delay: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

/// Configuration builder
pub struct ConfigBuilder {
    config: DeskConfig,
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: DeskConfig::default(),
        }
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.model = model.into();
        self
    }

    pub fn checker_model(mut self, model: impl Into<String>) -> Self {
        self.config.checker_model = model.into();
        self
    }

    pub fn temperature(mut self, temp: f32) -> Self {
        self.config.temperature = Some(temp);
        self
    }

    pub fn max_turns(mut self, max_turns: usize) -> Self {
        self.config.max_turns = max_turns;
        self
    }

    pub fn max_retries(mut self, retries: usize) -> Self {
        self.config.retry.max_retries = retries;
        self
    }

    pub fn retry(mut self, retry: RetryConfig) -> Self {
        self.config.retry = retry;
        self
    }

    pub fn session_ttl(mut self, ttl: Duration) -> Self {
        self.config.session_ttl = ttl;
        self
    }

    pub fn bind_address(mut self, addr: impl Into<String>) -> Self {
        self.config.bind_address = addr.into();
        self
    }

    pub fn refusal_message(mut self, message: impl Into<String>) -> Self {
        self.config.refusal_message = message.into();
        self
    }

    pub fn build(self) -> DeskConfig {
        self.config
    }
}

mod duration_ms {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_millis)
    }
}

mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}
