//! Connection configuration
//!
//! Loaded from JSON; every field is optional and falls back to the protocol
//! defaults.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::protocol::{DEFAULT_BAUD_RATE, REQUEST_RETRIES, RESPONSE_TIMEOUT_MS};

/// Errors raised while loading a configuration
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Connection configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConnectionConfig {
    /// Serial port name (e.g. "/dev/ttyACM0" or "COM3")
    pub port_name: String,
    /// Baud rate
    pub baud_rate: u32,
    /// Time to wait for each response attempt in milliseconds
    pub response_timeout_ms: u32,
    /// Number of times a request is sent before giving up
    pub request_retries: u32,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port_name: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            response_timeout_ms: RESPONSE_TIMEOUT_MS,
            request_retries: REQUEST_RETRIES,
        }
    }
}

impl ConnectionConfig {
    /// Configuration for `port_name` with default settings
    pub fn for_port(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into(),
            ..Self::default()
        }
    }

    /// Parse and validate a JSON configuration
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load and validate a JSON configuration file
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json_str(&content)
    }

    /// Write the configuration as pretty-printed JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    /// Check the values the engine depends on
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.baud_rate == 0 {
            return Err(ConfigError::Invalid("baud_rate must be non-zero".into()));
        }
        if self.request_retries == 0 {
            return Err(ConfigError::Invalid(
                "request_retries must be at least 1".into(),
            ));
        }
        if self.response_timeout_ms == 0 || self.response_timeout_ms > i32::MAX as u32 {
            return Err(ConfigError::Invalid(format!(
                "response_timeout_ms must be between 1 and {}",
                i32::MAX
            )));
        }
        Ok(())
    }
}
