use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::info;

use crate::types::fix::FixConfig;

/// Error type for gateway configuration operations
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),
}

/// The main gateway configuration structure, loaded from TOML.
#[derive(Deserialize, Serialize, Debug, Clone, Default)]
pub struct GatewayConfig {
    #[serde(default)]
    pub protocol: FixConfig,
    #[serde(default)]
    pub framer: FramerConfig,
    #[serde(default)]
    pub watermark: WatermarkConfig,
}

/// Configuration for per-connection framing
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct FramerConfig {
    /// Capacity of each connection's scan buffer in bytes
    pub buffer_capacity: usize,
}

impl Default for FramerConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 8192,
        }
    }
}

/// Configuration for watermark publication
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct WatermarkConfig {
    /// Interval at which the external driver should call flush, in ms
    pub flush_interval_ms: u64,
}

impl Default for WatermarkConfig {
    fn default() -> Self {
        Self {
            flush_interval_ms: 10,
        }
    }
}

impl GatewayConfig {
    /// Loads the configuration from the default location
    pub fn load_default() -> Result<Self, ConfigError> {
        let config_path = Self::default_config_path()?;
        Self::load(&config_path)
    }

    /// Loads the configuration from a specific path
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let contents = fs::read_to_string(&path)?;
        let config: GatewayConfig = toml::from_str(&contents)?;
        config.validate()?;
        info!(path = %path.as_ref().display(), "loaded gateway configuration");
        Ok(config)
    }

    /// Determines the default configuration path
    fn default_config_path() -> Result<PathBuf, ConfigError> {
        // First check if path is specified in environment
        if let Ok(path) = env::var("FIXGATE_CONFIG") {
            return Ok(PathBuf::from(path));
        }

        let default_path = PathBuf::from("config").join("gateway.toml");
        if default_path.exists() {
            return Ok(default_path);
        }

        Err(ConfigError::Validation(
            "Could not find gateway configuration file".to_string(),
        ))
    }

    /// Validates the configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.protocol.begin_string.is_empty() {
            return Err(ConfigError::Validation(
                "Begin string must not be empty".to_string(),
            ));
        }

        // The smallest scannable unit is the version prefix plus the
        // BodyLength tag and its separator
        let min_capacity = self.protocol.common_prefix_len() + 2;
        if self.framer.buffer_capacity < min_capacity {
            return Err(ConfigError::Validation(format!(
                "Buffer capacity must be at least {} bytes",
                min_capacity
            )));
        }

        // A maximal message (prefix, length field, body, checksum field)
        // must fit the buffer or it can never complete a frame. 16 bytes
        // covers the length digits plus the checksum field.
        if self.protocol.max_body_length + self.protocol.common_prefix_len() + 16
            > self.framer.buffer_capacity
        {
            return Err(ConfigError::Validation(
                "Max body length does not fit the buffer capacity".to_string(),
            ));
        }

        if self.watermark.flush_interval_ms == 0 {
            return Err(ConfigError::Validation(
                "Watermark flush interval must be greater than 0".to_string(),
            ));
        }

        Ok(())
    }
}
