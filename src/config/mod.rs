//! Configuration management
//!
//! Handles loading, validation, and merging of configuration from:
//! - TOML files
//! - CLI arguments
//!
//! The transfer engine consumes an immutable snapshot; it reads the
//! current values when pacing is computed and never persists anything.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

pub mod types;

pub use types::{LoggingConfig, SerialConfig, TransferConfig};

use crate::channel::serial::BAUD_RATE;
use crate::transfer::timing::SecurityLevel;

/// Main configuration structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Transfer pacing and chunking
    #[serde(default)]
    pub transfer: TransferConfig,
    /// Serial link parameters
    #[serde(default)]
    pub serial: SerialConfig,
    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from file
    pub fn load(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path))?;

        let config: Config = toml::from_str(&content).context("Failed to parse config file")?;

        config.validate()?;
        Ok(config)
    }

    /// Default config file location (`~/.config/keycourier/config.toml`)
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("keycourier").join("config.toml"))
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if self.transfer.chunk_size == 0 {
            anyhow::bail!("transfer.chunk_size must be positive");
        }
        if self.transfer.chunk_size % 3 != 0 {
            anyhow::bail!(
                "transfer.chunk_size must be a multiple of 3 (got {})",
                self.transfer.chunk_size
            );
        }
        if self.transfer.cooldown_ms > 60_000 {
            anyhow::bail!("transfer.cooldown_ms must be at most 60000");
        }

        if self.serial.baud != BAUD_RATE {
            anyhow::bail!(
                "serial.baud must be {} (got {})",
                BAUD_RATE,
                self.serial.baud
            );
        }
        if self.serial.port.is_empty() {
            anyhow::bail!("serial.port must not be empty");
        }

        match self.logging.format.as_str() {
            "pretty" | "compact" | "json" => {}
            other => anyhow::bail!("logging.format must be pretty|compact|json (got {other})"),
        }

        Ok(())
    }

    /// Override file values with CLI arguments
    pub fn with_overrides(
        mut self,
        level: Option<SecurityLevel>,
        chunk_size: Option<usize>,
        serial_port: Option<String>,
    ) -> Self {
        if let Some(level) = level {
            self.transfer.security_level = level;
        }
        if let Some(chunk_size) = chunk_size {
            self.transfer.chunk_size = chunk_size;
        }
        if let Some(port) = serial_port {
            self.serial.port = port;
        }
        self
    }
}
