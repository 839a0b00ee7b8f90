//! Configuration type definitions

use crate::transfer::timing::SecurityLevel;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Transfer pacing and chunking configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Risk/speed trade-off controlling inter-chunk pacing
    #[serde(default)]
    pub security_level: SecurityLevel,

    /// Milliseconds between confirmation and the first fragment, giving
    /// the operator time to focus the destination window
    #[serde(default = "default_cooldown_ms")]
    pub cooldown_ms: u64,

    /// Payload block size in bytes per chunk. Multiples of 3 keep base64
    /// blocks padding-free except the last.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            security_level: SecurityLevel::default(),
            cooldown_ms: default_cooldown_ms(),
            chunk_size: default_chunk_size(),
        }
    }
}

fn default_cooldown_ms() -> u64 {
    1500
}

fn default_chunk_size() -> usize {
    192
}

/// Serial link configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Serial device path
    #[serde(default = "default_serial_port")]
    pub port: String,

    /// Baud rate; the microcontroller firmware only speaks 115200
    #[serde(default = "default_baud")]
    pub baud: u32,

    /// Settle interval after asserting the control lines, in milliseconds
    #[serde(default = "default_settle_ms")]
    pub settle_ms: u64,
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            port: default_serial_port(),
            baud: default_baud(),
            settle_ms: default_settle_ms(),
        }
    }
}

fn default_serial_port() -> String {
    "/dev/ttyACM0".to_string()
}

fn default_baud() -> u32 {
    115_200
}

fn default_settle_ms() -> u64 {
    2000
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level ("trace", "debug", "info", "warn", "error")
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log format ("pretty", "compact", "json")
    #[serde(default = "default_log_format")]
    pub format: String,

    /// Write logs to this file in addition to stdout
    #[serde(default)]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: default_log_format(),
            file: None,
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> String {
    "pretty".to_string()
}
