//! Serial Channel
//!
//! Writes fragment bytes directly to a UART-attached microcontroller that
//! forwards them to a host shell. The channel owns the open port for the
//! duration of a transfer and releases it deterministically when closed,
//! regardless of outcome.
//!
//! Link parameters: 115200 baud, DTR and RTS asserted, 8-bit clean byte
//! stream. Quoting and escaping for the destination shell belong to the
//! script assembler, not this channel.

use crate::channel::{ChannelKind, OutputChannel};
use crate::config::types::SerialConfig;
use crate::transfer::error::{Result, TransferError};
use async_trait::async_trait;
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tokio_serial::{ClearBuffer, SerialPort, SerialPortBuilderExt, SerialStream};
use tracing::{debug, info};
use uuid::Uuid;

/// The only supported baud rate
pub const BAUD_RATE: u32 = 115_200;

/// Owns the open UART handle for one transfer.
struct SerialSession {
    port: SerialStream,
    id: Uuid,
}

/// Output channel that streams fragments over a serial link.
pub struct SerialChannel {
    config: SerialConfig,
    session: Option<SerialSession>,
}

impl SerialChannel {
    /// Create a channel for the configured port. Nothing is opened until
    /// the transfer starts.
    pub fn new(config: SerialConfig) -> Self {
        Self {
            config,
            session: None,
        }
    }
}

#[async_trait]
impl OutputChannel for SerialChannel {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Serial
    }

    async fn open(&mut self) -> Result<()> {
        let mut port = tokio_serial::new(&self.config.port, self.config.baud)
            .open_native_async()
            .map_err(|e| TransferError::ChannelOpen(format!("{}: {e}", self.config.port)))?;

        port.write_data_terminal_ready(true)
            .map_err(|e| TransferError::ChannelOpen(e.to_string()))?;
        port.write_request_to_send(true)
            .map_err(|e| TransferError::ChannelOpen(e.to_string()))?;

        // Give the microcontroller time to reset and settle after the
        // control lines assert, then drop whatever it queued meanwhile
        tokio::time::sleep(Duration::from_millis(self.config.settle_ms)).await;
        port.clear(ClearBuffer::Output)
            .map_err(|e| TransferError::ChannelOpen(e.to_string()))?;

        let id = Uuid::new_v4();
        info!(port = %self.config.port, baud = self.config.baud, session = %id, "Serial session opened");
        self.session = Some(SerialSession { port, id });
        Ok(())
    }

    async fn send(&mut self, fragment: &str) -> Result<u64> {
        let session = self
            .session
            .as_mut()
            .ok_or(TransferError::Channel("serial session not open".into()))?;

        let bytes = fragment.as_bytes();
        session
            .port
            .write_all(bytes)
            .await
            .map_err(|e| TransferError::Channel(e.to_string()))?;
        session
            .port
            .flush()
            .await
            .map_err(|e| TransferError::Channel(e.to_string()))?;

        debug!(session = %session.id, bytes = bytes.len(), "Fragment written");
        Ok(bytes.len() as u64)
    }

    async fn close(&mut self) -> Result<()> {
        if let Some(session) = self.session.take() {
            info!(session = %session.id, "Serial session released");
            drop(session);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SerialConfig {
        SerialConfig {
            port: "/dev/null-port-that-does-not-exist".to_string(),
            baud: BAUD_RATE,
            settle_ms: 0,
        }
    }

    #[tokio::test]
    async fn test_open_failure_surfaces_immediately() {
        let mut channel = SerialChannel::new(test_config());
        let err = channel.open().await.unwrap_err();
        assert!(matches!(err, TransferError::ChannelOpen(_)));
        assert!(err.to_string().contains("null-port"));
    }

    #[tokio::test]
    async fn test_send_without_open_is_an_error() {
        let mut channel = SerialChannel::new(test_config());
        let err = channel.send("x").await.unwrap_err();
        assert!(matches!(err, TransferError::Channel(_)));
    }

    #[tokio::test]
    async fn test_close_without_open_is_a_noop() {
        let mut channel = SerialChannel::new(test_config());
        channel.close().await.unwrap();
    }

    #[test]
    fn test_kind_and_pacing() {
        let channel = SerialChannel::new(test_config());
        assert_eq!(channel.kind(), ChannelKind::Serial);
        assert_eq!(
            channel.kind().delay_floor(),
            Duration::from_millis(1)
        );
    }
}
