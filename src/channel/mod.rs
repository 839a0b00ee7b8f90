//! Output Channels
//!
//! An output channel delivers literal script fragments to the destination
//! and reports how many of the requested units it actually accepted. Two
//! variants exist: synthetic keyboard events injected into the OS input
//! stream, and raw bytes written to a UART-attached microcontroller.
//!
//! Both channels assume exclusive ownership of their global resource (the
//! input queue, the serial port); at most one transfer may drive a channel
//! at a time, serialized by the caller.

use crate::transfer::error::Result;
use crate::transfer::script::QuoteStyle;
use async_trait::async_trait;
use std::time::Duration;

pub mod keystroke;
pub mod serial;

pub use keystroke::{KeyEvent, KeyEventKind, KeyEventSink, KeystrokeChannel};
pub use serial::SerialChannel;

/// Which channel variant is in use
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChannelKind {
    /// Synthetic keyboard events
    Keystroke,
    /// UART byte stream
    Serial,
}

impl ChannelKind {
    /// Quote style for destination-side string literals on this channel
    pub fn quote_style(self) -> QuoteStyle {
        match self {
            ChannelKind::Keystroke => QuoteStyle::Double,
            ChannelKind::Serial => QuoteStyle::Single,
        }
    }

    /// Minimum per-fragment pacing delay.
    ///
    /// The serial link is off-host and always gets a one-tick courtesy
    /// drain interval; the keystroke channel has no floor.
    pub fn delay_floor(self) -> Duration {
        match self {
            ChannelKind::Keystroke => Duration::ZERO,
            ChannelKind::Serial => Duration::from_millis(1),
        }
    }
}

/// Delivers fragments to the destination.
#[async_trait]
pub trait OutputChannel: Send {
    /// Channel variant
    fn kind(&self) -> ChannelKind;

    /// Acquire the underlying resource. Called once before the first
    /// fragment; an error here aborts the transfer before anything is sent.
    async fn open(&mut self) -> Result<()>;

    /// Deliver one fragment. Returns the number of units (input events or
    /// bytes) the destination actually accepted.
    async fn send(&mut self, fragment: &str) -> Result<u64>;

    /// Release the underlying resource. Called exactly once per transfer,
    /// regardless of outcome.
    async fn close(&mut self) -> Result<()>;
}

#[async_trait]
impl OutputChannel for Box<dyn OutputChannel> {
    fn kind(&self) -> ChannelKind {
        (**self).kind()
    }

    async fn open(&mut self) -> Result<()> {
        (**self).open().await
    }

    async fn send(&mut self, fragment: &str) -> Result<u64> {
        (**self).send(fragment).await
    }

    async fn close(&mut self) -> Result<()> {
        (**self).close().await
    }
}
