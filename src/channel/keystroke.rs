//! Keystroke Channel
//!
//! Converts each character of a fragment into a press/release pair of
//! synthetic key events and submits them to the OS input queue in one batch
//! per fragment, the way a (very fast) typist would produce them.
//!
//! Carriage return and tab are emitted as their dedicated virtual keys
//! rather than literal text injection, matching how a real keyboard emits
//! them. Code units in the reserved private-use band are tagged extended so
//! the sink can route them through the extended-key path.

use crate::channel::{ChannelKind, OutputChannel};
use crate::transfer::error::{Result, TransferError};
use async_trait::async_trait;
use std::ops::RangeInclusive;
use tracing::{debug, warn};

/// Code-unit band that requires the extended-key tag
pub const EXTENDED_BAND: RangeInclusive<u16> = 0xE000..=0xF8FF;

/// Virtual key code for carriage return
pub const VK_RETURN: u16 = 0x0D;
/// Virtual key code for tab
pub const VK_TAB: u16 = 0x09;

/// How a synthetic event's code is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyEventKind {
    /// `code` is a UTF-16 code unit to type
    Text,
    /// `code` is a UTF-16 code unit in the extended band
    TextExtended,
    /// `code` is a dedicated virtual key
    VirtualKey,
}

/// One synthetic input event
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Code unit or virtual key code
    pub code: u16,
    /// Interpretation of `code`
    pub kind: KeyEventKind,
    /// Press (`true`) or release (`false`)
    pub press: bool,
}

impl KeyEvent {
    fn pair(code: u16, kind: KeyEventKind) -> [KeyEvent; 2] {
        [
            KeyEvent {
                code,
                kind,
                press: true,
            },
            KeyEvent {
                code,
                kind,
                press: false,
            },
        ]
    }
}

/// Accepts batches of synthetic events and reports how many were taken.
///
/// The production implementation injects through the RemoteDesktop portal;
/// tests substitute a mock.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait KeyEventSink: Send {
    /// Submit one batch; returns the number of events accepted
    async fn inject(&mut self, events: &[KeyEvent]) -> Result<u64>;
}

/// Output channel that types fragments as synthetic keyboard input.
pub struct KeystrokeChannel<S> {
    sink: S,
    // Reusable event arena so the hot loop allocates once, not per fragment
    scratch: Vec<KeyEvent>,
}

impl<S: KeyEventSink> KeystrokeChannel<S> {
    /// Create a channel over the given event sink
    pub fn new(sink: S) -> Self {
        Self {
            sink,
            scratch: Vec::with_capacity(512),
        }
    }

    fn encode_fragment(&mut self, fragment: &str) -> Result<()> {
        self.scratch.clear();
        let mut units = [0u16; 2];
        for ch in fragment.chars() {
            match ch {
                '\r' => self
                    .scratch
                    .extend(KeyEvent::pair(VK_RETURN, KeyEventKind::VirtualKey)),
                '\t' => self
                    .scratch
                    .extend(KeyEvent::pair(VK_TAB, KeyEventKind::VirtualKey)),
                c if c.is_control() => return Err(TransferError::UnmappedCharacter(c)),
                c => {
                    for &unit in c.encode_utf16(&mut units).iter() {
                        let kind = if EXTENDED_BAND.contains(&unit) {
                            KeyEventKind::TextExtended
                        } else {
                            KeyEventKind::Text
                        };
                        self.scratch.extend(KeyEvent::pair(unit, kind));
                    }
                }
            }
        }
        Ok(())
    }
}

#[async_trait]
impl<S: KeyEventSink> OutputChannel for KeystrokeChannel<S> {
    fn kind(&self) -> ChannelKind {
        ChannelKind::Keystroke
    }

    async fn open(&mut self) -> Result<()> {
        Ok(())
    }

    async fn send(&mut self, fragment: &str) -> Result<u64> {
        self.encode_fragment(fragment)?;
        let requested = self.scratch.len() as u64;
        if requested == 0 {
            return Ok(0);
        }

        let accepted = self.sink.inject(&self.scratch).await?;
        if accepted < requested {
            // The destination text stream is not append-strict, so a short
            // acceptance is recoverable; the transfer continues
            warn!(requested, accepted, "Input queue accepted fewer events than requested");
        } else {
            debug!(events = accepted, "Fragment injected");
        }
        Ok(accepted)
    }

    async fn close(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::always;

    fn events_for(fragment: &str) -> Vec<KeyEvent> {
        let mut channel = KeystrokeChannel::new(MockKeyEventSink::new());
        channel.encode_fragment(fragment).unwrap();
        channel.scratch.clone()
    }

    #[test]
    fn test_two_events_per_char() {
        let events = events_for("Hi");
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].code, 'H' as u16);
        assert!(events[0].press);
        assert!(!events[1].press);
        assert_eq!(events[2].code, 'i' as u16);
        assert_eq!(events[0].kind, KeyEventKind::Text);
    }

    #[test]
    fn test_carriage_return_maps_to_virtual_key() {
        // "Hi\r" expands to pairs for H, i and the Enter virtual key:
        // 6 events total
        let events = events_for("Hi\r");
        assert_eq!(events.len(), 6);
        assert_eq!(events[4].code, VK_RETURN);
        assert_eq!(events[4].kind, KeyEventKind::VirtualKey);
        assert_eq!(events[5].press, false);
    }

    #[test]
    fn test_tab_maps_to_virtual_key() {
        let events = events_for("\t");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].code, VK_TAB);
        assert_eq!(events[0].kind, KeyEventKind::VirtualKey);
    }

    #[test]
    fn test_extended_band_tagged() {
        let events = events_for("\u{E0A0}");
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, KeyEventKind::TextExtended);
    }

    #[test]
    fn test_non_bmp_char_uses_surrogate_pair() {
        let events = events_for("\u{1F600}");
        // Two UTF-16 code units, two events each
        assert_eq!(events.len(), 4);
        assert_eq!(events[0].code, 0xD83D);
        assert_eq!(events[2].code, 0xDE00);
    }

    #[test]
    fn test_control_char_rejected() {
        let mut channel = KeystrokeChannel::new(MockKeyEventSink::new());
        let err = channel.encode_fragment("a\u{0007}b").unwrap_err();
        assert!(matches!(err, TransferError::UnmappedCharacter('\u{0007}')));
    }

    #[tokio::test]
    async fn test_send_counts_accepted_units() {
        let mut sink = MockKeyEventSink::new();
        sink.expect_inject()
            .with(always())
            .times(1)
            .returning(|events| Ok(events.len() as u64));

        let mut channel = KeystrokeChannel::new(sink);
        let accepted = channel.send("Hi\r").await.unwrap();
        assert_eq!(accepted, 6);
    }

    #[tokio::test]
    async fn test_send_partial_acceptance_is_not_an_error() {
        let mut sink = MockKeyEventSink::new();
        sink.expect_inject().times(1).returning(|_| Ok(3));

        let mut channel = KeystrokeChannel::new(sink);
        let accepted = channel.send("Hi\r").await.unwrap();
        assert_eq!(accepted, 3);
    }

    #[tokio::test]
    async fn test_send_empty_fragment() {
        let mut sink = MockKeyEventSink::new();
        sink.expect_inject().times(0);

        let mut channel = KeystrokeChannel::new(sink);
        assert_eq!(channel.send("").await.unwrap(), 0);
    }
}
