//! XDG Desktop Portal integration
//!
//! Production backend for the keystroke channel: a RemoteDesktop portal
//! session with the keyboard device selected, and a [`KeyEventSink`] that
//! injects synthetic events through it.
//!
//! Creating the session triggers the compositor's permission dialog; once
//! granted, the compositor routes injected keycodes to whatever surface is
//! focused, which is exactly the destination this tool targets.

use anyhow::{Context, Result};
use ashpd::desktop::remote_desktop::{DeviceType, KeyState, RemoteDesktop};
use ashpd::desktop::PersistMode;
use async_trait::async_trait;
use enumflags2::BitFlags;
use tracing::{debug, info};

use crate::channel::{KeyEvent, KeyEventKind, KeyEventSink};
use crate::channel::keystroke::{VK_RETURN, VK_TAB};
use crate::input::keymap::keycodes::{KEY_ENTER, KEY_LEFTSHIFT, KEY_TAB};
use crate::input::{KeyStroke, TextKeyMapper};
use crate::transfer::error::TransferError;

/// An established RemoteDesktop portal session with keyboard access.
pub struct PortalSession {
    proxy: RemoteDesktop<'static>,
    session: ashpd::desktop::Session<'static, RemoteDesktop<'static>>,
}

impl PortalSession {
    /// Connect to the portal, select the keyboard device, and start the
    /// session. Triggers the permission dialog.
    pub async fn connect() -> Result<Self> {
        info!("Creating RemoteDesktop portal session");

        // Reaching the session bus first gives a clearer failure than the
        // portal proxy's own timeout when D-Bus is absent
        let _connection = zbus::Connection::session()
            .await
            .context("Failed to connect to D-Bus session bus")?;
        debug!("Connected to D-Bus session bus");

        let proxy = RemoteDesktop::new()
            .await
            .context("Failed to reach the RemoteDesktop portal")?;
        let session = proxy
            .create_session()
            .await
            .context("Failed to create portal session")?;

        proxy
            .select_devices(
                &session,
                BitFlags::from(DeviceType::Keyboard),
                None,               // No restore token
                PersistMode::DoNot, // One transfer, one permission grant
            )
            .await
            .context("Failed to select keyboard device")?;

        let response = proxy
            .start(&session, None)
            .await
            .context("Failed to start portal session")?;
        let selected = response.response().context("Portal session was refused")?;

        info!(
            devices = selected.devices().bits(),
            "RemoteDesktop session started"
        );

        Ok(Self { proxy, session })
    }

    /// Turn the session into a key event sink for the keystroke channel
    pub fn into_keyboard(self) -> PortalKeyboard {
        PortalKeyboard {
            session: self,
            mapper: TextKeyMapper::new(),
        }
    }

    async fn notify_key(&self, keycode: u32, pressed: bool) -> std::result::Result<(), ashpd::Error> {
        let state = if pressed {
            KeyState::Pressed
        } else {
            KeyState::Released
        };
        self.proxy
            .notify_keyboard_keycode(&self.session, keycode as i32, state)
            .await
    }
}

/// Injects synthetic key events through an established portal session.
pub struct PortalKeyboard {
    session: PortalSession,
    mapper: TextKeyMapper,
}

/// Resolve a synthetic event to the concrete keystroke the compositor
/// understands.
fn resolve(mapper: &TextKeyMapper, event: &KeyEvent) -> crate::transfer::error::Result<KeyStroke> {
    match event.kind {
        KeyEventKind::VirtualKey => match event.code {
            VK_RETURN => Ok(KeyStroke {
                keycode: KEY_ENTER,
                shift: false,
            }),
            VK_TAB => Ok(KeyStroke {
                keycode: KEY_TAB,
                shift: false,
            }),
            other => Err(TransferError::UnmappedCharacter(
                char::from_u32(other as u32).unwrap_or('\u{FFFD}'),
            )),
        },
        KeyEventKind::Text | KeyEventKind::TextExtended => {
            mapper.lookup(event.code).ok_or_else(|| {
                TransferError::UnmappedCharacter(
                    char::from_u32(event.code as u32).unwrap_or('\u{FFFD}'),
                )
            })
        }
    }
}

#[async_trait]
impl KeyEventSink for PortalKeyboard {
    async fn inject(&mut self, events: &[KeyEvent]) -> crate::transfer::error::Result<u64> {
        let mut accepted = 0u64;
        for event in events {
            let stroke = resolve(&self.mapper, event)?;

            // Shift wraps the stroke on press and unwraps it on release so
            // the pair stays balanced across the event stream
            if event.press && stroke.shift {
                self.session
                    .notify_key(KEY_LEFTSHIFT, true)
                    .await
                    .map_err(|e| TransferError::Channel(e.to_string()))?;
            }

            self.session
                .notify_key(stroke.keycode, event.press)
                .await
                .map_err(|e| TransferError::Channel(e.to_string()))?;

            if !event.press && stroke.shift {
                self.session
                    .notify_key(KEY_LEFTSHIFT, false)
                    .await
                    .map_err(|e| TransferError::Channel(e.to_string()))?;
            }

            accepted += 1;
        }
        debug!(events = accepted, "Batch injected via portal");
        Ok(accepted)
    }
}
