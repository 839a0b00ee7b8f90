//! Input Translation
//!
//! Translates typed text into concrete keystrokes at the injection seam.
//! The synthetic event stream produced by the keystroke channel is
//! layout-independent; the mapper here resolves it to US-layout evdev
//! keycodes for the portal backend.

pub mod keymap;

pub use keymap::{KeyStroke, TextKeyMapper};
