//! # keycourier
//!
//! Types clipboard-sized payloads into whatever application currently has
//! input focus, by synthesizing keystrokes, or streams them to a
//! serial-attached microcontroller that forwards the bytes to a host
//! shell. Payloads that do not fit a text stream (sets of files) travel as
//! a compressed archive wrapped in a small self-reconstructing script,
//! emitted one character or one serial byte at a time.
//!
//! # Architecture
//!
//! ```text
//! keycourier
//!   ├─> Payload (text, or zip archive staged in a temp file)
//!   ├─> ChunkEncoder (bounded-memory base64 chunking)
//!   ├─> ScriptAssembler (verbatim text / reconstruction script fragments)
//!   ├─> TimingModel + FocusGuard (pacing, cooperative abort)
//!   └─> OutputChannel
//!         ├─> KeystrokeChannel ──> portal (RemoteDesktop injection)
//!         └─> SerialChannel ────> UART (115200, DTR+RTS)
//! ```
//!
//! # Data Flow
//!
//! **Keystroke path:** Payload → Chunks → Fragments → KeyEvents → Portal → Compositor
//!
//! **Serial path:** Payload → Chunks → Fragments → UART → Microcontroller → Host shell

#![warn(missing_docs)]
#![warn(clippy::all)]

/// Output channels: synthetic keyboard events and the serial link
pub mod channel;

/// Configuration loading and validation
pub mod config;

/// Text-to-keycode translation for the injection seam
pub mod input;

/// XDG Desktop Portal session and keyboard injection backend
pub mod portal;

/// The transfer engine: chunking, script assembly, pacing, focus
/// guarding, and the single-shot transfer operation
pub mod transfer;

/// Error formatting and display helpers
pub mod utils;
