//! Transfer Engine
//!
//! Turns an arbitrary byte payload into bounded, text-safe chunks, wraps
//! them into literal fragments of a reconstruction script, and paces their
//! emission over an output channel while continuously verifying that the
//! destination context is unchanged.
//!
//! ```text
//! Payload ──> ChunkEncoder ──> ScriptAssembler ──> OutputChannel
//!                                    │                  │
//!                              TimingModel         FocusGuard
//!                                    └── TransferOperation ──┘
//! ```

pub mod chunk;
pub mod error;
pub mod focus;
pub mod operation;
pub mod payload;
pub mod script;
pub mod timing;

pub use chunk::{Chunk, ChunkEncoder};
pub use error::{Result, TransferError};
pub use focus::{EventFocusGuard, FocusGuard, FocusMonitor, FocusSource, FocusToken, PollingFocusGuard};
pub use operation::{AbortReason, TransferOperation, TransferProgress, TransferState};
pub use payload::{Payload, PayloadKind};
pub use script::{Fragment, QuoteStyle, ScriptAssembler};
pub use timing::{SecurityLevel, TimingModel};
