//! Transfer Engine Error Types
//!
//! Error taxonomy for the transfer pipeline. Every failure mode that can
//! terminate a transfer is represented here; `TransferOperation::send`
//! catches all of them and folds them into the terminal operation state.

use std::path::PathBuf;
use thiserror::Error;

/// Result type for transfer operations
pub type Result<T> = std::result::Result<T, TransferError>;

/// Transfer engine error types
#[derive(Error, Debug)]
pub enum TransferError {
    /// Payload source file vanished before the transfer could read it
    #[error("Payload source missing: {0}")]
    SourceMissing(PathBuf),

    /// No destination context was available when the transfer started
    #[error("No destination context is available")]
    DestinationUnavailable,

    /// The destination focus changed mid-transfer
    #[error("Destination focus lost after {fragments_sent} fragments")]
    FocusLost {
        /// Fragments already delivered before the focus check failed
        fragments_sent: u64,
    },

    /// The output channel could not be opened
    #[error("Failed to open output channel: {0}")]
    ChannelOpen(String),

    /// The output channel failed while sending
    #[error("Output channel error: {0}")]
    Channel(String),

    /// Payload encoding failed
    #[error("Payload encoding failed: {0}")]
    Encoding(String),

    /// A character in the payload cannot be expressed as keystrokes
    #[error("Character cannot be expressed as keystrokes: {0:?}")]
    UnmappedCharacter(char),

    /// Archive staging failed
    #[error("Archive staging failed: {0}")]
    Archive(String),

    /// The operation was used after reaching a terminal state
    #[error("Invalid operation state: {0}")]
    InvalidState(&'static str),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<zip::result::ZipError> for TransferError {
    fn from(err: zip::result::ZipError) -> Self {
        TransferError::Archive(err.to_string())
    }
}
