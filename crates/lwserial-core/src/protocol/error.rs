//! Protocol errors

use thiserror::Error;

use crate::transport::TransportError;

/// Errors that can occur during protocol communication
#[derive(Error, Debug)]
pub enum ProtocolError {
    /// The link is gone; never retried
    #[error("Transport failure: {0}")]
    TransportFatal(#[from] TransportError),

    #[error("Timed out waiting for response")]
    Timeout,

    #[error("No response after {attempts} attempts")]
    RetriesExceeded { attempts: u32 },

    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("Command id mismatch: expected {expected}, got {actual}")]
    CommandIdMismatch { expected: u8, actual: u8 },

    #[error("Unexpected value {value} for command {command_id}")]
    UnexpectedValue { command_id: u8, value: u32 },

    #[error("No complete frame available")]
    IncompleteFrame,

    #[error("Field at offset {offset} ({size} bytes) exceeds payload of {available} bytes")]
    FieldOutOfBounds {
        offset: usize,
        size: usize,
        available: usize,
    },
}

impl ProtocolError {
    /// Whether the error means the link itself is lost
    pub fn is_fatal(&self) -> bool {
        matches!(self, ProtocolError::TransportFatal(_))
    }
}
