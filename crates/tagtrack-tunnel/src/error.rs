//! Protocol error types.

use thiserror::Error;

/// Errors that can occur when decoding a tunnel payload.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DecodeError {
    /// Payload is too short to hold a command id.
    #[error("payload too short: expected at least {expected} bytes, got {actual}")]
    FrameTooShort {
        /// Expected minimum length.
        expected: usize,
        /// Actual length received.
        actual: usize,
    },

    /// Command id is not one this protocol defines.
    #[error("unknown command id: {0}")]
    UnknownCommand(u32),

    /// Payload length does not match the fixed layout of its command.
    #[error("size mismatch for {command}: expected {expected} payload bytes, got {actual}")]
    SizeMismatch {
        /// Name of the command.
        command: &'static str,
        /// Expected payload size, excluding the command id.
        expected: usize,
        /// Actual payload size, excluding the command id.
        actual: usize,
    },
}

/// Errors that can occur when building or accepting a padded frame.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Encoded message does not fit in a frame.
    #[error("payload too large: maximum {max} bytes, got {actual}")]
    PayloadTooLarge {
        /// Maximum allowed length.
        max: usize,
        /// Actual length.
        actual: usize,
    },

    /// Declared payload length exceeds the bytes actually received.
    #[error("declared payload length {declared} exceeds received {received} bytes")]
    LengthExceedsFrame {
        /// Length declared by the transport.
        declared: usize,
        /// Bytes received.
        received: usize,
    },
}
