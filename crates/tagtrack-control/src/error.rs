//! Error types for the control session.

use tagtrack_tunnel::{CommandId, FrameError};
use thiserror::Error;

/// Errors raised by the transport collaborator.
#[derive(Debug, Error)]
pub enum TransportError {
    /// I/O error on the underlying link.
    #[error("transport I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The link has been closed.
    #[error("transport closed")]
    Closed,
}

/// Errors raised by session operations.
#[derive(Debug, Error)]
pub enum SessionError {
    /// The detector acknowledged a command with a failure result.
    #[error("detector reported failure for {command}")]
    CommandFailed {
        /// The failed command.
        command: CommandId,
    },

    /// An operation needs a loaded catalog and none is loaded.
    #[error("no tag catalog loaded")]
    NoCatalog,

    /// The session has been stopped.
    #[error("session stopped")]
    Stopped,

    /// A command could not be framed.
    #[error("frame error: {0}")]
    Frame(#[from] FrameError),

    /// The transport failed while sending.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl SessionError {
    /// Whether the session must be torn down after this error.
    pub fn is_fatal(&self) -> bool {
        matches!(self, SessionError::CommandFailed { .. })
    }
}

/// Errors in session configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A setting is out of range.
    #[error("invalid setting {field}: {reason}")]
    Invalid {
        /// Setting name.
        field: &'static str,
        /// Why it was rejected.
        reason: String,
    },
}

/// Result type alias for session operations.
pub type SessionResult<T> = Result<T, SessionError>;
