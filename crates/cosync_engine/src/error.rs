//! Error types for the sync engine.

use cosync_protocol::AlgebraError;
use thiserror::Error;

/// Result type for engine operations.
pub type EngineResult<T> = Result<T, EngineError>;

/// Errors that can occur while editing or syncing.
#[derive(Error, Debug)]
pub enum EngineError {
    /// Network or transport error.
    #[error("transport error: {message}")]
    Transport {
        /// Error message.
        message: String,
        /// Whether the operation can be retried.
        retryable: bool,
    },

    /// An edit did not apply to the current document state.
    #[error("malformed operation: {0}")]
    Malformed(#[from] AlgebraError),

    /// The peer violated the commit/poll protocol.
    #[error("protocol violation: {0}")]
    Protocol(String),

    /// A request or response body could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// The server rejected the request.
    #[error("server error: {0}")]
    Server(String),

    /// The session was stopped.
    #[error("session stopped")]
    Stopped,
}

impl EngineError {
    /// Creates a retryable transport error.
    pub fn transport_retryable(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: true,
        }
    }

    /// Creates a non-retryable transport error.
    pub fn transport_fatal(message: impl Into<String>) -> Self {
        Self::Transport {
            message: message.into(),
            retryable: false,
        }
    }

    /// Returns true if retrying the same exchange may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            EngineError::Transport { retryable, .. } => *retryable,
            EngineError::Server(_) => true,
            _ => false,
        }
    }
}
