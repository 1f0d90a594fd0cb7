//! Error types for the document server.

use cosync_protocol::DocumentId;
use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur while handling client requests.
#[derive(Error, Debug)]
pub enum ServerError {
    /// Invalid request format or contents.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The requested document does not exist.
    #[error("unknown document: {0}")]
    UnknownDocument(DocumentId),

    /// A request referenced log history this server does not have.
    #[error("protocol violation: {0}")]
    ProtocolViolation(String),
}

impl ServerError {
    /// Whether the error was caused by the client's request rather than
    /// server state.
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            ServerError::InvalidRequest(_) | ServerError::UnknownDocument(_)
        )
    }
}
