//! Error types for the RESP server.

use thiserror::Error;

/// Result type for server operations.
pub type ServerResult<T> = Result<T, ServerError>;

/// Errors that can occur in the RESP server.
#[derive(Debug, Error)]
pub enum ServerError {
    /// I/O error on the listener or a connection.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed RESP input from a client.
    #[error("protocol error: {message}")]
    Protocol {
        /// Description of the protocol violation.
        message: String,
    },

    /// Error from the underlying datastore.
    #[error("datastore error: {0}")]
    Store(#[from] caskdb_core::CaskError),
}

impl ServerError {
    /// Creates a protocol error.
    pub fn protocol(message: impl Into<String>) -> Self {
        Self::Protocol {
            message: message.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn protocol_display() {
        let err = ServerError::protocol("expected array header");
        assert_eq!(err.to_string(), "protocol error: expected array header");
    }
}
