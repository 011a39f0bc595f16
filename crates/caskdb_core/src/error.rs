//! Error types for the CaskDB engine.

use std::io;
use thiserror::Error;

/// Result type for engine operations.
pub type CaskResult<T> = Result<T, CaskError>;

/// Errors that can occur in CaskDB engine operations.
#[derive(Debug, Error)]
pub enum CaskError {
    /// I/O error, surfaced after the retry budget is exhausted.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Another process holds an incompatible lock on the datastore.
    #[error("access denied: datastore is locked")]
    DatastoreLocked,

    /// Key not present, or its latest record is a tombstone.
    #[error("{key}: key does not exist")]
    KeyNotFound {
        /// The key that was looked up.
        key: String,
    },

    /// A writing operation was attempted on a read-only handle.
    #[error("{op}: require write permission")]
    WritePermission {
        /// The operation that was refused.
        op: &'static str,
    },

    /// CRC mismatch on a data record.
    #[error("corruption detected: checksum mismatch: expected {expected:08x}, got {actual:08x}")]
    ChecksumMismatch {
        /// Checksum stored in the record header.
        expected: u32,
        /// Checksum computed over the record body.
        actual: u32,
    },

    /// Datastore files are structurally invalid.
    #[error("corruption detected: {message}")]
    Corruption {
        /// Description of the corruption.
        message: String,
    },
}

impl CaskError {
    /// Creates a key-not-found error.
    pub fn key_not_found(key: impl Into<String>) -> Self {
        Self::KeyNotFound { key: key.into() }
    }

    /// Creates a write-permission error for the named operation.
    pub fn write_permission(op: &'static str) -> Self {
        Self::WritePermission { op }
    }

    /// Creates a corruption error.
    pub fn corruption(message: impl Into<String>) -> Self {
        Self::Corruption {
            message: message.into(),
        }
    }

    /// Returns true if this error reports a missing (or tombstoned) key.
    #[must_use]
    pub fn is_key_not_found(&self) -> bool {
        matches!(self, Self::KeyNotFound { .. })
    }
}
