//! Error types for store operations.

use std::io;
use thiserror::Error;

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors returned by a [`crate::DatastoreBackend`].
///
/// Errors split into two groups. Transient errors (`Unavailable`,
/// `DeadlineExceeded`, `Aborted`) may succeed when the same call is
/// repeated; everything else is terminal.
#[derive(Debug, Error)]
pub enum StoreError {
    /// The service could not be reached or refused the call.
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The call did not complete in time.
    #[error("deadline exceeded")]
    DeadlineExceeded,

    /// The store aborted the call because of contention.
    #[error("aborted: {0}")]
    Aborted(String),

    /// The request was rejected as malformed.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// A key without identifier was used where a complete key is required.
    #[error("incomplete key for kind {kind}")]
    IncompleteKey {
        /// Kind of the offending key.
        kind: String,
    },

    /// A cursor could not be decoded.
    #[error("invalid cursor: {0}")]
    InvalidCursor(String),

    /// An I/O error occurred while persisting or loading a snapshot.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// CBOR encoding or decoding failed.
    #[error("codec error: {0}")]
    Codec(String),
}

impl StoreError {
    /// Creates an unavailable error.
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable(message.into())
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument(message.into())
    }

    /// Creates an incomplete key error.
    pub fn incomplete_key(kind: impl Into<String>) -> Self {
        Self::IncompleteKey { kind: kind.into() }
    }

    /// Returns true if repeating the call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Unavailable(_) | StoreError::DeadlineExceeded | StoreError::Aborted(_)
        )
    }
}
