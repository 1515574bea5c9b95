//! Error types for verkle_trie

use thiserror::Error;

/// Result type alias for verkle_trie operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in verkle_trie operations
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid {kind} length: expected {expected} bytes, found {found}")]
    InvalidLength {
        kind: &'static str,
        expected: usize,
        found: usize,
    },

    #[error("Failed to resolve node at path [{path}]: {reason}")]
    Resolution { path: String, reason: String },

    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    #[error("Cannot prove key {key}: {reason}")]
    ProofConstruction { key: String, reason: String },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl Error {
    pub(crate) fn resolution(path: &[u8], reason: impl Into<String>) -> Self {
        Error::Resolution {
            path: hex::encode(path),
            reason: reason.into(),
        }
    }

    pub(crate) fn invariant(msg: impl Into<String>) -> Self {
        Error::InvariantViolation(msg.into())
    }
}
