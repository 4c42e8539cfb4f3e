//! Blobstore error types.
//!
//! Every failure the adapter can report is a [`BlobstoreError`] variant.
//! The binary maps them to a nonzero exit status and prints the message
//! on standard error.

use thiserror::Error;

/// Message returned when a mutating operation runs without credentials.
const READ_ONLY_MESSAGE: &str =
    "the client operates in read only mode. Change 'credentials_source' parameter value";

/// Errors produced while resolving configuration or talking to the store.
#[derive(Debug, Error)]
pub enum BlobstoreError {
    /// The configuration document is malformed or incomplete.
    #[error("invalid configuration: {0}")]
    Config(String),

    /// A mutating operation was attempted under anonymous credentials.
    #[error("{}", READ_ONLY_MESSAGE)]
    ReadOnly,

    /// The backend reported that the key (or its bucket) does not exist.
    #[error("{code}: object '{key}' not found in bucket '{bucket}'")]
    NotFound {
        bucket: String,
        key: String,
        code: String,
    },

    /// The backend rejected the request credentials or signature.
    #[error("{code}: {message}")]
    Auth { code: String, message: String },

    /// Network, TLS, or any other backend failure.
    #[error("{0}")]
    Transport(String),

    /// The operation did not finish within the configured timeout.
    #[error("operation timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// Local file I/O failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl BlobstoreError {
    /// Build a configuration error from anything printable.
    pub fn config(message: impl Into<String>) -> Self {
        BlobstoreError::Config(message.into())
    }

    /// Whether the backend reported a missing object.
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlobstoreError::NotFound { .. })
    }

    /// Short machine-readable code, used in structured log fields.
    pub fn code(&self) -> &str {
        match self {
            BlobstoreError::Config(_) => "ConfigError",
            BlobstoreError::ReadOnly => "ReadOnlyMode",
            BlobstoreError::NotFound { code, .. } => code,
            BlobstoreError::Auth { code, .. } => code,
            BlobstoreError::Transport(_) => "TransportError",
            BlobstoreError::Timeout { .. } => "Timeout",
            BlobstoreError::Io(_) => "IoError",
        }
    }
}
