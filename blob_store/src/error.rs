//! Error types for bucket operations.

use std::fmt;

/// Result type for bucket operations.
pub type BlobResult<T> = Result<T, BlobError>;

/// Errors that can occur while talking to the object store.
#[derive(Debug)]
pub enum BlobError {
    /// No object exists under the key.
    NotFound { key: String },

    /// The key can't be represented as an object store path.
    InvalidKey { key: String, reason: String },

    /// Invalid bucket URI.
    InvalidUri { uri: String, reason: String },

    /// Bucket scheme has no backend.
    UnsupportedBackend { scheme: String },

    /// Error reported by the object store client (auth, network, quota...).
    Store { source: object_store::Error },

    /// I/O error, e.g. while preparing a local bucket directory.
    Io { source: std::io::Error },

    /// Generic error, e.g. a failed read of the inbound request body.
    Other { source: anyhow::Error },
}

impl BlobError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, BlobError::NotFound { .. })
    }
}

impl fmt::Display for BlobError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlobError::NotFound { key } => write!(f, "object not found: {}", key),
            BlobError::InvalidKey { key, reason } => {
                write!(f, "invalid object key '{}': {}", key, reason)
            }
            BlobError::InvalidUri { uri, reason } => {
                write!(f, "invalid bucket URI '{}': {}", uri, reason)
            }
            BlobError::UnsupportedBackend { scheme } => {
                write!(f, "unsupported bucket backend: {}", scheme)
            }
            BlobError::Store { source } => write!(f, "{}", source),
            BlobError::Io { source } => write!(f, "{}", source),
            BlobError::Other { source } => write!(f, "{}", source),
        }
    }
}

impl std::error::Error for BlobError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            BlobError::Store { source } => Some(source),
            BlobError::Io { source } => Some(source),
            BlobError::Other { source } => Some(source.as_ref()),
            _ => None,
        }
    }
}

impl From<object_store::Error> for BlobError {
    fn from(err: object_store::Error) -> Self {
        match err {
            object_store::Error::NotFound { path, .. } => BlobError::NotFound { key: path },
            _ => BlobError::Store { source: err },
        }
    }
}

impl From<std::io::Error> for BlobError {
    fn from(err: std::io::Error) -> Self {
        BlobError::Io { source: err }
    }
}

impl From<anyhow::Error> for BlobError {
    fn from(err: anyhow::Error) -> Self {
        BlobError::Other { source: err }
    }
}
