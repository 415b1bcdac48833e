use std::io;

/// Errors from blob store operations.
#[derive(Debug, thiserror::Error)]
pub enum BlobError {
    /// The blob does not exist.
    #[error("blob not found: {0}")]
    NotFound(String),

    /// The URL could not be parsed into a blob location.
    #[error("invalid blob URL {url}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// No bucket is mounted for the URL scheme.
    #[error("unsupported URL scheme: {0}")]
    UnsupportedScheme(String),

    /// Metadata could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A lock guarding shared state was poisoned by a panicking writer.
    #[error("blob store lock poisoned")]
    Poisoned,

    /// I/O error from the underlying storage backend.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl BlobError {
    /// Returns `true` if this error means the blob does not exist.
    pub fn is_not_found(&self) -> bool {
        match self {
            BlobError::NotFound(_) => true,
            BlobError::Io(e) => e.kind() == io::ErrorKind::NotFound,
            _ => false,
        }
    }

    /// Map an I/O error against `url`, turning `ErrorKind::NotFound` into
    /// [`BlobError::NotFound`].
    pub(crate) fn from_io(url: &str, err: io::Error) -> Self {
        if err.kind() == io::ErrorKind::NotFound {
            BlobError::NotFound(url.to_string())
        } else {
            BlobError::Io(err)
        }
    }
}

/// Result alias for blob operations.
pub type BlobResult<T> = Result<T, BlobError>;
