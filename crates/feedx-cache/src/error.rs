/// Errors from cache backends.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// I/O error from a persistent backend.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Stored entries could not be encoded or decoded.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// A lock guarding the entries was poisoned by a panicking writer.
    #[error("cache lock poisoned")]
    Poisoned,
}

/// Result alias for cache operations.
pub type CacheResult<T> = Result<T, CacheError>;
