/// Errors from compression codec lookup and streaming.
#[derive(Debug, thiserror::Error)]
pub enum CompressionError {
    /// No codec is registered under the requested name.
    #[error("invalid compression {0}")]
    UnknownCodec(String),

    /// A codec offered for registration was rejected.
    #[error("invalid compression codec {name:?}: {reason}")]
    InvalidCodec { name: String, reason: String },

    /// I/O error while compressing or decompressing.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for compression operations.
pub type CompressionResult<T> = Result<T, CompressionError>;
