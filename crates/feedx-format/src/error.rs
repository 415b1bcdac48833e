/// Errors from format codec lookup, encoding, and decoding.
#[derive(Debug, thiserror::Error)]
pub enum FormatError {
    /// No codec is registered under the requested name.
    #[error("invalid format {0}")]
    UnknownCodec(String),

    /// No registered codec matches any extension of the path.
    #[error("unable to detect format from {0:?}")]
    FormatUndetectable(String),

    /// A codec offered for registration was rejected.
    #[error("invalid format codec {name:?}: {reason}")]
    InvalidCodec { name: String, reason: String },

    /// The record type has no mapping for this wire format.
    #[error("record type does not support the {format} format")]
    Unsupported { format: &'static str },

    /// A record could not be converted to its wire form.
    #[error("encode error: {0}")]
    Encode(String),

    /// Input bytes could not be converted into a record.
    #[error("decode error: {0}")]
    Decode(String),

    /// I/O error from the underlying stream.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result alias for format operations.
pub type FormatResult<T> = Result<T, FormatError>;
