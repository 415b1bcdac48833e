use std::error::Error as StdError;

use feedx_blob::BlobError;
use feedx_cache::CacheError;
use feedx_compression::CompressionError;
use feedx_format::FormatError;
use thiserror::Error;

/// Errors from stream, producer, and consumer operations.
#[derive(Debug, Error)]
pub enum FeedError {
    /// The blob store failed or the blob does not exist.
    #[error("blob error: {0}")]
    Blob(#[from] BlobError),

    /// Compression lookup or streaming failed.
    #[error("compression error: {0}")]
    Compression(#[from] CompressionError),

    /// Format lookup or detection failed, or a record type lacks a mapping.
    #[error("format error: {0}")]
    Format(FormatError),

    /// A record could not be encoded.
    #[error(transparent)]
    Encode(FormatError),

    /// Stored bytes could not be decoded into a record.
    #[error(transparent)]
    Decode(FormatError),

    /// The version cache failed.
    #[error("cache error: {0}")]
    Cache(#[from] CacheError),

    /// An incremental feed manifest could not be read or written.
    #[error("manifest error: {0}")]
    Manifest(String),

    /// Releasing one layer of a stream failed after the work itself
    /// succeeded.
    #[error("failed to release {layer} layer: {source}")]
    Release {
        layer: &'static str,
        #[source]
        source: Box<dyn StdError + Send + Sync>,
    },

    /// An error raised by caller-supplied code, such as a record callback.
    #[error("callback failed: {0}")]
    Callback(#[source] Box<dyn StdError + Send + Sync>),
}

impl FeedError {
    pub fn release(layer: &'static str, err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        FeedError::Release {
            layer,
            source: err.into(),
        }
    }

    pub fn callback(err: impl Into<Box<dyn StdError + Send + Sync>>) -> Self {
        FeedError::Callback(err.into())
    }

    /// Returns `true` if the underlying blob does not exist.
    pub fn is_not_found(&self) -> bool {
        matches!(self, FeedError::Blob(e) if e.is_not_found())
    }

    /// Returns `true` for an unregistered format or compression name.
    pub fn is_unknown_codec(&self) -> bool {
        matches!(
            self,
            FeedError::Format(FormatError::UnknownCodec(_))
                | FeedError::Compression(CompressionError::UnknownCodec(_))
        )
    }

    /// Returns `true` if no format could be inferred from the blob path.
    pub fn is_format_undetectable(&self) -> bool {
        matches!(self, FeedError::Format(FormatError::FormatUndetectable(_)))
    }

    /// Returns `true` for a rejected codec or registration.
    pub fn is_invalid_codec(&self) -> bool {
        matches!(
            self,
            FeedError::Format(FormatError::InvalidCodec { .. })
                | FeedError::Compression(CompressionError::InvalidCodec { .. })
        )
    }
}

impl From<FormatError> for FeedError {
    fn from(err: FormatError) -> Self {
        match err {
            FormatError::Encode(_) => FeedError::Encode(err),
            FormatError::Decode(_) => FeedError::Decode(err),
            other => FeedError::Format(other),
        }
    }
}

/// Result alias for feed operations.
pub type FeedResult<T> = Result<T, FeedError>;
