use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::error::BlobResult;

/// Flat string-keyed metadata persisted alongside a blob.
pub type Metadata = BTreeMap<String, String>;

/// Size and metadata of a stored blob.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlobInfo {
    pub size: u64,
    pub metadata: Metadata,
}

/// Options applied when creating a blob.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreateOptions {
    /// Metadata stored with the blob on commit.
    pub metadata: Metadata,
}

impl CreateOptions {
    /// Options carrying a single metadata entry.
    pub fn with_metadata(key: impl Into<String>, value: impl Into<String>) -> Self {
        let mut metadata = Metadata::new();
        metadata.insert(key.into(), value.into());
        Self { metadata }
    }
}

/// Writable content stream of a blob under creation.
///
/// Nothing written becomes visible at the destination until [`commit`]
/// returns successfully. Dropping the writer without committing discards
/// the partial content and leaves any previous blob untouched.
///
/// [`commit`]: BlobWriter::commit
pub trait BlobWriter: Write + Send {
    /// Flush and atomically publish the written content and metadata.
    fn commit(self: Box<Self>) -> BlobResult<()>;
}

/// A single blob addressed by URL.
///
/// Implementations must be thread-safe. Handles are cheap; they hold a
/// location, not content.
pub trait Blob: Send + Sync + fmt::Debug {
    /// The URL this blob was resolved from.
    fn url(&self) -> &str;

    /// The blob path within its bucket. Used for extension detection.
    fn path(&self) -> &str;

    /// Open the blob content for reading.
    ///
    /// Fails with `BlobError::NotFound` if the blob does not exist.
    fn open(&self) -> BlobResult<Box<dyn Read + Send>>;

    /// Start creating (or replacing) the blob.
    fn create(&self, options: &CreateOptions) -> BlobResult<Box<dyn BlobWriter>>;

    /// Size and metadata of the stored blob.
    ///
    /// Fails with `BlobError::NotFound` if the blob does not exist.
    fn info(&self) -> BlobResult<BlobInfo>;

    /// Release any connection-level resource held by this handle.
    ///
    /// Must be idempotent. The default implementation holds nothing.
    fn close(&self) -> BlobResult<()> {
        Ok(())
    }
}

/// A namespace of blobs, such as a directory or an object store bucket.
pub trait Bucket: Send + Sync {
    /// Return a handle for the blob at `path`. Does not check existence.
    fn blob(&self, path: &str) -> BlobResult<Arc<dyn Blob>>;
}
