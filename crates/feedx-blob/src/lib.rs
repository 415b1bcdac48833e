//! Blob store contract for feedx.
//!
//! A feed is a single blob: a content stream plus a flat string-keyed
//! metadata map. This crate defines the handle feedx consumes and ships two
//! reference backends.
//!
//! # Contract
//!
//! - [`Blob::open`] yields a readable stream, failing with
//!   [`BlobError::NotFound`] if the blob is absent.
//! - [`Blob::create`] yields a [`BlobWriter`]; content and metadata become
//!   visible only on [`BlobWriter::commit`]. A dropped writer discards.
//! - [`Blob::info`] returns size and metadata.
//! - [`Blob::path`] is the path used for format/compression detection.
//!
//! # Backends
//!
//! - [`MemoryBucket`] -- `HashMap`-based bucket for tests and embedding
//! - [`FileBucket`] / [`FileBlob`] -- local filesystem with JSON metadata sidecars
//!
//! [`Resolver`] maps URL schemes to buckets.

pub mod error;
pub mod fs;
pub mod memory;
pub mod path;
pub mod resolver;
pub mod traits;

pub use error::{BlobError, BlobResult};
pub use fs::{FileBlob, FileBucket};
pub use memory::{MemoryBlob, MemoryBucket};
pub use resolver::Resolver;
pub use traits::{Blob, BlobInfo, BlobWriter, Bucket, CreateOptions, Metadata};
