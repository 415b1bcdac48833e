//! Stream records to and from blob stores as feeds.
//!
//! A feed is one blob holding a sequence of encoded records, optionally
//! compressed. A [`Stream`] layers a format codec over a compression codec
//! over the blob. [`Producer`] and [`Consumer`] wrap a stream with a
//! version check so unchanged feeds are neither rewritten nor re-read:
//!
//! - the producer stores its version in the blob metadata under
//!   [`META_VERSION`] and skips the write unless it is strictly newer;
//! - the consumer remembers the last version it fully read in a
//!   [`CacheValue`] and skips the read unless the blob is strictly newer.
//!
//! Incremental feeds spread records over several data files listed by a
//! [`Manifest`]; see [`IncrementalProducer`] and [`IncrementalConsumer`].
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use feedx::{CacheValue, Consumer, FeedOptions, MemoryCache, Producer, Resolver, Stream, Version};
//! use serde_json::{json, Value};
//!
//! # fn main() -> feedx::FeedResult<()> {
//! let resolver = Resolver::new();
//! let stream = Stream::from_url(&resolver, "/tmp/feed.jsonz", &FeedOptions::default())?;
//!
//! let rows = vec![json!({"id": 1}), json!({"id": 2})];
//! let produced = Producer::new(stream.clone(), rows)
//!     .with_version(Version::new(33))
//!     .perform()?;
//! println!("wrote {} bytes", produced.size());
//!
//! let cache = CacheValue::new(Arc::new(MemoryCache::new()), "feed");
//! let consumer = Consumer::<Value>::new(stream).with_cache(cache);
//! consumer.each(|row| {
//!     println!("{row}");
//!     Ok(())
//! })?;
//! # Ok(())
//! # }
//! ```

pub mod consumer;
pub mod error;
pub mod incremental;
pub mod options;
pub mod producer;
pub mod recurring;
pub mod source;
pub mod stream;
pub mod version;

pub use consumer::{Consumer, Records};
pub use error::{FeedError, FeedResult};
pub use incremental::{IncrementalConsumer, IncrementalProducer, Manifest, MANIFEST_NAME};
pub use options::{Codecs, FeedOptions};
pub use producer::{Produced, Producer, VersionSource};
pub use recurring::RecurringProducer;
pub use source::{Batches, IterSource, RecordSource};
pub use stream::Stream;
pub use version::{Version, META_VERSION, META_VERSION_LOWER};

pub use feedx_blob as blob;
pub use feedx_cache as cache;
pub use feedx_compression as compression;
pub use feedx_format as format;

pub use feedx_blob::{Blob, BlobInfo, Bucket, CreateOptions, FileBucket, MemoryBucket, Metadata, Resolver};
pub use feedx_cache::{Cache, CacheValue, FileCache, MemoryCache};
pub use feedx_compression::{CompressionCodec, CompressionRegistry, CompressionSelector};
pub use feedx_format::{
    impl_json_record, impl_parquet_record, impl_protobuf_record, Decoder, Encoder, FormatCodec,
    FormatRegistry, FormatResult, FormatSelector, ParquetCodec, Record,
};
