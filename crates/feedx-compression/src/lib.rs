//! Compression layer for feedx streams.
//!
//! A [`CompressionCodec`] sits between a blob's byte stream and a format
//! codec. Codecs are looked up through a [`CompressionRegistry`], either by
//! name or by inspecting a blob path's extension.
//!
//! Built-in codecs:
//!
//! - [`NoCompression`] -- identity
//! - [`Gzip`] -- gzip via `flate2`
//! - [`Flate`] -- raw DEFLATE via `flate2`
//! - [`Zstd`] -- Zstandard via `zstd`

pub mod codec;
pub mod codecs;
pub mod error;
pub mod registry;

pub use codec::{CompressWriter, CompressionCodec};
pub use codecs::{Flate, Gzip, NoCompression, Zstd};
pub use error::{CompressionError, CompressionResult};
pub use registry::{CompressionRegistry, CompressionSelector};
