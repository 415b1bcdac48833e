//! Record formats for feedx streams.
//!
//! A [`FormatCodec`] turns a byte stream into an [`Encoder`] or a
//! [`Decoder`] over [`Record`] values. Codecs are looked up by name or
//! detected from a path's extensions through a [`FormatRegistry`].
//!
//! Built-in formats:
//!
//! - [`JsonCodec`] -- one JSON document per line (`.json`, `.jsonl`, `.ndjson`)
//! - [`ProtobufCodec`] -- varint length-delimited messages (`.pb`, `.proto`, `.protobuf`)
//! - [`ParquetCodec`] -- flat Apache Parquet files (`.parquet`)

pub mod codec;
pub mod columnar;
pub mod error;
pub mod json;
pub mod protobuf;
pub mod record;
pub mod registry;

pub use codec::{Decoder, Encoder, FormatCodec};
pub use columnar::ParquetCodec;
pub use error::{FormatError, FormatResult};
pub use json::JsonCodec;
pub use protobuf::ProtobufCodec;
pub use record::Record;
pub use registry::{FormatRegistry, FormatSelector};

pub use ::parquet::record::{Field as ParquetField, Row as ParquetRow};
