//! The per-record serialization capability.

use parquet::record::Row;

use crate::columnar::Fields;
use crate::error::{FormatError, FormatResult};

/// A value that can travel through a feed.
///
/// Each wire format calls one pair of methods. A record type implements the
/// pairs for the formats it supports; the rest fail with
/// [`FormatError::Unsupported`]. The trait is object-safe so codecs can work
/// with `&dyn Record` without knowing the concrete type.
///
/// `merge_*` replaces the contents of `self` with the decoded unit.
///
/// For serde types, [`impl_json_record!`](crate::impl_json_record) writes the
/// JSON pair; [`impl_protobuf_record!`](crate::impl_protobuf_record) does the
/// same for `prost` messages and
/// [`impl_parquet_record!`](crate::impl_parquet_record) for flat Parquet rows.
pub trait Record {
    /// Append the compact JSON form of `self` to `buf`. Must not emit a raw
    /// newline.
    fn to_json(&self, buf: &mut Vec<u8>) -> FormatResult<()> {
        let _ = buf;
        Err(FormatError::Unsupported { format: "json" })
    }

    /// Populate `self` from one JSON document.
    fn merge_json(&mut self, data: &[u8]) -> FormatResult<()> {
        let _ = data;
        Err(FormatError::Unsupported { format: "json" })
    }

    /// Append the protobuf encoding of `self` to `buf`, without framing.
    fn to_protobuf(&self, buf: &mut Vec<u8>) -> FormatResult<()> {
        let _ = buf;
        Err(FormatError::Unsupported { format: "protobuf" })
    }

    /// Populate `self` from one protobuf message body.
    fn merge_protobuf(&mut self, data: &[u8]) -> FormatResult<()> {
        let _ = data;
        Err(FormatError::Unsupported { format: "protobuf" })
    }

    /// Named column values of `self` for one Parquet row.
    fn to_parquet(&self) -> FormatResult<Fields> {
        Err(FormatError::Unsupported { format: "parquet" })
    }

    /// Populate `self` from one Parquet row.
    fn merge_parquet(&mut self, row: &Row) -> FormatResult<()> {
        let _ = row;
        Err(FormatError::Unsupported { format: "parquet" })
    }
}

impl<R: Record + ?Sized> Record for Box<R> {
    fn to_json(&self, buf: &mut Vec<u8>) -> FormatResult<()> {
        (**self).to_json(buf)
    }

    fn merge_json(&mut self, data: &[u8]) -> FormatResult<()> {
        (**self).merge_json(data)
    }

    fn to_protobuf(&self, buf: &mut Vec<u8>) -> FormatResult<()> {
        (**self).to_protobuf(buf)
    }

    fn merge_protobuf(&mut self, data: &[u8]) -> FormatResult<()> {
        (**self).merge_protobuf(data)
    }

    fn to_parquet(&self) -> FormatResult<Fields> {
        (**self).to_parquet()
    }

    fn merge_parquet(&mut self, row: &Row) -> FormatResult<()> {
        (**self).merge_parquet(row)
    }
}

impl Record for serde_json::Value {
    fn to_json(&self, buf: &mut Vec<u8>) -> FormatResult<()> {
        crate::json::encode_value(self, buf)
    }

    fn merge_json(&mut self, data: &[u8]) -> FormatResult<()> {
        *self = crate::json::decode_value(data)?;
        Ok(())
    }

    fn to_parquet(&self) -> FormatResult<Fields> {
        crate::columnar::fields_from_value(self)
    }

    fn merge_parquet(&mut self, row: &Row) -> FormatResult<()> {
        *self = crate::columnar::value_from_row(row)?;
        Ok(())
    }
}

/// Implement [`Record`](crate::Record) over JSON for serde types.
///
/// ```
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Default, Serialize, Deserialize)]
/// struct Row {
///     id: u64,
/// }
///
/// feedx_format::impl_json_record!(Row);
/// ```
#[macro_export]
macro_rules! impl_json_record {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::Record for $ty {
            fn to_json(&self, buf: &mut ::std::vec::Vec<u8>) -> $crate::FormatResult<()> {
                $crate::json::encode_value(self, buf)
            }

            fn merge_json(&mut self, data: &[u8]) -> $crate::FormatResult<()> {
                *self = $crate::json::decode_value(data)?;
                Ok(())
            }
        }
    )+};
}

/// Implement [`Record`](crate::Record) over protobuf for `prost` messages.
#[macro_export]
macro_rules! impl_protobuf_record {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::Record for $ty {
            fn to_protobuf(&self, buf: &mut ::std::vec::Vec<u8>) -> $crate::FormatResult<()> {
                $crate::protobuf::encode_message(self, buf)
            }

            fn merge_protobuf(&mut self, data: &[u8]) -> $crate::FormatResult<()> {
                *self = $crate::protobuf::decode_message(data)?;
                Ok(())
            }
        }
    )+};
}

/// Implement [`Record`](crate::Record) over Parquet for flat serde types.
///
/// Values pass through their JSON form, so nested fields are rejected.
#[macro_export]
macro_rules! impl_parquet_record {
    ($($ty:ty),+ $(,)?) => {$(
        impl $crate::Record for $ty {
            fn to_parquet(&self) -> $crate::FormatResult<$crate::columnar::Fields> {
                $crate::columnar::encode_serde(self)
            }

            fn merge_parquet(&mut self, row: &$crate::ParquetRow) -> $crate::FormatResult<()> {
                *self = $crate::columnar::decode_serde(row)?;
                Ok(())
            }
        }
    )+};
}
