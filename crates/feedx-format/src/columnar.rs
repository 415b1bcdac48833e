//! Apache Parquet files.
//!
//! Parquet is not a streaming format: the encoder buffers rows into row
//! groups and writes the whole file to the sink on `finish`, and the
//! decoder reads its entire source before yielding the first record.
//!
//! Only flat schemas are supported. Columns are top-level primitive
//! fields, `OPTIONAL` or `REQUIRED`. Without an explicit schema the column
//! set and types are inferred from the first row group; every inferred
//! column is `OPTIONAL`.

use std::collections::HashMap;
use std::fmt;
use std::io::{Read, Write};
use std::sync::Arc;

use bytes::Bytes;
use parquet::basic::{ConvertedType, Repetition, Type as PhysicalType};
use parquet::column::writer::ColumnWriter;
use parquet::data_type::ByteArray;
use parquet::errors::ParquetError;
use parquet::file::properties::WriterProperties;
use parquet::file::reader::{FileReader, SerializedFileReader};
use parquet::file::writer::SerializedFileWriter;
use parquet::record::{Field, Row};
use parquet::schema::parser::parse_message_type;
use parquet::schema::types::{Type, TypePtr};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Number, Value};

use crate::codec::{Decoder, Encoder, FormatCodec};
use crate::error::{FormatError, FormatResult};
use crate::record::Record;

/// Rows per row group unless configured otherwise.
pub const DEFAULT_BATCH_SIZE: usize = 10_000;

/// One record as named column values.
pub type Fields = Vec<(String, Field)>;

/// The Parquet format.
#[derive(Clone)]
pub struct ParquetCodec {
    schema: Option<TypePtr>,
    batch_size: usize,
}

impl ParquetCodec {
    /// A codec that infers its schema from the written rows.
    pub fn new() -> Self {
        Self {
            schema: None,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }

    /// A codec writing the given message type, e.g.
    /// `message row { required int64 id; optional binary name (UTF8); }`.
    pub fn with_schema(message_type: &str) -> FormatResult<Self> {
        let schema = parse_message_type(message_type).map_err(|e| FormatError::InvalidCodec {
            name: "parquet".into(),
            reason: e.to_string(),
        })?;
        columns(&schema)?;
        Ok(Self {
            schema: Some(Arc::new(schema)),
            batch_size: DEFAULT_BATCH_SIZE,
        })
    }

    /// Rows buffered per row group. Zero is treated as one.
    pub fn with_batch_size(mut self, batch_size: usize) -> Self {
        self.batch_size = batch_size.max(1);
        self
    }
}

impl Default for ParquetCodec {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for ParquetCodec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ParquetCodec")
            .field("schema", &self.schema.as_ref().map(|s| s.name()))
            .field("batch_size", &self.batch_size)
            .finish()
    }
}

impl FormatCodec for ParquetCodec {
    fn name(&self) -> &str {
        "parquet"
    }

    fn encoder<'a>(&self, sink: &'a mut dyn Write) -> FormatResult<Box<dyn Encoder + 'a>> {
        Ok(Box::new(ParquetEncoder {
            sink,
            schema: self.schema.clone(),
            columns: Vec::new(),
            writer: None,
            batch: Vec::new(),
            batch_size: self.batch_size,
        }))
    }

    fn decoder<'a>(
        &self,
        mut source: Box<dyn Read + Send + 'a>,
    ) -> FormatResult<Box<dyn Decoder + 'a>> {
        let mut data = Vec::new();
        source.read_to_end(&mut data)?;
        drop(source);

        let rows = if data.is_empty() {
            Vec::new()
        } else {
            let reader = SerializedFileReader::new(Bytes::from(data)).map_err(decode_error)?;
            let iter = reader.get_row_iter(None).map_err(decode_error)?;
            iter.collect::<Result<Vec<Row>, _>>().map_err(decode_error)?
        };
        Ok(Box::new(ParquetDecoder {
            rows: rows.into_iter(),
        }))
    }
}

// ---------------------------------------------------------------------------
// Encoder
// ---------------------------------------------------------------------------

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Kind {
    Bool,
    Int32,
    Int64,
    Float,
    Double,
    Utf8,
    Binary,
}

impl Kind {
    fn of(field: &Field) -> FormatResult<Option<Kind>> {
        let kind = match field {
            Field::Null => return Ok(None),
            Field::Bool(_) => Kind::Bool,
            Field::Byte(_) | Field::Short(_) | Field::Int(_) | Field::UByte(_) | Field::UShort(_) => {
                Kind::Int32
            }
            Field::Date(_) => Kind::Int32,
            Field::Long(_) | Field::UInt(_) | Field::ULong(_) => Kind::Int64,
            Field::TimestampMillis(_) | Field::TimestampMicros(_) => Kind::Int64,
            Field::Float(_) => Kind::Float,
            Field::Double(_) => Kind::Double,
            Field::Str(_) => Kind::Utf8,
            Field::Bytes(_) => Kind::Binary,
            other => {
                return Err(FormatError::Encode(format!(
                    "unsupported parquet value {other}"
                )))
            }
        };
        Ok(Some(kind))
    }

    fn column_type(self, name: &str) -> FormatResult<TypePtr> {
        let physical = match self {
            Kind::Bool => PhysicalType::BOOLEAN,
            Kind::Int32 => PhysicalType::INT32,
            Kind::Int64 => PhysicalType::INT64,
            Kind::Float => PhysicalType::FLOAT,
            Kind::Double => PhysicalType::DOUBLE,
            Kind::Utf8 | Kind::Binary => PhysicalType::BYTE_ARRAY,
        };
        let mut builder =
            Type::primitive_type_builder(name, physical).with_repetition(Repetition::OPTIONAL);
        if self == Kind::Utf8 {
            builder = builder.with_converted_type(ConvertedType::UTF8);
        }
        Ok(Arc::new(builder.build().map_err(encode_error)?))
    }
}

#[derive(Debug)]
struct Column {
    name: String,
    physical: PhysicalType,
    optional: bool,
}

fn columns(schema: &Type) -> FormatResult<Vec<Column>> {
    schema
        .get_fields()
        .iter()
        .map(|field| {
            if !field.is_primitive() {
                return Err(FormatError::Encode(format!(
                    "nested parquet column {:?} is not supported",
                    field.name()
                )));
            }
            let info = field.get_basic_info();
            let repetition = if info.has_repetition() {
                info.repetition()
            } else {
                Repetition::REQUIRED
            };
            if repetition == Repetition::REPEATED {
                return Err(FormatError::Encode(format!(
                    "repeated parquet column {:?} is not supported",
                    field.name()
                )));
            }
            Ok(Column {
                name: field.name().to_string(),
                physical: field.get_physical_type(),
                optional: repetition == Repetition::OPTIONAL,
            })
        })
        .collect()
}

/// Build a flat schema from the first typed value seen in each column.
fn infer_schema(rows: &[Fields]) -> FormatResult<TypePtr> {
    let mut order: Vec<(&str, Option<Kind>)> = Vec::new();
    for row in rows {
        for (name, field) in row {
            let kind = Kind::of(field)?;
            match order.iter_mut().find(|(n, _)| *n == name.as_str()) {
                Some((_, slot)) => {
                    if slot.is_none() {
                        *slot = kind;
                    }
                }
                None => order.push((name.as_str(), kind)),
            }
        }
    }

    let mut fields = Vec::with_capacity(order.len());
    for (name, kind) in order {
        let kind = kind.ok_or_else(|| {
            FormatError::Encode(format!("cannot infer parquet type of {name:?}: every value is null"))
        })?;
        fields.push(kind.column_type(name)?);
    }
    let schema = Type::group_type_builder("feedx")
        .with_fields(fields)
        .build()
        .map_err(encode_error)?;
    Ok(Arc::new(schema))
}

enum Values {
    Bool(Vec<bool>),
    Int32(Vec<i32>),
    Int64(Vec<i64>),
    Float(Vec<f32>),
    Double(Vec<f64>),
    Bytes(Vec<ByteArray>),
}

impl Values {
    fn for_column(column: &Column) -> FormatResult<Self> {
        Ok(match column.physical {
            PhysicalType::BOOLEAN => Values::Bool(Vec::new()),
            PhysicalType::INT32 => Values::Int32(Vec::new()),
            PhysicalType::INT64 => Values::Int64(Vec::new()),
            PhysicalType::FLOAT => Values::Float(Vec::new()),
            PhysicalType::DOUBLE => Values::Double(Vec::new()),
            PhysicalType::BYTE_ARRAY => Values::Bytes(Vec::new()),
            other => {
                return Err(FormatError::Encode(format!(
                    "parquet column {:?} has unsupported type {other}",
                    column.name
                )))
            }
        })
    }

    fn push(&mut self, column: &str, field: &Field) -> FormatResult<()> {
        let pushed = match (self, field) {
            (Values::Bool(v), Field::Bool(x)) => {
                v.push(*x);
                true
            }
            (Values::Int32(v), _) => match int32(field) {
                Some(x) => {
                    v.push(x);
                    true
                }
                None => false,
            },
            (Values::Int64(v), _) => match int64(field) {
                Some(x) => {
                    v.push(x);
                    true
                }
                None => false,
            },
            (Values::Float(v), Field::Float(x)) => {
                v.push(*x);
                true
            }
            (Values::Double(v), Field::Double(x)) => {
                v.push(*x);
                true
            }
            (Values::Double(v), Field::Float(x)) => {
                v.push(f64::from(*x));
                true
            }
            (Values::Bytes(v), Field::Str(s)) => {
                v.push(ByteArray::from(s.as_str()));
                true
            }
            (Values::Bytes(v), Field::Bytes(b)) => {
                v.push(b.clone());
                true
            }
            _ => false,
        };
        if pushed {
            Ok(())
        } else {
            Err(FormatError::Encode(format!(
                "value {field} does not fit parquet column {column:?}"
            )))
        }
    }
}

fn int32(field: &Field) -> Option<i32> {
    match field {
        Field::Byte(x) => Some(i32::from(*x)),
        Field::Short(x) => Some(i32::from(*x)),
        Field::Int(x) | Field::Date(x) => Some(*x),
        Field::UByte(x) => Some(i32::from(*x)),
        Field::UShort(x) => Some(i32::from(*x)),
        Field::Long(x) => i32::try_from(*x).ok(),
        _ => None,
    }
}

fn int64(field: &Field) -> Option<i64> {
    match field {
        Field::Long(x) | Field::TimestampMillis(x) | Field::TimestampMicros(x) => Some(*x),
        Field::ULong(x) => i64::try_from(*x).ok(),
        Field::UInt(x) => Some(i64::from(*x)),
        other => int32(other).map(i64::from),
    }
}

struct ParquetEncoder<'a> {
    sink: &'a mut dyn Write,
    schema: Option<TypePtr>,
    columns: Vec<Column>,
    writer: Option<SerializedFileWriter<Vec<u8>>>,
    batch: Vec<Fields>,
    batch_size: usize,
}

impl ParquetEncoder<'_> {
    fn open(&mut self, schema: TypePtr) -> FormatResult<()> {
        self.columns = columns(&schema)?;
        let props = Arc::new(WriterProperties::builder().build());
        self.writer = Some(SerializedFileWriter::new(Vec::new(), schema, props).map_err(encode_error)?);
        Ok(())
    }

    fn flush_batch(&mut self) -> FormatResult<()> {
        if self.batch.is_empty() {
            return Ok(());
        }
        if self.writer.is_none() {
            let schema = match &self.schema {
                Some(schema) => Arc::clone(schema),
                None => infer_schema(&self.batch)?,
            };
            self.open(schema)?;
        }

        let rows: Vec<HashMap<&str, &Field>> = self
            .batch
            .iter()
            .map(|row| row.iter().map(|(k, v)| (k.as_str(), v)).collect())
            .collect();

        let mut columns = Vec::with_capacity(self.columns.len());
        for column in &self.columns {
            let mut values = Values::for_column(column)?;
            let mut levels = Vec::with_capacity(rows.len());
            for row in &rows {
                match row.get(column.name.as_str()) {
                    Some(field) if !matches!(field, Field::Null) => {
                        values.push(&column.name, field)?;
                        levels.push(1i16);
                    }
                    _ if column.optional => levels.push(0),
                    _ => {
                        return Err(FormatError::Encode(format!(
                            "parquet column {:?} is required",
                            column.name
                        )))
                    }
                }
            }
            let levels = if column.optional { Some(levels) } else { None };
            columns.push((values, levels));
        }

        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| FormatError::Encode("parquet writer is not open".into()))?;
        let mut group = writer.next_row_group().map_err(encode_error)?;
        for (values, levels) in &columns {
            let mut column = group
                .next_column()
                .map_err(encode_error)?
                .ok_or_else(|| FormatError::Encode("parquet schema has fewer columns".into()))?;
            let levels = levels.as_deref();
            let written = match (column.untyped(), values) {
                (ColumnWriter::BoolColumnWriter(w), Values::Bool(v)) => w.write_batch(v, levels, None),
                (ColumnWriter::Int32ColumnWriter(w), Values::Int32(v)) => w.write_batch(v, levels, None),
                (ColumnWriter::Int64ColumnWriter(w), Values::Int64(v)) => w.write_batch(v, levels, None),
                (ColumnWriter::FloatColumnWriter(w), Values::Float(v)) => w.write_batch(v, levels, None),
                (ColumnWriter::DoubleColumnWriter(w), Values::Double(v)) => w.write_batch(v, levels, None),
                (ColumnWriter::ByteArrayColumnWriter(w), Values::Bytes(v)) => w.write_batch(v, levels, None),
                _ => return Err(FormatError::Encode("parquet column writer mismatch".into())),
            };
            written.map_err(encode_error)?;
            column.close().map_err(encode_error)?;
        }
        group.close().map_err(encode_error)?;

        self.batch.clear();
        Ok(())
    }
}

impl Encoder for ParquetEncoder<'_> {
    fn encode(&mut self, record: &dyn Record) -> FormatResult<()> {
        self.batch.push(record.to_parquet()?);
        if self.batch.len() >= self.batch_size {
            self.flush_batch()?;
        }
        Ok(())
    }

    fn finish(mut self: Box<Self>) -> FormatResult<()> {
        self.flush_batch()?;
        if self.writer.is_none() {
            let schema = match &self.schema {
                Some(schema) => Arc::clone(schema),
                None => Arc::new(
                    Type::group_type_builder("feedx")
                        .with_fields(Vec::new())
                        .build()
                        .map_err(encode_error)?,
                ),
            };
            self.open(schema)?;
        }
        let writer = self
            .writer
            .take()
            .ok_or_else(|| FormatError::Encode("parquet writer is not open".into()))?;
        let data = writer.into_inner().map_err(encode_error)?;
        self.sink.write_all(&data)?;
        self.sink.flush()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Decoder
// ---------------------------------------------------------------------------

struct ParquetDecoder {
    rows: std::vec::IntoIter<Row>,
}

impl Decoder for ParquetDecoder {
    fn decode_into(&mut self, record: &mut dyn Record) -> FormatResult<bool> {
        match self.rows.next() {
            Some(row) => {
                record.merge_parquet(&row)?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    fn is_eof(&mut self) -> FormatResult<bool> {
        Ok(self.rows.len() == 0)
    }
}

// ---------------------------------------------------------------------------
// JSON bridge
// ---------------------------------------------------------------------------

/// Flatten a JSON object into column values.
pub fn fields_from_value(value: &Value) -> FormatResult<Fields> {
    let Value::Object(map) = value else {
        return Err(FormatError::Encode(format!(
            "parquet rows must be JSON objects, got {value}"
        )));
    };
    map.iter()
        .map(|(name, v)| {
            let field = match v {
                Value::Null => Field::Null,
                Value::Bool(b) => Field::Bool(*b),
                Value::Number(n) => match n.as_i64() {
                    Some(i) => Field::Long(i),
                    None => Field::Double(n.as_f64().unwrap_or(f64::NAN)),
                },
                Value::String(s) => Field::Str(s.clone()),
                Value::Array(_) | Value::Object(_) => {
                    return Err(FormatError::Encode(format!(
                        "nested value in {name:?} cannot be stored in a flat parquet row"
                    )))
                }
            };
            Ok((name.clone(), field))
        })
        .collect()
}

/// Convert a decoded row into a JSON object.
pub fn value_from_row(row: &Row) -> FormatResult<Value> {
    let mut map = Map::with_capacity(row.len());
    for (name, field) in row.get_column_iter() {
        let value = match field {
            Field::Null => Value::Null,
            Field::Bool(b) => Value::Bool(*b),
            Field::Byte(x) => Value::from(*x),
            Field::Short(x) => Value::from(*x),
            Field::Int(x) | Field::Date(x) => Value::from(*x),
            Field::Long(x) | Field::TimestampMillis(x) | Field::TimestampMicros(x) => {
                Value::from(*x)
            }
            Field::UByte(x) => Value::from(*x),
            Field::UShort(x) => Value::from(*x),
            Field::UInt(x) => Value::from(*x),
            Field::ULong(x) => Value::from(*x),
            Field::Float(x) => float(f64::from(*x)),
            Field::Double(x) => float(*x),
            Field::Str(s) => Value::String(s.clone()),
            Field::Bytes(b) => match b.as_utf8() {
                Ok(s) => Value::String(s.to_string()),
                Err(_) => Value::from(b.data().to_vec()),
            },
            other => {
                return Err(FormatError::Decode(format!(
                    "parquet value {other} in {name:?} has no JSON form"
                )))
            }
        };
        map.insert(name.clone(), value);
    }
    Ok(Value::Object(map))
}

fn float(x: f64) -> Value {
    Number::from_f64(x).map(Value::Number).unwrap_or(Value::Null)
}

/// Column values of a serde type, through its JSON form.
pub fn encode_serde<T: Serialize + ?Sized>(value: &T) -> FormatResult<Fields> {
    let value = serde_json::to_value(value).map_err(|e| FormatError::Encode(e.to_string()))?;
    fields_from_value(&value)
}

/// A serde type from a decoded row, through its JSON form.
pub fn decode_serde<T: DeserializeOwned>(row: &Row) -> FormatResult<T> {
    serde_json::from_value(value_from_row(row)?).map_err(|e| FormatError::Decode(e.to_string()))
}

fn encode_error(e: ParquetError) -> FormatError {
    FormatError::Encode(e.to_string())
}

fn decode_error(e: ParquetError) -> FormatError {
    FormatError::Decode(e.to_string())
}
