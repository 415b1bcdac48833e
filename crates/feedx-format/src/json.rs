//! Newline-delimited JSON: one compact document per line.

use std::io::{BufRead, BufReader, BufWriter, Read, Write};

use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::codec::{Decoder, Encoder, FormatCodec};
use crate::error::{FormatError, FormatResult};
use crate::record::Record;

/// Append the compact JSON form of `value` to `buf`.
pub fn encode_value<T: Serialize + ?Sized>(value: &T, buf: &mut Vec<u8>) -> FormatResult<()> {
    serde_json::to_writer(buf, value).map_err(|e| FormatError::Encode(e.to_string()))
}

/// Parse one JSON document.
pub fn decode_value<T: DeserializeOwned>(data: &[u8]) -> FormatResult<T> {
    serde_json::from_slice(data).map_err(|e| FormatError::Decode(e.to_string()))
}

/// The JSON-lines format.
#[derive(Clone, Copy, Debug, Default)]
pub struct JsonCodec;

impl FormatCodec for JsonCodec {
    fn name(&self) -> &str {
        "json"
    }

    fn encoder<'a>(&self, sink: &'a mut dyn Write) -> FormatResult<Box<dyn Encoder + 'a>> {
        Ok(Box::new(JsonEncoder {
            out: BufWriter::new(sink),
            buf: Vec::new(),
        }))
    }

    fn decoder<'a>(
        &self,
        source: Box<dyn Read + Send + 'a>,
    ) -> FormatResult<Box<dyn Decoder + 'a>> {
        Ok(Box::new(JsonDecoder {
            input: BufReader::new(source),
            line: Vec::new(),
        }))
    }
}

struct JsonEncoder<'a> {
    out: BufWriter<&'a mut dyn Write>,
    buf: Vec<u8>,
}

impl Encoder for JsonEncoder<'_> {
    fn encode(&mut self, record: &dyn Record) -> FormatResult<()> {
        self.buf.clear();
        record.to_json(&mut self.buf)?;
        self.buf.push(b'\n');
        self.out.write_all(&self.buf)?;
        Ok(())
    }

    fn finish(self: Box<Self>) -> FormatResult<()> {
        let sink = self.out.into_inner().map_err(|e| e.into_error())?;
        sink.flush()?;
        Ok(())
    }
}

struct JsonDecoder<'a> {
    input: BufReader<Box<dyn Read + Send + 'a>>,
    line: Vec<u8>,
}

impl Decoder for JsonDecoder<'_> {
    fn decode_into(&mut self, record: &mut dyn Record) -> FormatResult<bool> {
        loop {
            self.line.clear();
            if self.input.read_until(b'\n', &mut self.line)? == 0 {
                return Ok(false);
            }
            let doc = self.line.trim_ascii();
            if doc.is_empty() {
                continue;
            }
            record.merge_json(doc)?;
            return Ok(true);
        }
    }

    fn is_eof(&mut self) -> FormatResult<bool> {
        loop {
            let buf = self.input.fill_buf()?;
            if buf.is_empty() {
                return Ok(true);
            }
            let len = buf.len();
            let blank = buf.iter().take_while(|b| b.is_ascii_whitespace()).count();
            self.input.consume(blank);
            if blank < len {
                return Ok(false);
            }
        }
    }
}
