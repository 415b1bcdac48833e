//! Length-delimited protobuf: each message is preceded by its byte length
//! as a base-128 varint.

use std::io::{BufRead, BufReader, BufWriter, Read, Write};

use prost::Message;

use crate::codec::{Decoder, Encoder, FormatCodec};
use crate::error::{FormatError, FormatResult};
use crate::record::Record;

/// Append the encoding of `message` to `buf`.
pub fn encode_message<M: Message>(message: &M, buf: &mut Vec<u8>) -> FormatResult<()> {
    message
        .encode(buf)
        .map_err(|e| FormatError::Encode(e.to_string()))
}

/// Decode one message body.
pub fn decode_message<M: Message + Default>(data: &[u8]) -> FormatResult<M> {
    M::decode(data).map_err(|e| FormatError::Decode(e.to_string()))
}

/// The delimited protobuf format.
#[derive(Clone, Copy, Debug, Default)]
pub struct ProtobufCodec;

impl FormatCodec for ProtobufCodec {
    fn name(&self) -> &str {
        "protobuf"
    }

    fn encoder<'a>(&self, sink: &'a mut dyn Write) -> FormatResult<Box<dyn Encoder + 'a>> {
        Ok(Box::new(ProtobufEncoder {
            out: BufWriter::new(sink),
            prefix: Vec::with_capacity(10),
            buf: Vec::new(),
        }))
    }

    fn decoder<'a>(
        &self,
        source: Box<dyn Read + Send + 'a>,
    ) -> FormatResult<Box<dyn Decoder + 'a>> {
        Ok(Box::new(ProtobufDecoder {
            input: BufReader::new(source),
            buf: Vec::new(),
        }))
    }
}

struct ProtobufEncoder<'a> {
    out: BufWriter<&'a mut dyn Write>,
    prefix: Vec<u8>,
    buf: Vec<u8>,
}

impl Encoder for ProtobufEncoder<'_> {
    fn encode(&mut self, record: &dyn Record) -> FormatResult<()> {
        self.buf.clear();
        record.to_protobuf(&mut self.buf)?;
        self.prefix.clear();
        prost::encoding::encode_varint(self.buf.len() as u64, &mut self.prefix);
        self.out.write_all(&self.prefix)?;
        self.out.write_all(&self.buf)?;
        Ok(())
    }

    fn finish(self: Box<Self>) -> FormatResult<()> {
        let sink = self.out.into_inner().map_err(|e| e.into_error())?;
        sink.flush()?;
        Ok(())
    }
}

struct ProtobufDecoder<'a> {
    input: BufReader<Box<dyn Read + Send + 'a>>,
    buf: Vec<u8>,
}

impl ProtobufDecoder<'_> {
    /// Read a length prefix. `None` on a clean end of stream.
    fn read_length(&mut self) -> FormatResult<Option<u64>> {
        let mut value: u64 = 0;
        let mut shift = 0;
        loop {
            let mut byte = [0u8; 1];
            if self.input.read(&mut byte)? == 0 {
                if shift == 0 {
                    return Ok(None);
                }
                return Err(FormatError::Decode("truncated length prefix".into()));
            }
            value |= ((byte[0] & 0x7F) as u64) << shift;
            shift += 7;
            if byte[0] & 0x80 == 0 {
                return Ok(Some(value));
            }
            if shift >= 64 {
                return Err(FormatError::Decode("length prefix overflow".into()));
            }
        }
    }
}

impl Decoder for ProtobufDecoder<'_> {
    fn decode_into(&mut self, record: &mut dyn Record) -> FormatResult<bool> {
        let Some(len) = self.read_length()? else {
            return Ok(false);
        };
        self.buf.clear();
        let read = (&mut self.input).take(len).read_to_end(&mut self.buf)?;
        if (read as u64) < len {
            return Err(FormatError::Decode(format!(
                "truncated message: expected {len} bytes, got {read}"
            )));
        }
        record.merge_protobuf(&self.buf)?;
        Ok(true)
    }

    fn is_eof(&mut self) -> FormatResult<bool> {
        Ok(self.input.fill_buf()?.is_empty())
    }
}
