use std::fmt;
use std::io::{Read, Write};

use crate::error::FormatResult;
use crate::record::Record;

/// A wire format: turns byte streams into encoders and decoders.
///
/// Like compression codecs, the decoder owns its source and the encoder
/// borrows its sink.
pub trait FormatCodec: Send + Sync + fmt::Debug {
    /// Short name, e.g. `"json"`.
    fn name(&self) -> &str;

    fn encoder<'a>(&self, sink: &'a mut dyn Write) -> FormatResult<Box<dyn Encoder + 'a>>;

    fn decoder<'a>(
        &self,
        source: Box<dyn Read + Send + 'a>,
    ) -> FormatResult<Box<dyn Decoder + 'a>>;
}

/// Write half of a format layer.
pub trait Encoder {
    /// Serialize one record.
    fn encode(&mut self, record: &dyn Record) -> FormatResult<()>;

    /// Flush buffered output into the sink.
    fn finish(self: Box<Self>) -> FormatResult<()>;
}

/// Read half of a format layer.
pub trait Decoder: Send {
    /// Populate `record` from the next unit. Returns `false` at end of
    /// stream, leaving `record` untouched.
    fn decode_into(&mut self, record: &mut dyn Record) -> FormatResult<bool>;

    /// `true` once no further units remain. Does not consume a unit.
    fn is_eof(&mut self) -> FormatResult<bool>;

    /// Release the decoder and its source.
    fn close(self: Box<Self>) -> FormatResult<()> {
        Ok(())
    }
}

impl dyn Decoder + '_ {
    /// Decode the next unit into a fresh `T`, or `None` at end of stream.
    pub fn decode<T: Record + Default>(&mut self) -> FormatResult<Option<T>> {
        let mut record = T::default();
        if self.decode_into(&mut record)? {
            Ok(Some(record))
        } else {
            Ok(None)
        }
    }
}
