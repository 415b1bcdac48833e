use std::fmt;
use std::io::{Read, Write};

use crate::error::CompressionResult;

/// A pluggable compression layer between a blob and a format codec.
///
/// The read side takes ownership of the source so the composed stream can
/// outlive the call that opened it. The write side borrows the sink: the
/// caller needs it back after [`CompressWriter::finish`] to commit the blob.
pub trait CompressionCodec: Send + Sync + fmt::Debug {
    /// Short name, e.g. `"gzip"`.
    fn name(&self) -> &str;

    /// Wrap `source` with a decompressing reader.
    fn reader<'a>(
        &self,
        source: Box<dyn Read + Send + 'a>,
    ) -> CompressionResult<Box<dyn Read + Send + 'a>>;

    /// Wrap `sink` with a compressing writer.
    fn writer<'a>(&self, sink: &'a mut dyn Write)
        -> CompressionResult<Box<dyn CompressWriter + 'a>>;
}

/// Write half of a compression layer.
pub trait CompressWriter: Write {
    /// Write the codec trailer and flush everything into the wrapped sink.
    fn finish(self: Box<Self>) -> CompressionResult<()>;
}
