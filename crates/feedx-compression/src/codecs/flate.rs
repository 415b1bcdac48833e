use std::io::{Read, Write};

use flate2::read::DeflateDecoder;
use flate2::write::DeflateEncoder;
use flate2::Compression;

use crate::codec::{CompressWriter, CompressionCodec};
use crate::error::CompressionResult;

/// Raw DEFLATE (no zlib/gzip framing), tuned for speed.
#[derive(Clone, Copy, Debug, Default)]
pub struct Flate;

impl CompressionCodec for Flate {
    fn name(&self) -> &str {
        "flate"
    }

    fn reader<'a>(
        &self,
        source: Box<dyn Read + Send + 'a>,
    ) -> CompressionResult<Box<dyn Read + Send + 'a>> {
        Ok(Box::new(DeflateDecoder::new(source)))
    }

    fn writer<'a>(
        &self,
        sink: &'a mut dyn Write,
    ) -> CompressionResult<Box<dyn CompressWriter + 'a>> {
        Ok(Box::new(DeflateEncoder::new(sink, Compression::fast())))
    }
}

impl<W: Write> CompressWriter for DeflateEncoder<W> {
    fn finish(self: Box<Self>) -> CompressionResult<()> {
        let mut sink = DeflateEncoder::finish(*self)?;
        sink.flush()?;
        Ok(())
    }
}
