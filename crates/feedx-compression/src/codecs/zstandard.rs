use std::io::{Read, Write};

use ::zstd::stream::read::Decoder;
use ::zstd::stream::write::Encoder;

use crate::codec::{CompressWriter, CompressionCodec};
use crate::error::CompressionResult;

/// Zstandard compression.
#[derive(Clone, Copy, Debug)]
pub struct Zstd {
    level: i32,
}

impl Zstd {
    /// Zstd at the given level.
    pub fn with_level(level: i32) -> Self {
        Self { level }
    }
}

impl Default for Zstd {
    fn default() -> Self {
        Self { level: 3 }
    }
}

impl CompressionCodec for Zstd {
    fn name(&self) -> &str {
        "zstd"
    }

    fn reader<'a>(
        &self,
        source: Box<dyn Read + Send + 'a>,
    ) -> CompressionResult<Box<dyn Read + Send + 'a>> {
        Ok(Box::new(Decoder::new(source)?))
    }

    fn writer<'a>(
        &self,
        sink: &'a mut dyn Write,
    ) -> CompressionResult<Box<dyn CompressWriter + 'a>> {
        Ok(Box::new(Encoder::new(sink, self.level)?))
    }
}

impl<W: Write> CompressWriter for Encoder<'static, W> {
    fn finish(self: Box<Self>) -> CompressionResult<()> {
        let mut sink = Encoder::finish(*self)?;
        sink.flush()?;
        Ok(())
    }
}
