use std::io::{Read, Write};

use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;

use crate::codec::{CompressWriter, CompressionCodec};
use crate::error::CompressionResult;

/// Gzip compression via `flate2`.
///
/// The reader accepts concatenated gzip members.
#[derive(Clone, Copy, Debug)]
pub struct Gzip {
    level: Compression,
}

impl Gzip {
    /// Gzip at the given level (0-9).
    pub fn with_level(level: u32) -> Self {
        Self {
            level: Compression::new(level.min(9)),
        }
    }
}

impl Default for Gzip {
    fn default() -> Self {
        Self {
            level: Compression::default(),
        }
    }
}

impl CompressionCodec for Gzip {
    fn name(&self) -> &str {
        "gzip"
    }

    fn reader<'a>(
        &self,
        source: Box<dyn Read + Send + 'a>,
    ) -> CompressionResult<Box<dyn Read + Send + 'a>> {
        Ok(Box::new(MultiGzDecoder::new(source)))
    }

    fn writer<'a>(
        &self,
        sink: &'a mut dyn Write,
    ) -> CompressionResult<Box<dyn CompressWriter + 'a>> {
        Ok(Box::new(GzEncoder::new(sink, self.level)))
    }
}

impl<W: Write> CompressWriter for GzEncoder<W> {
    fn finish(self: Box<Self>) -> CompressionResult<()> {
        let mut sink = GzEncoder::finish(*self)?;
        sink.flush()?;
        Ok(())
    }
}
