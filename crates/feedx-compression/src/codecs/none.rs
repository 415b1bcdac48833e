use std::io::{self, Read, Write};

use crate::codec::{CompressWriter, CompressionCodec};
use crate::error::CompressionResult;

/// Pass-through codec.
#[derive(Clone, Copy, Debug, Default)]
pub struct NoCompression;

impl CompressionCodec for NoCompression {
    fn name(&self) -> &str {
        "none"
    }

    fn reader<'a>(
        &self,
        source: Box<dyn Read + Send + 'a>,
    ) -> CompressionResult<Box<dyn Read + Send + 'a>> {
        Ok(source)
    }

    fn writer<'a>(
        &self,
        sink: &'a mut dyn Write,
    ) -> CompressionResult<Box<dyn CompressWriter + 'a>> {
        Ok(Box::new(Passthrough { sink }))
    }
}

struct Passthrough<'a> {
    sink: &'a mut dyn Write,
}

impl Write for Passthrough<'_> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.sink.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.sink.flush()
    }
}

impl CompressWriter for Passthrough<'_> {
    fn finish(self: Box<Self>) -> CompressionResult<()> {
        self.sink.flush()?;
        Ok(())
    }
}
