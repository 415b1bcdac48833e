//! Layered access to a single feed blob.
//!
//! Reading composes blob → compression → format. Writing composes the same
//! layers in the other direction. Every layer is released on every exit
//! path, innermost (format) first.

use std::fmt;
use std::sync::Arc;

use feedx_blob::{Blob, BlobInfo, BlobWriter, CreateOptions, Metadata, Resolver};
use feedx_compression::{CompressionCodec, CompressionSelector};
use feedx_format::{Decoder, Encoder, FormatCodec, FormatSelector};
use tracing::{debug, warn};

use crate::error::{FeedError, FeedResult};
use crate::options::{Codecs, FeedOptions};

/// A blob paired with its resolved compression and format codecs.
///
/// The codecs are fixed at construction. Cloning shares the blob handle.
#[derive(Clone)]
pub struct Stream {
    blob: Arc<dyn Blob>,
    format: Arc<dyn FormatCodec>,
    compression: Arc<dyn CompressionCodec>,
    metadata: Metadata,
}

impl Stream {
    /// Build a stream over `blob`, resolving codecs from `options` against
    /// the built-in registries.
    pub fn new(blob: Arc<dyn Blob>, options: &FeedOptions) -> FeedResult<Self> {
        let stream = Self::with_selectors(
            blob,
            &Codecs::default(),
            &options.format_selector(),
            &options.compression_selector(),
        )?;
        Ok(stream.with_metadata(options.metadata.clone()))
    }

    /// Build a stream with explicit selectors and registries.
    pub fn with_selectors(
        blob: Arc<dyn Blob>,
        codecs: &Codecs,
        format: &FormatSelector,
        compression: &CompressionSelector,
    ) -> FeedResult<Self> {
        let format = codecs.formats.select(format, blob.path())?;
        let compression = codecs.compressions.select(compression, blob.path())?;
        debug!(
            url = blob.url(),
            format = format.name(),
            compression = compression.name(),
            "resolved stream codecs"
        );
        Ok(Self {
            blob,
            format,
            compression,
            metadata: Metadata::new(),
        })
    }

    /// Metadata stored with every blob this stream creates.
    pub fn with_metadata(mut self, metadata: Metadata) -> Self {
        self.metadata = metadata;
        self
    }

    pub fn metadata(&self) -> &Metadata {
        &self.metadata
    }

    /// Resolve `url` and build a stream over it.
    pub fn from_url(resolver: &Resolver, url: &str, options: &FeedOptions) -> FeedResult<Self> {
        Self::new(resolver.resolve(url)?, options)
    }

    pub fn blob(&self) -> &Arc<dyn Blob> {
        &self.blob
    }

    pub fn url(&self) -> &str {
        self.blob.url()
    }

    pub fn format(&self) -> &Arc<dyn FormatCodec> {
        &self.format
    }

    pub fn compression(&self) -> &Arc<dyn CompressionCodec> {
        &self.compression
    }

    /// Size and metadata of the stored blob.
    pub fn info(&self) -> FeedResult<BlobInfo> {
        Ok(self.blob.info()?)
    }

    /// Open the feed and hand its decoder to `f`.
    ///
    /// The decoder and everything beneath it are released before this
    /// returns, whether `f` succeeds or not. An error from `f` wins over a
    /// release error, which is then only logged.
    pub fn open<T>(&self, f: impl FnOnce(&mut dyn Decoder) -> FeedResult<T>) -> FeedResult<T> {
        let mut decoder = self.decoder()?;
        let result = f(decoder.as_mut());
        settle(result, decoder.close().map_err(|e| FeedError::release("format", e)))
    }

    /// Open the feed and return the composed decoder.
    ///
    /// The decoder owns the compression reader and the blob reader beneath
    /// it. Closing or dropping it releases all three in order.
    pub fn decoder(&self) -> FeedResult<Box<dyn Decoder>> {
        let source = self.blob.open()?;
        debug!(url = self.blob.url(), "opened blob for reading");
        let source = self.compression.reader(source)?;
        Ok(self.format.decoder(source)?)
    }

    /// Create (or replace) the feed, handing an encoder to `f`.
    ///
    /// `options.metadata` is layered over the stream's own metadata. The
    /// blob is published only if `f` and every layer release succeed.
    /// Otherwise the partial write is discarded and any previous content
    /// stays in place.
    pub fn create<T>(
        &self,
        options: &CreateOptions,
        f: impl FnOnce(&mut dyn Encoder) -> FeedResult<T>,
    ) -> FeedResult<T> {
        let mut metadata = self.metadata.clone();
        metadata.extend(options.metadata.clone());
        let mut writer = self.blob.create(&CreateOptions { metadata })?;
        debug!(url = self.blob.url(), "created blob writer");

        match self.write_layers(&mut writer, f) {
            Ok(value) => {
                writer
                    .commit()
                    .map_err(|e| FeedError::release("blob", e))?;
                debug!(url = self.blob.url(), "committed blob");
                Ok(value)
            }
            Err(err) => {
                drop(writer);
                debug!(url = self.blob.url(), error = %err, "discarded partial blob");
                Err(err)
            }
        }
    }

    fn write_layers<T>(
        &self,
        sink: &mut Box<dyn BlobWriter>,
        f: impl FnOnce(&mut dyn Encoder) -> FeedResult<T>,
    ) -> FeedResult<T> {
        let mut compressor = self.compression.writer(sink)?;
        let result = match self.format.encoder(&mut compressor) {
            Ok(mut encoder) => {
                let result = f(encoder.as_mut());
                settle(result, encoder.finish().map_err(|e| FeedError::release("format", e)))
            }
            Err(e) => Err(e.into()),
        };
        settle(
            result,
            compressor
                .finish()
                .map_err(|e| FeedError::release("compression", e)),
        )
    }

    /// Release any connection-level resource held by the blob handle.
    pub fn close(&self) -> FeedResult<()> {
        Ok(self.blob.close()?)
    }
}

impl fmt::Debug for Stream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Stream")
            .field("url", &self.blob.url())
            .field("format", &self.format.name())
            .field("compression", &self.compression.name())
            .finish()
    }
}

/// Combine the outcome of a scope with the outcome of releasing it.
///
/// The scope's own error always wins; a release error behind it is logged.
pub(crate) fn settle<T>(result: FeedResult<T>, released: FeedResult<()>) -> FeedResult<T> {
    match (result, released) {
        (Ok(value), Ok(())) => Ok(value),
        (Ok(_), Err(err)) => Err(err),
        (Err(err), Ok(())) => Err(err),
        (Err(err), Err(release)) => {
            warn!(error = %release, "release failed while unwinding");
            Err(err)
        }
    }
}
