use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use feedx_blob::path::{base_name, split_extension};
use tracing::debug;

use crate::codec::CompressionCodec;
use crate::codecs::{Flate, Gzip, NoCompression, Zstd};
use crate::error::{CompressionError, CompressionResult};

/// How a stream picks its compression codec.
#[derive(Clone, Debug, Default)]
pub enum CompressionSelector {
    /// Infer from the blob path.
    #[default]
    Detect,
    /// Resolve a registered name such as `"gzip"` or `""`.
    Named(String),
    /// Use this codec as-is.
    Codec(Arc<dyn CompressionCodec>),
}

impl From<Option<String>> for CompressionSelector {
    fn from(name: Option<String>) -> Self {
        match name {
            Some(name) => Self::Named(name),
            None => Self::Detect,
        }
    }
}

impl From<&str> for CompressionSelector {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<Arc<dyn CompressionCodec>> for CompressionSelector {
    fn from(codec: Arc<dyn CompressionCodec>) -> Self {
        Self::Codec(codec)
    }
}

/// Maps names and file extensions to compression codecs.
///
/// [`CompressionRegistry::default`] knows the built-in codecs:
///
/// | keys               | codec             |
/// |--------------------|-------------------|
/// | `""`, `none`       | [`NoCompression`] |
/// | `gz`, `gzip`       | [`Gzip`]          |
/// | `flate`, `deflate` | [`Flate`]         |
/// | `zst`, `zstd`      | [`Zstd`]          |
#[derive(Clone)]
pub struct CompressionRegistry {
    codecs: HashMap<String, Arc<dyn CompressionCodec>>,
    identity: Arc<dyn CompressionCodec>,
    gzip: Arc<dyn CompressionCodec>,
}

impl CompressionRegistry {
    /// A registry holding only the built-in codecs.
    pub fn new() -> Self {
        let identity: Arc<dyn CompressionCodec> = Arc::new(NoCompression);
        let gzip: Arc<dyn CompressionCodec> = Arc::new(Gzip::default());
        let flate: Arc<dyn CompressionCodec> = Arc::new(Flate);
        let zstd: Arc<dyn CompressionCodec> = Arc::new(Zstd::default());

        let mut codecs = HashMap::new();
        for (key, codec) in [
            ("", &identity),
            ("none", &identity),
            ("gz", &gzip),
            ("gzip", &gzip),
            ("flate", &flate),
            ("deflate", &flate),
            ("zst", &zstd),
            ("zstd", &zstd),
        ] {
            codecs.insert(key.to_string(), Arc::clone(codec));
        }

        Self {
            codecs,
            identity,
            gzip,
        }
    }

    /// Look up a codec by exact name.
    pub fn resolve(&self, name: &str) -> CompressionResult<Arc<dyn CompressionCodec>> {
        self.codecs
            .get(name)
            .cloned()
            .ok_or_else(|| CompressionError::UnknownCodec(name.to_string()))
    }

    /// Infer the codec from the rightmost extension of `path`.
    ///
    /// A registered extension wins; otherwise any extension ending in `z`
    /// (`.jsonz`, `.pbz`, `.z`) means gzip. Everything else is uncompressed.
    /// Detection never fails.
    pub fn detect(&self, path: &str) -> Arc<dyn CompressionCodec> {
        let Some((_, ext)) = split_extension(base_name(path)) else {
            return Arc::clone(&self.identity);
        };
        if let Some(codec) = self.codecs.get(ext) {
            return Arc::clone(codec);
        }
        if ext.ends_with('z') {
            return Arc::clone(&self.gzip);
        }
        Arc::clone(&self.identity)
    }

    /// Add or replace the codec for `extension`.
    pub fn register(
        &mut self,
        extension: &str,
        codec: Arc<dyn CompressionCodec>,
    ) -> CompressionResult<()> {
        validate_extension(extension)?;
        if codec.name().is_empty() {
            return Err(CompressionError::InvalidCodec {
                name: extension.to_string(),
                reason: "codec reports an empty name".into(),
            });
        }
        debug!(extension, codec = codec.name(), "registered compression codec");
        self.codecs.insert(extension.to_string(), codec);
        Ok(())
    }

    /// Pick a codec for a stream at `path`.
    pub fn select(
        &self,
        selector: &CompressionSelector,
        path: &str,
    ) -> CompressionResult<Arc<dyn CompressionCodec>> {
        match selector {
            CompressionSelector::Detect => Ok(self.detect(path)),
            CompressionSelector::Named(name) => self.resolve(name),
            CompressionSelector::Codec(codec) => {
                if codec.name().is_empty() {
                    return Err(CompressionError::InvalidCodec {
                        name: format!("{codec:?}"),
                        reason: "codec reports an empty name".into(),
                    });
                }
                Ok(Arc::clone(codec))
            }
        }
    }

    /// Registered keys, sorted.
    pub fn extensions(&self) -> Vec<&str> {
        let mut keys: Vec<&str> = self.codecs.keys().map(String::as_str).collect();
        keys.sort_unstable();
        keys
    }
}

impl Default for CompressionRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for CompressionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressionRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}

fn validate_extension(extension: &str) -> CompressionResult<()> {
    let reason = if extension.is_empty() {
        "extension must not be empty"
    } else if extension.contains(['.', '/']) {
        "extension must not contain '.' or '/'"
    } else {
        return Ok(());
    };
    Err(CompressionError::InvalidCodec {
        name: extension.to_string(),
        reason: reason.into(),
    })
}
