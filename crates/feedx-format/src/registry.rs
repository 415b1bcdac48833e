use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use feedx_blob::path::{base_name, split_extension};
use tracing::debug;

use crate::codec::FormatCodec;
use crate::columnar::ParquetCodec;
use crate::error::{FormatError, FormatResult};
use crate::json::JsonCodec;
use crate::protobuf::ProtobufCodec;

/// How a stream picks its format codec.
#[derive(Clone, Debug, Default)]
pub enum FormatSelector {
    /// Infer from the blob path.
    #[default]
    Detect,
    /// Resolve a registered name such as `"json"`.
    Named(String),
    /// Use this codec as-is.
    Codec(Arc<dyn FormatCodec>),
}

impl From<Option<String>> for FormatSelector {
    fn from(name: Option<String>) -> Self {
        match name {
            Some(name) => Self::Named(name),
            None => Self::Detect,
        }
    }
}

impl From<&str> for FormatSelector {
    fn from(name: &str) -> Self {
        Self::Named(name.to_string())
    }
}

impl From<Arc<dyn FormatCodec>> for FormatSelector {
    fn from(codec: Arc<dyn FormatCodec>) -> Self {
        Self::Codec(codec)
    }
}

/// Maps names and file extensions to format codecs.
///
/// Built in: `json`, `jsonl`, `ndjson` for [`JsonCodec`], `pb`, `proto`,
/// `protobuf` for [`ProtobufCodec`] and `parquet` for a schema-inferring
/// [`ParquetCodec`]. Register a configured `ParquetCodec` to pin a schema.
#[derive(Clone)]
pub struct FormatRegistry {
    codecs: HashMap<String, Arc<dyn FormatCodec>>,
}

impl FormatRegistry {
    /// A registry holding only the built-in codecs.
    pub fn new() -> Self {
        let json: Arc<dyn FormatCodec> = Arc::new(JsonCodec);
        let protobuf: Arc<dyn FormatCodec> = Arc::new(ProtobufCodec);

        let mut codecs = HashMap::new();
        for ext in ["json", "jsonl", "ndjson"] {
            codecs.insert(ext.to_string(), Arc::clone(&json));
        }
        for ext in ["pb", "proto", "protobuf"] {
            codecs.insert(ext.to_string(), Arc::clone(&protobuf));
        }
        codecs.insert("parquet".to_string(), Arc::new(ParquetCodec::new()) as Arc<dyn FormatCodec>);
        Self { codecs }
    }

    /// Look up a codec by exact name.
    pub fn resolve(&self, name: &str) -> FormatResult<Arc<dyn FormatCodec>> {
        self.codecs
            .get(name)
            .cloned()
            .ok_or_else(|| FormatError::UnknownCodec(name.to_string()))
    }

    /// Infer the codec from the extensions of `path`.
    ///
    /// Extensions are stripped right to left. Each one is tried verbatim,
    /// then with its last character dropped, so `file.jsonz`, `file.json.gz`
    /// and `file.pb.z` all find their format.
    pub fn detect(&self, path: &str) -> FormatResult<Arc<dyn FormatCodec>> {
        let mut name = base_name(path);
        while let Some((stem, ext)) = split_extension(name) {
            if let Some(codec) = self.codecs.get(ext) {
                return Ok(Arc::clone(codec));
            }
            let mut chars = ext.chars();
            chars.next_back();
            let shortened = chars.as_str();
            if !shortened.is_empty() {
                if let Some(codec) = self.codecs.get(shortened) {
                    return Ok(Arc::clone(codec));
                }
            }
            name = stem;
        }
        Err(FormatError::FormatUndetectable(path.to_string()))
    }

    /// Add or replace the codec for `extension`.
    pub fn register(&mut self, extension: &str, codec: Arc<dyn FormatCodec>) -> FormatResult<()> {
        if extension.is_empty() || extension.contains(['.', '/']) {
            return Err(FormatError::InvalidCodec {
                name: extension.to_string(),
                reason: "extension must be non-empty without '.' or '/'".into(),
            });
        }
        validate_codec(codec.as_ref())?;
        debug!(extension, codec = codec.name(), "registered format codec");
        self.codecs.insert(extension.to_string(), codec);
        Ok(())
    }

    /// Pick a codec for a stream at `path`.
    pub fn select(&self, selector: &FormatSelector, path: &str) -> FormatResult<Arc<dyn FormatCodec>> {
        match selector {
            FormatSelector::Detect => self.detect(path),
            FormatSelector::Named(name) => self.resolve(name),
            FormatSelector::Codec(codec) => {
                validate_codec(codec.as_ref())?;
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

impl Default for FormatRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for FormatRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormatRegistry")
            .field("extensions", &self.extensions())
            .finish()
    }
}

fn validate_codec(codec: &dyn FormatCodec) -> FormatResult<()> {
    if codec.name().is_empty() {
        return Err(FormatError::InvalidCodec {
            name: format!("{codec:?}"),
            reason: "codec reports an empty name".into(),
        });
    }
    Ok(())
}
