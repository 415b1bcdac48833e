use feedx_blob::{CreateOptions, Metadata};
use feedx_compression::{CompressionRegistry, CompressionSelector};
use feedx_format::{FormatRegistry, FormatSelector};
use serde::{Deserialize, Serialize};

/// Caller-facing stream options.
///
/// Unset `format`/`compression` mean "detect from the blob path". An empty
/// `compression` string selects no compression. `metadata` is stored with
/// every blob the stream creates.
///
/// Loadable from any serde source:
///
/// ```toml
/// format = "json"
/// compression = "gzip"
///
/// [metadata]
/// owner = "catalog"
/// ```
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FeedOptions {
    pub format: Option<String>,
    pub compression: Option<String>,
    pub metadata: Metadata,
}

impl FeedOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_compression(mut self, compression: impl Into<String>) -> Self {
        self.compression = Some(compression.into());
        self
    }

    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn format_selector(&self) -> FormatSelector {
        self.format.clone().into()
    }

    pub fn compression_selector(&self) -> CompressionSelector {
        self.compression.clone().into()
    }

    pub fn create_options(&self) -> CreateOptions {
        CreateOptions {
            metadata: self.metadata.clone(),
        }
    }
}

/// The registries a stream resolves codecs against.
#[derive(Clone, Debug, Default)]
pub struct Codecs {
    pub formats: FormatRegistry,
    pub compressions: CompressionRegistry,
}
