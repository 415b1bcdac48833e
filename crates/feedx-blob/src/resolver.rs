use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{BlobError, BlobResult};
use crate::fs::FileBlob;
use crate::traits::{Blob, Bucket};

/// Resolves blob URLs to handles by scheme.
///
/// `file://` URLs and bare paths always resolve to the local filesystem.
/// Other schemes must be mounted explicitly; there is no process-wide
/// registry.
#[derive(Clone, Default)]
pub struct Resolver {
    buckets: HashMap<String, Arc<dyn Bucket>>,
}

impl Resolver {
    /// A resolver that only understands local paths.
    pub fn new() -> Self {
        Self::default()
    }

    /// Route URLs with `scheme` to `bucket`. Replaces any previous mount.
    pub fn mount(mut self, scheme: &str, bucket: Arc<dyn Bucket>) -> Self {
        self.buckets.insert(scheme.to_ascii_lowercase(), bucket);
        self
    }

    /// Returns `true` if `scheme` is mounted.
    pub fn is_mounted(&self, scheme: &str) -> bool {
        self.buckets.contains_key(&scheme.to_ascii_lowercase())
    }

    /// Resolve `url` to a blob handle.
    pub fn resolve(&self, url: &str) -> BlobResult<Arc<dyn Blob>> {
        let Some((scheme, rest)) = url.split_once("://") else {
            if url.is_empty() {
                return Err(BlobError::InvalidUrl {
                    url: url.to_string(),
                    reason: "empty URL".into(),
                });
            }
            return Ok(Arc::new(FileBlob::new(url)));
        };

        let scheme = scheme.to_ascii_lowercase();
        if let Some(bucket) = self.buckets.get(&scheme) {
            return bucket.blob(rest);
        }
        if scheme == "file" {
            if rest.is_empty() {
                return Err(BlobError::InvalidUrl {
                    url: url.to_string(),
                    reason: "missing file path".into(),
                });
            }
            return Ok(Arc::new(FileBlob::new(rest)));
        }
        Err(BlobError::UnsupportedScheme(scheme))
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut schemes: Vec<&str> = self.buckets.keys().map(String::as_str).collect();
        schemes.sort_unstable();
        f.debug_struct("Resolver").field("schemes", &schemes).finish()
    }
}
