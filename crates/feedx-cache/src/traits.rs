use std::fmt;
use std::sync::Arc;

use crate::error::CacheResult;

/// A string key/value store for version markers.
///
/// Implementations are shared across threads and must serialize every
/// operation. In particular, two concurrent [`Cache::fetch_with`] calls for
/// the same missing key must not both run their compute function.
pub trait Cache: Send + Sync + fmt::Debug {
    /// Read the value stored under `key`.
    fn read(&self, key: &str) -> CacheResult<Option<String>>;

    /// Store `value` under `key`.
    fn write(&self, key: &str, value: &str) -> CacheResult<()>;

    /// Read `key`; on a miss, run `compute` and store a non-empty result.
    fn fetch_with(
        &self,
        key: &str,
        compute: &mut dyn FnMut() -> Option<String>,
    ) -> CacheResult<Option<String>>;

    /// Remove all entries.
    fn clear(&self) -> CacheResult<()>;

    /// [`Cache::read`] under its fetch-without-compute name.
    fn fetch(&self, key: &str) -> CacheResult<Option<String>> {
        self.read(key)
    }
}

/// A cache slot bound to a single key.
#[derive(Clone, Debug)]
pub struct CacheValue {
    cache: Arc<dyn Cache>,
    key: String,
}

impl CacheValue {
    pub fn new(cache: Arc<dyn Cache>, key: impl Into<String>) -> Self {
        Self {
            cache,
            key: key.into(),
        }
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    pub fn cache(&self) -> &Arc<dyn Cache> {
        &self.cache
    }

    pub fn read(&self) -> CacheResult<Option<String>> {
        self.cache.read(&self.key)
    }

    pub fn write(&self, value: &str) -> CacheResult<()> {
        self.cache.write(&self.key, value)
    }

    pub fn fetch_with(
        &self,
        mut compute: impl FnMut() -> Option<String>,
    ) -> CacheResult<Option<String>> {
        self.cache.fetch_with(&self.key, &mut compute)
    }

    /// The stored value as a version marker. Absent or unparseable is 0.
    pub fn version(&self) -> CacheResult<u64> {
        Ok(self
            .read()?
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(0))
    }
}
