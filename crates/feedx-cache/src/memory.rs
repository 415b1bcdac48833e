//! In-memory cache for tests and single-process use.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::error::{CacheError, CacheResult};
use crate::traits::Cache;

/// A [`Cache`] backed by a `HashMap` behind a single `Mutex`.
///
/// Every operation, including the compute step of
/// [`Cache::fetch_with`], runs under the lock.
#[derive(Debug, Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> CacheResult<usize> {
        Ok(self.lock()?.len())
    }

    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.lock()?.is_empty())
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, HashMap<String, String>>> {
        self.entries.lock().map_err(|_| CacheError::Poisoned)
    }
}

impl Cache for MemoryCache {
    fn read(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> CacheResult<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn fetch_with(
        &self,
        key: &str,
        compute: &mut dyn FnMut() -> Option<String>,
    ) -> CacheResult<Option<String>> {
        let mut entries = self.lock()?;
        if let Some(value) = entries.get(key) {
            return Ok(Some(value.clone()));
        }
        let value = compute().filter(|v| !v.is_empty());
        if let Some(value) = &value {
            entries.insert(key.to_string(), value.clone());
        }
        Ok(value)
    }

    fn clear(&self) -> CacheResult<()> {
        self.lock()?.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::traits::CacheValue;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    // -----------------------------------------------------------------------
    // Basic operations
    // -----------------------------------------------------------------------

    #[test]
    fn read_write_clear() {
        let cache = MemoryCache::new();
        assert_eq!(cache.read("k").unwrap(), None);

        cache.write("k", "v").unwrap();
        assert_eq!(cache.read("k").unwrap().as_deref(), Some("v"));
        assert_eq!(cache.fetch("k").unwrap().as_deref(), Some("v"));
        assert_eq!(cache.len().unwrap(), 1);

        cache.clear().unwrap();
        assert!(cache.is_empty().unwrap());
        assert_eq!(cache.read("k").unwrap(), None);
    }

    #[test]
    fn fetch_with_stores_computed_value() {
        let cache = MemoryCache::new();
        let got = cache
            .fetch_with("k", &mut || Some("computed".to_string()))
            .unwrap();
        assert_eq!(got.as_deref(), Some("computed"));
        assert_eq!(cache.read("k").unwrap().as_deref(), Some("computed"));

        // Present values short-circuit the compute.
        let got = cache
            .fetch_with("k", &mut || panic!("must not compute"))
            .unwrap();
        assert_eq!(got.as_deref(), Some("computed"));
    }

    #[test]
    fn fetch_with_skips_empty_results() {
        let cache = MemoryCache::new();
        assert_eq!(cache.fetch_with("a", &mut || None).unwrap(), None);
        assert_eq!(
            cache.fetch_with("b", &mut || Some(String::new())).unwrap(),
            None
        );
        assert!(cache.is_empty().unwrap());
    }

    // -----------------------------------------------------------------------
    // Cache slots
    // -----------------------------------------------------------------------

    #[test]
    fn value_slot_and_version() {
        let cache = Arc::new(MemoryCache::new());
        let slot = CacheValue::new(cache.clone(), "feed");
        assert_eq!(slot.key(), "feed");
        assert_eq!(slot.version().unwrap(), 0);

        slot.write("33").unwrap();
        assert_eq!(slot.version().unwrap(), 33);
        assert_eq!(cache.read("feed").unwrap().as_deref(), Some("33"));

        slot.write("garbage").unwrap();
        assert_eq!(slot.version().unwrap(), 0);

        let other = CacheValue::new(cache, "other");
        assert_eq!(other.fetch_with(|| Some("1".into())).unwrap().as_deref(), Some("1"));
    }

    // -----------------------------------------------------------------------
    // Concurrency
    // -----------------------------------------------------------------------

    #[test]
    fn concurrent_misses_compute_once() {
        let cache = Arc::new(MemoryCache::new());
        let calls = Arc::new(AtomicUsize::new(0));

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let cache = Arc::clone(&cache);
                let calls = Arc::clone(&calls);
                std::thread::spawn(move || {
                    cache
                        .fetch_with("shared", &mut || {
                            calls.fetch_add(1, Ordering::SeqCst);
                            std::thread::sleep(std::time::Duration::from_millis(5));
                            Some("value".to_string())
                        })
                        .unwrap()
                })
            })
            .collect();

        for h in handles {
            assert_eq!(h.join().unwrap().as_deref(), Some("value"));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn concurrent_writers_and_clear() {
        let cache = Arc::new(MemoryCache::new());
        let handles: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        cache.write(&format!("{t}-{i}"), "x").unwrap();
                        if i % 25 == 0 {
                            cache.read(&format!("{t}-{i}")).unwrap();
                        }
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(cache.len().unwrap(), 400);
        cache.clear().unwrap();
        assert!(cache.is_empty().unwrap());
    }
}
