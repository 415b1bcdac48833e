//! A cache persisted as a JSON object on the local filesystem.

use std::collections::BTreeMap;
use std::fs;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use tempfile::NamedTempFile;
use tracing::debug;

use crate::error::{CacheError, CacheResult};
use crate::traits::Cache;

/// A [`Cache`] whose entries survive process restarts.
///
/// The whole map is held in memory and rewritten on every mutation through
/// a temporary file renamed over the target, so readers never observe a
/// partial file.
#[derive(Debug)]
pub struct FileCache {
    path: PathBuf,
    entries: Mutex<BTreeMap<String, String>>,
}

impl FileCache {
    /// Open the cache at `path`, loading existing entries. A missing file is
    /// an empty cache.
    pub fn open(path: impl Into<PathBuf>) -> CacheResult<Self> {
        let path = path.into();
        let entries = match fs::read(&path) {
            Ok(data) if data.is_empty() => BTreeMap::new(),
            Ok(data) => serde_json::from_slice(&data)
                .map_err(|e| CacheError::Serialization(format!("{}: {e}", path.display())))?,
            Err(e) if e.kind() == io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => return Err(e.into()),
        };
        debug!(path = %path.display(), entries = entries.len(), "opened file cache");
        Ok(Self {
            path,
            entries: Mutex::new(entries),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn lock(&self) -> CacheResult<MutexGuard<'_, BTreeMap<String, String>>> {
        self.entries.lock().map_err(|_| CacheError::Poisoned)
    }

    fn persist(&self, entries: &BTreeMap<String, String>) -> CacheResult<()> {
        let dir = match self.path.parent() {
            Some(p) if !p.as_os_str().is_empty() => p,
            _ => Path::new("."),
        };
        fs::create_dir_all(dir)?;
        let tmp = NamedTempFile::new_in(dir)?;
        let mut out = BufWriter::new(tmp);
        serde_json::to_writer_pretty(&mut out, entries)
            .map_err(|e| CacheError::Serialization(e.to_string()))?;
        let tmp = out.into_inner().map_err(|e| e.into_error())?;
        tmp.as_file().sync_all()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl Cache for FileCache {
    fn read(&self, key: &str) -> CacheResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> CacheResult<()> {
        let mut entries = self.lock()?;
        let mut next = entries.clone();
        next.insert(key.to_string(), value.to_string());
        self.persist(&next)?;
        *entries = next;
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
            let mut next = entries.clone();
            next.insert(key.to_string(), value.clone());
            self.persist(&next)?;
            *entries = next;
        }
        Ok(value)
    }

    fn clear(&self) -> CacheResult<()> {
        let mut entries = self.lock()?;
        self.persist(&BTreeMap::new())?;
        entries.clear();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn entries_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("markers.json");

        let cache = FileCache::open(&path).unwrap();
        assert_eq!(cache.read("feed").unwrap(), None);
        cache.write("feed", "42").unwrap();
        cache.fetch_with("other", &mut || Some("7".into())).unwrap();
        drop(cache);

        let cache = FileCache::open(&path).unwrap();
        assert_eq!(cache.read("feed").unwrap().as_deref(), Some("42"));
        assert_eq!(cache.read("other").unwrap().as_deref(), Some("7"));
    }

    #[test]
    fn clear_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/markers.json");

        let cache = FileCache::open(&path).unwrap();
        cache.write("feed", "1").unwrap();
        cache.clear().unwrap();

        let cache = FileCache::open(&path).unwrap();
        assert_eq!(cache.read("feed").unwrap(), None);
    }

    #[test]
    fn corrupt_file_is_serialization_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("markers.json");
        fs::write(&path, b"{not json").unwrap();
        assert!(matches!(
            FileCache::open(&path).unwrap_err(),
            CacheError::Serialization(_)
        ));
    }

    #[test]
    fn failed_persist_leaves_memory_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("markers.json");
        let cache = FileCache::open(&path).unwrap();
        cache.write("feed", "1").unwrap();

        // A directory at the target path makes the rename fail.
        fs::remove_file(&path).unwrap();
        fs::create_dir(&path).unwrap();

        assert!(cache.write("feed", "2").is_err());
        assert!(cache.fetch_with("other", &mut || Some("9".into())).is_err());
        assert!(cache.clear().is_err());

        assert_eq!(cache.read("feed").unwrap().as_deref(), Some("1"));
        assert_eq!(cache.read("other").unwrap(), None);
    }

    #[test]
    fn empty_compute_result_not_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("markers.json");
        let cache = FileCache::open(&path).unwrap();
        assert_eq!(cache.fetch_with("k", &mut || None).unwrap(), None);
        assert!(!path.exists());
    }
}
