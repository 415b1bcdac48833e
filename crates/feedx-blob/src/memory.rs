use std::collections::HashMap;
use std::fmt;
use std::io::{Cursor, Read, Write};
use std::sync::{Arc, RwLock};

use tracing::debug;

use crate::error::{BlobError, BlobResult};
use crate::traits::{Blob, BlobInfo, BlobWriter, Bucket, CreateOptions, Metadata};

#[derive(Clone, Debug)]
struct StoredBlob {
    data: Arc<[u8]>,
    metadata: Metadata,
}

type Objects = Arc<RwLock<HashMap<String, StoredBlob>>>;

/// In-memory, HashMap-based bucket.
///
/// Intended for tests and embedding. Clones share the same underlying
/// storage, so a bucket handed to a resolver can still be inspected by the
/// test that created it.
#[derive(Clone, Default)]
pub struct MemoryBucket {
    objects: Objects,
}

impl MemoryBucket {
    /// Create a new empty bucket.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of blobs currently stored.
    pub fn len(&self) -> usize {
        self.objects.read().map(|m| m.len()).unwrap_or(0)
    }

    /// Returns `true` if the bucket holds no blobs.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns `true` if a blob is stored at `path`.
    pub fn contains(&self, path: &str) -> bool {
        let key = normalize(path);
        self.objects
            .read()
            .map(|m| m.contains_key(&key))
            .unwrap_or(false)
    }

    /// Raw content of the blob at `path`.
    pub fn read_all(&self, path: &str) -> BlobResult<Vec<u8>> {
        let key = normalize(path);
        let map = self.objects.read().map_err(|_| BlobError::Poisoned)?;
        map.get(&key)
            .map(|b| b.data.to_vec())
            .ok_or_else(|| BlobError::NotFound(key))
    }

    /// Store raw content at `path`, bypassing the writer protocol.
    pub fn put(&self, path: &str, data: &[u8], metadata: Metadata) -> BlobResult<()> {
        let mut map = self.objects.write().map_err(|_| BlobError::Poisoned)?;
        map.insert(
            normalize(path),
            StoredBlob {
                data: Arc::from(data),
                metadata,
            },
        );
        Ok(())
    }

    /// Remove the blob at `path`. Returns `true` if it existed.
    pub fn remove(&self, path: &str) -> BlobResult<bool> {
        let mut map = self.objects.write().map_err(|_| BlobError::Poisoned)?;
        Ok(map.remove(&normalize(path)).is_some())
    }

    /// Remove all blobs.
    pub fn clear(&self) -> BlobResult<()> {
        self.objects
            .write()
            .map_err(|_| BlobError::Poisoned)?
            .clear();
        Ok(())
    }
}

impl Bucket for MemoryBucket {
    fn blob(&self, path: &str) -> BlobResult<Arc<dyn Blob>> {
        let key = normalize(path);
        if key.is_empty() {
            return Err(BlobError::InvalidUrl {
                url: path.to_string(),
                reason: "empty blob path".into(),
            });
        }
        Ok(Arc::new(MemoryBlob {
            url: format!("mem:///{key}"),
            key,
            objects: Arc::clone(&self.objects),
        }))
    }
}

impl fmt::Debug for MemoryBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBucket")
            .field("blob_count", &self.len())
            .finish()
    }
}

/// A blob inside a [`MemoryBucket`].
pub struct MemoryBlob {
    url: String,
    key: String,
    objects: Objects,
}

impl Blob for MemoryBlob {
    fn url(&self) -> &str {
        &self.url
    }

    fn path(&self) -> &str {
        &self.key
    }

    fn open(&self) -> BlobResult<Box<dyn Read + Send>> {
        let map = self.objects.read().map_err(|_| BlobError::Poisoned)?;
        let stored = map
            .get(&self.key)
            .ok_or_else(|| BlobError::NotFound(self.url.clone()))?;
        Ok(Box::new(Cursor::new(Arc::clone(&stored.data))))
    }

    fn create(&self, options: &CreateOptions) -> BlobResult<Box<dyn BlobWriter>> {
        Ok(Box::new(MemoryWriter {
            key: self.key.clone(),
            objects: Arc::clone(&self.objects),
            metadata: options.metadata.clone(),
            buf: Vec::new(),
        }))
    }

    fn info(&self) -> BlobResult<BlobInfo> {
        let map = self.objects.read().map_err(|_| BlobError::Poisoned)?;
        let stored = map
            .get(&self.key)
            .ok_or_else(|| BlobError::NotFound(self.url.clone()))?;
        Ok(BlobInfo {
            size: stored.data.len() as u64,
            metadata: stored.metadata.clone(),
        })
    }
}

impl fmt::Debug for MemoryBlob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MemoryBlob").field("url", &self.url).finish()
    }
}

struct MemoryWriter {
    key: String,
    objects: Objects,
    metadata: Metadata,
    buf: Vec<u8>,
}

impl Write for MemoryWriter {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.buf.extend_from_slice(data);
        Ok(data.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

impl BlobWriter for MemoryWriter {
    fn commit(self: Box<Self>) -> BlobResult<()> {
        let MemoryWriter {
            key,
            objects,
            metadata,
            buf,
        } = *self;
        let size = buf.len();
        let mut map = objects.write().map_err(|_| BlobError::Poisoned)?;
        map.insert(
            key.clone(),
            StoredBlob {
                data: Arc::from(buf),
                metadata,
            },
        );
        debug!(key = %key, size, "memory blob committed");
        Ok(())
    }
}

fn normalize(path: &str) -> String {
    path.trim_start_matches('/').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_blob(blob: &dyn Blob, data: &[u8], options: &CreateOptions) {
        let mut w = blob.create(options).unwrap();
        w.write_all(data).unwrap();
        w.commit().unwrap();
    }

    // -----------------------------------------------------------------------
    // Create / open / info
    // -----------------------------------------------------------------------

    #[test]
    fn create_then_read() {
        let bucket = MemoryBucket::new();
        let blob = bucket.blob("dir/file.json").unwrap();
        write_blob(blob.as_ref(), b"hello", &CreateOptions::default());

        let mut out = String::new();
        blob.open().unwrap().read_to_string(&mut out).unwrap();
        assert_eq!(out, "hello");
        assert_eq!(bucket.read_all("dir/file.json").unwrap(), b"hello");
    }

    #[test]
    fn info_reports_size_and_metadata() {
        let bucket = MemoryBucket::new();
        let blob = bucket.blob("/dir/file.json").unwrap();
        write_blob(
            blob.as_ref(),
            b"12345",
            &CreateOptions::with_metadata("x", "5"),
        );

        let info = blob.info().unwrap();
        assert_eq!(info.size, 5);
        assert_eq!(info.metadata.get("x").map(String::as_str), Some("5"));
    }

    #[test]
    fn missing_blob_is_not_found() {
        let bucket = MemoryBucket::new();
        let blob = bucket.blob("nope.json").unwrap();
        assert!(matches!(blob.open(), Err(e) if e.is_not_found()));
        assert!(blob.info().unwrap_err().is_not_found());
    }

    #[test]
    fn leading_slash_is_ignored() {
        let bucket = MemoryBucket::new();
        let blob = bucket.blob("///dir/file.pb").unwrap();
        assert_eq!(blob.path(), "dir/file.pb");
        assert_eq!(blob.url(), "mem:///dir/file.pb");
    }

    #[test]
    fn empty_path_rejected() {
        let bucket = MemoryBucket::new();
        assert!(matches!(
            bucket.blob("/").unwrap_err(),
            BlobError::InvalidUrl { .. }
        ));
    }

    // -----------------------------------------------------------------------
    // Atomic create
    // -----------------------------------------------------------------------

    #[test]
    fn uncommitted_writer_is_discarded() {
        let bucket = MemoryBucket::new();
        let blob = bucket.blob("file.json").unwrap();
        {
            let mut w = blob.create(&CreateOptions::default()).unwrap();
            w.write_all(b"partial").unwrap();
        }
        assert!(!bucket.contains("file.json"));
        assert!(bucket.is_empty());
    }

    #[test]
    fn uncommitted_writer_keeps_previous_content() {
        let bucket = MemoryBucket::new();
        let blob = bucket.blob("file.json").unwrap();
        write_blob(blob.as_ref(), b"v1", &CreateOptions::default());
        {
            let mut w = blob.create(&CreateOptions::default()).unwrap();
            w.write_all(b"v2-partial").unwrap();
        }
        assert_eq!(bucket.read_all("file.json").unwrap(), b"v1");
    }

    #[test]
    fn readers_see_snapshot_before_replace() {
        let bucket = MemoryBucket::new();
        let blob = bucket.blob("file.json").unwrap();
        write_blob(blob.as_ref(), b"old", &CreateOptions::default());

        let mut reader = blob.open().unwrap();
        write_blob(blob.as_ref(), b"new", &CreateOptions::default());

        let mut out = String::new();
        reader.read_to_string(&mut out).unwrap();
        assert_eq!(out, "old");
    }

    // -----------------------------------------------------------------------
    // Bucket helpers
    // -----------------------------------------------------------------------

    #[test]
    fn clones_share_storage() {
        let bucket = MemoryBucket::new();
        let other = bucket.clone();
        other.put("a.json", b"{}", Metadata::new()).unwrap();
        assert!(bucket.contains("a.json"));
        assert_eq!(bucket.len(), 1);

        assert!(bucket.remove("a.json").unwrap());
        assert!(!bucket.remove("a.json").unwrap());
        assert!(other.is_empty());
    }

    #[test]
    fn clear_removes_everything() {
        let bucket = MemoryBucket::new();
        bucket.put("a", b"1", Metadata::new()).unwrap();
        bucket.put("b", b"2", Metadata::new()).unwrap();
        bucket.clear().unwrap();
        assert!(bucket.is_empty());
    }
}
