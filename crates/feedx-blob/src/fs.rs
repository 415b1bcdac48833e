use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::{NamedTempFile, TempPath};
use tracing::{debug, warn};

use crate::error::{BlobError, BlobResult};
use crate::traits::{Blob, BlobInfo, BlobWriter, Bucket, CreateOptions, Metadata};

/// A bucket rooted at a local directory.
#[derive(Clone, Debug)]
pub struct FileBucket {
    root: PathBuf,
}

impl FileBucket {
    /// Create a bucket rooted at `root`. The directory is created lazily on
    /// the first write.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl Bucket for FileBucket {
    fn blob(&self, path: &str) -> BlobResult<Arc<dyn Blob>> {
        let rel = path.trim_start_matches('/');
        if rel.is_empty() || rel.split('/').any(|seg| seg == "..") {
            return Err(BlobError::InvalidUrl {
                url: path.to_string(),
                reason: "path must be non-empty and stay inside the bucket".into(),
            });
        }
        Ok(Arc::new(FileBlob::new(self.root.join(rel))))
    }
}

/// A blob stored as a local file.
///
/// Metadata is kept in a JSON sidecar next to the file
/// (`dir/.name.meta.json`). Creation writes to a temporary file in the
/// target directory and renames it into place on commit.
#[derive(Debug)]
pub struct FileBlob {
    url: String,
    path: String,
    file: PathBuf,
}

impl FileBlob {
    /// A blob at the given filesystem path.
    pub fn new(file: impl Into<PathBuf>) -> Self {
        let file = file.into();
        let path = file.to_string_lossy().into_owned();
        Self {
            url: format!("file://{path}"),
            path,
            file,
        }
    }

    fn sidecar(&self) -> PathBuf {
        sidecar_path(&self.file)
    }
}

impl Blob for FileBlob {
    fn url(&self) -> &str {
        &self.url
    }

    fn path(&self) -> &str {
        &self.path
    }

    fn open(&self) -> BlobResult<Box<dyn Read + Send>> {
        let file = File::open(&self.file).map_err(|e| BlobError::from_io(&self.url, e))?;
        Ok(Box::new(BufReader::new(file)))
    }

    fn create(&self, options: &CreateOptions) -> BlobResult<Box<dyn BlobWriter>> {
        let dir = parent_dir(&self.file);
        fs::create_dir_all(&dir)?;
        let tmp = NamedTempFile::new_in(&dir)?;
        Ok(Box::new(FileWriter {
            target: self.file.clone(),
            metadata: options.metadata.clone(),
            tmp: BufWriter::new(tmp),
        }))
    }

    fn info(&self) -> BlobResult<BlobInfo> {
        let stat = fs::metadata(&self.file).map_err(|e| BlobError::from_io(&self.url, e))?;
        let metadata = match fs::read(self.sidecar()) {
            Ok(raw) => serde_json::from_slice::<Metadata>(&raw)
                .map_err(|e| BlobError::Serialization(e.to_string()))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Metadata::new(),
            Err(e) => return Err(e.into()),
        };
        Ok(BlobInfo {
            size: stat.len(),
            metadata,
        })
    }
}

struct FileWriter {
    target: PathBuf,
    metadata: Metadata,
    tmp: BufWriter<NamedTempFile>,
}

impl Write for FileWriter {
    fn write(&mut self, data: &[u8]) -> std::io::Result<usize> {
        self.tmp.write(data)
    }

    fn flush(&mut self) -> std::io::Result<()> {
        self.tmp.flush()
    }
}

impl BlobWriter for FileWriter {
    fn commit(self: Box<Self>) -> BlobResult<()> {
        let FileWriter {
            target,
            metadata,
            tmp,
        } = *self;
        let dir = parent_dir(&target);
        let sidecar = sidecar_path(&target);

        let content = tmp.into_inner().map_err(|e| e.into_error())?;
        content.as_file().sync_all()?;
        let meta = stage_metadata(&dir, &metadata)?;

        // Both files are staged. The previous content is parked in a
        // temporary path until the sidecar is in place.
        let backup = park_existing(&dir, &target)?;
        if let Err(e) = content.persist(&target) {
            restore(backup, &target);
            return Err(std::io::Error::from(e).into());
        }
        if let Err(e) = publish_metadata(meta, &sidecar) {
            restore(backup, &target);
            return Err(e);
        }

        debug!(path = %target.display(), "file blob committed");
        Ok(())
    }
}

fn stage_metadata(dir: &Path, metadata: &Metadata) -> BlobResult<Option<NamedTempFile>> {
    if metadata.is_empty() {
        return Ok(None);
    }
    let raw =
        serde_json::to_vec(metadata).map_err(|e| BlobError::Serialization(e.to_string()))?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(&raw)?;
    tmp.as_file().sync_all()?;
    Ok(Some(tmp))
}

fn publish_metadata(meta: Option<NamedTempFile>, sidecar: &Path) -> BlobResult<()> {
    match meta {
        Some(tmp) => {
            tmp.persist(sidecar).map_err(std::io::Error::from)?;
        }
        None => match fs::remove_file(sidecar) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => return Err(e.into()),
        },
    }
    Ok(())
}

/// Move the current content of `target` (if any) to a temporary path that
/// is deleted on drop.
fn park_existing(dir: &Path, target: &Path) -> BlobResult<Option<TempPath>> {
    if !target.exists() {
        return Ok(None);
    }
    let parked = NamedTempFile::new_in(dir)?.into_temp_path();
    fs::rename(target, &parked)?;
    Ok(Some(parked))
}

/// Put parked content back, or remove a half-published file when there
/// was nothing to restore.
fn restore(backup: Option<TempPath>, target: &Path) {
    let outcome = match backup {
        Some(parked) => parked.persist(target).map_err(std::io::Error::from),
        None => match fs::remove_file(target) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        },
    };
    if let Err(e) = outcome {
        warn!(path = %target.display(), error = %e, "failed to restore blob after aborted commit");
    }
}

fn parent_dir(file: &Path) -> PathBuf {
    match file.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

fn sidecar_path(file: &Path) -> PathBuf {
    let name = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    parent_dir(file).join(format!(".{name}.meta.json"))
}
