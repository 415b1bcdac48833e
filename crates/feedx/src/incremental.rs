//! Incremental feeds: a bucket of data files listed by a manifest.
//!
//! Every push writes the records changed since the previous push to a new
//! data file, then rewrites `manifest.json` to append that file. The
//! manifest blob carries the feed version in its metadata, so consumers
//! gate on it exactly as they do for single-blob feeds and then read every
//! listed file in order.

use std::marker::PhantomData;
use std::sync::Arc;

use feedx_blob::{Bucket, CreateOptions, Metadata};
use feedx_cache::CacheValue;
use feedx_format::Record;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::consumer::Consumer;
use crate::error::{FeedError, FeedResult};
use crate::options::FeedOptions;
use crate::producer::{produce, Produced, VersionSource};
use crate::source::RecordSource;
use crate::stream::{settle, Stream};
use crate::version::{Version, META_VERSION};

/// Blob name of the manifest inside the bucket.
pub const MANIFEST_NAME: &str = "manifest.json";

/// Data file suffix unless configured otherwise.
pub const DEFAULT_SUFFIX: &str = ".pbz";

/// The current state of an incremental feed.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Manifest {
    /// Version of the newest records included in `files`.
    pub last_modified: Version,
    /// Compaction generation; part of every data file name.
    pub generation: u64,
    /// Data files in the order they were written.
    pub files: Vec<String>,
}

feedx_format::impl_json_record!(Manifest);

impl Manifest {
    /// Read the manifest, treating a missing blob as an empty feed.
    pub fn load(stream: &Stream) -> FeedResult<Self> {
        match Self::read(stream) {
            Err(err) if err.is_not_found() => Ok(Self::default()),
            other => other,
        }
    }

    /// Read the manifest. Fails with a not-found error if it is absent.
    pub fn read(stream: &Stream) -> FeedResult<Self> {
        stream.open(|decoder| {
            decoder
                .decode::<Manifest>()?
                .ok_or_else(|| FeedError::Manifest(format!("{} is empty", stream.url())))
        })
    }

    /// Store the manifest, tagging the blob with `version`.
    pub fn commit(&self, stream: &Stream, version: Version) -> FeedResult<()> {
        let options = CreateOptions::with_metadata(META_VERSION, version.to_string());
        stream.create(&options, |encoder| {
            encoder.encode(self)?;
            Ok(())
        })
    }

    /// Name of the data file holding records up to `version`.
    pub fn data_file_name(&self, version: Version, suffix: &str) -> String {
        format!("data-{}-{}{}", self.generation, version, suffix)
    }
}

fn manifest_stream(bucket: &dyn Bucket) -> FeedResult<Stream> {
    Stream::new(bucket.blob(MANIFEST_NAME)?, &FeedOptions::default())
}

// ---------------------------------------------------------------------------
// Producer
// ---------------------------------------------------------------------------

/// Appends data files to an incremental feed.
///
/// A push is skipped unless the local version is positive and strictly
/// greater than the manifest's `last_modified`. The data file is committed
/// before the manifest, so a failed push never lists a missing file.
pub struct IncrementalProducer {
    bucket: Arc<dyn Bucket>,
    options: FeedOptions,
    suffix: String,
}

impl IncrementalProducer {
    /// A producer writing data files with `options`. Format and compression
    /// are detected from [`DEFAULT_SUFFIX`] unless the options name them.
    pub fn new(bucket: Arc<dyn Bucket>, options: FeedOptions) -> Self {
        Self {
            bucket,
            options,
            suffix: DEFAULT_SUFFIX.to_string(),
        }
    }

    /// Data file suffix, e.g. `".jsonz"`.
    pub fn with_suffix(mut self, suffix: impl Into<String>) -> Self {
        self.suffix = suffix.into();
        self
    }

    /// The manifest as currently stored.
    pub fn manifest(&self) -> FeedResult<Manifest> {
        let stream = manifest_stream(self.bucket.as_ref())?;
        let result = Manifest::load(&stream);
        settle(result, stream.close())
    }

    /// Push the records changed since the last push.
    ///
    /// `changes` receives the manifest's `last_modified` and returns the
    /// records modified after it.
    pub fn perform<S: RecordSource>(
        &self,
        version: impl Into<Version>,
        changes: impl FnOnce(Version) -> FeedResult<S>,
    ) -> FeedResult<Produced> {
        let local = version.into();
        let stream = manifest_stream(self.bucket.as_ref())?;
        let result = self.push(&stream, local, changes);
        settle(result, stream.close())
    }

    fn push<S: RecordSource>(
        &self,
        index: &Stream,
        local: Version,
        changes: impl FnOnce(Version) -> FeedResult<S>,
    ) -> FeedResult<Produced> {
        let mut manifest = Manifest::load(index)?;
        let remote = manifest.last_modified;
        if !local.is_set() || local <= remote {
            info!(
                url = index.url(),
                local = local.get(),
                remote = remote.get(),
                "incremental feed is current, skipping push"
            );
            return Ok(Produced::Skipped { local, remote });
        }

        let name = manifest.data_file_name(local, &self.suffix);
        let data = Stream::new(self.bucket.blob(&name)?, &self.options)?;
        let written = changes(remote).and_then(|source| {
            produce(&data, source, VersionSource::Fixed(local), Metadata::new())
        });
        let produced = settle(written, data.close())?;

        manifest.files.push(name);
        manifest.last_modified = local;
        manifest.commit(index, local)?;

        info!(
            url = index.url(),
            files = manifest.files.len(),
            version = local.get(),
            "incremental feed pushed"
        );
        Ok(produced)
    }
}

// ---------------------------------------------------------------------------
// Consumer
// ---------------------------------------------------------------------------

/// Reads every data file listed by an incremental feed's manifest.
///
/// The cache check works as for [`Consumer`], against the version stored
/// on the manifest blob. The cache is written only after every listed file
/// has been read to the end.
pub struct IncrementalConsumer<T> {
    bucket: Arc<dyn Bucket>,
    options: FeedOptions,
    cache: Option<CacheValue>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record + Default> IncrementalConsumer<T> {
    /// A consumer reading data files with `options`; by default format and
    /// compression are detected from each file name.
    pub fn new(bucket: Arc<dyn Bucket>, options: FeedOptions) -> Self {
        Self {
            bucket,
            options,
            cache: None,
            _record: PhantomData,
        }
    }

    pub fn with_cache(mut self, cache: CacheValue) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Call `f` with every record of every listed file, in manifest order.
    ///
    /// Returns `false` if the feed was skipped.
    pub fn each(&self, mut f: impl FnMut(T) -> FeedResult<()>) -> FeedResult<bool> {
        Ok(self.consume(&mut f)?.is_some())
    }

    /// Number of records across all files, or zero if skipped.
    pub fn count(&self) -> FeedResult<u64> {
        Ok(self.consume(&mut |_| Ok(()))?.unwrap_or(0))
    }

    fn consume(&self, f: &mut dyn FnMut(T) -> FeedResult<()>) -> FeedResult<Option<u64>> {
        let stream = manifest_stream(self.bucket.as_ref())?;
        let result = self.check(&stream).and_then(|remote| match remote {
            Some(remote) => Manifest::read(&stream).map(|m| Some((remote, m))),
            None => Ok(None),
        });
        let (remote, manifest) = match settle(result, stream.close())? {
            Some(found) => found,
            None => return Ok(None),
        };

        let mut total = 0u64;
        for file in &manifest.files {
            let data = Stream::new(self.bucket.blob(file)?, &self.options)?;
            let mut records = Consumer::<T>::new(data).records()?;
            for record in &mut records {
                f(record?)?;
            }
            total += records.num_read();
        }

        if let Some(cache) = &self.cache {
            if remote.is_set() {
                cache.write(&remote.to_string())?;
            }
        }
        Ok(Some(total))
    }

    /// The manifest version, or `None` if the cache says it is current.
    fn check(&self, stream: &Stream) -> FeedResult<Option<Version>> {
        let Some(cache) = &self.cache else {
            return Ok(Some(Version::NONE));
        };
        let remote = Version::from_metadata(&stream.info()?.metadata);
        let local = Version::new(cache.version()?);
        if remote.is_set() && remote <= local {
            info!(
                url = stream.url(),
                local = local.get(),
                remote = remote.get(),
                "incremental feed is current, skipping read"
            );
            return Ok(None);
        }
        Ok(Some(remote))
    }
}
