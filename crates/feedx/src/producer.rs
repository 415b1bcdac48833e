//! Conditional feed writes.

use feedx_blob::{CreateOptions, Metadata};
use tracing::info;

use crate::error::{FeedError, FeedResult};
use crate::source::RecordSource;
use crate::stream::{settle, Stream};
use crate::version::{Version, META_VERSION};

type SourceFactory<'a, S> = Box<dyn FnOnce() -> FeedResult<S> + 'a>;
type VersionFactory<'a, S> = Box<dyn FnOnce(&S) -> FeedResult<Version> + 'a>;

/// Where a producer's local version comes from.
pub enum VersionSource<'a, S> {
    /// No version: always write.
    Unversioned,
    Fixed(Version),
    /// Derived from the realized source, e.g. its latest update time.
    Factory(VersionFactory<'a, S>),
}

impl<S> VersionSource<'_, S> {
    fn realize(self, source: &S) -> FeedResult<Version> {
        match self {
            VersionSource::Unversioned => Ok(Version::NONE),
            VersionSource::Fixed(v) => Ok(v),
            VersionSource::Factory(f) => f(source),
        }
    }
}

/// Outcome of [`Producer::perform`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Produced {
    Written {
        /// Size of the stored blob in bytes.
        size: u64,
        records: u64,
        version: Version,
    },
    /// The remote feed was at least as new as the local version.
    Skipped { local: Version, remote: Version },
}

impl Produced {
    /// Bytes written, or `-1` if the write was skipped.
    pub fn size(&self) -> i64 {
        match self {
            Produced::Written { size, .. } => i64::try_from(*size).unwrap_or(i64::MAX),
            Produced::Skipped { .. } => -1,
        }
    }

    pub fn records(&self) -> u64 {
        match self {
            Produced::Written { records, .. } => *records,
            Produced::Skipped { .. } => 0,
        }
    }

    pub fn is_skipped(&self) -> bool {
        matches!(self, Produced::Skipped { .. })
    }
}

/// Writes a feed unless the stored copy is already current.
///
/// With a positive local version, the producer first reads the version in
/// the blob's metadata and skips the write unless the local one is strictly
/// greater. A missing blob counts as version zero. Without a version the
/// feed is always written.
///
/// The record source is realized at [`Producer::perform`], not before.
pub struct Producer<'a, S: RecordSource> {
    stream: Stream,
    source: SourceFactory<'a, S>,
    version: VersionSource<'a, S>,
    metadata: Metadata,
}

impl<'a, S: RecordSource + 'a> Producer<'a, S> {
    pub fn new(stream: Stream, source: S) -> Self {
        Self::lazy(stream, move || Ok(source))
    }

    /// A producer whose source is built by `factory` when performed.
    pub fn lazy(stream: Stream, factory: impl FnOnce() -> FeedResult<S> + 'a) -> Self {
        Self {
            stream,
            source: Box::new(factory),
            version: VersionSource::Unversioned,
            metadata: Metadata::new(),
        }
    }

    pub fn with_version(mut self, version: impl Into<Version>) -> Self {
        self.version = VersionSource::Fixed(version.into());
        self
    }

    /// Derive the version from the realized source.
    pub fn with_version_fn(mut self, f: impl FnOnce(&S) -> FeedResult<Version> + 'a) -> Self {
        self.version = VersionSource::Factory(Box::new(f));
        self
    }

    /// Extra metadata stored with the blob, on top of the stream's own.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }

    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// Run the write protocol. The stream is closed afterwards.
    pub fn perform(self) -> FeedResult<Produced> {
        let source = match (self.source)() {
            Ok(source) => source,
            Err(err) => return settle(Err(err), self.stream.close()),
        };
        let Producer {
            stream,
            version,
            metadata,
            ..
        } = self;
        let result = produce(&stream, source, version, metadata);
        settle(result, stream.close())
    }

    pub(crate) fn into_parts(self) -> (Stream, SourceFactory<'a, S>, VersionSource<'a, S>, Metadata) {
        (self.stream, self.source, self.version, self.metadata)
    }
}

pub(crate) fn produce<S: RecordSource>(
    stream: &Stream,
    source: S,
    version: VersionSource<'_, S>,
    metadata: Metadata,
) -> FeedResult<Produced> {
    let local = version.realize(&source)?;

    if local.is_set() {
        let remote = match stream.info() {
            Ok(info) => Version::from_metadata(&info.metadata),
            Err(err) if err.is_not_found() => Version::NONE,
            Err(err) => return Err(err),
        };
        if remote.is_set() && local <= remote {
            info!(
                url = stream.url(),
                local = local.get(),
                remote = remote.get(),
                "feed is current, skipping write"
            );
            return Ok(Produced::Skipped { local, remote });
        }
    }

    let mut options = CreateOptions { metadata };
    options
        .metadata
        .insert(META_VERSION.to_string(), local.to_string());

    let records = stream.create(&options, |encoder| {
        let mut count = 0u64;
        source.each_record(&mut |record| {
            encoder.encode(record).map_err(FeedError::from)?;
            count += 1;
            Ok(())
        })?;
        Ok(count)
    })?;
    let size = stream.info()?.size;

    info!(
        url = stream.url(),
        size,
        records,
        version = local.get(),
        "feed written"
    );
    Ok(Produced::Written {
        size,
        records,
        version: local,
    })
}
