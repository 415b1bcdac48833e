//! Conditional feed reads.

use std::marker::PhantomData;

use feedx_cache::CacheValue;
use feedx_format::{Decoder, Record};
use tracing::{info, warn};

use crate::error::{FeedError, FeedResult};
use crate::stream::{settle, Stream};
use crate::version::Version;

/// Reads a feed unless it has not changed since the last full read.
///
/// Without a cache slot every call reads the whole feed. With one, the
/// remote version is compared against the cached version first and the
/// read is skipped unless the remote one is positive and strictly greater.
/// After a complete pass the remote version is written to the cache.
pub struct Consumer<T> {
    stream: Stream,
    cache: Option<CacheValue>,
    _record: PhantomData<fn() -> T>,
}

impl<T: Record + Default> Consumer<T> {
    pub fn new(stream: Stream) -> Self {
        Self {
            stream,
            cache: None,
            _record: PhantomData,
        }
    }

    pub fn with_cache(mut self, cache: CacheValue) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn stream(&self) -> &Stream {
        &self.stream
    }

    /// Call `f` with every record in order.
    ///
    /// Returns `false` if the feed was skipped. An error from `f` stops the
    /// pass; the cache is left untouched and the stream is released.
    pub fn each(&self, mut f: impl FnMut(T) -> FeedResult<()>) -> FeedResult<bool> {
        let mut records = self.records()?;
        if records.is_skipped() {
            return Ok(false);
        }
        for record in &mut records {
            f(record?)?;
        }
        Ok(true)
    }

    /// Number of records in a full pass, or zero if skipped.
    pub fn count(&self) -> FeedResult<u64> {
        let mut records = self.records()?;
        for record in &mut records {
            record?;
        }
        Ok(records.num_read())
    }

    /// Start a lazy pass over the feed.
    ///
    /// Each call starts over. The cache is updated only when the returned
    /// iterator runs to the end of the feed.
    pub fn records(&self) -> FeedResult<Records<T>> {
        match self.start() {
            Ok(records) => Ok(records),
            Err(err) => settle(Err(err), self.stream.close()),
        }
    }

    fn start(&self) -> FeedResult<Records<T>> {
        let mut remote = Version::NONE;
        if let Some(cache) = &self.cache {
            remote = Version::from_metadata(&self.stream.info()?.metadata);
            let local = Version::new(cache.version()?);
            if remote.is_set() && remote <= local {
                info!(
                    url = self.stream.url(),
                    local = local.get(),
                    remote = remote.get(),
                    "feed is current, skipping read"
                );
                self.stream.close()?;
                return Ok(Records::skipped());
            }
        }

        let decoder = self.stream.decoder()?;
        Ok(Records {
            decoder: Some(decoder),
            stream: Some(self.stream.clone()),
            cache: self.cache.clone(),
            remote,
            num_read: 0,
            skipped: false,
            _record: PhantomData,
        })
    }
}

/// A lazy pass over a feed, yielding decoded records.
///
/// Dropping it before the end releases the stream without touching the
/// cache. Iteration stops after the first error.
pub struct Records<T> {
    decoder: Option<Box<dyn Decoder>>,
    stream: Option<Stream>,
    cache: Option<CacheValue>,
    remote: Version,
    num_read: u64,
    skipped: bool,
    _record: PhantomData<fn() -> T>,
}

impl<T> Records<T> {
    fn skipped() -> Self {
        Self {
            decoder: None,
            stream: None,
            cache: None,
            remote: Version::NONE,
            num_read: 0,
            skipped: true,
            _record: PhantomData,
        }
    }

    /// Returns `true` if the feed was current and nothing was opened.
    pub fn is_skipped(&self) -> bool {
        self.skipped
    }

    /// Records yielded so far.
    pub fn num_read(&self) -> u64 {
        self.num_read
    }

    /// The remote version observed before reading, if a cache is attached.
    pub fn remote_version(&self) -> Version {
        self.remote
    }

    fn release(&mut self) -> FeedResult<()> {
        let closed = match self.decoder.take() {
            Some(decoder) => decoder
                .close()
                .map_err(|e| FeedError::release("format", e)),
            None => Ok(()),
        };
        match self.stream.take() {
            Some(stream) => settle(closed, stream.close()),
            None => closed,
        }
    }

    fn complete(&mut self) -> FeedResult<()> {
        self.release()?;
        if let Some(cache) = self.cache.take() {
            if self.remote.is_set() {
                cache.write(&self.remote.to_string())?;
            }
        }
        Ok(())
    }
}

impl<T: Record + Default> Iterator for Records<T> {
    type Item = FeedResult<T>;

    fn next(&mut self) -> Option<Self::Item> {
        let decoder = self.decoder.as_mut()?;
        match decoder.decode::<T>() {
            Ok(Some(record)) => {
                self.num_read += 1;
                Some(Ok(record))
            }
            Ok(None) => self.complete().err().map(Err),
            Err(err) => {
                if let Err(release) = self.release() {
                    warn!(error = %release, "release failed after decode error");
                }
                self.cache = None;
                Some(Err(err.into()))
            }
        }
    }
}

impl<T> Drop for Records<T> {
    fn drop(&mut self) {
        if let Err(err) = self.release() {
            warn!(error = %err, "release failed while dropping records");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::FeedOptions;
    use feedx_blob::{Bucket, MemoryBucket, Metadata};
    use feedx_cache::MemoryCache;
    use serde_json::{json, Value};
    use std::sync::Arc;

    fn feed(lines: &str, version: Option<&str>) -> (MemoryBucket, Stream) {
        let bucket = MemoryBucket::new();
        let mut meta = Metadata::new();
        if let Some(v) = version {
            meta.insert(crate::META_VERSION.into(), v.into());
        }
        bucket.put("feed.json", lines.as_bytes(), meta).unwrap();
        let stream = Stream::new(bucket.blob("feed.json").unwrap(), &FeedOptions::default()).unwrap();
        (bucket, stream)
    }

    fn slot() -> CacheValue {
        CacheValue::new(Arc::new(MemoryCache::new()), "feed")
    }

    #[test]
    fn uncached_reads_every_time() {
        let (_, stream) = feed("1\n2\n3\n", Some("7"));
        let consumer = Consumer::<Value>::new(stream);
        assert_eq!(consumer.count().unwrap(), 3);
        assert_eq!(consumer.count().unwrap(), 3);
    }

    #[test]
    fn cached_read_skips_until_remote_advances() {
        let (bucket, stream) = feed("1\n2\n", Some("7"));
        let cache = slot();
        let consumer = Consumer::<Value>::new(stream).with_cache(cache.clone());

        let mut seen = Vec::new();
        assert!(consumer
            .each(|v| {
                seen.push(v);
                Ok(())
            })
            .unwrap());
        assert_eq!(seen, vec![json!(1), json!(2)]);
        assert_eq!(cache.version().unwrap(), 7);

        assert!(!consumer.each(|_| panic!("must not be called")).unwrap());

        let mut meta = Metadata::new();
        meta.insert("x-feedx-version".into(), "8".into());
        bucket.put("feed.json", b"3\n", meta).unwrap();
        assert_eq!(consumer.count().unwrap(), 1);
        assert_eq!(cache.version().unwrap(), 8);
    }

    #[test]
    fn zero_remote_version_always_reads_and_is_not_cached() {
        let (_, stream) = feed("1\n", None);
        let cache = slot();
        let consumer = Consumer::<Value>::new(stream).with_cache(cache.clone());
        assert_eq!(consumer.count().unwrap(), 1);
        assert_eq!(consumer.count().unwrap(), 1);
        assert_eq!(cache.read().unwrap(), None);
    }

    #[test]
    fn aborted_pass_leaves_cache_untouched() {
        let (_, stream) = feed("1\n2\n3\n", Some("5"));
        let cache = slot();
        let consumer = Consumer::<Value>::new(stream).with_cache(cache.clone());

        let err = consumer
            .each(|_| Err(FeedError::callback("stop")))
            .unwrap_err();
        assert!(matches!(err, FeedError::Callback(_)));
        assert_eq!(cache.read().unwrap(), None);

        let mut records = consumer.records().unwrap();
        assert!(records.next().unwrap().is_ok());
        drop(records);
        assert_eq!(cache.read().unwrap(), None);
    }

    #[test]
    fn lazy_records_write_cache_on_exhaustion() {
        let (_, stream) = feed("1\n2\n", Some("4"));
        let cache = slot();
        let consumer = Consumer::<Value>::new(stream).with_cache(cache.clone());

        let mut records = consumer.records().unwrap();
        assert!(!records.is_skipped());
        assert_eq!(records.remote_version(), Version::new(4));
        let all: Vec<Value> = records.by_ref().collect::<FeedResult<_>>().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(records.num_read(), 2);
        assert!(records.next().is_none());
        assert_eq!(cache.version().unwrap(), 4);

        let records = consumer.records().unwrap();
        assert!(records.is_skipped());
    }

    #[test]
    fn decode_error_stops_iteration() {
        let (_, stream) = feed("1\nnot json\n3\n", Some("2"));
        let cache = slot();
        let consumer = Consumer::<Value>::new(stream).with_cache(cache.clone());

        let mut records = consumer.records().unwrap();
        assert!(records.next().unwrap().is_ok());
        assert!(matches!(records.next(), Some(Err(FeedError::Decode(_)))));
        assert!(records.next().is_none());
        assert_eq!(cache.read().unwrap(), None);
    }

    #[test]
    fn missing_feed_is_not_found() {
        let bucket = MemoryBucket::new();
        let stream = Stream::new(bucket.blob("nope.json").unwrap(), &FeedOptions::default()).unwrap();

        let err = Consumer::<Value>::new(stream.clone())
            .with_cache(slot())
            .count()
            .unwrap_err();
        assert!(err.is_not_found());

        let err = Consumer::<Value>::new(stream).count().unwrap_err();
        assert!(err.is_not_found());
    }
}
