use std::sync::Arc;

use feedx::format::{columnar, json, protobuf, ParquetRow};
use feedx::{
    Bucket, CacheValue, Consumer, CreateOptions, FeedError, FeedOptions, FeedResult, FileBucket,
    FileCache, FormatResult, IncrementalConsumer, IncrementalProducer, MemoryBucket, MemoryCache,
    Produced, Producer, Record, Resolver, Stream, Version,
};
use serde::{Deserialize, Serialize};

#[derive(Clone, PartialEq, Serialize, Deserialize, prost::Message)]
struct Item {
    #[prost(string, tag = "1")]
    title: String,
}

impl Record for Item {
    fn to_json(&self, buf: &mut Vec<u8>) -> FormatResult<()> {
        json::encode_value(self, buf)
    }

    fn merge_json(&mut self, data: &[u8]) -> FormatResult<()> {
        *self = json::decode_value(data)?;
        Ok(())
    }

    fn to_protobuf(&self, buf: &mut Vec<u8>) -> FormatResult<()> {
        protobuf::encode_message(self, buf)
    }

    fn merge_protobuf(&mut self, data: &[u8]) -> FormatResult<()> {
        *self = protobuf::decode_message(data)?;
        Ok(())
    }

    fn to_parquet(&self) -> FormatResult<columnar::Fields> {
        columnar::encode_serde(self)
    }

    fn merge_parquet(&mut self, row: &ParquetRow) -> FormatResult<()> {
        *self = columnar::decode_serde(row)?;
        Ok(())
    }
}

fn items() -> Vec<Item> {
    let mut out = Vec::with_capacity(300);
    for title in ["x", "y", "z"] {
        for _ in 0..100 {
            out.push(Item {
                title: title.to_string(),
            });
        }
    }
    out
}

fn produce(stream: &Stream, version: u64) -> Produced {
    Producer::new(stream.clone(), items())
        .with_version(Version::new(version))
        .perform()
        .unwrap()
}

// ---------------------------------------------------------------------------
// Producer / consumer protocol
// ---------------------------------------------------------------------------

#[test]
fn produce_then_consume_on_local_files() {
    let dir = tempfile::tempdir().unwrap();
    let bucket = FileBucket::new(dir.path());
    let stream = Stream::new(bucket.blob("file.json").unwrap(), &FeedOptions::default()).unwrap();

    let first = produce(&stream, 33);
    assert_eq!(first.size(), 4200);
    assert_eq!(first.records(), 300);
    assert_eq!(
        std::fs::metadata(dir.path().join("file.json")).unwrap().len(),
        4200
    );

    assert_eq!(produce(&stream, 33).size(), -1);
    assert_eq!(produce(&stream, 22).size(), -1);

    let cache = CacheValue::new(Arc::new(MemoryCache::new()), "file.json");
    let consumer = Consumer::<Item>::new(stream.clone()).with_cache(cache.clone());

    let mut seen = Vec::new();
    assert!(consumer
        .each(|item| {
            seen.push(item);
            Ok(())
        })
        .unwrap());
    assert_eq!(seen, items());
    assert_eq!(cache.version().unwrap(), 33);

    let mut calls = 0;
    assert!(!consumer
        .each(|_| {
            calls += 1;
            Ok(())
        })
        .unwrap());
    assert_eq!(calls, 0);
    assert_eq!(consumer.count().unwrap(), 0);

    let third = produce(&stream, 44);
    assert!(third.size() > 0);
    assert_eq!(consumer.count().unwrap(), 300);
    assert_eq!(cache.version().unwrap(), 44);
}

#[test]
fn produce_then_consume_through_resolver() {
    let bucket = MemoryBucket::new();
    let resolver = Resolver::new().mount("mem", Arc::new(bucket.clone()));

    for url in [
        "mem:///feeds/items.jsonz",
        "mem:///feeds/items.json.zst",
        "mem:///feeds/items.pbz",
        "mem:///feeds/items.pb.flate",
        "mem:///feeds/items.ndjson",
    ] {
        let stream = Stream::from_url(&resolver, url, &FeedOptions::default()).unwrap();
        let produced = produce(&stream, 1);
        assert!(produced.size() > 0, "{url}");

        let back: Vec<Item> = Consumer::<Item>::new(stream)
            .records()
            .unwrap()
            .collect::<FeedResult<_>>()
            .unwrap();
        assert_eq!(back, items(), "{url}");
    }
    assert_eq!(bucket.len(), 5);
}

#[test]
fn compressed_feed_is_smaller() {
    let bucket = MemoryBucket::new();
    let plain = Stream::new(bucket.blob("a.json").unwrap(), &FeedOptions::default()).unwrap();
    let gzipped = Stream::new(bucket.blob("a.jsonz").unwrap(), &FeedOptions::default()).unwrap();

    let plain = produce(&plain, 1).size();
    let gzipped = produce(&gzipped, 1).size();
    assert!(gzipped < plain / 10, "{gzipped} vs {plain}");
}

#[test]
fn explicit_options_beat_the_extension() {
    let bucket = MemoryBucket::new();
    let opts = FeedOptions::new().with_format("pb").with_compression("gzip");
    let stream = Stream::new(bucket.blob("feed.data").unwrap(), &opts).unwrap();
    produce(&stream, 1);

    let raw = bucket.read_all("feed.data").unwrap();
    assert_eq!(&raw[..2], &[0x1f, 0x8b]);
    assert_eq!(Consumer::<Item>::new(stream).count().unwrap(), 300);
}

#[test]
fn consumer_cache_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let bucket = FileBucket::new(dir.path().join("feeds"));
    let stream = Stream::new(bucket.blob("file.pb").unwrap(), &FeedOptions::default()).unwrap();
    produce(&stream, 7);

    let cache_path = dir.path().join("state/markers.json");
    {
        let cache = CacheValue::new(Arc::new(FileCache::open(&cache_path).unwrap()), "feed");
        let consumer = Consumer::<Item>::new(stream.clone()).with_cache(cache);
        assert_eq!(consumer.count().unwrap(), 300);
    }

    let cache = CacheValue::new(Arc::new(FileCache::open(&cache_path).unwrap()), "feed");
    assert_eq!(cache.version().unwrap(), 7);
    let consumer = Consumer::<Item>::new(stream).with_cache(cache);
    assert_eq!(consumer.count().unwrap(), 0);
}

#[test]
fn consumer_of_missing_feed_fails() {
    let dir = tempfile::tempdir().unwrap();
    let resolver = Resolver::new();
    let url = format!("file://{}/never.json", dir.path().display());
    let stream = Stream::from_url(&resolver, &url, &FeedOptions::default()).unwrap();

    let err = Consumer::<Item>::new(stream.clone()).count().unwrap_err();
    assert!(err.is_not_found());

    let cache = CacheValue::new(Arc::new(MemoryCache::new()), "never");
    let err = Consumer::<Item>::new(stream)
        .with_cache(cache)
        .count()
        .unwrap_err();
    assert!(err.is_not_found());
}

// ---------------------------------------------------------------------------
// Error-path cleanup
// ---------------------------------------------------------------------------

#[test]
fn failed_create_leaves_no_file() {
    let dir = tempfile::tempdir().unwrap();
    let bucket = FileBucket::new(dir.path());
    let stream = Stream::new(bucket.blob("file.jsonz").unwrap(), &FeedOptions::default()).unwrap();

    let err = stream
        .create(&CreateOptions::default(), |enc| {
            enc.encode(&Item {
                title: "x".into(),
            })?;
            Err::<(), _>(FeedError::callback("boom"))
        })
        .unwrap_err();
    assert!(matches!(err, FeedError::Callback(_)));

    let leftovers: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert!(leftovers.is_empty(), "{leftovers:?}");
}

#[test]
fn failed_create_keeps_previous_feed() {
    let dir = tempfile::tempdir().unwrap();
    let bucket = FileBucket::new(dir.path());
    let stream = Stream::new(bucket.blob("file.json").unwrap(), &FeedOptions::default()).unwrap();
    produce(&stream, 10);
    let before = std::fs::read(dir.path().join("file.json")).unwrap();

    let err = stream.create(&CreateOptions::default(), |enc| {
        enc.encode(&Item {
            title: "new".into(),
        })?;
        Err::<(), _>(FeedError::callback("boom"))
    });
    assert!(err.is_err());
    assert_eq!(std::fs::read(dir.path().join("file.json")).unwrap(), before);
    assert_eq!(stream.info().unwrap().metadata[feedx::META_VERSION], "10");
}

#[test]
fn producer_with_unencodable_records_writes_nothing() {
    let bucket = MemoryBucket::new();
    let stream = Stream::new(bucket.blob("feed.pb").unwrap(), &FeedOptions::default()).unwrap();
    let rows = vec![serde_json::json!({"title": "x"})];

    let err = Producer::new(stream, rows)
        .with_version(Version::new(1))
        .perform()
        .unwrap_err();
    assert!(matches!(err, FeedError::Format(_)));
    assert!(bucket.is_empty());
}

// ---------------------------------------------------------------------------
// Configuration
// ---------------------------------------------------------------------------

#[test]
fn options_from_toml_drive_the_stream() {
    let opts: FeedOptions = toml::from_str(
        r#"
            format = "json"
            compression = ""

            [metadata]
            owner = "catalog"
        "#,
    )
    .unwrap();

    let bucket = MemoryBucket::new();
    let stream = Stream::new(bucket.blob("feed.bin").unwrap(), &opts).unwrap();
    assert_eq!(stream.format().name(), "json");
    assert_eq!(stream.compression().name(), "none");

    Producer::new(stream.clone(), items())
        .with_metadata("run", "nightly")
        .perform()
        .unwrap();
    let metadata = stream.info().unwrap().metadata;
    assert_eq!(metadata["owner"], "catalog");
    assert_eq!(metadata["run"], "nightly");
}

// ---------------------------------------------------------------------------
// Parquet
// ---------------------------------------------------------------------------

#[test]
fn parquet_feeds_are_detected_and_roundtrip() {
    let dir = tempfile::tempdir().unwrap();
    let bucket = FileBucket::new(dir.path());

    for path in ["file.parquet", "file.parquet.gz"] {
        let stream = Stream::new(bucket.blob(path).unwrap(), &FeedOptions::default()).unwrap();
        assert_eq!(stream.format().name(), "parquet");

        let produced = produce(&stream, 33);
        assert_eq!(produced.records(), 300);
        assert!(produce(&stream, 33).is_skipped());

        let cache = CacheValue::new(Arc::new(MemoryCache::new()), path);
        let consumer = Consumer::<Item>::new(stream).with_cache(cache);
        let mut titles = Vec::new();
        assert!(consumer
            .each(|item| {
                titles.push(item.title);
                Ok(())
            })
            .unwrap());
        assert_eq!(titles.len(), 300);
        assert_eq!(titles[0], "x");
        assert_eq!(titles[299], "z");
        assert_eq!(consumer.count().unwrap(), 0);
    }
}

// ---------------------------------------------------------------------------
// Commit failures
// ---------------------------------------------------------------------------

#[test]
fn failed_metadata_write_publishes_nothing() {
    let dir = tempfile::tempdir().unwrap();
    let bucket = FileBucket::new(dir.path());
    let stream = Stream::new(bucket.blob("file.json").unwrap(), &FeedOptions::default()).unwrap();
    std::fs::create_dir(dir.path().join(".file.json.meta.json")).unwrap();

    let result = Producer::new(stream.clone(), items())
        .with_version(Version::new(5))
        .perform();
    assert!(result.is_err());
    assert!(!dir.path().join("file.json").exists());
    assert!(stream.info().unwrap_err().is_not_found());
}

// ---------------------------------------------------------------------------
// Incremental feeds
// ---------------------------------------------------------------------------

#[test]
fn incremental_feed_on_local_files() {
    let dir = tempfile::tempdir().unwrap();
    let bucket: Arc<dyn Bucket> = Arc::new(FileBucket::new(dir.path()));
    let producer = IncrementalProducer::new(Arc::clone(&bucket), FeedOptions::default());

    let first = producer.perform(Version::new(100), |_| Ok(items())).unwrap();
    assert_eq!(first.records(), 300);
    let second = producer
        .perform(Version::new(200), |since| {
            assert_eq!(since, Version::new(100));
            Ok(vec![Item {
                title: "late".into(),
            }])
        })
        .unwrap();
    assert_eq!(second.records(), 1);
    assert!(dir.path().join("data-0-100.pbz").exists());
    assert!(dir.path().join("manifest.json").exists());

    let markers = FileCache::open(dir.path().join("cache.json")).unwrap();
    let cache = CacheValue::new(Arc::new(markers), "inc");
    let consumer = IncrementalConsumer::<Item>::new(Arc::clone(&bucket), FeedOptions::default())
        .with_cache(cache);
    let mut last = None;
    assert!(consumer
        .each(|item| {
            last = Some(item.title);
            Ok(())
        })
        .unwrap());
    assert_eq!(last.as_deref(), Some("late"));
    assert_eq!(consumer.count().unwrap(), 0);
}
