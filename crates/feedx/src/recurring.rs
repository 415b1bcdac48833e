//! Producers run on a schedule, gated on a source revision.

use feedx_cache::CacheValue;
use tracing::info;

use crate::error::FeedResult;
use crate::producer::{produce, Produced, Producer};
use crate::source::RecordSource;
use crate::stream::settle;
use crate::version::Version;

type RevisionCheck<'a, S> = Box<dyn FnOnce(&S) -> FeedResult<Version> + 'a>;

/// A producer that only runs when its source has moved on.
///
/// Before writing, `check` computes the revision of the realized source
/// (typically its latest update time). The run is skipped unless that
/// revision is strictly greater than the last one recorded in `state`;
/// after a run the new revision is recorded. State lives in the injected
/// cache slot, one key per task.
pub struct RecurringProducer<'a, S: RecordSource> {
    producer: Producer<'a, S>,
    state: CacheValue,
    check: RevisionCheck<'a, S>,
}

impl<'a, S: RecordSource + 'a> RecurringProducer<'a, S> {
    pub fn new(
        producer: Producer<'a, S>,
        state: CacheValue,
        check: impl FnOnce(&S) -> FeedResult<Version> + 'a,
    ) -> Self {
        Self {
            producer,
            state,
            check: Box::new(check),
        }
    }

    /// The revision recorded by the last run, or zero.
    pub fn last_revision(&self) -> FeedResult<Version> {
        Ok(Version::new(self.state.version()?))
    }

    pub fn perform(self) -> FeedResult<Produced> {
        let RecurringProducer {
            producer,
            state,
            check,
        } = self;
        let (stream, source, version, metadata) = producer.into_parts();

        let result = source().and_then(|source| {
            let latest = check(&source)?;
            let stored = Version::new(state.version()?);
            if latest <= stored {
                info!(
                    task = state.key(),
                    revision = latest.get(),
                    "source unchanged, skipping run"
                );
                return Ok(Produced::Skipped {
                    local: latest,
                    remote: stored,
                });
            }

            let produced = produce(&stream, source, version, metadata)?;
            state.write(&latest.to_string())?;
            Ok(produced)
        });
        settle(result, stream.close())
    }
}
