//! Record sources for producers.

use feedx_format::Record;

use crate::error::FeedResult;

/// Something a producer can drain into an encoder.
///
/// Records are visited in order. A source that fetches records in pages
/// should do so inside [`RecordSource::each_record`]; see [`Batches`].
pub trait RecordSource {
    type Record: Record;

    fn each_record(self, f: &mut dyn FnMut(&Self::Record) -> FeedResult<()>) -> FeedResult<()>;
}

impl<T: Record> RecordSource for Vec<T> {
    type Record = T;

    fn each_record(self, f: &mut dyn FnMut(&T) -> FeedResult<()>) -> FeedResult<()> {
        self.iter().try_for_each(f)
    }
}

impl<T: Record> RecordSource for &[T] {
    type Record = T;

    fn each_record(self, f: &mut dyn FnMut(&T) -> FeedResult<()>) -> FeedResult<()> {
        self.iter().try_for_each(f)
    }
}

/// A source over any iterator of records.
#[derive(Clone, Debug)]
pub struct IterSource<I>(pub I);

impl<I> RecordSource for IterSource<I>
where
    I: IntoIterator,
    I::Item: Record,
{
    type Record = I::Item;

    fn each_record(self, f: &mut dyn FnMut(&I::Item) -> FeedResult<()>) -> FeedResult<()> {
        for record in self.0 {
            f(&record)?;
        }
        Ok(())
    }
}

/// A paged source.
///
/// `fetch(offset, limit)` returns up to `limit` records starting at
/// `offset`. Paging stops at the first short or empty page.
pub struct Batches<F> {
    size: usize,
    fetch: F,
}

impl<F> Batches<F> {
    pub fn new(size: usize, fetch: F) -> Self {
        Self {
            size: size.max(1),
            fetch,
        }
    }

    pub fn batch_size(&self) -> usize {
        self.size
    }
}

impl<T, F> RecordSource for Batches<F>
where
    T: Record,
    F: FnMut(usize, usize) -> FeedResult<Vec<T>>,
{
    type Record = T;

    fn each_record(mut self, f: &mut dyn FnMut(&T) -> FeedResult<()>) -> FeedResult<()> {
        let mut offset = 0;
        loop {
            let batch = (self.fetch)(offset, self.size)?;
            let len = batch.len();
            batch.iter().try_for_each(&mut *f)?;
            if len < self.size {
                return Ok(());
            }
            offset += len;
        }
    }
}
