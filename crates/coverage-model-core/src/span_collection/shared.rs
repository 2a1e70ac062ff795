//! Thread-safe by-file index for concurrent ingest.
//!
//! The index map sits behind an `RwLock`; each record has its own `Mutex`.
//! Writers targeting the same container serialize on that record's mutex,
//! writers on different containers only share the read side of the index.

use std::{collections::BTreeMap, sync::Arc};

use log::debug;
use parking_lot::{Mutex, RwLock};

use crate::{
    address::Address,
    span_collection::{CollectionError, SpanCollectionByFile},
    span_stats::SpanStats,
};

type Record = Arc<Mutex<SpanStats>>;

/// A [`SpanCollectionByFile`] that can be shared across threads.
#[derive(Debug, Default)]
pub struct SharedSpanCollection {
    records: RwLock<BTreeMap<String, Record>>,
}

impl SharedSpanCollection {
    /// Empty collection.
    pub fn new() -> SharedSpanCollection {
        SharedSpanCollection::default()
    }

    fn record(&self, key: &str) -> Option<Record> {
        self.records.read().get(key).cloned()
    }

    /// Merge `stats` into the record for its top-level key.
    pub fn add_span(&self, mut stats: SpanStats) -> Result<(), CollectionError> {
        let key = stats.address().top_level_key().to_string();

        if let Some(record) = self.record(&key) {
            debug!("Extending span: {key}");
            record.lock().extend(&stats)?;
            return Ok(());
        }

        let mut records = self.records.write();
        match records.get(&key) {
            // Another writer created it between the two lock acquisitions.
            Some(record) => {
                debug!("Extending span: {key}");
                record.lock().extend(&stats)?;
            }
            None => {
                debug!("Creating new span: {key}");
                stats.mark_dirty();
                records.insert(key, Arc::new(Mutex::new(stats)));
            }
        }
        Ok(())
    }

    /// Snapshot of the record for the container `address` belongs to.
    pub fn get_span(&self, address: &Address) -> Option<SpanStats> {
        self.record(address.top_level_key())
            .map(|record| record.lock().clone())
    }

    /// Snapshots of every dirty record.
    pub fn get_dirty_spans(&self) -> Vec<SpanStats> {
        self.records
            .read()
            .values()
            .filter_map(|record| {
                let stats = record.lock();
                stats.is_dirty().then(|| stats.clone())
            })
            .collect()
    }

    /// Hand every dirty record to `write` and clear its flag once `write`
    /// returns `Ok`.
    ///
    /// Each record stays locked while it is written, so a concurrent merge
    /// cannot land between the write and the clear. The first error stops the
    /// flush; records already written stay clean, the rest stay dirty.
    /// Returns the number of records written.
    ///
    /// `write` runs under the index read lock and the record's mutex. It must
    /// not call back into this collection: the locks are not reentrant, so
    /// `add_span` or `get_span` from inside `write` deadlocks.
    pub fn flush_dirty<E>(
        &self,
        mut write: impl FnMut(&SpanStats) -> Result<(), E>,
    ) -> Result<usize, E> {
        let records = self.records.read();
        let mut flushed = 0;
        for record in records.values() {
            let mut stats = record.lock();
            if !stats.is_dirty() {
                continue;
            }
            write(&stats)?;
            stats.mark_clean();
            flushed += 1;
        }
        Ok(flushed)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    /// Whether the collection has no records.
    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Unwrap into a plain collection.
    pub fn into_collection(self) -> SpanCollectionByFile {
        let spans = self
            .records
            .into_inner()
            .into_iter()
            .map(|(key, record)| {
                let stats = Arc::try_unwrap(record)
                    .map(Mutex::into_inner)
                    .unwrap_or_else(|shared| shared.lock().clone());
                (key, stats)
            })
            .collect();
        SpanCollectionByFile::from_records(spans)
    }
}

impl From<SpanCollectionByFile> for SharedSpanCollection {
    fn from(collection: SpanCollectionByFile) -> Self {
        let records = collection
            .into_records()
            .map(|(key, stats)| (key, Arc::new(Mutex::new(stats))))
            .collect();
        SharedSpanCollection {
            records: RwLock::new(records),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::thread;

    use super::*;
    use crate::value::ParamRange;

    fn stats(brick: &str, lo: i64, hi: i64) -> SpanStats {
        SpanStats::new(
            Address::brick_file("cov", brick),
            [("time".to_string(), ParamRange::ints(lo, hi))],
        )
        .expect("valid stats")
    }

    #[test]
    fn concurrent_writers_merge_per_container() {
        let shared = Arc::new(SharedSpanCollection::new());
        let handles: Vec<_> = (0..8_i64)
            .map(|i| {
                let shared = Arc::clone(&shared);
                thread::spawn(move || {
                    let brick = if i % 2 == 0 { "even" } else { "odd" };
                    shared.add_span(stats(brick, i * 10, i * 10 + 5)).unwrap();
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        assert_eq!(shared.len(), 2);
        let even = shared.get_span(&Address::brick_file("cov", "even")).unwrap();
        assert_eq!(even.param("time"), Some(&ParamRange::ints(0, 65)));
        let odd = shared.get_span(&Address::brick_file("cov", "odd")).unwrap();
        assert_eq!(odd.param("time"), Some(&ParamRange::ints(10, 75)));
    }

    #[test]
    fn merges_queued_by_the_writer_apply_after_flush() {
        let shared = SharedSpanCollection::new();
        shared.add_span(stats("b0", 0, 10)).unwrap();

        let mut follow_ups = Vec::new();
        let flushed = shared
            .flush_dirty(|written| -> Result<(), std::convert::Infallible> {
                follow_ups.push(stats(written.address().top_level_key(), 0, 20));
                follow_ups.push(stats("b1", 5, 6));
                Ok(())
            })
            .unwrap();
        assert_eq!(flushed, 1);

        for record in follow_ups {
            shared.add_span(record).unwrap();
        }
        assert_eq!(shared.len(), 2);
        assert_eq!(shared.get_dirty_spans().len(), 2);
    }

    #[test]
    fn flush_clears_only_written_records() {
        let shared = SharedSpanCollection::new();
        shared.add_span(stats("a", 0, 1)).unwrap();
        shared.add_span(stats("b", 0, 1)).unwrap();
        assert_eq!(shared.get_dirty_spans().len(), 2);

        let result: Result<usize, &str> = shared.flush_dirty(|s| {
            if s.address().top_level_key() == "b" {
                Err("disk full")
            } else {
                Ok(())
            }
        });
        assert_eq!(result, Err("disk full"));

        let dirty = shared.get_dirty_spans();
        assert_eq!(dirty.len(), 1);
        assert_eq!(dirty[0].address().top_level_key(), "b");

        let flushed: Result<usize, &str> = shared.flush_dirty(|_| Ok(()));
        assert_eq!(flushed, Ok(1));
        assert!(shared.get_dirty_spans().is_empty());
    }

    #[test]
    fn converts_to_and_from_plain_collection() {
        let mut plain = SpanCollectionByFile::new();
        plain.add_span(stats("a", 0, 1)).unwrap();

        let shared = SharedSpanCollection::from(plain.clone());
        shared.add_span(stats("a", 5, 6)).unwrap();
        let back = shared.into_collection();

        assert_eq!(back.len(), 1);
        assert_eq!(
            back.get_span(&Address::brick_file("cov", "a")).and_then(|s| s.param("time")),
            Some(&ParamRange::ints(0, 6))
        );
        assert_ne!(back, plain);
    }
}
