//! Indexes of [`SpanStats`] keyed by top-level address key.
//!
//! Two indexes share one error type and one set of encodings:
//!
//! - [`SpanCollectionByFile`]: at most one merged record per top-level key.
//!   Adding stats whose address maps to an existing key widens that record.
//! - [`SpanStatsCollection`]: a second level keyed by the full address text,
//!   so records for different addresses inside one container stay apart.
//!
//! Both hand the persistence layer its work list through `get_dirty_spans`.
//! A record inserted for the first time counts as dirty since it has never
//! been written; decoded collections start clean.
//!
//! [`SharedSpanCollection`] wraps the by-file index for concurrent ingest.

mod shared;
mod stats_collection;

pub use shared::SharedSpanCollection;
pub use stats_collection::{SPAN_STATS_COLLECTION_TYPE, SpanStatsCollection};

use std::{collections::BTreeMap, fmt, str::FromStr};

use log::{debug, warn};
use snafu::prelude::*;

use crate::{
    address::Address,
    literal::{Literal, LiteralError},
    span_stats::{SpanStats, SpanStatsError},
};

/// Value of the `type` entry in the by-file dict form.
pub const SPAN_COLLECTION_BY_FILE_TYPE: &str = "SpanCollectionByFile";

/// Errors raised while merging into or decoding a collection.
#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum CollectionError {
    /// A record could not be merged or decoded.
    #[snafu(transparent)]
    Stats {
        /// Underlying SpanStats error.
        source: SpanStatsError,
    },

    /// The string form is not valid literal syntax.
    #[snafu(transparent)]
    Literal {
        /// Underlying literal parse error.
        source: LiteralError,
    },

    /// The serialized form is not an envelope of the expected collection.
    #[snafu(display("Cannot build {expected} from {found}: {detail}"))]
    UnrecognizedEnvelope {
        /// Collection type being decoded.
        expected: &'static str,
        /// Text form of the rejected input.
        found: String,
        /// What was wrong with it.
        detail: &'static str,
    },
}

/// Build the rejection for a foreign or malformed envelope, logging it.
pub(crate) fn reject(
    expected: &'static str,
    lit: &Literal,
    detail: &'static str,
) -> CollectionError {
    warn!("Rejecting {expected} envelope: {detail}");
    CollectionError::UnrecognizedEnvelope {
        expected,
        found: lit.to_string(),
        detail,
    }
}

/// Check the `type` entry of a dict envelope and return its `spans` dict.
pub(crate) fn envelope_spans<'l>(
    expected: &'static str,
    lit: &'l Literal,
) -> Result<&'l [(Literal, Literal)], CollectionError> {
    if lit.as_dict().is_none() {
        return Err(reject(expected, lit, "expected a dict"));
    }
    if lit.dict_get("type").and_then(Literal::as_str) != Some(expected) {
        return Err(reject(expected, lit, "missing or foreign 'type' entry"));
    }
    lit.dict_get("spans")
        .and_then(Literal::as_dict)
        .ok_or_else(|| reject(expected, lit, "missing 'spans' dict"))
}

/// Check the header of a tuple envelope and return the record tuples.
pub(crate) fn envelope_records<'l>(
    expected: &'static str,
    lit: &'l Literal,
) -> Result<&'l [Literal], CollectionError> {
    let items = lit
        .as_tuple()
        .ok_or_else(|| reject(expected, lit, "expected a tuple"))?;
    match items.split_first() {
        Some((head, records)) if head.as_str() == Some(expected) => Ok(records),
        _ => Err(reject(expected, lit, "missing or foreign type header")),
    }
}

/// Decode one record that may be nested as a literal or as its text.
pub(crate) fn record_from_literal(lit: &Literal) -> Result<SpanStats, CollectionError> {
    match lit {
        Literal::Str(text) => Ok(text.parse::<SpanStats>()?),
        other => Ok(SpanStats::from_literal(other)?),
    }
}

/// One merged [`SpanStats`] record per top-level key.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpanCollectionByFile {
    spans: BTreeMap<String, SpanStats>,
}

impl SpanCollectionByFile {
    /// Empty collection.
    pub fn new() -> SpanCollectionByFile {
        SpanCollectionByFile::default()
    }

    /// Merge `stats` into the record for its top-level key, creating the
    /// record if needed.
    ///
    /// A failed merge leaves the existing record untouched.
    pub fn add_span(&mut self, mut stats: SpanStats) -> Result<(), CollectionError> {
        let key = stats.address().top_level_key().to_string();
        match self.spans.get_mut(&key) {
            Some(existing) => {
                debug!("Extending span: {key}");
                existing.extend(&stats)?;
            }
            None => {
                debug!("Creating new span: {key}");
                stats.mark_dirty();
                self.spans.insert(key, stats);
            }
        }
        Ok(())
    }

    /// Record for the container `address` belongs to.
    pub fn get_span(&self, address: &Address) -> Option<&SpanStats> {
        self.spans.get(address.top_level_key())
    }

    /// Records changed since construction or their last clear.
    pub fn get_dirty_spans(&self) -> Vec<&SpanStats> {
        self.spans.values().filter(|s| s.is_dirty()).collect()
    }

    /// Clear the dirty flag of the record `address` resolves to.
    ///
    /// Returns `false` when no such record exists.
    pub fn mark_clean(&mut self, address: &Address) -> bool {
        match self.spans.get_mut(address.top_level_key()) {
            Some(stats) => {
                stats.mark_clean();
                true
            }
            None => false,
        }
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.spans.len()
    }

    /// Whether the collection has no records.
    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Records in top-level key order.
    pub fn iter(&self) -> impl Iterator<Item = &SpanStats> {
        self.spans.values()
    }

    pub(crate) fn into_records(self) -> impl Iterator<Item = (String, SpanStats)> {
        self.spans.into_iter()
    }

    pub(crate) fn from_records(spans: BTreeMap<String, SpanStats>) -> SpanCollectionByFile {
        SpanCollectionByFile { spans }
    }

    fn decode(
        records: impl IntoIterator<Item = SpanStats>,
    ) -> Result<SpanCollectionByFile, CollectionError> {
        let mut collection = SpanCollectionByFile::new();
        for stats in records {
            collection.add_span(stats)?;
        }
        for stats in collection.spans.values_mut() {
            stats.mark_clean();
        }
        Ok(collection)
    }

    /// Dict form: `{'type': 'SpanCollectionByFile', 'spans': {key: <record dict>}}`.
    pub fn as_dict(&self) -> Literal {
        let spans = self
            .spans
            .iter()
            .map(|(k, s)| (Literal::str(k.as_str()), s.as_dict()))
            .collect();
        Literal::Dict(vec![
            (Literal::str("type"), Literal::str(SPAN_COLLECTION_BY_FILE_TYPE)),
            (Literal::str("spans"), Literal::Dict(spans)),
        ])
    }

    /// Decode the dict form. Records may be nested as dicts or as their text.
    pub fn from_dict(lit: &Literal) -> Result<SpanCollectionByFile, CollectionError> {
        let spans = envelope_spans(SPAN_COLLECTION_BY_FILE_TYPE, lit)?;
        let records = spans
            .iter()
            .map(|(_, v)| record_from_literal(v))
            .collect::<Result<Vec<_>, _>>()?;
        SpanCollectionByFile::decode(records)
    }

    /// Tuple form: `('SpanCollectionByFile', <record tuple>, ...)`, sorted by key.
    pub fn as_tuple(&self) -> Literal {
        let mut items = vec![Literal::str(SPAN_COLLECTION_BY_FILE_TYPE)];
        items.extend(self.spans.values().map(SpanStats::as_tuple));
        Literal::Tuple(items)
    }

    /// Decode the tuple form.
    pub fn from_tuple(lit: &Literal) -> Result<SpanCollectionByFile, CollectionError> {
        let records = envelope_records(SPAN_COLLECTION_BY_FILE_TYPE, lit)?;
        let records = records
            .iter()
            .map(|r| match r {
                Literal::Tuple(_) => Ok(SpanStats::from_tuple(r)?),
                _ => Err(reject(SPAN_COLLECTION_BY_FILE_TYPE, lit, "records must be tuples")),
            })
            .collect::<Result<Vec<_>, _>>()?;
        SpanCollectionByFile::decode(records)
    }

    /// Decode either the dict form or the tuple form.
    pub fn from_literal(lit: &Literal) -> Result<SpanCollectionByFile, CollectionError> {
        match lit {
            Literal::Dict(_) => SpanCollectionByFile::from_dict(lit),
            _ => SpanCollectionByFile::from_tuple(lit),
        }
    }
}

impl fmt::Display for SpanCollectionByFile {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_dict())
    }
}

impl FromStr for SpanCollectionByFile {
    type Err = CollectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SpanCollectionByFile::from_literal(&Literal::parse(s)?)
    }
}
