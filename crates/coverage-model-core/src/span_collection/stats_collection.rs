//! Two-level index: top-level key, then full address text.

use std::{collections::BTreeMap, fmt, str::FromStr};

use log::debug;

use crate::{
    address::Address,
    literal::Literal,
    span_collection::{
        CollectionError, envelope_records, envelope_spans, record_from_literal, reject,
    },
    span_stats::SpanStats,
};

/// Value of the `type` entry in the dict form.
pub const SPAN_STATS_COLLECTION_TYPE: &str = "SpanStatsCollection";

/// [`SpanStats`] records grouped by container, one per distinct address.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SpanStatsCollection {
    spans: BTreeMap<String, BTreeMap<String, SpanStats>>,
}

impl SpanStatsCollection {
    /// Empty collection.
    pub fn new() -> SpanStatsCollection {
        SpanStatsCollection::default()
    }

    /// Store `stats` under its address, widening the record when the exact
    /// address is already present.
    pub fn add_span(&mut self, mut stats: SpanStats) -> Result<(), CollectionError> {
        let key = stats.address().top_level_key().to_string();
        let address = stats.address().to_string();
        let group = self.spans.entry(key).or_default();
        match group.get_mut(&address) {
            Some(existing) => {
                debug!("Extending span: {address}");
                existing.extend(&stats)?;
            }
            None => {
                debug!("Creating new span: {address}");
                stats.mark_dirty();
                group.insert(address, stats);
            }
        }
        Ok(())
    }

    /// Record stored for exactly `address`.
    pub fn get_span(&self, address: &Address) -> Option<&SpanStats> {
        self.spans
            .get(address.top_level_key())?
            .get(&address.to_string())
    }

    /// Records changed since construction or their last clear.
    pub fn get_dirty_spans(&self) -> Vec<&SpanStats> {
        self.iter().filter(|s| s.is_dirty()).collect()
    }

    /// Clear the dirty flag of the record stored for `address`.
    ///
    /// Returns `false` when no such record exists.
    pub fn mark_clean(&mut self, address: &Address) -> bool {
        let record = self
            .spans
            .get_mut(address.top_level_key())
            .and_then(|group| group.get_mut(&address.to_string()));
        match record {
            Some(stats) => {
                stats.mark_clean();
                true
            }
            None => false,
        }
    }

    /// Number of records across all containers.
    pub fn len(&self) -> usize {
        self.spans.values().map(BTreeMap::len).sum()
    }

    /// Whether the collection has no records.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records ordered by top-level key, then address text.
    pub fn iter(&self) -> impl Iterator<Item = &SpanStats> {
        self.spans.values().flat_map(BTreeMap::values)
    }

    fn decode(
        records: impl IntoIterator<Item = SpanStats>,
    ) -> Result<SpanStatsCollection, CollectionError> {
        let mut collection = SpanStatsCollection::new();
        for stats in records {
            collection.add_span(stats)?;
        }
        for stats in collection.spans.values_mut().flat_map(BTreeMap::values_mut) {
            stats.mark_clean();
        }
        Ok(collection)
    }

    /// Dict form: `{'type': 'SpanStatsCollection', 'spans': {key: {address: <record dict>}}}`.
    pub fn as_dict(&self) -> Literal {
        let spans = self
            .spans
            .iter()
            .map(|(key, group)| {
                let inner = group
                    .iter()
                    .map(|(addr, s)| (Literal::str(addr.as_str()), s.as_dict()))
                    .collect();
                (Literal::str(key.as_str()), Literal::Dict(inner))
            })
            .collect();
        Literal::Dict(vec![
            (Literal::str("type"), Literal::str(SPAN_STATS_COLLECTION_TYPE)),
            (Literal::str("spans"), Literal::Dict(spans)),
        ])
    }

    /// Decode the dict form. Records may be nested as dicts or as their text.
    pub fn from_dict(lit: &Literal) -> Result<SpanStatsCollection, CollectionError> {
        let spans = envelope_spans(SPAN_STATS_COLLECTION_TYPE, lit)?;
        let mut records = Vec::new();
        for (_, group) in spans {
            let group = group
                .as_dict()
                .ok_or_else(|| reject(SPAN_STATS_COLLECTION_TYPE, lit, "groups must be dicts"))?;
            for (_, record) in group {
                records.push(record_from_literal(record)?);
            }
        }
        SpanStatsCollection::decode(records)
    }

    /// Tuple form: `('SpanStatsCollection', <record tuple>, ...)`.
    pub fn as_tuple(&self) -> Literal {
        let mut items = vec![Literal::str(SPAN_STATS_COLLECTION_TYPE)];
        items.extend(self.iter().map(SpanStats::as_tuple));
        Literal::Tuple(items)
    }

    /// Decode the tuple form.
    pub fn from_tuple(lit: &Literal) -> Result<SpanStatsCollection, CollectionError> {
        let records = envelope_records(SPAN_STATS_COLLECTION_TYPE, lit)?
            .iter()
            .map(|r| match r {
                Literal::Tuple(_) => Ok(SpanStats::from_tuple(r)?),
                _ => Err(reject(SPAN_STATS_COLLECTION_TYPE, lit, "records must be tuples")),
            })
            .collect::<Result<Vec<_>, _>>()?;
        SpanStatsCollection::decode(records)
    }

    /// Decode either the dict form or the tuple form.
    pub fn from_literal(lit: &Literal) -> Result<SpanStatsCollection, CollectionError> {
        match lit {
            Literal::Dict(_) => SpanStatsCollection::from_dict(lit),
            _ => SpanStatsCollection::from_tuple(lit),
        }
    }
}

impl fmt::Display for SpanStatsCollection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_dict())
    }
}

impl FromStr for SpanStatsCollection {
    type Err = CollectionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SpanStatsCollection::from_literal(&Literal::parse(s)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::ParamRange;

    fn region(brick: &str, lo: i64, hi: i64) -> SpanStats {
        SpanStats::new(
            Address::brick("cov", brick, vec![(lo, hi)]),
            [("time".to_string(), ParamRange::ints(lo, hi))],
        )
        .expect("valid stats")
    }

    #[test]
    fn distinct_addresses_in_one_container_stay_apart() {
        let mut c = SpanStatsCollection::new();
        c.add_span(region("b0", 0, 10)).unwrap();
        c.add_span(region("b0", 10, 20)).unwrap();
        c.add_span(region("b1", 0, 10)).unwrap();
        assert_eq!(c.len(), 3);

        let addr = Address::brick("cov", "b0", vec![(10, 20)]);
        assert_eq!(
            c.get_span(&addr).and_then(|s| s.param("time")),
            Some(&ParamRange::ints(10, 20))
        );
        assert_eq!(c.get_span(&Address::brick_file("cov", "b0")), None);
    }

    #[test]
    fn identical_address_is_widened() {
        let mut c = SpanStatsCollection::new();
        let addr = Address::brick_file("cov", "b0");
        c.add_span(
            SpanStats::new(addr.clone(), [("t".to_string(), ParamRange::ints(0, 5))]).unwrap(),
        )
        .unwrap();
        assert!(c.mark_clean(&addr));

        c.add_span(
            SpanStats::new(addr.clone(), [("t".to_string(), ParamRange::ints(3, 9))]).unwrap(),
        )
        .unwrap();
        assert_eq!(c.len(), 1);
        assert_eq!(c.get_span(&addr).and_then(|s| s.param("t")), Some(&ParamRange::ints(0, 9)));
        assert_eq!(c.get_dirty_spans().len(), 1);
    }

    #[test]
    fn encodings_round_trip() {
        let mut c = SpanStatsCollection::new();
        c.add_span(region("b0", 0, 10)).unwrap();
        c.add_span(region("b0", 10, 20)).unwrap();
        c.add_span(region("b1", 0, 10)).unwrap();

        let back = SpanStatsCollection::from_dict(&c.as_dict()).unwrap();
        assert_eq!(back, c);
        assert!(back.get_dirty_spans().is_empty());

        assert_eq!(SpanStatsCollection::from_tuple(&c.as_tuple()).unwrap(), c);
        assert_eq!(c.to_string().parse::<SpanStatsCollection>().unwrap(), c);
    }

    #[test]
    fn by_file_envelope_is_foreign_here() {
        let err = "{'type': 'SpanCollectionByFile', 'spans': {}}"
            .parse::<SpanStatsCollection>()
            .unwrap_err();
        assert!(matches!(
            err,
            CollectionError::UnrecognizedEnvelope {
                expected: SPAN_STATS_COLLECTION_TYPE,
                ..
            }
        ));
    }
}
