//! Per-address parameter range records.
//!
//! A [`SpanStats`] remembers, for one [`Address`], the `(lo, hi)` range of
//! every parameter written there. Ranges only ever widen: a parameter, once
//! added, is extended to the union of its stored range and any new range.
//!
//! Each record carries an explicit dirty flag. Mutating methods set it when
//! (and only when) a stored range actually changes; the persistence layer
//! clears it with [`SpanStats::mark_clean`] after a confirmed durable write.
//!
//! ## Encodings
//!
//! All three encodings round-trip against each other:
//!
//! ```text
//! dict:   {'type': 'SpanStats', 'address': "('Address', 'abc')", 'time': (0, 99)}
//! tuple:  (('Address', 'abc'), ('time', (0, 99)))
//! string: literal text of the dict form
//! ```

use std::{cmp::Ordering, collections::BTreeMap, fmt, str::FromStr};

use log::warn;
use snafu::prelude::*;

use crate::{
    address::{Address, AddressError},
    literal::{Literal, LiteralError},
    value::{ParamRange, ValueError},
};

/// Value of the `type` entry in the dict form.
pub const SPAN_STATS_TYPE: &str = "SpanStats";

/// Dict-form keys that cannot be used as parameter names.
pub const RESERVED_PARAM_NAMES: [&str; 2] = ["type", "address"];

/// Errors raised by [`SpanStats`] construction, mutation, and decoding.
#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum SpanStatsError {
    /// `add_param` was called for a key that already has a range.
    #[snafu(display("Parameter {key:?} already exists with range {existing}"))]
    DuplicateParam {
        /// Parameter name.
        key: String,
        /// Range currently stored for the parameter.
        existing: String,
    },

    /// The parameter name collides with a dict-form envelope key.
    #[snafu(display("Parameter name {key:?} is reserved"))]
    ReservedParamName {
        /// Parameter name.
        key: String,
    },

    /// A range is invalid or incompatible with the stored range.
    #[snafu(display("Invalid range for parameter {key:?}: {source}"))]
    InvalidRange {
        /// Parameter name.
        key: String,
        /// Underlying value error.
        source: ValueError,
    },

    /// The serialized form is not a SpanStats envelope.
    #[snafu(display("Cannot build SpanStats from {found}: {detail}"))]
    UnrecognizedEnvelope {
        /// Text form of the rejected input.
        found: String,
        /// What was wrong with it.
        detail: &'static str,
    },

    /// The address inside the envelope could not be decoded.
    #[snafu(transparent)]
    Address {
        /// Underlying address error.
        source: AddressError,
    },

    /// The string form is not valid literal syntax.
    #[snafu(transparent)]
    Literal {
        /// Underlying literal parse error.
        source: LiteralError,
    },
}

/// Parameter ranges recorded for one address.
///
/// Equality compares the address and the ranges; the dirty flag is
/// bookkeeping and does not take part.
#[derive(Debug, Clone)]
pub struct SpanStats {
    address: Address,
    params: BTreeMap<String, ParamRange>,
    dirty: bool,
}

impl SpanStats {
    /// Build a clean record from an address and initial ranges.
    pub fn new(
        address: Address,
        params: impl IntoIterator<Item = (String, ParamRange)>,
    ) -> Result<SpanStats, SpanStatsError> {
        let mut stats = SpanStats {
            address,
            params: BTreeMap::new(),
            dirty: false,
        };
        for (key, range) in params {
            stats.add_param(key, range)?;
        }
        stats.dirty = false;
        Ok(stats)
    }

    /// Address this record describes.
    pub fn address(&self) -> &Address {
        &self.address
    }

    /// All stored ranges, sorted by parameter name.
    pub fn params(&self) -> &BTreeMap<String, ParamRange> {
        &self.params
    }

    /// Stored range of one parameter.
    pub fn param(&self, key: &str) -> Option<&ParamRange> {
        self.params.get(key)
    }

    /// Whether a range changed since construction or the last clear.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Clear the dirty flag.
    ///
    /// Only call this once the record's current state is durably written.
    pub fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Add a range for a parameter that has none yet.
    pub fn add_param(
        &mut self,
        key: impl Into<String>,
        range: ParamRange,
    ) -> Result<(), SpanStatsError> {
        let key = key.into();
        ensure!(
            !RESERVED_PARAM_NAMES.contains(&key.as_str()),
            ReservedParamNameSnafu { key }
        );
        if let Some(existing) = self.params.get(&key) {
            return DuplicateParamSnafu {
                existing: existing.to_string(),
                key,
            }
            .fail();
        }
        self.params.insert(key, range);
        self.dirty = true;
        Ok(())
    }

    /// Widen a parameter's range to cover `range`, adding it if new.
    pub fn extend_param(
        &mut self,
        key: impl Into<String>,
        range: ParamRange,
    ) -> Result<(), SpanStatsError> {
        let key = key.into();
        match self.params.get(&key) {
            None => self.add_param(key, range),
            Some(current) => {
                let widened = current
                    .union(&range)
                    .context(InvalidRangeSnafu { key: key.as_str() })?;
                self.replace_if_changed(key, widened);
                Ok(())
            }
        }
    }

    /// Widen several parameters at once.
    ///
    /// Every entry is validated before any is applied, so a failing entry
    /// leaves the record untouched.
    pub fn extend_params<'a>(
        &mut self,
        params: impl IntoIterator<Item = (&'a String, &'a ParamRange)>,
    ) -> Result<(), SpanStatsError> {
        let mut staged = Vec::new();
        for (key, range) in params {
            ensure!(
                !RESERVED_PARAM_NAMES.contains(&key.as_str()),
                ReservedParamNameSnafu { key: key.as_str() }
            );
            let next = match self.params.get(key) {
                None => range.clone(),
                Some(current) => current
                    .union(range)
                    .context(InvalidRangeSnafu { key: key.as_str() })?,
            };
            staged.push((key.clone(), next));
        }

        for (key, next) in staged {
            self.replace_if_changed(key, next);
        }
        Ok(())
    }

    /// Widen this record with every range of `other`.
    pub fn extend(&mut self, other: &SpanStats) -> Result<(), SpanStatsError> {
        self.extend_params(&other.params)
    }

    fn replace_if_changed(&mut self, key: String, next: ParamRange) {
        if self.params.get(&key) != Some(&next) {
            self.params.insert(key, next);
            self.dirty = true;
        }
    }

    /// Dict form: `{'type': 'SpanStats', 'address': <address text>, <param>: (lo, hi), ...}`.
    pub fn as_dict(&self) -> Literal {
        let mut entries = vec![
            (Literal::str("type"), Literal::str(SPAN_STATS_TYPE)),
            (
                Literal::str("address"),
                Literal::Str(self.address.to_string()),
            ),
        ];
        entries.extend(
            self.params
                .iter()
                .map(|(k, r)| (Literal::str(k.as_str()), r.to_literal())),
        );
        Literal::Dict(entries)
    }

    /// Decode the dict form. The result is clean.
    pub fn from_dict(lit: &Literal) -> Result<SpanStats, SpanStatsError> {
        let reject = |detail| {
            warn!("Rejecting SpanStats envelope: {detail}");
            SpanStatsError::UnrecognizedEnvelope {
                found: lit.to_string(),
                detail,
            }
        };

        let entries = lit.as_dict().ok_or_else(|| reject("expected a dict"))?;
        if lit.dict_get("type").and_then(Literal::as_str) != Some(SPAN_STATS_TYPE) {
            return Err(reject("missing or foreign 'type' entry"));
        }
        let address: Address = lit
            .dict_get("address")
            .and_then(Literal::as_str)
            .ok_or_else(|| reject("missing 'address' entry"))?
            .parse()?;

        let mut params = Vec::with_capacity(entries.len());
        for (k, v) in entries {
            let key = k.as_str().ok_or_else(|| reject("parameter names must be strings"))?;
            if RESERVED_PARAM_NAMES.contains(&key) {
                continue;
            }
            let range = ParamRange::from_literal(v).context(InvalidRangeSnafu { key })?;
            params.push((key.to_string(), range));
        }

        SpanStats::new(address, params)
    }

    /// Tuple form: `(<address tuple>, (param, (lo, hi)), ...)`.
    pub fn as_tuple(&self) -> Literal {
        let mut items = vec![self.address.as_tuple()];
        items.extend(self.params.iter().map(|(k, r)| {
            Literal::Tuple(vec![Literal::str(k.as_str()), r.to_literal()])
        }));
        Literal::Tuple(items)
    }

    /// Decode the tuple form. The result is clean.
    pub fn from_tuple(lit: &Literal) -> Result<SpanStats, SpanStatsError> {
        let reject = |detail| {
            warn!("Rejecting SpanStats tuple: {detail}");
            SpanStatsError::UnrecognizedEnvelope {
                found: lit.to_string(),
                detail,
            }
        };

        let items = lit.as_tuple().ok_or_else(|| reject("expected a tuple"))?;
        let (address, rest) = items
            .split_first()
            .ok_or_else(|| reject("empty tuple has no address"))?;
        let address = Address::from_tuple(address)?;

        let mut params = Vec::with_capacity(rest.len());
        for item in rest {
            let Some([name, range]) = item.as_tuple() else {
                return Err(reject("expected (name, (lo, hi)) entries"));
            };
            let key = name
                .as_str()
                .ok_or_else(|| reject("parameter names must be strings"))?;
            let range = ParamRange::from_literal(range).context(InvalidRangeSnafu { key })?;
            params.push((key.to_string(), range));
        }

        SpanStats::new(address, params)
    }

    /// Decode either the dict form or the tuple form.
    pub fn from_literal(lit: &Literal) -> Result<SpanStats, SpanStatsError> {
        match lit {
            Literal::Dict(_) => SpanStats::from_dict(lit),
            _ => SpanStats::from_tuple(lit),
        }
    }
}

/// Order records by address only.
pub fn cmp_span_stats_by_address(a: &SpanStats, b: &SpanStats) -> Ordering {
    a.address.cmp(&b.address)
}

impl PartialEq for SpanStats {
    fn eq(&self, other: &Self) -> bool {
        self.address == other.address && self.params == other.params
    }
}

impl PartialOrd for SpanStats {
    /// Records at different addresses order by address. Records at the same
    /// address are only comparable when equal.
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match self.address.cmp(&other.address) {
            Ordering::Equal if self.params == other.params => Some(Ordering::Equal),
            Ordering::Equal => None,
            ord => Some(ord),
        }
    }
}

impl fmt::Display for SpanStats {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_dict())
    }
}

impl FromStr for SpanStats {
    type Err = SpanStatsError;

    /// Parse the literal text of either the dict or the tuple form.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SpanStats::from_literal(&Literal::parse(s)?)
    }
}
