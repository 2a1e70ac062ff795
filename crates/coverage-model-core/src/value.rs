//! Typed parameter values, columns, and value ranges.
//!
//! A coverage parameter is a column of one element kind ([`DType`]). Columns
//! are carried as [`ColumnData`], single elements as [`ParamValue`], and the
//! `(lo, hi)` pairs tracked by span statistics as [`ParamRange`].
//!
//! Every range keeps both ends of the same kind; mixing kinds is rejected at
//! construction, which is what lets range widening compare ends directly.

use std::{cmp::Ordering, fmt, ops::Range};

use serde::{Deserialize, Serialize};
use serde_json::Value;
use snafu::prelude::*;

use crate::literal::Literal;

/// Errors raised by value, column, and range operations.
#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum ValueError {
    /// The two ends of a range are of different kinds.
    #[snafu(display("Range ends must share one element kind, found {lo} and {hi}"))]
    MixedRange {
        /// Kind of the low end.
        lo: DType,
        /// Kind of the high end.
        hi: DType,
    },

    /// A value's kind does not match the column or range it is applied to.
    #[snafu(display("Expected a {expected} value, found {found}"))]
    KindMismatch {
        /// Kind required by the target.
        expected: DType,
        /// Kind of the supplied value.
        found: DType,
    },

    /// A literal cannot represent a parameter value or range.
    #[snafu(display("Cannot read a {what} from {kind} literal {found}"))]
    UnsupportedLiteral {
        /// What the caller tried to decode.
        what: &'static str,
        /// Variant name of the offending literal.
        kind: &'static str,
        /// Text form of the offending literal.
        found: String,
    },

    /// A JSON value cannot be read as the requested kind.
    #[snafu(display("Cannot read a {dtype} value from JSON {found}"))]
    UnsupportedJson {
        /// Kind that was requested.
        dtype: DType,
        /// Text form of the offending JSON value.
        found: String,
    },

    /// Element index past the end of a column.
    #[snafu(display("Index {index} out of bounds for column of length {len}"))]
    OutOfBounds {
        /// Requested index.
        index: usize,
        /// Column length.
        len: usize,
    },
}

/// Element kind of a column or scalar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    /// Boolean elements.
    Bool,
    /// 64-bit signed integers.
    Int64,
    /// 64-bit floats.
    Float64,
    /// UTF-8 strings.
    Str,
}

impl DType {
    /// Stable lowercase name (`"bool"`, `"int64"`, `"float64"`, `"str"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int64 => "int64",
            DType::Float64 => "float64",
            DType::Str => "str",
        }
    }

    /// The value used for new elements when no fill value is configured.
    pub fn default_fill(&self) -> ParamValue {
        match self {
            DType::Bool => ParamValue::Bool(false),
            DType::Int64 => ParamValue::Int(0),
            DType::Float64 => ParamValue::Float(f64::NAN),
            DType::Str => ParamValue::Str(String::new()),
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single parameter value.
///
/// Equality treats every NaN float as equal to every other NaN, so a range
/// holding NaN still compares equal to itself and to its reparsed text.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    /// Boolean.
    Bool(bool),
    /// Integer.
    Int(i64),
    /// Float.
    Float(f64),
    /// String.
    Str(String),
}

impl ParamValue {
    /// Element kind of this value.
    pub fn dtype(&self) -> DType {
        match self {
            ParamValue::Bool(_) => DType::Bool,
            ParamValue::Int(_) => DType::Int64,
            ParamValue::Float(_) => DType::Float64,
            ParamValue::Str(_) => DType::Str,
        }
    }

    /// Compare two values of the same kind; `None` when kinds differ.
    ///
    /// Floats use IEEE total ordering so every pair is comparable.
    pub fn compare(&self, other: &ParamValue) -> Option<Ordering> {
        match (self, other) {
            (ParamValue::Bool(a), ParamValue::Bool(b)) => Some(a.cmp(b)),
            (ParamValue::Int(a), ParamValue::Int(b)) => Some(a.cmp(b)),
            (ParamValue::Float(a), ParamValue::Float(b)) => Some(a.total_cmp(b)),
            (ParamValue::Str(a), ParamValue::Str(b)) => Some(a.cmp(b)),
            _ => None,
        }
    }

    /// Literal form of the value.
    pub fn to_literal(&self) -> Literal {
        match self {
            ParamValue::Bool(v) => Literal::Bool(*v),
            ParamValue::Int(v) => Literal::Int(*v),
            ParamValue::Float(v) => Literal::Float(*v),
            ParamValue::Str(v) => Literal::Str(v.clone()),
        }
    }

    /// Read a value back from its literal form.
    pub fn from_literal(lit: &Literal) -> Result<ParamValue, ValueError> {
        match lit {
            Literal::Bool(v) => Ok(ParamValue::Bool(*v)),
            Literal::Int(v) => Ok(ParamValue::Int(*v)),
            Literal::Float(v) => Ok(ParamValue::Float(*v)),
            Literal::Str(v) => Ok(ParamValue::Str(v.clone())),
            other => UnsupportedLiteralSnafu {
                what: "parameter value",
                kind: other.kind_name(),
                found: other.to_string(),
            }
            .fail(),
        }
    }

    /// Read a JSON value as the given kind.
    ///
    /// `null` reads as the kind's default fill; JSON cannot carry NaN, so a
    /// float column's NaN fill comes back this way.
    pub fn from_json(dtype: DType, value: &Value) -> Result<ParamValue, ValueError> {
        let parsed = match (dtype, value) {
            (_, Value::Null) => Some(dtype.default_fill()),
            (DType::Bool, Value::Bool(v)) => Some(ParamValue::Bool(*v)),
            (DType::Int64, Value::Number(n)) => n.as_i64().map(ParamValue::Int),
            (DType::Float64, Value::Number(n)) => n.as_f64().map(ParamValue::Float),
            (DType::Str, Value::String(s)) => Some(ParamValue::Str(s.clone())),
            _ => None,
        };
        parsed.context(UnsupportedJsonSnafu {
            dtype,
            found: value.to_string(),
        })
    }

    fn expect_kind(&self, expected: DType) -> Result<(), ValueError> {
        let found = self.dtype();
        ensure!(found == expected, KindMismatchSnafu { expected, found });
        Ok(())
    }
}

impl PartialEq for ParamValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (ParamValue::Bool(a), ParamValue::Bool(b)) => a == b,
            (ParamValue::Int(a), ParamValue::Int(b)) => a == b,
            (ParamValue::Float(a), ParamValue::Float(b)) => a == b || (a.is_nan() && b.is_nan()),
            (ParamValue::Str(a), ParamValue::Str(b)) => a == b,
            _ => false,
        }
    }
}

impl fmt::Display for ParamValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_literal())
    }
}

/// A `(lo, hi)` value range whose ends share one element kind.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamRange {
    lo: ParamValue,
    hi: ParamValue,
}

impl ParamRange {
    /// Build a range, rejecting ends of different kinds.
    ///
    /// Reversed ends are swapped, so `lo <= hi` always holds.
    pub fn new(lo: ParamValue, hi: ParamValue) -> Result<ParamRange, ValueError> {
        ensure!(
            lo.dtype() == hi.dtype(),
            MixedRangeSnafu {
                lo: lo.dtype(),
                hi: hi.dtype(),
            }
        );
        Ok(ParamRange::ordered(lo, hi))
    }

    /// Integer range shorthand. Reversed ends are swapped.
    pub fn ints(lo: i64, hi: i64) -> ParamRange {
        ParamRange::ordered(ParamValue::Int(lo), ParamValue::Int(hi))
    }

    /// Float range shorthand. Reversed ends are swapped.
    pub fn floats(lo: f64, hi: f64) -> ParamRange {
        ParamRange::ordered(ParamValue::Float(lo), ParamValue::Float(hi))
    }

    /// Same-kind ends in ascending order.
    fn ordered(lo: ParamValue, hi: ParamValue) -> ParamRange {
        if lo.compare(&hi) == Some(Ordering::Greater) {
            ParamRange { lo: hi, hi: lo }
        } else {
            ParamRange { lo, hi }
        }
    }

    /// Low end.
    pub fn lo(&self) -> &ParamValue {
        &self.lo
    }

    /// High end.
    pub fn hi(&self) -> &ParamValue {
        &self.hi
    }

    /// Element kind shared by both ends.
    pub fn dtype(&self) -> DType {
        self.lo.dtype()
    }

    /// Smaller of the two ends.
    pub fn min(&self) -> &ParamValue {
        match self.lo.compare(&self.hi) {
            Some(Ordering::Greater) => &self.hi,
            _ => &self.lo,
        }
    }

    /// Larger of the two ends.
    pub fn max(&self) -> &ParamValue {
        match self.lo.compare(&self.hi) {
            Some(Ordering::Greater) => &self.lo,
            _ => &self.hi,
        }
    }

    /// Smallest range covering both `self` and `other`.
    pub fn union(&self, other: &ParamRange) -> Result<ParamRange, ValueError> {
        other.lo.expect_kind(self.dtype())?;

        let lo = pick(self.min(), other.min(), Ordering::Less);
        let hi = pick(self.max(), other.max(), Ordering::Greater);
        Ok(ParamRange {
            lo: lo.clone(),
            hi: hi.clone(),
        })
    }

    /// `(lo, hi)` literal tuple.
    pub fn to_literal(&self) -> Literal {
        Literal::Tuple(vec![self.lo.to_literal(), self.hi.to_literal()])
    }

    /// Read a range from a two-element literal tuple.
    pub fn from_literal(lit: &Literal) -> Result<ParamRange, ValueError> {
        match lit.as_tuple() {
            Some([lo, hi]) => {
                ParamRange::new(ParamValue::from_literal(lo)?, ParamValue::from_literal(hi)?)
            }
            _ => UnsupportedLiteralSnafu {
                what: "2-tuple range",
                kind: lit.kind_name(),
                found: lit.to_string(),
            }
            .fail(),
        }
    }
}

impl fmt::Display for ParamRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_literal())
    }
}

/// Return `b` only when it compares as `wanted` against `a`.
fn pick<'v>(a: &'v ParamValue, b: &'v ParamValue, wanted: Ordering) -> &'v ParamValue {
    if a.compare(b) == Some(wanted.reverse()) {
        b
    } else {
        a
    }
}

/// A typed column of parameter data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "dtype", content = "values", rename_all = "lowercase")]
pub enum ColumnData {
    /// Boolean column.
    Bool(Vec<bool>),
    /// Integer column.
    Int64(Vec<i64>),
    /// Float column.
    Float64(Vec<f64>),
    /// String column.
    Str(Vec<String>),
}

impl ColumnData {
    /// An empty column of the given kind.
    pub fn empty(dtype: DType) -> ColumnData {
        match dtype {
            DType::Bool => ColumnData::Bool(Vec::new()),
            DType::Int64 => ColumnData::Int64(Vec::new()),
            DType::Float64 => ColumnData::Float64(Vec::new()),
            DType::Str => ColumnData::Str(Vec::new()),
        }
    }

    /// Element kind of the column.
    pub fn dtype(&self) -> DType {
        match self {
            ColumnData::Bool(_) => DType::Bool,
            ColumnData::Int64(_) => DType::Int64,
            ColumnData::Float64(_) => DType::Float64,
            ColumnData::Str(_) => DType::Str,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Bool(v) => v.len(),
            ColumnData::Int64(v) => v.len(),
            ColumnData::Float64(v) => v.len(),
            ColumnData::Str(v) => v.len(),
        }
    }

    /// Whether the column has no elements.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Element at `index`.
    pub fn get(&self, index: usize) -> Option<ParamValue> {
        match self {
            ColumnData::Bool(v) => v.get(index).copied().map(ParamValue::Bool),
            ColumnData::Int64(v) => v.get(index).copied().map(ParamValue::Int),
            ColumnData::Float64(v) => v.get(index).copied().map(ParamValue::Float),
            ColumnData::Str(v) => v.get(index).cloned().map(ParamValue::Str),
        }
    }

    /// Overwrite the element at `index`.
    pub fn set(&mut self, index: usize, value: ParamValue) -> Result<(), ValueError> {
        let len = self.len();
        ensure!(index < len, OutOfBoundsSnafu { index, len });
        match (self, value) {
            (ColumnData::Bool(v), ParamValue::Bool(x)) => v[index] = x,
            (ColumnData::Int64(v), ParamValue::Int(x)) => v[index] = x,
            (ColumnData::Float64(v), ParamValue::Float(x)) => v[index] = x,
            (ColumnData::Str(v), ParamValue::Str(x)) => v[index] = x,
            (col, value) => {
                return KindMismatchSnafu {
                    expected: col.dtype(),
                    found: value.dtype(),
                }
                .fail();
            }
        }
        Ok(())
    }

    /// Copy of the elements in `range`.
    pub fn slice(&self, range: Range<usize>) -> Result<ColumnData, ValueError> {
        let len = self.len();
        ensure!(
            range.start <= range.end && range.end <= len,
            OutOfBoundsSnafu {
                index: range.end,
                len
            }
        );
        Ok(match self {
            ColumnData::Bool(v) => ColumnData::Bool(v[range].to_vec()),
            ColumnData::Int64(v) => ColumnData::Int64(v[range].to_vec()),
            ColumnData::Float64(v) => ColumnData::Float64(v[range].to_vec()),
            ColumnData::Str(v) => ColumnData::Str(v[range].to_vec()),
        })
    }

    /// Insert `count` copies of `fill` before position `origin`.
    pub fn insert_filled(
        &mut self,
        origin: usize,
        count: usize,
        fill: &ParamValue,
    ) -> Result<(), ValueError> {
        let len = self.len();
        ensure!(origin <= len, OutOfBoundsSnafu { index: origin, len });
        match (self, fill) {
            (ColumnData::Bool(v), ParamValue::Bool(x)) => {
                v.splice(origin..origin, std::iter::repeat_n(*x, count));
            }
            (ColumnData::Int64(v), ParamValue::Int(x)) => {
                v.splice(origin..origin, std::iter::repeat_n(*x, count));
            }
            (ColumnData::Float64(v), ParamValue::Float(x)) => {
                v.splice(origin..origin, std::iter::repeat_n(*x, count));
            }
            (ColumnData::Str(v), ParamValue::Str(x)) => {
                v.splice(origin..origin, std::iter::repeat_n(x.clone(), count));
            }
            (col, fill) => {
                return KindMismatchSnafu {
                    expected: col.dtype(),
                    found: fill.dtype(),
                }
                .fail();
            }
        }
        Ok(())
    }

    /// Overwrite every element with `value`.
    pub fn fill(&mut self, value: &ParamValue) -> Result<(), ValueError> {
        value.expect_kind(self.dtype())?;
        let len = self.len();
        for index in 0..len {
            self.set(index, value.clone())?;
        }
        Ok(())
    }

    /// Iterate over the elements as [`ParamValue`]s.
    pub fn iter(&self) -> impl Iterator<Item = ParamValue> + '_ {
        (0..self.len()).filter_map(move |i| self.get(i))
    }

    /// Smallest element, or `None` for an empty column.
    ///
    /// NaN floats (the default float fill) are not data and are skipped.
    pub fn min(&self) -> Option<ParamValue> {
        self.values()
            .reduce(|a, b| if b.compare(&a) == Some(Ordering::Less) { b } else { a })
    }

    /// Largest element, or `None` for an empty column. NaN floats are skipped.
    pub fn max(&self) -> Option<ParamValue> {
        self.values()
            .reduce(|a, b| if b.compare(&a) == Some(Ordering::Greater) { b } else { a })
    }

    fn values(&self) -> impl Iterator<Item = ParamValue> + '_ {
        self.iter()
            .filter(|v| !matches!(v, ParamValue::Float(x) if x.is_nan()))
    }

    /// `(min, max)` of the column, or `None` when it holds no comparable data.
    pub fn range(&self) -> Option<ParamRange> {
        Some(ParamRange {
            lo: self.min()?,
            hi: self.max()?,
        })
    }

    /// JSON array of the elements (NaN floats become `null`).
    pub fn to_json(&self) -> Value {
        Value::Array(
            self.iter()
                .map(|v| serde_json::to_value(v).unwrap_or(Value::Null))
                .collect(),
        )
    }

    /// Read a JSON array as a column of the given kind.
    pub fn from_json(dtype: DType, value: &Value) -> Result<ColumnData, ValueError> {
        let items = value.as_array().context(UnsupportedJsonSnafu {
            dtype,
            found: value.to_string(),
        })?;

        let mut column = ColumnData::empty(dtype);
        for item in items {
            let v = ParamValue::from_json(dtype, item)?;
            let end = column.len();
            column.insert_filled(end, 1, &v)?;
        }
        Ok(column)
    }
}

impl From<Vec<i64>> for ColumnData {
    fn from(values: Vec<i64>) -> Self {
        ColumnData::Int64(values)
    }
}

impl From<Vec<f64>> for ColumnData {
    fn from(values: Vec<f64>) -> Self {
        ColumnData::Float64(values)
    }
}

impl From<Vec<bool>> for ColumnData {
    fn from(values: Vec<bool>) -> Self {
        ColumnData::Bool(values)
    }
}

impl From<Vec<String>> for ColumnData {
    fn from(values: Vec<String>) -> Self {
        ColumnData::Str(values)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn range_rejects_mixed_kinds() {
        let err = ParamRange::new(ParamValue::Int(1), ParamValue::Float(2.0)).unwrap_err();
        assert_eq!(
            err,
            ValueError::MixedRange {
                lo: DType::Int64,
                hi: DType::Float64
            }
        );
    }

    #[test]
    fn union_takes_outer_bounds_and_normalizes_order() {
        let a = ParamRange::ints(10, 0);
        let b = ParamRange::ints(5, 20);
        let u = a.union(&b).unwrap();
        assert_eq!(u, ParamRange::ints(0, 20));
    }

    #[test]
    fn reversed_ends_are_stored_in_order() {
        let r = ParamRange::new(ParamValue::Int(10), ParamValue::Int(0)).unwrap();
        assert_eq!(r.lo(), &ParamValue::Int(0));
        assert_eq!(r.hi(), &ParamValue::Int(10));
        assert_eq!(r, ParamRange::ints(0, 10));
        assert_eq!(r.to_string(), "(0, 10)");
    }

    #[test]
    fn nan_floats_compare_equal() {
        assert_eq!(ParamValue::Float(f64::NAN), ParamValue::Float(-f64::NAN));
        assert_ne!(ParamValue::Float(f64::NAN), ParamValue::Float(0.0));
        assert_eq!(ParamRange::floats(0.0, f64::NAN), ParamRange::floats(0.0, f64::NAN));
    }

    #[test]
    fn column_range_skips_nan_fill() {
        let col = ColumnData::from(vec![f64::NAN, 2.0, -3.0, f64::NAN]);
        assert_eq!(col.range(), Some(ParamRange::floats(-3.0, 2.0)));
        assert_eq!(ColumnData::from(vec![f64::NAN]).range(), None);
    }

    #[test]
    fn union_rejects_kind_mismatch() {
        let a = ParamRange::ints(0, 1);
        let b = ParamRange::floats(0.0, 1.0);
        assert_eq!(
            a.union(&b).unwrap_err(),
            ValueError::KindMismatch {
                expected: DType::Int64,
                found: DType::Float64
            }
        );
    }

    #[test]
    fn column_min_max() {
        let col = ColumnData::from(vec![3.5, -1.0, 9.25]);
        assert_eq!(col.range(), Some(ParamRange::floats(-1.0, 9.25)));
        assert_eq!(ColumnData::empty(DType::Int64).range(), None);

        let names = ColumnData::from(vec!["b".to_string(), "a".to_string()]);
        assert_eq!(names.min(), Some(ParamValue::Str("a".to_string())));
    }

    #[test]
    fn insert_filled_keeps_surrounding_values() {
        let mut col = ColumnData::from(vec![1_i64, 2, 3]);
        col.insert_filled(1, 2, &ParamValue::Int(-1)).unwrap();
        assert_eq!(col, ColumnData::from(vec![1_i64, -1, -1, 2, 3]));

        let err = col.insert_filled(9, 1, &ParamValue::Int(0)).unwrap_err();
        assert_eq!(err, ValueError::OutOfBounds { index: 9, len: 5 });
    }

    #[test]
    fn range_literal_requires_a_tuple() {
        let lit = Literal::parse("(0, 99)").unwrap();
        assert_eq!(ParamRange::from_literal(&lit).unwrap(), ParamRange::ints(0, 99));

        let list = Literal::parse("[0, 99]").unwrap();
        let err = ParamRange::from_literal(&list).unwrap_err();
        assert_eq!(err.to_string(), "Cannot read a 2-tuple range from list literal [0, 99]");

        let mixed = Literal::parse("(0, 'x')").unwrap();
        assert!(matches!(
            ParamRange::from_literal(&mixed),
            Err(ValueError::MixedRange { .. })
        ));
    }

    #[test]
    fn float_column_json_maps_nan_to_null() {
        let col = ColumnData::from(vec![1.0, f64::NAN]);
        let json = col.to_json();
        assert_eq!(json, serde_json::json!([1.0, null]));

        let back = ColumnData::from_json(DType::Float64, &json).unwrap();
        match back {
            ColumnData::Float64(v) => {
                assert_eq!(v[0], 1.0);
                assert!(v[1].is_nan());
            }
            other => panic!("unexpected column {other:?}"),
        }
    }
}
