//! Addressing constraints: which part of a coverage a value applies to.
//!
//! A constraint is an index, a slice, or a (possibly nested) sequence of
//! constraints. Untyped input arrives as JSON: integers are indexes,
//! `{"start": .., "stop": .., "step": ..}` objects are slices, arrays are
//! sequences. Anything else is rejected.

use std::fmt;

use serde_json::{Map, Value};
use snafu::prelude::*;

use crate::{
    basic_types::BASIC_TYPES_NAMESPACE,
    dictable::{
        DictMap, Dictable, DictableError, DictableType, FieldValue, RequiredFields, TypeTag,
        UnknownAttributeSnafu,
    },
};

/// Errors raised while validating addressing constraints.
#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum DomainError {
    /// No constraint was given.
    #[snafu(display("'slices' cannot be None"))]
    MissingSlices,

    /// The value is not an index, slice, or sequence of those.
    #[snafu(display(
        "'slices' must be either single, tuple, or list of slice or int objects, found {found}"
    ))]
    InvalidConstraint {
        /// Text form of the offending value.
        found: String,
    },

    /// A slice has a step of zero.
    #[snafu(display("Slice step cannot be zero: {found}"))]
    ZeroStep {
        /// Text form of the offending slice.
        found: String,
    },
}

/// `start:stop:step`, each bound optional.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SliceSpec {
    /// First index, `None` for the beginning.
    pub start: Option<i64>,
    /// End index (exclusive), `None` for the end.
    pub stop: Option<i64>,
    /// Stride, `None` for 1.
    pub step: Option<i64>,
}

impl SliceSpec {
    /// `start:stop`.
    pub fn new(start: Option<i64>, stop: Option<i64>) -> SliceSpec {
        SliceSpec {
            start,
            stop,
            step: None,
        }
    }

    /// `:`, the whole extent.
    pub fn full() -> SliceSpec {
        SliceSpec::default()
    }
}

impl fmt::Display for SliceSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let bound = |b: Option<i64>| b.map(|v| v.to_string()).unwrap_or_default();
        write!(f, "{}:{}", bound(self.start), bound(self.stop))?;
        if let Some(step) = self.step {
            write!(f, ":{step}")?;
        }
        Ok(())
    }
}

/// One addressing constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Constraint {
    /// A single index.
    Index(i64),
    /// A slice.
    Slice(SliceSpec),
    /// A sequence of constraints.
    Seq(Vec<Constraint>),
}

const SLICE_KEYS: [&str; 3] = ["start", "stop", "step"];

impl Constraint {
    /// Validate an untyped value, recursing into sequences.
    pub fn from_value(value: &Value) -> Result<Constraint, DomainError> {
        let invalid = || DomainError::InvalidConstraint {
            found: value.to_string(),
        };
        match value {
            Value::Number(n) => n.as_i64().map(Constraint::Index).ok_or_else(invalid),
            Value::Array(items) => items
                .iter()
                .map(Constraint::from_value)
                .collect::<Result<Vec<_>, _>>()
                .map(Constraint::Seq),
            Value::Object(map) if map.keys().all(|k| SLICE_KEYS.contains(&k.as_str())) => {
                let bound = |key: &str| match map.get(key) {
                    None | Some(Value::Null) => Ok(None),
                    Some(v) => v.as_i64().map(Some).ok_or_else(invalid),
                };
                let spec = SliceSpec {
                    start: bound("start")?,
                    stop: bound("stop")?,
                    step: bound("step")?,
                };
                ensure!(
                    spec.step != Some(0),
                    ZeroStepSnafu {
                        found: value.to_string()
                    }
                );
                Ok(Constraint::Slice(spec))
            }
            _ => Err(invalid()),
        }
    }

    /// Untyped form accepted by [`Constraint::from_value`].
    pub fn to_value(&self) -> Value {
        match self {
            Constraint::Index(i) => Value::from(*i),
            Constraint::Slice(spec) => {
                let mut map = Map::new();
                map.insert("start".to_string(), spec.start.map_or(Value::Null, Value::from));
                map.insert("stop".to_string(), spec.stop.map_or(Value::Null, Value::from));
                map.insert("step".to_string(), spec.step.map_or(Value::Null, Value::from));
                Value::Object(map)
            }
            Constraint::Seq(items) => {
                Value::Array(items.iter().map(Constraint::to_value).collect())
            }
        }
    }
}

impl From<i64> for Constraint {
    fn from(index: i64) -> Self {
        Constraint::Index(index)
    }
}

impl From<SliceSpec> for Constraint {
    fn from(spec: SliceSpec) -> Self {
        Constraint::Slice(spec)
    }
}

/// The constraints a value applies to, one entry per addressed dimension.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainOfApplication {
    slices: Vec<Constraint>,
    topo_dim: u32,
}

impl DomainOfApplication {
    /// A single index or slice is wrapped into a one-element sequence.
    pub fn new(slices: impl Into<Constraint>, topo_dim: Option<u32>) -> DomainOfApplication {
        let slices = match slices.into() {
            Constraint::Seq(items) => items,
            single => vec![single],
        };
        DomainOfApplication {
            slices,
            topo_dim: topo_dim.unwrap_or(0),
        }
    }

    /// Validate an untyped value; `null` is rejected.
    pub fn from_value(
        value: &Value,
        topo_dim: Option<u32>,
    ) -> Result<DomainOfApplication, DomainError> {
        ensure!(!value.is_null(), MissingSlicesSnafu);
        Ok(DomainOfApplication::new(Constraint::from_value(value)?, topo_dim))
    }

    /// The constraints.
    pub fn slices(&self) -> &[Constraint] {
        &self.slices
    }

    /// Topological dimension; 0 by default.
    pub fn topo_dim(&self) -> u32 {
        self.topo_dim
    }

    /// Number of constraints.
    pub fn len(&self) -> usize {
        self.slices.len()
    }

    /// Whether there are no constraints.
    pub fn is_empty(&self) -> bool {
        self.slices.is_empty()
    }

    /// Iterate over the constraints.
    pub fn iter(&self) -> std::slice::Iter<'_, Constraint> {
        self.slices.iter()
    }
}

impl<'a> IntoIterator for &'a DomainOfApplication {
    type Item = &'a Constraint;
    type IntoIter = std::slice::Iter<'a, Constraint>;

    fn into_iter(self) -> Self::IntoIter {
        self.slices.iter()
    }
}

/// Validate `value` into a domain, or cover the full extent of
/// `valid_shape` (one full slice per dimension) when it is absent or null.
pub fn get_valid_domain_of_application(
    value: Option<&Value>,
    valid_shape: &[usize],
) -> Result<DomainOfApplication, DomainError> {
    match value {
        Some(v) if !v.is_null() => DomainOfApplication::from_value(v, None),
        _ => Ok(DomainOfApplication::new(
            Constraint::Seq(vec![Constraint::Slice(SliceSpec::full()); valid_shape.len()]),
            None,
        )),
    }
}

impl Dictable for DomainOfApplication {
    fn type_tag(&self) -> TypeTag {
        Self::TYPE_TAG
    }

    fn to_fields(&self) -> DictMap {
        let mut map = DictMap::new();
        map.insert(
            "slices".to_string(),
            Value::Array(self.slices.iter().map(Constraint::to_value).collect()),
        );
        map.insert("topo_dim".to_string(), Value::from(self.topo_dim));
        map
    }

    fn set_attribute(&mut self, name: &str, _value: FieldValue) -> Result<(), DictableError> {
        UnknownAttributeSnafu {
            type_name: Self::TYPE_TAG.name,
            field: name,
        }
        .fail()
    }
}

impl DictableType for DomainOfApplication {
    const TYPE_TAG: TypeTag = TypeTag::new(BASIC_TYPES_NAMESPACE, "DomainOfApplication");
    const REQUIRED_FIELDS: &'static [&'static str] = &["slices", "topo_dim"];

    fn from_fields(mut fields: RequiredFields) -> Result<Self, DictableError> {
        let slices = fields.value::<Value>("slices")?.unwrap_or(Value::Null);
        let topo_dim = fields.value::<u32>("topo_dim")?;
        Ok(DomainOfApplication::from_value(&slices, topo_dim)?)
    }
}
