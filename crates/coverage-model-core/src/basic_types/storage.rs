//! Resizable typed storage.
//!
//! [`AbstractStorage`] is the contract brick-backed storage implements
//! elsewhere; [`InMemoryStorage`] keeps the values in a [`ColumnData`].
//! Storage is one-dimensional: `expand` inserts fill-valued records at an
//! origin and never touches the values around them.

use std::ops::Range;

use serde_json::Value;
use snafu::prelude::*;

use crate::{
    basic_types::{BASIC_TYPES_NAMESPACE, identity::AbstractBase},
    dictable::{DictMap, Dictable, DictableError, DictableType, FieldValue, RequiredFields, TypeTag},
    value::{ColumnData, DType, ParamValue, ValueError},
};

/// Errors raised by storage operations.
#[derive(Debug, Snafu, PartialEq)]
#[snafu(visibility(pub(crate)))]
pub enum StorageError {
    /// The shape passed to `expand` is not the resulting 1-D shape.
    #[snafu(display("Expansion shape {shape:?} does not match the expanded length {expected}"))]
    ShapeMismatch {
        /// Shape passed by the caller.
        shape: Vec<usize>,
        /// Length the storage will have after the expansion.
        expected: usize,
    },

    /// An element access or value did not fit the storage.
    #[snafu(transparent)]
    Value {
        /// Underlying value error.
        source: ValueError,
    },
}

/// Typed, resizable, one-dimensional storage.
pub trait AbstractStorage {
    /// Element kind.
    fn dtype(&self) -> DType;

    /// Value written into newly expanded records.
    fn fill_value(&self) -> &ParamValue;

    /// Element at `index`.
    fn get(&self, index: usize) -> Option<ParamValue>;

    /// Copy of the elements in `range`.
    fn get_range(&self, range: Range<usize>) -> Result<ColumnData, StorageError>;

    /// Overwrite the element at `index`.
    fn set(&mut self, index: usize, value: ParamValue) -> Result<(), StorageError>;

    /// Overwrite `values.len()` elements starting at `start`.
    fn set_range(&mut self, start: usize, values: &ColumnData) -> Result<(), StorageError>;

    /// Insert `count` fill-valued records before `origin`; `shape` is the
    /// resulting shape and must be `[len + count]`.
    fn expand(&mut self, shape: &[usize], origin: usize, count: usize) -> Result<(), StorageError>;

    /// Overwrite every element with `value`.
    fn fill(&mut self, value: &ParamValue) -> Result<(), StorageError>;

    /// Number of elements.
    fn len(&self) -> usize;

    /// Whether the storage is empty.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Iterate over the elements.
    fn iter(&self) -> Box<dyn Iterator<Item = ParamValue> + '_>;
}

/// Storage backed by an in-memory column.
#[derive(Debug, Clone, PartialEq)]
pub struct InMemoryStorage {
    base: AbstractBase,
    fill_value: ParamValue,
    data: ColumnData,
}

impl InMemoryStorage {
    /// Empty storage of `dtype`. Without a fill value the kind's default
    /// fill is used.
    pub fn new(
        dtype: DType,
        fill_value: Option<ParamValue>,
    ) -> Result<InMemoryStorage, StorageError> {
        InMemoryStorage::with_base(AbstractBase::default(), dtype, fill_value)
    }

    /// Like [`InMemoryStorage::new`] with explicit identity fields.
    pub fn with_base(
        base: AbstractBase,
        dtype: DType,
        fill_value: Option<ParamValue>,
    ) -> Result<InMemoryStorage, StorageError> {
        let fill_value = fill_value.unwrap_or_else(|| dtype.default_fill());
        if fill_value.dtype() != dtype {
            return Err(ValueError::KindMismatch {
                expected: dtype,
                found: fill_value.dtype(),
            }
            .into());
        }
        Ok(InMemoryStorage {
            base,
            fill_value,
            data: ColumnData::empty(dtype),
        })
    }

    /// Identity fields.
    pub fn base(&self) -> &AbstractBase {
        &self.base
    }

    /// The backing column.
    pub fn data(&self) -> &ColumnData {
        &self.data
    }

    fn replace_values(&mut self, values: &Value) -> Result<(), StorageError> {
        self.data = ColumnData::from_json(self.dtype(), values)?;
        Ok(())
    }
}

impl AbstractStorage for InMemoryStorage {
    fn dtype(&self) -> DType {
        self.data.dtype()
    }

    fn fill_value(&self) -> &ParamValue {
        &self.fill_value
    }

    fn get(&self, index: usize) -> Option<ParamValue> {
        self.data.get(index)
    }

    fn get_range(&self, range: Range<usize>) -> Result<ColumnData, StorageError> {
        Ok(self.data.slice(range)?)
    }

    fn set(&mut self, index: usize, value: ParamValue) -> Result<(), StorageError> {
        Ok(self.data.set(index, value)?)
    }

    fn set_range(&mut self, start: usize, values: &ColumnData) -> Result<(), StorageError> {
        let len = self.len();
        let Some(end) = start.checked_add(values.len()) else {
            return Err(ValueError::OutOfBounds { index: start, len }.into());
        };
        if values.dtype() != self.dtype() {
            return Err(ValueError::KindMismatch {
                expected: self.dtype(),
                found: values.dtype(),
            }
            .into());
        }
        if end > len {
            return Err(ValueError::OutOfBounds { index: end, len }.into());
        }
        for (offset, value) in values.iter().enumerate() {
            self.data.set(start + offset, value)?;
        }
        Ok(())
    }

    fn expand(&mut self, shape: &[usize], origin: usize, count: usize) -> Result<(), StorageError> {
        let len = self.len();
        let Some(expected) = len.checked_add(count) else {
            return Err(ValueError::OutOfBounds { index: count, len }.into());
        };
        ensure!(
            shape == [expected].as_slice(),
            ShapeMismatchSnafu {
                shape: shape.to_vec(),
                expected,
            }
        );
        self.data.insert_filled(origin, count, &self.fill_value)?;
        Ok(())
    }

    fn fill(&mut self, value: &ParamValue) -> Result<(), StorageError> {
        Ok(self.data.fill(value)?)
    }

    fn len(&self) -> usize {
        self.data.len()
    }

    fn iter(&self) -> Box<dyn Iterator<Item = ParamValue> + '_> {
        Box::new(self.data.iter())
    }
}

impl Dictable for InMemoryStorage {
    fn type_tag(&self) -> TypeTag {
        Self::TYPE_TAG
    }

    fn to_fields(&self) -> DictMap {
        let mut map = DictMap::new();
        self.base.write_fields(&mut map);
        map.insert("dtype".to_string(), Value::String(self.dtype().as_str().to_string()));
        map.insert(
            "fill_value".to_string(),
            serde_json::to_value(&self.fill_value).unwrap_or(Value::Null),
        );
        map.insert("values".to_string(), self.data.to_json());
        map
    }

    fn set_attribute(&mut self, name: &str, value: FieldValue) -> Result<(), DictableError> {
        match name {
            "values" => {
                let values = value.decode::<Value>(Self::TYPE_TAG.name, name)?;
                self.replace_values(&values.unwrap_or(Value::Array(Vec::new())))?;
                Ok(())
            }
            other => self.base.set_base_attribute(Self::TYPE_TAG.name, other, value),
        }
    }
}

impl DictableType for InMemoryStorage {
    const TYPE_TAG: TypeTag = TypeTag::new(BASIC_TYPES_NAMESPACE, "InMemoryStorage");
    const REQUIRED_FIELDS: &'static [&'static str] = &["dtype", "fill_value", "id"];

    fn from_fields(mut fields: RequiredFields) -> Result<Self, DictableError> {
        let dtype: DType = fields.require("dtype")?;
        let fill_value = match fields.value::<Value>("fill_value")? {
            Some(raw) => Some(ParamValue::from_json(dtype, &raw)?),
            None => None,
        };
        let base = AbstractBase::new(fields.value("id")?);
        Ok(InMemoryStorage::with_base(base, dtype, fill_value)?)
    }
}
