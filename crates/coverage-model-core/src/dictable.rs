//! Tagged-mapping marshalling for coverage-model objects.
//!
//! Any persistable object implements [`Dictable`]: it can list its attributes
//! as a JSON object and accept attributes back one by one. [`Dictable::dump`]
//! adds a type tag under [`TYPE_TAG_KEY`]:
//!
//! ```json
//! {"cm_type": ["coverage_model.basic_types", "AbstractBase"],
//!  "id": "base-1", "mutable": false, "extension": {}}
//! ```
//!
//! Loading goes through a [`DictableRegistry`], which maps tags to
//! [`DictableType`] factories. A type declares the fields its factory needs
//! (`REQUIRED_FIELDS`); the registry pulls those out of the mapping
//! (renamed through optional argument masks, `null` when absent), builds the
//! object, then hands every remaining entry to
//! [`Dictable::set_attribute`]. Nested tagged mappings are loaded
//! recursively, so a field may arrive as a live object
//! ([`FieldValue::Object`]).

mod registry;

pub use registry::DictableRegistry;

use std::{any::Any, collections::BTreeMap, fmt};

use serde::de::DeserializeOwned;
use serde_json::Value;
use snafu::prelude::*;

use crate::{
    basic_types::{domain::DomainError, storage::StorageError},
    value::ValueError,
};

/// Key under which a dumped mapping carries its type tag.
pub const TYPE_TAG_KEY: &str = "cm_type";

/// The tagged mapping representation.
pub type DictMap = serde_json::Map<String, Value>;

/// Errors raised while dumping, loading, or registering Dictable types.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub(crate)))]
pub enum DictableError {
    /// The mapping has no type tag, so it is not a Dictable payload.
    #[snafu(display("Mapping is not properly formed, it must contain a 'cm_type' key: {found}"))]
    NotTagged {
        /// Text form of the rejected mapping.
        found: String,
    },

    /// The type tag is present but is not a `[namespace, name]` pair.
    #[snafu(display("Malformed type tag {found}, expected [namespace, name]"))]
    MalformedTag {
        /// Text form of the tag value.
        found: String,
    },

    /// The tag names a type that was never registered.
    #[snafu(display("Unknown Dictable type {namespace}.{name}"))]
    UnknownType {
        /// Tag namespace.
        namespace: String,
        /// Tag type name.
        name: String,
    },

    /// A type with the same tag is already registered.
    #[snafu(display("Dictable type {namespace}.{name} is already registered"))]
    DuplicateType {
        /// Tag namespace.
        namespace: String,
        /// Tag type name.
        name: String,
    },

    /// A field the type cannot do without is absent or null.
    #[snafu(display("{type_name} requires field {field:?}"))]
    MissingField {
        /// Type being built.
        type_name: &'static str,
        /// Field name.
        field: String,
    },

    /// A field holds a value of the wrong shape.
    #[snafu(display("Invalid value for {type_name}.{field}: {source}"))]
    InvalidField {
        /// Type being built.
        type_name: &'static str,
        /// Field name.
        field: String,
        /// Underlying decode error.
        source: serde_json::Error,
    },

    /// A field expected a plain value but received a tagged object.
    #[snafu(display("{type_name}.{field} does not accept a tagged object"))]
    UnexpectedObject {
        /// Type being built.
        type_name: &'static str,
        /// Field name.
        field: String,
    },

    /// The type has no attribute of this name.
    #[snafu(display("{type_name} has no attribute {field:?}"))]
    UnknownAttribute {
        /// Type being built.
        type_name: &'static str,
        /// Attribute name.
        field: String,
    },

    /// A loaded object is not of the requested concrete type.
    #[snafu(display("Expected a {expected}, loaded a {found}"))]
    TypeMismatch {
        /// Requested type name.
        expected: &'static str,
        /// Type name of the loaded object.
        found: &'static str,
    },

    /// A domain field failed validation.
    #[snafu(transparent)]
    Domain {
        /// Underlying domain error.
        source: DomainError,
    },

    /// A storage field failed validation.
    #[snafu(transparent)]
    Storage {
        /// Underlying storage error.
        source: StorageError,
    },

    /// A stored value does not fit its column.
    #[snafu(transparent)]
    Value {
        /// Underlying value error.
        source: ValueError,
    },
}

/// Stable identity of a Dictable type: a namespace plus a type name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeTag {
    /// Namespace the type lives in.
    pub namespace: &'static str,
    /// Type name.
    pub name: &'static str,
}

impl TypeTag {
    /// Tag for `namespace.name`.
    pub const fn new(namespace: &'static str, name: &'static str) -> TypeTag {
        TypeTag { namespace, name }
    }

    /// `[namespace, name]` as stored under [`TYPE_TAG_KEY`].
    pub fn to_value(&self) -> Value {
        Value::Array(vec![
            Value::String(self.namespace.to_string()),
            Value::String(self.name.to_string()),
        ])
    }
}

impl fmt::Display for TypeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.namespace, self.name)
    }
}

/// A field as delivered to a factory or attribute setter.
#[derive(Debug)]
pub enum FieldValue {
    /// A plain JSON value (`null` for absent required fields).
    Value(Value),
    /// A nested tagged mapping, already loaded.
    Object(Box<dyn Dictable>),
}

impl FieldValue {
    /// Whether this is a plain `null`.
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Value(Value::Null))
    }

    /// Plain JSON form; a loaded object is dumped back to its mapping.
    pub fn into_json(self) -> Value {
        match self {
            FieldValue::Value(v) => v,
            FieldValue::Object(obj) => Value::Object(obj.dump()),
        }
    }

    /// Decode a plain value, `None` for `null`.
    pub fn decode<T: DeserializeOwned>(
        self,
        type_name: &'static str,
        field: &str,
    ) -> Result<Option<T>, DictableError> {
        match self {
            FieldValue::Value(Value::Null) => Ok(None),
            FieldValue::Value(v) => serde_json::from_value(v)
                .map(Some)
                .context(InvalidFieldSnafu { type_name, field }),
            FieldValue::Object(_) => UnexpectedObjectSnafu { type_name, field }.fail(),
        }
    }

    /// Take a loaded object of type `T`, `None` for `null`.
    pub fn into_object<T: DictableType>(
        self,
        type_name: &'static str,
        field: &str,
    ) -> Result<Option<T>, DictableError> {
        match self {
            FieldValue::Value(Value::Null) => Ok(None),
            FieldValue::Value(_) => MissingFieldSnafu { type_name, field }.fail(),
            FieldValue::Object(obj) => downcast::<T>(obj).map(Some),
        }
    }
}

/// Downcast a loaded object to its concrete type.
pub(crate) fn downcast<T: DictableType>(obj: Box<dyn Dictable>) -> Result<T, DictableError> {
    let found = obj.type_tag().name;
    let any: Box<dyn Any> = obj;
    any.downcast::<T>()
        .map(|boxed| *boxed)
        .map_err(|_| DictableError::TypeMismatch {
            expected: T::TYPE_TAG.name,
            found,
        })
}

/// The required fields handed to a [`DictableType`] factory.
///
/// Every name in `REQUIRED_FIELDS` is present; absent fields arrive as
/// `null`.
#[derive(Debug)]
pub struct RequiredFields {
    type_name: &'static str,
    fields: BTreeMap<&'static str, FieldValue>,
}

impl RequiredFields {
    pub(crate) fn new(
        type_name: &'static str,
        fields: BTreeMap<&'static str, FieldValue>,
    ) -> RequiredFields {
        RequiredFields { type_name, fields }
    }

    /// Take a field as delivered.
    pub fn take(&mut self, field: &str) -> FieldValue {
        self.fields
            .remove(field)
            .unwrap_or(FieldValue::Value(Value::Null))
    }

    /// Decode a plain field, `None` when null.
    pub fn value<T: DeserializeOwned>(&mut self, field: &str) -> Result<Option<T>, DictableError> {
        self.take(field).decode(self.type_name, field)
    }

    /// Decode a plain field that must not be null.
    pub fn require<T: DeserializeOwned>(&mut self, field: &str) -> Result<T, DictableError> {
        let type_name = self.type_name;
        self.value(field)?
            .context(MissingFieldSnafu { type_name, field })
    }

    /// Take a nested object of type `T`, `None` when null.
    pub fn object<T: DictableType>(&mut self, field: &str) -> Result<Option<T>, DictableError> {
        self.take(field).into_object(self.type_name, field)
    }
}

/// An object that can be dumped to, and rebuilt from, a tagged mapping.
pub trait Dictable: Any + fmt::Debug + Send + Sync {
    /// Tag identifying the concrete type.
    fn type_tag(&self) -> TypeTag;

    /// Every attribute, with nested Dictable attributes already dumped.
    fn to_fields(&self) -> DictMap;

    /// Assign one attribute during load.
    fn set_attribute(&mut self, name: &str, value: FieldValue) -> Result<(), DictableError>;

    /// Tagged mapping of the object.
    fn dump(&self) -> DictMap {
        let mut map = self.to_fields();
        map.insert(TYPE_TAG_KEY.to_string(), self.type_tag().to_value());
        map
    }
}

/// A concrete Dictable type the registry can build.
pub trait DictableType: Dictable + Sized {
    /// Tag written by `dump` and matched by `load`.
    const TYPE_TAG: TypeTag;

    /// Fields pulled out of the mapping and passed to [`from_fields`](Self::from_fields).
    const REQUIRED_FIELDS: &'static [&'static str];

    /// Build the object from its required fields, validating them.
    fn from_fields(fields: RequiredFields) -> Result<Self, DictableError>;
}
