//! Identity carriers: `AbstractBase` and `AbstractIdentifiable`.

use std::sync::OnceLock;

use serde_json::Value;

use crate::{
    basic_types::{BASIC_TYPES_NAMESPACE, create_guid},
    dictable::{DictMap, Dictable, DictableError, DictableType, FieldValue, RequiredFields, TypeTag},
};

/// Id, mutability flag and open extension map shared by coverage-model
/// objects.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AbstractBase {
    id: Option<String>,
    mutable: bool,
    extension: DictMap,
}

impl AbstractBase {
    /// Immutable object with an empty extension map.
    pub fn new(id: Option<String>) -> AbstractBase {
        AbstractBase {
            id,
            ..AbstractBase::default()
        }
    }

    /// Set the mutability flag.
    pub fn with_mutable(mut self, mutable: bool) -> AbstractBase {
        self.mutable = mutable;
        self
    }

    /// Replace the extension map.
    pub fn with_extension(mut self, extension: DictMap) -> AbstractBase {
        self.extension = extension;
        self
    }

    /// Id fixed at construction.
    pub fn id(&self) -> Option<&str> {
        self.id.as_deref()
    }

    /// Whether the object may be changed.
    pub fn is_mutable(&self) -> bool {
        self.mutable
    }

    /// Free-form extra attributes.
    pub fn extension(&self) -> &DictMap {
        &self.extension
    }

    /// Mutable access to the extension map.
    pub fn extension_mut(&mut self) -> &mut DictMap {
        &mut self.extension
    }

    pub(crate) fn write_fields(&self, map: &mut DictMap) {
        map.insert("id".to_string(), self.id.clone().map_or(Value::Null, Value::String));
        map.insert("mutable".to_string(), Value::Bool(self.mutable));
        map.insert("extension".to_string(), Value::Object(self.extension.clone()));
    }

    /// Apply the attributes this type owns. Unknown names land in the
    /// extension map.
    pub(crate) fn set_base_attribute(
        &mut self,
        type_name: &'static str,
        name: &str,
        value: FieldValue,
    ) -> Result<(), DictableError> {
        match name {
            "id" => self.id = value.decode(type_name, name)?,
            "mutable" => self.mutable = value.decode(type_name, name)?.unwrap_or(false),
            "extension" => self.extension = value.decode(type_name, name)?.unwrap_or_default(),
            other => {
                self.extension.insert(other.to_string(), value.into_json());
            }
        }
        Ok(())
    }
}

impl Dictable for AbstractBase {
    fn type_tag(&self) -> TypeTag {
        Self::TYPE_TAG
    }

    fn to_fields(&self) -> DictMap {
        let mut map = DictMap::new();
        self.write_fields(&mut map);
        map
    }

    fn set_attribute(&mut self, name: &str, value: FieldValue) -> Result<(), DictableError> {
        self.set_base_attribute(Self::TYPE_TAG.name, name, value)
    }
}

impl DictableType for AbstractBase {
    const TYPE_TAG: TypeTag = TypeTag::new(BASIC_TYPES_NAMESPACE, "AbstractBase");
    const REQUIRED_FIELDS: &'static [&'static str] = &["id"];

    fn from_fields(mut fields: RequiredFields) -> Result<Self, DictableError> {
        Ok(AbstractBase::new(fields.value("id")?))
    }
}

/// An [`AbstractBase`] with a lazily generated GUID, a label and a
/// description.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AbstractIdentifiable {
    base: AbstractBase,
    identifier: OnceLock<String>,
    label: String,
    description: String,
}

impl AbstractIdentifiable {
    /// Identifiable object; the identifier is generated on first read.
    pub fn new(base: AbstractBase) -> AbstractIdentifiable {
        AbstractIdentifiable {
            base,
            ..AbstractIdentifiable::default()
        }
    }

    /// Use a known identifier instead of generating one.
    pub fn with_identifier(self, identifier: impl Into<String>) -> AbstractIdentifiable {
        AbstractIdentifiable {
            identifier: OnceLock::from(identifier.into()),
            ..self
        }
    }

    /// Set the label.
    pub fn with_label(mut self, label: impl Into<String>) -> AbstractIdentifiable {
        self.label = label.into();
        self
    }

    /// Set the description.
    pub fn with_description(mut self, description: impl Into<String>) -> AbstractIdentifiable {
        self.description = description.into();
        self
    }

    /// Identity fields.
    pub fn base(&self) -> &AbstractBase {
        &self.base
    }

    /// The GUID, generated on first call and stable afterwards.
    pub fn identifier(&self) -> &str {
        self.identifier.get_or_init(create_guid)
    }

    /// Short name; empty by default.
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Long description; empty by default.
    pub fn description(&self) -> &str {
        &self.description
    }
}

impl Dictable for AbstractIdentifiable {
    fn type_tag(&self) -> TypeTag {
        Self::TYPE_TAG
    }

    /// Dumping materializes the identifier so a reload keeps it.
    fn to_fields(&self) -> DictMap {
        let mut map = DictMap::new();
        self.base.write_fields(&mut map);
        map.insert("identifier".to_string(), Value::String(self.identifier().to_string()));
        map.insert("label".to_string(), Value::String(self.label.clone()));
        map.insert("description".to_string(), Value::String(self.description.clone()));
        map
    }

    fn set_attribute(&mut self, name: &str, value: FieldValue) -> Result<(), DictableError> {
        let type_name = Self::TYPE_TAG.name;
        match name {
            "label" => self.label = value.decode(type_name, name)?.unwrap_or_default(),
            "description" => self.description = value.decode(type_name, name)?.unwrap_or_default(),
            "identifier" => {
                self.identifier = value
                    .decode::<String>(type_name, name)?
                    .map_or_else(OnceLock::new, OnceLock::from);
            }
            other => self.base.set_base_attribute(type_name, other, value)?,
        }
        Ok(())
    }
}

impl DictableType for AbstractIdentifiable {
    const TYPE_TAG: TypeTag = TypeTag::new(BASIC_TYPES_NAMESPACE, "AbstractIdentifiable");
    const REQUIRED_FIELDS: &'static [&'static str] = &["id", "identifier"];

    fn from_fields(mut fields: RequiredFields) -> Result<Self, DictableError> {
        let base = AbstractBase::new(fields.value("id")?);
        let identifiable = AbstractIdentifiable::new(base);
        Ok(match fields.value::<String>("identifier")? {
            Some(identifier) => identifiable.with_identifier(identifier),
            None => identifiable,
        })
    }
}
