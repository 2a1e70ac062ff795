//! Tag → factory lookup and the generic load walk.

use std::collections::{BTreeMap, HashMap};

use log::debug;
use serde_json::Value;
use snafu::prelude::*;

use crate::{
    basic_types::{
        domain::DomainOfApplication,
        identity::{AbstractBase, AbstractIdentifiable},
        storage::InMemoryStorage,
    },
    dictable::{
        DictMap, Dictable, DictableError, DictableType, DuplicateTypeSnafu, FieldValue,
        MalformedTagSnafu, NotTaggedSnafu, RequiredFields, TYPE_TAG_KEY, TypeTag,
        UnknownTypeSnafu, downcast,
    },
};

type BuildFn = fn(RequiredFields) -> Result<Box<dyn Dictable>, DictableError>;

#[derive(Debug, Clone, Copy)]
struct Registration {
    tag: TypeTag,
    required: &'static [&'static str],
    build: BuildFn,
}

fn build_boxed<T: DictableType>(
    fields: RequiredFields,
) -> Result<Box<dyn Dictable>, DictableError> {
    Ok(Box::new(T::from_fields(fields)?))
}

fn registry_key(namespace: &str, name: &str) -> String {
    format!("{namespace}:{name}")
}

/// Known Dictable types, keyed by tag.
#[derive(Debug, Clone, Default)]
pub struct DictableRegistry {
    types: HashMap<String, Registration>,
}

impl DictableRegistry {
    /// Registry with no types.
    pub fn new() -> DictableRegistry {
        DictableRegistry::default()
    }

    /// Registry with this crate's coverage-model primitives registered.
    pub fn with_builtin_types() -> DictableRegistry {
        let mut registry = DictableRegistry::new();
        let builtins: [Registration; 4] = [
            registration::<AbstractBase>(),
            registration::<AbstractIdentifiable>(),
            registration::<InMemoryStorage>(),
            registration::<DomainOfApplication>(),
        ];
        for entry in builtins {
            registry
                .types
                .insert(registry_key(entry.tag.namespace, entry.tag.name), entry);
        }
        registry
    }

    /// Register `T` under its tag.
    pub fn register<T: DictableType>(&mut self) -> Result<(), DictableError> {
        let entry = registration::<T>();
        let key = registry_key(entry.tag.namespace, entry.tag.name);
        ensure!(
            !self.types.contains_key(&key),
            DuplicateTypeSnafu {
                namespace: entry.tag.namespace,
                name: entry.tag.name,
            }
        );
        self.types.insert(key, entry);
        Ok(())
    }

    /// Whether a type is registered under `tag`.
    pub fn contains(&self, tag: &TypeTag) -> bool {
        self.types
            .contains_key(&registry_key(tag.namespace, tag.name))
    }

    /// Rebuild whichever registered type the mapping's tag names.
    pub fn load(&self, map: &DictMap) -> Result<Box<dyn Dictable>, DictableError> {
        self.load_with_masks(map, &[])
    }

    /// Like [`load`](Self::load), reading each required field `param` from
    /// the stored attribute `masks` maps it to.
    ///
    /// Masks are `(param, stored attribute)` pairs and apply to the top-level
    /// mapping only.
    pub fn load_with_masks(
        &self,
        map: &DictMap,
        masks: &[(&str, &str)],
    ) -> Result<Box<dyn Dictable>, DictableError> {
        let mut rest = map.clone();
        let tag = rest.remove(TYPE_TAG_KEY).context(NotTaggedSnafu {
            found: Value::Object(map.clone()).to_string(),
        })?;
        let (namespace, name) = parse_tag(&tag)?;

        let entry = self
            .types
            .get(&registry_key(namespace, name))
            .context(UnknownTypeSnafu { namespace, name })?;
        debug!("Loading Dictable {}", entry.tag);

        let mut required = BTreeMap::new();
        for &param in entry.required {
            let stored = masks
                .iter()
                .find(|(p, _)| *p == param)
                .map_or(param, |(_, stored)| *stored);
            let value = rest.remove(stored).unwrap_or(Value::Null);
            required.insert(param, self.resolve(value)?);
        }

        let mut obj = (entry.build)(RequiredFields::new(entry.tag.name, required))?;
        for (attr, value) in rest {
            obj.set_attribute(&attr, self.resolve(value)?)?;
        }
        Ok(obj)
    }

    /// Load a mapping and check that it is a `T`.
    pub fn load_as<T: DictableType>(&self, map: &DictMap) -> Result<T, DictableError> {
        downcast(self.load(map)?)
    }

    fn resolve(&self, value: Value) -> Result<FieldValue, DictableError> {
        match value {
            Value::Object(map) if map.contains_key(TYPE_TAG_KEY) => {
                Ok(FieldValue::Object(self.load(&map)?))
            }
            other => Ok(FieldValue::Value(other)),
        }
    }
}

fn registration<T: DictableType>() -> Registration {
    Registration {
        tag: T::TYPE_TAG,
        required: T::REQUIRED_FIELDS,
        build: build_boxed::<T>,
    }
}

fn parse_tag(tag: &Value) -> Result<(&str, &str), DictableError> {
    match tag.as_array().map(Vec::as_slice) {
        Some([Value::String(namespace), Value::String(name)]) => Ok((namespace, name)),
        _ => MalformedTagSnafu {
            found: tag.to_string(),
        }
        .fail(),
    }
}
