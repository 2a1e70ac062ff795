#![allow(missing_docs)]

use coverage_model_core::{
    basic_types::{
        domain::DomainOfApplication,
        identity::{AbstractBase, AbstractIdentifiable},
        storage::{AbstractStorage, InMemoryStorage},
    },
    dictable::{
        DictMap, Dictable, DictableError, DictableRegistry, DictableType, FieldValue,
        RequiredFields, TypeTag,
    },
    value::{DType, ParamValue},
};
use serde_json::{Value, json};

type TestResult = Result<(), Box<dyn std::error::Error>>;

/// `x` is required, `y` has a default.
#[derive(Debug, PartialEq)]
struct Point {
    x: Option<i64>,
    y: i64,
}

const DEFAULT_Y: i64 = 7;

impl Dictable for Point {
    fn type_tag(&self) -> TypeTag {
        Self::TYPE_TAG
    }

    fn to_fields(&self) -> DictMap {
        let mut map = DictMap::new();
        map.insert("x".to_string(), json!(self.x));
        map.insert("y".to_string(), json!(self.y));
        map
    }

    fn set_attribute(&mut self, name: &str, value: FieldValue) -> Result<(), DictableError> {
        match name {
            "y" => {
                self.y = value.decode(Self::TYPE_TAG.name, name)?.unwrap_or(DEFAULT_Y);
                Ok(())
            }
            other => Err(DictableError::UnknownAttribute {
                type_name: Self::TYPE_TAG.name,
                field: other.to_string(),
            }),
        }
    }
}

impl DictableType for Point {
    const TYPE_TAG: TypeTag = TypeTag::new("tests.shapes", "Point");
    const REQUIRED_FIELDS: &'static [&'static str] = &["x"];

    fn from_fields(mut fields: RequiredFields) -> Result<Self, DictableError> {
        Ok(Point {
            x: fields.value("x")?,
            y: DEFAULT_Y,
        })
    }
}

/// Holds a nested Dictable object.
#[derive(Debug)]
struct Labelled {
    label: String,
    domain: Option<DomainOfApplication>,
}

impl Dictable for Labelled {
    fn type_tag(&self) -> TypeTag {
        Self::TYPE_TAG
    }

    fn to_fields(&self) -> DictMap {
        let mut map = DictMap::new();
        map.insert("label".to_string(), json!(self.label));
        map.insert(
            "domain".to_string(),
            self.domain
                .as_ref()
                .map_or(Value::Null, |d| Value::Object(d.dump())),
        );
        map
    }

    fn set_attribute(&mut self, name: &str, value: FieldValue) -> Result<(), DictableError> {
        match name {
            "domain" => {
                self.domain = value.into_object(Self::TYPE_TAG.name, name)?;
                Ok(())
            }
            other => Err(DictableError::UnknownAttribute {
                type_name: Self::TYPE_TAG.name,
                field: other.to_string(),
            }),
        }
    }
}

impl DictableType for Labelled {
    const TYPE_TAG: TypeTag = TypeTag::new("tests.shapes", "Labelled");
    const REQUIRED_FIELDS: &'static [&'static str] = &["label"];

    fn from_fields(mut fields: RequiredFields) -> Result<Self, DictableError> {
        Ok(Labelled {
            label: fields.require("label")?,
            domain: None,
        })
    }
}

fn registry() -> Result<DictableRegistry, DictableError> {
    let mut registry = DictableRegistry::with_builtin_types();
    registry.register::<Point>()?;
    registry.register::<Labelled>()?;
    Ok(registry)
}

#[test]
fn defaulted_fields_are_dumped_and_reloaded() -> TestResult {
    let point = Point {
        x: Some(5),
        y: DEFAULT_Y,
    };
    let dumped = point.dump();
    assert_eq!(
        Value::Object(dumped.clone()),
        json!({"cm_type": ["tests.shapes", "Point"], "x": 5, "y": 7})
    );

    let back: Point = registry()?.load_as(&dumped)?;
    assert_eq!(back.x, Some(5));
    assert_eq!(back, point);
    Ok(())
}

#[test]
fn absent_required_field_becomes_null() -> TestResult {
    let map = match json!({"cm_type": ["tests.shapes", "Point"], "y": 1}) {
        Value::Object(m) => m,
        _ => unreachable!(),
    };
    let point: Point = registry()?.load_as(&map)?;
    assert_eq!(point, Point { x: None, y: 1 });
    Ok(())
}

#[test]
fn argument_masks_read_renamed_attributes() -> TestResult {
    let map = match json!({"cm_type": ["tests.shapes", "Point"], "_x": 3}) {
        Value::Object(m) => m,
        _ => unreachable!(),
    };
    let loaded = registry()?.load_with_masks(&map, &[("x", "_x")])?;
    assert_eq!(loaded.dump().get("x"), Some(&json!(3)));
    Ok(())
}

#[test]
fn nested_objects_load_recursively() -> TestResult {
    let registry = registry()?;
    let outer = Labelled {
        label: "surface".to_string(),
        domain: Some(DomainOfApplication::from_value(
            &json!([0, {"start": 1, "stop": 3}]),
            Some(2),
        )?),
    };

    let back: Labelled = registry.load_as(&outer.dump())?;
    assert_eq!(back.label, "surface");
    assert_eq!(back.domain, outer.domain);
    Ok(())
}

#[test]
fn load_is_polymorphic_over_registered_types() -> TestResult {
    let registry = registry()?;
    let mut storage = InMemoryStorage::new(DType::Float64, Some(ParamValue::Float(-1.0)))?;
    storage.expand(&[3], 0, 3)?;

    let dumped = vec![
        AbstractBase::new(Some("a".to_string())).dump(),
        AbstractIdentifiable::new(AbstractBase::new(None)).dump(),
        storage.dump(),
        Point { x: Some(1), y: 2 }.dump(),
    ];
    let names: Vec<&str> = dumped
        .iter()
        .map(|map| registry.load(map).map(|obj| obj.type_tag().name))
        .collect::<Result<_, _>>()?;
    assert_eq!(
        names,
        ["AbstractBase", "AbstractIdentifiable", "InMemoryStorage", "Point"]
    );
    Ok(())
}

#[test]
fn failures_return_no_object() -> TestResult {
    let registry = registry()?;

    let err = registry.load(&DictMap::new()).unwrap_err();
    assert!(matches!(err, DictableError::NotTagged { .. }));

    let unknown = match json!({"cm_type": ["tests.shapes", "Circle"]}) {
        Value::Object(m) => m,
        _ => unreachable!(),
    };
    assert!(matches!(
        registry.load(&unknown),
        Err(DictableError::UnknownType { .. })
    ));

    let bad_field = match json!({"cm_type": ["tests.shapes", "Point"], "x": "five"}) {
        Value::Object(m) => m,
        _ => unreachable!(),
    };
    assert!(matches!(
        registry.load(&bad_field),
        Err(DictableError::InvalidField { .. })
    ));

    let missing_label = match json!({"cm_type": ["tests.shapes", "Labelled"]}) {
        Value::Object(m) => m,
        _ => unreachable!(),
    };
    assert!(matches!(
        registry.load(&missing_label),
        Err(DictableError::MissingField { .. })
    ));
    Ok(())
}
