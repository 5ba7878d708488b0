//! # JSON Payloads
//!
//! Conversion between JSON objects and core values, driven by the schema.
//!
//! Input objects follow the usual OData JSON shape:
//! - `"Name": "Lamp"` sets a structural property
//! - `"Category": {...}` / `"Items": [{...}]` are inline entities
//!   (`"Category": null` unlinks a to-one navigation on update)
//! - `"Category@odata.bind": "Categories('A')"` binds existing records
//!
//! Output objects carry `@id`, every property, one `<nav>@links` array per
//! navigation link and a `@media` summary for media records.

use crate::error::AppError;
use navstore_core::{
    Binding, ChangedRecord, ComplexType, ComplexValue, EntitySet, EntityType, Inline,
    PrimitiveKind, Property, PropertyDef, PropertyKind, Record, Scalar, Schema, Store, Value,
};
use serde_json::{Map, Value as Json, json};

/// Suffix marking a binding-link annotation.
pub const BIND_SUFFIX: &str = "@odata.bind";

/// Suffix of rendered navigation link arrays.
pub const LINKS_SUFFIX: &str = "@links";

fn invalid(message: String) -> AppError {
    AppError::Payload(message)
}

// =============================================================================
// JSON -> CORE
// =============================================================================

/// Build a change payload for `entity_type` from a JSON object.
pub fn changed_record(
    schema: &Schema,
    entity_type: &EntityType,
    object: &Map<String, Json>,
) -> Result<ChangedRecord, AppError> {
    let mut changed = ChangedRecord::new();

    for (name, json) in object {
        if let Some(navigation) = name.strip_suffix(BIND_SUFFIX) {
            if entity_type.navigation(navigation).is_none() {
                return Err(invalid(format!(
                    "{} has no navigation property {}",
                    entity_type.name, navigation
                )));
            }
            changed.bindings.push(Binding {
                navigation: navigation.to_string(),
                targets: binding_targets(name, json)?,
            });
        } else if let Some(navigation) = entity_type.navigation(name) {
            let target = schema.require_entity_type(&navigation.target)?;
            let inline = match json {
                Json::Null => Inline::Null,
                Json::Object(child) => {
                    Inline::Entity(Box::new(changed_record(schema, target, child)?))
                }
                Json::Array(children) => Inline::Entities(
                    children
                        .iter()
                        .map(|child| match child {
                            Json::Object(child) => changed_record(schema, target, child),
                            other => Err(invalid(format!(
                                "Inline {} entries must be objects, got {}",
                                name, other
                            ))),
                        })
                        .collect::<Result<_, _>>()?,
                ),
                other => {
                    return Err(invalid(format!(
                        "Navigation {} cannot hold {}",
                        name, other
                    )));
                }
            };
            changed = changed.with_inline(name.clone(), inline);
        } else {
            let def = entity_type.property(name).ok_or_else(|| {
                invalid(format!("{} has no property {}", entity_type.name, name))
            })?;
            changed = changed.with_property(Property::new(name.clone(), value(schema, def, json)?));
        }
    }

    Ok(changed)
}

fn binding_targets(name: &str, json: &Json) -> Result<Vec<String>, AppError> {
    let not_a_link = || invalid(format!("{} must hold link strings", name));
    match json {
        Json::String(link) => Ok(vec![link.clone()]),
        Json::Array(links) => links
            .iter()
            .map(|l| l.as_str().map(str::to_string).ok_or_else(not_a_link))
            .collect(),
        _ => Err(not_a_link()),
    }
}

/// Convert a JSON value to the value shape declared by `def`.
pub fn value(schema: &Schema, def: &PropertyDef, json: &Json) -> Result<Value, AppError> {
    match (def.kind(), json) {
        (PropertyKind::Primitive(_), Json::Null) if !def.nullable => Err(invalid(format!(
            "Property {} is not nullable",
            def.name
        ))),
        (_, Json::Null) => Ok(Value::null()),
        (PropertyKind::Primitive(kind), json) => {
            Ok(Value::Primitive(Some(scalar(kind, &def.name, json)?)))
        }
        (PropertyKind::PrimitiveCollection(kind), Json::Array(items)) => items
            .iter()
            .map(|item| scalar(kind, &def.name, item))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::PrimitiveCollection),
        (PropertyKind::Complex(type_name), Json::Object(object)) => Ok(Value::Complex(complex(
            schema,
            schema.require_complex_type(type_name)?,
            object,
        )?)),
        (PropertyKind::ComplexCollection(type_name), Json::Array(items)) => {
            let complex_type = schema.require_complex_type(type_name)?;
            items
                .iter()
                .map(|item| match item {
                    Json::Object(object) => complex(schema, complex_type, object),
                    other => Err(invalid(format!(
                        "Elements of {} must be objects, got {}",
                        def.name, other
                    ))),
                })
                .collect::<Result<Vec<_>, _>>()
                .map(Value::ComplexCollection)
        }
        (kind, other) => Err(invalid(format!(
            "Property {} ({:?}) does not accept {}",
            def.name, kind, other
        ))),
    }
}

fn complex(
    schema: &Schema,
    complex_type: &ComplexType,
    object: &Map<String, Json>,
) -> Result<ComplexValue, AppError> {
    let mut result = ComplexValue::new();
    for (name, json) in object {
        let def = complex_type.property(name).ok_or_else(|| {
            invalid(format!("{} has no property {}", complex_type.name, name))
        })?;
        result.properties.push(Property::new(name.clone(), value(schema, def, json)?));
    }
    Ok(result)
}

fn scalar(kind: PrimitiveKind, name: &str, json: &Json) -> Result<Scalar, AppError> {
    let literal = match json {
        Json::Bool(b) => Scalar::Boolean(*b),
        Json::Number(n) => match (n.as_i64(), n.as_f64()) {
            (Some(i), _) => Scalar::Int(i),
            (None, Some(d)) => Scalar::Double(d),
            (None, None) => {
                return Err(invalid(format!(
                    "Property {} number {} is out of range",
                    name, n
                )));
            }
        },
        Json::String(s) if kind == PrimitiveKind::Binary => Scalar::Binary(s.as_bytes().to_vec()),
        Json::String(s) => Scalar::String(s.clone()),
        other => {
            return Err(invalid(format!(
                "Property {} expects a {:?} primitive, got {}",
                name, kind, other
            )));
        }
    };
    kind.coerce(&literal).map_err(|_| {
        invalid(format!(
            "Property {} expects {:?}, got {} {}",
            name,
            kind,
            literal.type_name(),
            json
        ))
    })
}

// =============================================================================
// CORE -> JSON
// =============================================================================

/// Literal text of a key value, as accepted by the binding-link parser.
#[must_use]
pub fn key_literal(scalar: &Scalar) -> String {
    match scalar {
        Scalar::String(s) => format!("'{}'", s.replace('\'', "''")),
        Scalar::Binary(bytes) => {
            format!("'{}'", String::from_utf8_lossy(bytes).replace('\'', "''"))
        }
        other => other.to_string(),
    }
}

/// Canonical link of a record: `Set(key)` or `Set(A=1,B='x')`.
#[must_use]
pub fn entity_link(set: &str, entity_type: &EntityType, record: &Record) -> String {
    let literal = |name: &str| {
        record
            .property(name)
            .and_then(|p| p.value.as_scalar())
            .map_or_else(|| "null".to_string(), key_literal)
    };

    let key = match entity_type.keys.as_slice() {
        [single] => literal(single.as_str()),
        keys => keys
            .iter()
            .map(|k| format!("{}={}", k, literal(k.as_str())))
            .collect::<Vec<_>>()
            .join(","),
    };
    format!("{}({})", set, key)
}

fn scalar_json(scalar: &Scalar) -> Json {
    match scalar {
        Scalar::Boolean(b) => Json::Bool(*b),
        Scalar::Int(i) => json!(i),
        Scalar::Double(d) => serde_json::Number::from_f64(*d).map_or(Json::Null, Json::Number),
        Scalar::String(s) => Json::String(s.clone()),
        Scalar::Binary(bytes) => Json::String(String::from_utf8_lossy(bytes).into_owned()),
    }
}

/// JSON rendering of a core value.
#[must_use]
pub fn value_json(value: &Value) -> Json {
    match value {
        Value::Primitive(None) => Json::Null,
        Value::Primitive(Some(scalar)) => scalar_json(scalar),
        Value::PrimitiveCollection(items) => Json::Array(items.iter().map(scalar_json).collect()),
        Value::Complex(complex) => Json::Object(properties_json(&complex.properties)),
        Value::ComplexCollection(items) => Json::Array(
            items
                .iter()
                .map(|c| Json::Object(properties_json(&c.properties)))
                .collect(),
        ),
    }
}

fn properties_json(properties: &[Property]) -> Map<String, Json> {
    properties
        .iter()
        .map(|p| (p.name.clone(), value_json(&p.value)))
        .collect()
}

/// JSON rendering of a stored record of `set`.
pub fn record_json(store: &Store, set: &EntitySet, record: &Record) -> Result<Json, AppError> {
    let schema = store.schema();
    let entity_type = schema.require_entity_type(&record.entity_type)?;

    let mut object = Map::new();
    object.insert(
        "@id".to_string(),
        Json::String(entity_link(&set.name, entity_type, record)),
    );
    object.extend(properties_json(&record.properties));

    for link in &record.links {
        let mut targets = Vec::new();
        if let Some(target_set) = set.binding_target(&link.navigation) {
            let target_type = schema.require_entity_set(target_set)?.1;
            for id in link.target.ids() {
                if let Some(target) = store.get(id) {
                    targets.push(Json::String(entity_link(target_set, target_type, target)));
                }
            }
        }
        object.insert(format!("{}{}", link.navigation, LINKS_SUFFIX), Json::Array(targets));
    }

    if let Some(media) = &record.media {
        object.insert(
            "@media".to_string(),
            json!({ "content_type": media.content_type, "size": media.bytes.len() }),
        );
    }

    Ok(Json::Object(object))
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use navstore_core::{NavigationDef, RecordId};

    fn schema() -> Schema {
        Schema::new()
            .with_complex_type(
                ComplexType::new("CTAddress")
                    .with_property(PropertyDef::primitive("City", PrimitiveKind::String)),
            )
            .with_entity_type(
                EntityType::new("ETPerson")
                    .with_key(PropertyDef::primitive("Id", PrimitiveKind::Int32))
                    .with_property(PropertyDef::primitive("Name", PrimitiveKind::String))
                    .with_property(PropertyDef::primitive("Score", PrimitiveKind::Double))
                    .with_property(PropertyDef::complex("Home", "CTAddress"))
                    .with_property(
                        PropertyDef::primitive("Nicks", PrimitiveKind::String).collection(),
                    )
                    .with_navigation(NavigationDef::one("Boss", "ETPerson")),
            )
            .with_entity_set(EntitySet::new("People", "ETPerson").with_binding("Boss", "People"))
    }

    fn object(json: Json) -> Map<String, Json> {
        match json {
            Json::Object(map) => map,
            _ => Map::new(),
        }
    }

    #[test]
    fn converts_properties_inlines_and_bindings() {
        let schema = schema();
        let entity_type = schema.entity_type("ETPerson").expect("type");
        let payload = object(json!({
            "Name": "Ada",
            "Score": 3,
            "Home": { "City": "Turin" },
            "Nicks": ["a", "b"],
            "Boss@odata.bind": "People(1)",
            "Boss": null
        }));

        let changed = changed_record(&schema, entity_type, &payload).expect("convert");
        assert_eq!(changed.property("Name"), Some(&Property::primitive("Name", "Ada")));
        assert_eq!(
            changed.property("Score").map(|p| &p.value),
            Some(&Value::primitive(Scalar::Double(3.0)))
        );
        assert_eq!(changed.bindings[0].targets, vec!["People(1)".to_string()]);
        assert_eq!(changed.inline("Boss"), Some(&Inline::Null));
    }

    #[test]
    fn rejects_unknown_and_mistyped_properties() {
        let schema = schema();
        let entity_type = schema.entity_type("ETPerson").expect("type");

        let unknown = object(json!({ "Nope": 1 }));
        assert!(matches!(
            changed_record(&schema, entity_type, &unknown),
            Err(AppError::Payload(_))
        ));

        let mistyped = object(json!({ "Name": 5 }));
        assert!(matches!(
            changed_record(&schema, entity_type, &mistyped),
            Err(AppError::Payload(_))
        ));
    }

    #[test]
    fn key_id_round_trips_through_link_text() {
        let schema = schema();
        let entity_type = schema.entity_type("ETPerson").expect("type");
        let mut record = Record::new(RecordId(1), "ETPerson");
        record.properties.push(Property::primitive("Id", 4));
        assert_eq!(entity_link("People", entity_type, &record), "People(4)");

        assert_eq!(key_literal(&Scalar::from("it's")), "'it''s'");
    }

    #[test]
    fn renders_values() {
        assert_eq!(value_json(&Value::null()), Json::Null);
        assert_eq!(
            value_json(&Value::PrimitiveCollection(vec![Scalar::Int(1), Scalar::Boolean(true)])),
            json!([1, true])
        );
    }
}
