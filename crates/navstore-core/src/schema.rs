//! # Schema Model
//!
//! The type metadata the store consumes: entity types, complex types,
//! entity sets and their navigation bindings.
//!
//! The store never defines types. A `Schema` is built programmatically
//! (`with_*` builders) or deserialized from a configuration file, and is
//! checked once by `Schema::validate` so that every later lookup failure is
//! an internal invariant violation rather than a user error.

use crate::types::{Scalar, StoreError, StoreResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

// =============================================================================
// PRIMITIVE KINDS
// =============================================================================

/// Primitive type of a structural property.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum PrimitiveKind {
    Boolean,
    Byte,
    SByte,
    Int16,
    Int32,
    Int64,
    Single,
    Double,
    Decimal,
    String,
    Guid,
    Date,
    DateTimeOffset,
    TimeOfDay,
    Duration,
    Binary,
}

impl PrimitiveKind {
    /// Integer kinds eligible for free-key allocation.
    #[must_use]
    pub const fn is_allocatable_integer(self) -> bool {
        matches!(self, Self::Int16 | Self::Int32 | Self::Int64)
    }

    /// Inclusive value range of an integer kind.
    const fn integer_range(self) -> Option<(i64, i64)> {
        match self {
            Self::Byte => Some((0, u8::MAX as i64)),
            Self::SByte => Some((i8::MIN as i64, i8::MAX as i64)),
            Self::Int16 => Some((i16::MIN as i64, i16::MAX as i64)),
            Self::Int32 => Some((i32::MIN as i64, i32::MAX as i64)),
            Self::Int64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }

    /// Convert an already-typed literal to this kind's runtime value.
    ///
    /// Integers are range-checked, integers widen to floating kinds, and all
    /// textual kinds accept strings. Anything else is a wrong key.
    pub fn coerce(self, literal: &Scalar) -> StoreResult<Scalar> {
        let converted = match (self, literal) {
            (Self::Boolean, Scalar::Boolean(b)) => Some(Scalar::Boolean(*b)),
            (Self::Single | Self::Double | Self::Decimal, Scalar::Double(d)) => {
                Some(Scalar::Double(*d))
            }
            (Self::Single | Self::Double | Self::Decimal, Scalar::Int(i)) => {
                Some(Scalar::Double(*i as f64))
            }
            (
                Self::String
                | Self::Guid
                | Self::Date
                | Self::DateTimeOffset
                | Self::TimeOfDay
                | Self::Duration,
                Scalar::String(s),
            ) => Some(Scalar::String(s.clone())),
            (Self::Binary, Scalar::Binary(bytes)) => Some(Scalar::Binary(bytes.clone())),
            (kind, Scalar::Int(i)) => kind
                .integer_range()
                .filter(|(min, max)| (*min..=*max).contains(i))
                .map(|_| Scalar::Int(*i)),
            _ => None,
        };

        converted.ok_or_else(|| {
            StoreError::Internal(format!(
                "Wrong key: cannot convert {} literal {} to {:?}",
                literal.type_name(),
                literal,
                self
            ))
        })
    }
}

// =============================================================================
// STRUCTURAL PROPERTIES
// =============================================================================

/// Declared type of a structural property.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeRef {
    Primitive(PrimitiveKind),
    /// Name of a complex type.
    Complex(String),
}

/// Kind of a structural property, as used for exhaustive dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind<'a> {
    Primitive(PrimitiveKind),
    PrimitiveCollection(PrimitiveKind),
    Complex(&'a str),
    ComplexCollection(&'a str),
}

fn default_nullable() -> bool {
    true
}

/// A structural property declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PropertyDef {
    pub name: String,
    #[serde(rename = "type")]
    pub type_ref: TypeRef,
    #[serde(default)]
    pub collection: bool,
    #[serde(default = "default_nullable")]
    pub nullable: bool,
}

impl PropertyDef {
    /// A nullable single-valued primitive property.
    #[must_use]
    pub fn primitive(name: impl Into<String>, kind: PrimitiveKind) -> Self {
        Self {
            name: name.into(),
            type_ref: TypeRef::Primitive(kind),
            collection: false,
            nullable: true,
        }
    }

    /// A nullable single-valued complex property.
    #[must_use]
    pub fn complex(name: impl Into<String>, complex_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_ref: TypeRef::Complex(complex_type.into()),
            collection: false,
            nullable: true,
        }
    }

    /// Make this a collection property.
    #[must_use]
    pub fn collection(mut self) -> Self {
        self.collection = true;
        self
    }

    /// Make this a non-nullable property.
    #[must_use]
    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }

    /// The dispatch kind of this property.
    #[must_use]
    pub fn kind(&self) -> PropertyKind<'_> {
        match (&self.type_ref, self.collection) {
            (TypeRef::Primitive(k), false) => PropertyKind::Primitive(*k),
            (TypeRef::Primitive(k), true) => PropertyKind::PrimitiveCollection(*k),
            (TypeRef::Complex(t), false) => PropertyKind::Complex(t),
            (TypeRef::Complex(t), true) => PropertyKind::ComplexCollection(t),
        }
    }
}

// =============================================================================
// NAVIGATION PROPERTIES
// =============================================================================

/// A navigation property declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationDef {
    pub name: String,
    /// Name of the target entity type.
    pub target: String,
    #[serde(default)]
    pub collection: bool,
    /// Inverse navigation property declared on the target type.
    #[serde(default)]
    pub partner: Option<String>,
}

impl NavigationDef {
    /// A to-one navigation property.
    #[must_use]
    pub fn one(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            target: target.into(),
            collection: false,
            partner: None,
        }
    }

    /// A to-many navigation property.
    #[must_use]
    pub fn many(name: impl Into<String>, target: impl Into<String>) -> Self {
        Self {
            collection: true,
            ..Self::one(name, target)
        }
    }

    /// Declare the partner navigation property.
    #[must_use]
    pub fn with_partner(mut self, partner: impl Into<String>) -> Self {
        self.partner = Some(partner.into());
        self
    }
}

// =============================================================================
// STRUCTURED TYPES
// =============================================================================

/// A complex (keyless, structured) type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ComplexType {
    pub name: String,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
}

impl ComplexType {
    /// Create a complex type with no properties.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            properties: Vec::new(),
        }
    }

    /// Builder-style property declaration.
    #[must_use]
    pub fn with_property(mut self, property: PropertyDef) -> Self {
        self.properties.push(property);
        self
    }

    /// Get a declared property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }
}

/// An entity type: keyed structural properties plus navigation properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityType {
    pub name: String,
    /// Key property names, in key order.
    pub keys: Vec<String>,
    #[serde(default)]
    pub properties: Vec<PropertyDef>,
    #[serde(default)]
    pub navigations: Vec<NavigationDef>,
    /// Records of this type carry a media stream.
    #[serde(default)]
    pub has_stream: bool,
}

impl EntityType {
    /// Create an entity type with no properties.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            keys: Vec::new(),
            properties: Vec::new(),
            navigations: Vec::new(),
            has_stream: false,
        }
    }

    /// Declare a key property (also added to the property list).
    #[must_use]
    pub fn with_key(mut self, property: PropertyDef) -> Self {
        self.keys.push(property.name.clone());
        self.properties.push(property.not_null());
        self
    }

    /// Declare a non-key structural property.
    #[must_use]
    pub fn with_property(mut self, property: PropertyDef) -> Self {
        self.properties.push(property);
        self
    }

    /// Declare a navigation property.
    #[must_use]
    pub fn with_navigation(mut self, navigation: NavigationDef) -> Self {
        self.navigations.push(navigation);
        self
    }

    /// Mark the type as a media type.
    #[must_use]
    pub fn with_stream(mut self) -> Self {
        self.has_stream = true;
        self
    }

    /// Get a declared property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&PropertyDef> {
        self.properties.iter().find(|p| p.name == name)
    }

    /// Get a declared navigation property by name.
    #[must_use]
    pub fn navigation(&self, name: &str) -> Option<&NavigationDef> {
        self.navigations.iter().find(|n| n.name == name)
    }

    /// Check if a property name is part of the key.
    #[must_use]
    pub fn is_key(&self, name: &str) -> bool {
        self.keys.iter().any(|k| k == name)
    }

    /// Declared non-key properties, in schema order.
    pub fn non_key_properties(&self) -> impl Iterator<Item = &PropertyDef> {
        self.properties.iter().filter(|p| !self.is_key(&p.name))
    }

    /// Key property declarations, in key order.
    pub fn key_properties(&self) -> StoreResult<Vec<&PropertyDef>> {
        self.keys
            .iter()
            .map(|k| {
                self.property(k).ok_or_else(|| {
                    StoreError::Internal(format!(
                        "Key property {} is not declared on {}",
                        k, self.name
                    ))
                })
            })
            .collect()
    }
}

/// An entity set: a named collection of one entity type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySet {
    pub name: String,
    pub entity_type: String,
    /// Navigation property name -> target entity set name.
    #[serde(default)]
    pub bindings: Vec<NavigationBinding>,
}

/// Binds a navigation property of a set's entity type to a target set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NavigationBinding {
    pub path: String,
    pub target: String,
}

impl EntitySet {
    /// Create an entity set with no navigation bindings.
    #[must_use]
    pub fn new(name: impl Into<String>, entity_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entity_type: entity_type.into(),
            bindings: Vec::new(),
        }
    }

    /// Bind a navigation property to a target entity set.
    #[must_use]
    pub fn with_binding(mut self, path: impl Into<String>, target: impl Into<String>) -> Self {
        self.bindings.push(NavigationBinding {
            path: path.into(),
            target: target.into(),
        });
        self
    }

    /// The entity set a navigation property is bound to.
    #[must_use]
    pub fn binding_target(&self, navigation: &str) -> Option<&str> {
        self.bindings
            .iter()
            .find(|b| b.path == navigation)
            .map(|b| b.target.as_str())
    }
}

// =============================================================================
// SCHEMA
// =============================================================================

/// The complete type metadata consumed by the store.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Schema {
    #[serde(default)]
    pub complex_types: Vec<ComplexType>,
    #[serde(default)]
    pub entity_types: Vec<EntityType>,
    #[serde(default)]
    pub entity_sets: Vec<EntitySet>,
}

impl Schema {
    /// Create an empty schema.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_complex_type(mut self, complex_type: ComplexType) -> Self {
        self.complex_types.push(complex_type);
        self
    }

    #[must_use]
    pub fn with_entity_type(mut self, entity_type: EntityType) -> Self {
        self.entity_types.push(entity_type);
        self
    }

    #[must_use]
    pub fn with_entity_set(mut self, entity_set: EntitySet) -> Self {
        self.entity_sets.push(entity_set);
        self
    }

    #[must_use]
    pub fn complex_type(&self, name: &str) -> Option<&ComplexType> {
        self.complex_types.iter().find(|t| t.name == name)
    }

    #[must_use]
    pub fn entity_type(&self, name: &str) -> Option<&EntityType> {
        self.entity_types.iter().find(|t| t.name == name)
    }

    #[must_use]
    pub fn entity_set(&self, name: &str) -> Option<&EntitySet> {
        self.entity_sets.iter().find(|s| s.name == name)
    }

    /// Complex type lookup for an already-validated reference.
    pub fn require_complex_type(&self, name: &str) -> StoreResult<&ComplexType> {
        self.complex_type(name)
            .ok_or_else(|| StoreError::Internal(format!("Unknown complex type {}", name)))
    }

    /// Entity type lookup for an already-validated reference.
    pub fn require_entity_type(&self, name: &str) -> StoreResult<&EntityType> {
        self.entity_type(name)
            .ok_or_else(|| StoreError::Internal(format!("Unknown entity type {}", name)))
    }

    /// Resolve an entity set addressed by a caller, with its entity type.
    pub fn require_entity_set(&self, name: &str) -> StoreResult<(&EntitySet, &EntityType)> {
        let set = self
            .entity_set(name)
            .ok_or_else(|| StoreError::NotFound(format!("Entity set {} not found", name)))?;
        let entity_type = self.require_entity_type(&set.entity_type)?;
        Ok((set, entity_type))
    }

    /// The partner declaration of a navigation property, if any.
    pub fn partner(&self, navigation: &NavigationDef) -> StoreResult<Option<&NavigationDef>> {
        let Some(partner) = &navigation.partner else {
            return Ok(None);
        };
        let target = self.require_entity_type(&navigation.target)?;
        target.navigation(partner).map(Some).ok_or_else(|| {
            StoreError::Internal(format!(
                "Partner {} of {} is not declared on {}",
                partner, navigation.name, target.name
            ))
        })
    }

    /// Check every cross reference in the schema.
    ///
    /// Reports the first dangling reference found.
    pub fn validate(&self) -> StoreResult<()> {
        unique_names(self.complex_types.iter().map(|t| t.name.as_str()), "complex type")?;
        unique_names(self.entity_types.iter().map(|t| t.name.as_str()), "entity type")?;
        unique_names(self.entity_sets.iter().map(|s| s.name.as_str()), "entity set")?;

        for complex_type in &self.complex_types {
            unique_names(
                complex_type.properties.iter().map(|p| p.name.as_str()),
                "property",
            )?;
            for property in &complex_type.properties {
                self.validate_property(&complex_type.name, property)?;
            }
        }

        for entity_type in &self.entity_types {
            self.validate_entity_type(entity_type)?;
        }

        for set in &self.entity_sets {
            let entity_type = self.entity_type(&set.entity_type).ok_or_else(|| {
                invalid(format!(
                    "Entity set {} has unknown type {}",
                    set.name, set.entity_type
                ))
            })?;
            for binding in &set.bindings {
                let navigation = entity_type.navigation(&binding.path).ok_or_else(|| {
                    invalid(format!(
                        "Entity set {} binds unknown navigation {}",
                        set.name, binding.path
                    ))
                })?;
                let target = self.entity_set(&binding.target).ok_or_else(|| {
                    invalid(format!(
                        "Entity set {} binds {} to unknown set {}",
                        set.name, binding.path, binding.target
                    ))
                })?;
                if target.entity_type != navigation.target {
                    return Err(invalid(format!(
                        "Entity set {} binds {} to {} of type {}, expected {}",
                        set.name,
                        binding.path,
                        target.name,
                        target.entity_type,
                        navigation.target
                    )));
                }
            }
        }

        Ok(())
    }

    fn validate_entity_type(&self, entity_type: &EntityType) -> StoreResult<()> {
        if entity_type.keys.is_empty() {
            return Err(invalid(format!("Entity type {} has no key", entity_type.name)));
        }
        unique_names(
            entity_type.properties.iter().map(|p| p.name.as_str()),
            "property",
        )?;
        unique_names(
            entity_type.navigations.iter().map(|n| n.name.as_str()),
            "navigation property",
        )?;

        for key in entity_type.key_properties()? {
            if !matches!(key.kind(), PropertyKind::Primitive(_)) {
                return Err(invalid(format!(
                    "Key property {} of {} must be a single primitive",
                    key.name, entity_type.name
                )));
            }
        }

        for property in &entity_type.properties {
            self.validate_property(&entity_type.name, property)?;
        }

        for navigation in &entity_type.navigations {
            let target = self.entity_type(&navigation.target).ok_or_else(|| {
                invalid(format!(
                    "Navigation {} of {} targets unknown type {}",
                    navigation.name, entity_type.name, navigation.target
                ))
            })?;
            if let Some(partner) = &navigation.partner {
                let inverse = target.navigation(partner).ok_or_else(|| {
                    invalid(format!(
                        "Partner {} of {}.{} is not declared on {}",
                        partner, entity_type.name, navigation.name, target.name
                    ))
                })?;
                if inverse.target != entity_type.name {
                    return Err(invalid(format!(
                        "Partner {}.{} targets {}, expected {}",
                        target.name, inverse.name, inverse.target, entity_type.name
                    )));
                }
                if inverse.partner.as_deref() != Some(navigation.name.as_str()) {
                    return Err(invalid(format!(
                        "Partner {}.{} does not name {} as its partner",
                        target.name, inverse.name, navigation.name
                    )));
                }
            }
        }

        Ok(())
    }

    fn validate_property(&self, owner: &str, property: &PropertyDef) -> StoreResult<()> {
        if let TypeRef::Complex(name) = &property.type_ref
            && self.complex_type(name).is_none()
        {
            return Err(invalid(format!(
                "Property {}.{} has unknown complex type {}",
                owner, property.name, name
            )));
        }
        Ok(())
    }
}

fn invalid(message: String) -> StoreError {
    StoreError::Internal(format!("Invalid schema: {}", message))
}

fn unique_names<'a>(names: impl Iterator<Item = &'a str>, what: &str) -> StoreResult<()> {
    let mut seen = BTreeSet::new();
    for name in names {
        if !seen.insert(name) {
            return Err(invalid(format!("Duplicate {} {}", what, name)));
        }
    }
    Ok(())
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Schema {
        Schema::new()
            .with_complex_type(
                ComplexType::new("CTAddress")
                    .with_property(PropertyDef::primitive("City", PrimitiveKind::String)),
            )
            .with_entity_type(
                EntityType::new("ETPerson")
                    .with_key(PropertyDef::primitive("Id", PrimitiveKind::Int32))
                    .with_property(PropertyDef::complex("Address", "CTAddress"))
                    .with_navigation(
                        NavigationDef::many("Friends", "ETPerson").with_partner("Friends"),
                    ),
            )
            .with_entity_set(EntitySet::new("People", "ETPerson").with_binding("Friends", "People"))
    }

    #[test]
    fn valid_schema_passes() {
        assert!(sample().validate().is_ok());
    }

    #[test]
    fn unknown_complex_type_rejected() {
        let schema = Schema::new().with_entity_type(
            EntityType::new("ET")
                .with_key(PropertyDef::primitive("Id", PrimitiveKind::Int32))
                .with_property(PropertyDef::complex("C", "Missing")),
        );
        assert!(matches!(schema.validate(), Err(StoreError::Internal(_))));
    }

    #[test]
    fn dangling_partner_rejected() {
        let schema = Schema::new().with_entity_type(
            EntityType::new("ET")
                .with_key(PropertyDef::primitive("Id", PrimitiveKind::Int32))
                .with_navigation(NavigationDef::one("Next", "ET").with_partner("Prev")),
        );
        assert!(schema.validate().is_err());
    }

    #[test]
    fn one_sided_partner_rejected() {
        let schema = Schema::new()
            .with_entity_type(
                EntityType::new("ETA")
                    .with_key(PropertyDef::primitive("Id", PrimitiveKind::Int32))
                    .with_navigation(NavigationDef::one("ToB", "ETB").with_partner("ToA")),
            )
            .with_entity_type(
                EntityType::new("ETB")
                    .with_key(PropertyDef::primitive("Id", PrimitiveKind::Int32))
                    .with_navigation(NavigationDef::many("ToA", "ETA")),
            );
        assert!(matches!(schema.validate(), Err(StoreError::Internal(_))));

        let mut paired = schema.clone();
        paired.entity_types[1].navigations[0].partner = Some("ToB".into());
        assert!(paired.validate().is_ok());
    }

    #[test]
    fn keyless_type_rejected() {
        let schema = Schema::new().with_entity_type(EntityType::new("ET"));
        assert!(schema.validate().is_err());
    }

    #[test]
    fn binding_to_wrong_type_rejected() {
        let schema = sample()
            .with_entity_type(
                EntityType::new("ETOther")
                    .with_key(PropertyDef::primitive("Id", PrimitiveKind::Int32)),
            )
            .with_entity_set(EntitySet::new("Others", "ETOther"));
        let mut broken = schema.clone();
        broken.entity_sets[0] =
            EntitySet::new("People", "ETPerson").with_binding("Friends", "Others");
        assert!(schema.validate().is_ok());
        assert!(broken.validate().is_err());
    }

    #[test]
    fn keys_come_first_and_are_not_null() {
        let schema = sample();
        let person = schema.entity_type("ETPerson").expect("type");
        assert!(person.is_key("Id"));
        assert!(!person.property("Id").expect("prop").nullable);
        let non_keys: Vec<_> = person.non_key_properties().map(|p| p.name.as_str()).collect();
        assert_eq!(non_keys, vec!["Address"]);
    }

    #[test]
    fn coerce_integer_ranges() {
        assert_eq!(
            PrimitiveKind::Int16.coerce(&Scalar::Int(12)).expect("fits"),
            Scalar::Int(12)
        );
        assert!(PrimitiveKind::Int16.coerce(&Scalar::Int(40_000)).is_err());
        assert!(PrimitiveKind::Byte.coerce(&Scalar::Int(-1)).is_err());
    }

    #[test]
    fn coerce_widens_and_rejects_mismatch() {
        assert_eq!(
            PrimitiveKind::Double.coerce(&Scalar::Int(2)).expect("widen"),
            Scalar::Double(2.0)
        );
        assert_eq!(
            PrimitiveKind::Guid.coerce(&Scalar::from("abc")).expect("text"),
            Scalar::from("abc")
        );
        assert!(PrimitiveKind::String.coerce(&Scalar::Int(1)).is_err());
        assert!(PrimitiveKind::Int32.coerce(&Scalar::from("1")).is_err());
    }

    #[test]
    fn partner_lookup() {
        let schema = sample();
        let person = schema.entity_type("ETPerson").expect("type");
        let friends = person.navigation("Friends").expect("nav");
        let partner = schema.partner(friends).expect("partner");
        assert_eq!(partner.map(|p| p.name.as_str()), Some("Friends"));
    }

    #[test]
    fn unknown_set_is_not_found() {
        let schema = sample();
        assert!(matches!(
            schema.require_entity_set("Nope"),
            Err(StoreError::NotFound(_))
        ));
    }
}
