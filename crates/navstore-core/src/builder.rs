//! # Record Builder
//!
//! Builds default-valued records and complex values from schema, and
//! allocates free key values for new records.
//!
//! - Integer keys (Int16/Int32/Int64): lowest unused value from 1 upward
//! - String keys: probe "1", then "0", "1", "2", ... until unused
//! - Any other key type: `StoreError::NotImplemented`
//!
//! Each key property of a composed key is allocated independently.
//! Allocation is a plain scan; concurrent creates are not coordinated.

use crate::merge::MergeEngine;
use crate::primitives::{FIRST_INTEGER_KEY, FIRST_STRING_KEY_PROBE, STRING_KEY_RESTART};
use crate::schema::{ComplexType, EntityType, PrimitiveKind, PropertyDef, PropertyKind, Schema};
use crate::types::{ComplexValue, Property, Record, Scalar, StoreError, StoreResult, Value};
use std::collections::BTreeSet;

/// Constructs records, complex values and free keys.
pub struct RecordBuilder;

impl RecordBuilder {
    /// Allocate a free value for every key property of `entity_type`.
    ///
    /// `existing` are the records already in the target collection.
    /// Returns one primitive property per key, in key order.
    pub fn free_key(entity_type: &EntityType, existing: &[&Record]) -> StoreResult<Vec<Property>> {
        let mut key = Vec::with_capacity(entity_type.keys.len());

        for def in entity_type.key_properties()? {
            let value = match def.kind() {
                PropertyKind::Primitive(kind) if kind.is_allocatable_integer() => {
                    Scalar::Int(Self::free_integer(&def.name, kind, existing)?)
                }
                PropertyKind::Primitive(PrimitiveKind::String) => {
                    Scalar::String(Self::free_string(&def.name, existing))
                }
                _ => {
                    return Err(StoreError::NotImplemented(format!(
                        "Key type not supported: {}.{}",
                        entity_type.name, def.name
                    )));
                }
            };
            key.push(Property::new(def.name.clone(), Value::Primitive(Some(value))));
        }

        Ok(key)
    }

    fn free_integer(name: &str, kind: PrimitiveKind, existing: &[&Record]) -> StoreResult<i64> {
        let used: BTreeSet<i64> = existing
            .iter()
            .filter_map(|r| match r.property(name)?.value.as_scalar()? {
                Scalar::Int(i) => Some(*i),
                _ => None,
            })
            .collect();

        let max = match kind {
            PrimitiveKind::Int16 => i16::MAX as i64,
            PrimitiveKind::Int32 => i32::MAX as i64,
            _ => i64::MAX,
        };

        let mut candidate = FIRST_INTEGER_KEY;
        while used.contains(&candidate) {
            if candidate >= max {
                return Err(StoreError::Internal(format!(
                    "Key space of {} ({:?}) exhausted",
                    name, kind
                )));
            }
            candidate = candidate.saturating_add(1);
        }
        Ok(candidate)
    }

    fn free_string(name: &str, existing: &[&Record]) -> String {
        let used: BTreeSet<&str> = existing
            .iter()
            .filter_map(|r| match r.property(name)?.value.as_scalar()? {
                Scalar::String(s) => Some(s.as_str()),
                _ => None,
            })
            .collect();

        let mut candidate = FIRST_STRING_KEY_PROBE.to_string();
        let mut counter = STRING_KEY_RESTART;
        while used.contains(candidate.as_str()) {
            candidate = counter.to_string();
            counter = counter.saturating_add(1);
        }
        candidate
    }

    /// Default-valued properties for every non-key property of an entity type.
    pub fn default_properties(
        schema: &Schema,
        entity_type: &EntityType,
    ) -> StoreResult<Vec<Property>> {
        entity_type
            .non_key_properties()
            .map(|def| Self::default_property(schema, def))
            .collect()
    }

    /// A default-valued property built by kind:
    /// null primitive, empty collections, recursively defaulted complex value.
    pub fn default_property(schema: &Schema, def: &PropertyDef) -> StoreResult<Property> {
        let value = match def.kind() {
            PropertyKind::Primitive(_) => Value::Primitive(None),
            PropertyKind::PrimitiveCollection(_) => Value::PrimitiveCollection(Vec::new()),
            PropertyKind::ComplexCollection(_) => Value::ComplexCollection(Vec::new()),
            PropertyKind::Complex(type_name) => Value::Complex(Self::default_complex(
                schema,
                schema.require_complex_type(type_name)?,
            )?),
        };
        Ok(Property::new(def.name.clone(), value))
    }

    /// A complex value with every declared property defaulted.
    pub fn default_complex(
        schema: &Schema,
        complex_type: &ComplexType,
    ) -> StoreResult<ComplexValue> {
        let properties = complex_type
            .properties
            .iter()
            .map(|def| Self::default_property(schema, def))
            .collect::<StoreResult<Vec<_>>>()?;
        Ok(ComplexValue { properties })
    }

    /// Build a fresh complex value seeded with a changed value.
    ///
    /// Every declared property is created; those present in `changed` are
    /// then reconciled through the merge rule, the rest keep their defaults.
    pub fn seeded_complex(
        schema: &Schema,
        complex_type: &ComplexType,
        changed: &ComplexValue,
        patch: bool,
    ) -> StoreResult<ComplexValue> {
        let mut result = ComplexValue::new();

        for def in &complex_type.properties {
            let mut property = Self::default_property(schema, def)?;
            if let Some(given) = changed.property(&def.name) {
                MergeEngine::update_property(schema, def, &mut property, Some(given), patch)?;
            }
            result.properties.push(property);
        }

        Ok(result)
    }
}

// =============================================================================
// TESTS
// =============================================================================
