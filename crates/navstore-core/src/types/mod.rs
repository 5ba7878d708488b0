//! # Core Type Definitions
//!
//! This module contains the data model of the navstore entity store:
//! - Record identity (`RecordId`)
//! - Property values (`Scalar`, `Value`, `Property`, `ComplexValue`)
//! - Stored records and their navigation links (`Record`, `Link`, `LinkTarget`)
//! - Caller-supplied change payloads (`ChangedRecord`, `Inline`, `Binding`)
//! - Key predicates (`KeyPredicate`)
//! - Error types (`StoreError`, `StatusCode`)
//!
//! ## Identity vs. Key
//!
//! A `RecordId` is the arena identity of a stored record and is never reused.
//! The schema key of a record lives in its properties and may be reused after
//! the record holding it is deleted. Links always refer to `RecordId`s, so
//! partner links form no ownership cycles.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

// =============================================================================
// IDENTIFIERS
// =============================================================================

/// Arena identifier of a stored record.
///
/// Allocated monotonically by the store and never reused, even after deletion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RecordId(pub u64);

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

// =============================================================================
// VALUES
// =============================================================================

/// A primitive scalar.
///
/// Textual primitive kinds (guids, dates, durations) are carried as `String`.
/// A null primitive is `Value::Primitive(None)`, never a `Scalar`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Boolean(bool),
    Int(i64),
    Double(f64),
    String(String),
    Binary(Vec<u8>),
}

impl Scalar {
    /// Short name of the scalar's runtime type, used in error messages.
    #[must_use]
    pub const fn type_name(&self) -> &'static str {
        match self {
            Self::Boolean(_) => "boolean",
            Self::Int(_) => "integer",
            Self::Double(_) => "double",
            Self::String(_) => "string",
            Self::Binary(_) => "binary",
        }
    }
}

impl From<i64> for Scalar {
    fn from(v: i64) -> Self {
        Self::Int(v)
    }
}

impl From<i32> for Scalar {
    fn from(v: i32) -> Self {
        Self::Int(i64::from(v))
    }
}

impl From<bool> for Scalar {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<&str> for Scalar {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Scalar {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Boolean(b) => write!(f, "{b}"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Double(d) => write!(f, "{d}"),
            Self::String(s) => write!(f, "'{s}'"),
            Self::Binary(bytes) => write!(f, "binary[{}]", bytes.len()),
        }
    }
}

/// The value held by a property.
///
/// This is a closed sum type; every reconciliation step matches it
/// exhaustively against the schema's `PropertyKind`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Value {
    /// A single primitive, `None` when null.
    Primitive(Option<Scalar>),
    /// A single complex value.
    Complex(ComplexValue),
    /// An ordered sequence of primitives.
    PrimitiveCollection(Vec<Scalar>),
    /// An ordered sequence of complex values.
    ComplexCollection(Vec<ComplexValue>),
}

impl Value {
    /// Null primitive.
    #[must_use]
    pub const fn null() -> Self {
        Self::Primitive(None)
    }

    /// Non-null primitive.
    #[must_use]
    pub fn primitive(scalar: impl Into<Scalar>) -> Self {
        Self::Primitive(Some(scalar.into()))
    }

    /// Short name of the value's shape, used in error messages.
    #[must_use]
    pub const fn shape(&self) -> &'static str {
        match self {
            Self::Primitive(_) => "primitive",
            Self::Complex(_) => "complex",
            Self::PrimitiveCollection(_) => "primitive collection",
            Self::ComplexCollection(_) => "complex collection",
        }
    }

    /// Get the scalar if this is a non-null primitive.
    #[must_use]
    pub fn as_scalar(&self) -> Option<&Scalar> {
        match self {
            Self::Primitive(v) => v.as_ref(),
            _ => None,
        }
    }

    /// Get the complex value if this is a single complex value.
    #[must_use]
    pub fn as_complex(&self) -> Option<&ComplexValue> {
        match self {
            Self::Complex(c) => Some(c),
            _ => None,
        }
    }
}

/// A named value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Property {
    pub name: String,
    pub value: Value,
}

impl Property {
    /// Create a new property.
    #[must_use]
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }

    /// Create a primitive property.
    #[must_use]
    pub fn primitive(name: impl Into<String>, scalar: impl Into<Scalar>) -> Self {
        Self::new(name, Value::primitive(scalar))
    }

    /// Check if the property holds a null primitive.
    ///
    /// Empty collections and complex values are not null.
    #[must_use]
    pub fn has_null_value(&self) -> bool {
        matches!(self.value, Value::Primitive(None))
    }
}

/// A complex (structured, keyless) value: an ordered, name-unique property list.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ComplexValue {
    pub properties: Vec<Property>,
}

impl ComplexValue {
    /// Create an empty complex value.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style property append.
    #[must_use]
    pub fn with(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Get a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        find_property(&self.properties, name)
    }
}

/// Find a property by name in an ordered property list.
pub(crate) fn find_property<'a>(properties: &'a [Property], name: &str) -> Option<&'a Property> {
    properties.iter().find(|p| p.name == name)
}

/// Find a property by name in an ordered property list, mutably.
pub(crate) fn find_property_mut<'a>(
    properties: &'a mut [Property],
    name: &str,
) -> Option<&'a mut Property> {
    properties.iter_mut().find(|p| p.name == name)
}

// =============================================================================
// STORED RECORDS
// =============================================================================

/// Target of a navigation link.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LinkTarget {
    /// A to-one navigation link.
    One(RecordId),
    /// A to-many navigation link (inline set), in link order.
    Many(Vec<RecordId>),
}

impl LinkTarget {
    /// All targets in link order.
    #[must_use]
    pub fn ids(&self) -> Vec<RecordId> {
        match self {
            Self::One(id) => vec![*id],
            Self::Many(ids) => ids.clone(),
        }
    }

    /// Check if the link points at the given record.
    #[must_use]
    pub fn contains(&self, id: RecordId) -> bool {
        match self {
            Self::One(target) => *target == id,
            Self::Many(ids) => ids.contains(&id),
        }
    }
}

/// A navigation link held by a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Link {
    /// The navigation property name.
    pub navigation: String,
    pub target: LinkTarget,
}

/// Media stream attached to a media record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MediaStream {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// A stored record (entity instance).
///
/// Key properties come first, followed by the remaining declared
/// properties in schema order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Arena identity.
    pub id: RecordId,
    /// Name of the record's entity type.
    pub entity_type: String,
    pub properties: Vec<Property>,
    pub links: Vec<Link>,
    pub media: Option<MediaStream>,
}

impl Record {
    /// Create a record with no properties and no links.
    #[must_use]
    pub fn new(id: RecordId, entity_type: impl Into<String>) -> Self {
        Self {
            id,
            entity_type: entity_type.into(),
            properties: Vec::new(),
            links: Vec::new(),
            media: None,
        }
    }

    /// Get a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        find_property(&self.properties, name)
    }

    /// Get a property by name, mutably.
    pub fn property_mut(&mut self, name: &str) -> Option<&mut Property> {
        find_property_mut(&mut self.properties, name)
    }

    /// Get the navigation link for the given navigation property.
    #[must_use]
    pub fn link(&self, navigation: &str) -> Option<&Link> {
        self.links.iter().find(|l| l.navigation == navigation)
    }
}

// =============================================================================
// CHANGE PAYLOADS
// =============================================================================

/// Inline content of a navigation property in a change payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Inline {
    /// The navigation is explicitly present with no entity ("set to null").
    Null,
    /// A single embedded child record.
    Entity(Box<ChangedRecord>),
    /// Embedded child records of a to-many navigation.
    Entities(Vec<ChangedRecord>),
}

/// A navigation property present inline in a change payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InlineLink {
    pub navigation: String,
    pub inline: Inline,
}

/// Unresolved references to existing records, by opaque link text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Binding {
    pub navigation: String,
    pub targets: Vec<String>,
}

/// A caller-supplied record used as the diff source of an update.
///
/// Absent properties are "not given": ignored under patch semantics and
/// reset under replace semantics.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ChangedRecord {
    #[serde(default)]
    pub properties: Vec<Property>,
    #[serde(default)]
    pub navigation: Vec<InlineLink>,
    #[serde(default)]
    pub bindings: Vec<Binding>,
}

impl ChangedRecord {
    /// Create an empty change payload.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style property append.
    #[must_use]
    pub fn with_property(mut self, property: Property) -> Self {
        self.properties.push(property);
        self
    }

    /// Builder-style inline navigation append.
    #[must_use]
    pub fn with_inline(mut self, navigation: impl Into<String>, inline: Inline) -> Self {
        self.navigation.push(InlineLink {
            navigation: navigation.into(),
            inline,
        });
        self
    }

    /// Builder-style binding append.
    #[must_use]
    pub fn with_binding<S: Into<String>>(
        mut self,
        navigation: impl Into<String>,
        targets: impl IntoIterator<Item = S>,
    ) -> Self {
        self.bindings.push(Binding {
            navigation: navigation.into(),
            targets: targets.into_iter().map(Into::into).collect(),
        });
        self
    }

    /// Get a property by name.
    #[must_use]
    pub fn property(&self, name: &str) -> Option<&Property> {
        find_property(&self.properties, name)
    }

    /// Get the inline content of a navigation property, if present.
    #[must_use]
    pub fn inline(&self, navigation: &str) -> Option<&Inline> {
        self.navigation
            .iter()
            .find(|l| l.navigation == navigation)
            .map(|l| &l.inline)
    }
}

// =============================================================================
// KEY PREDICATES
// =============================================================================

/// A single `name = value` key predicate, already typed by the URI layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeyPredicate {
    pub name: String,
    pub value: Scalar,
}

impl KeyPredicate {
    /// Create a new key predicate.
    #[must_use]
    pub fn new(name: impl Into<String>, value: impl Into<Scalar>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
        }
    }
}

// =============================================================================
// ERROR TYPES
// =============================================================================

/// Advisory HTTP-like classification of a `StoreError`.
///
/// This is not a wire response; transport layers decide what to send.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StatusCode {
    BadRequest,
    NotFound,
    InternalServerError,
    NotImplemented,
}

impl StatusCode {
    /// Numeric HTTP status code.
    #[must_use]
    pub const fn as_u16(self) -> u16 {
        match self {
            Self::BadRequest => 400,
            Self::NotFound => 404,
            Self::InternalServerError => 500,
            Self::NotImplemented => 501,
        }
    }
}

/// Errors raised by the store.
///
/// All errors are synchronous and non-retryable. A failed update may leave
/// the store partially mutated; there is no rollback.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Malformed or unresolvable input, e.g. a bad binding link.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An entity set or record addressed by a mutating call does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Schema/data invariant violation.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Outside the store's supported scope, e.g. an unsupported key type.
    #[error("Not implemented: {0}")]
    NotImplemented(String),
}

impl StoreError {
    /// The advisory status classification.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BadRequest,
            Self::NotFound(_) => StatusCode::NotFound,
            Self::Internal(_) => StatusCode::InternalServerError,
            Self::NotImplemented(_) => StatusCode::NotImplemented,
        }
    }

    /// The error message without its classification prefix.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::BadRequest(m)
            | Self::NotFound(m)
            | Self::Internal(m)
            | Self::NotImplemented(m) => m,
        }
    }
}

/// Result alias used throughout the crate.
pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_primitive_is_null() {
        assert!(Property::new("p", Value::null()).has_null_value());
        assert!(!Property::primitive("p", 1).has_null_value());
        assert!(!Property::new("p", Value::PrimitiveCollection(Vec::new())).has_null_value());
    }

    #[test]
    fn link_target_contains() {
        let one = LinkTarget::One(RecordId(1));
        assert!(one.contains(RecordId(1)));
        assert!(!one.contains(RecordId(2)));

        let many = LinkTarget::Many(vec![RecordId(2), RecordId(3)]);
        assert!(many.contains(RecordId(3)));
        assert_eq!(many.ids(), vec![RecordId(2), RecordId(3)]);
    }

    #[test]
    fn error_status_codes() {
        assert_eq!(StoreError::BadRequest("x".into()).status().as_u16(), 400);
        assert_eq!(StoreError::NotFound("x".into()).status().as_u16(), 404);
        assert_eq!(StoreError::Internal("x".into()).status().as_u16(), 500);
        assert_eq!(StoreError::NotImplemented("x".into()).status().as_u16(), 501);
    }

    #[test]
    fn error_message_strips_prefix() {
        let err = StoreError::NotImplemented("Key type not supported".into());
        assert_eq!(err.message(), "Key type not supported");
        assert_eq!(err.to_string(), "Not implemented: Key type not supported");
    }

    #[test]
    fn changed_record_lookup() {
        let changed = ChangedRecord::new()
            .with_property(Property::primitive("Name", "x"))
            .with_inline("Parent", Inline::Null);

        assert!(changed.property("Name").is_some());
        assert!(changed.property("Other").is_none());
        assert_eq!(changed.inline("Parent"), Some(&Inline::Null));
    }
}
