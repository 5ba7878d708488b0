//! # navstore-core
//!
//! The in-memory entity store of navstore - THE LOGIC.
//!
//! This crate keeps typed records in named entity sets, driven entirely by
//! a `Schema` of entity types, complex types, navigation properties and
//! entity-set bindings. It allocates free keys, reconciles updates with
//! patch or replace semantics, performs deep inserts, resolves binding links
//! and keeps partner navigation links symmetric.
//!
//! ## Architectural Constraints
//!
//! The CORE:
//! - Holds all state in memory; nothing is persisted
//! - Is closed: URI parsing and operations are injected through traits
//!   (`LinkResolver`, `FunctionTable`, `ActionTable`)
//! - Is deterministic: insertion order is read order, `BTreeMap` only
//! - Has NO async, NO network dependencies, NO file I/O (pure Rust)

// =============================================================================
// MODULES
// =============================================================================

pub mod builder;
pub mod link;
pub mod merge;
pub mod operations;
pub mod primitives;
pub mod schema;
pub mod store;
pub mod types;

// =============================================================================
// RE-EXPORTS: Core Types (from types module)
// =============================================================================

pub use types::{
    Binding, ChangedRecord, ComplexValue, Inline, InlineLink, KeyPredicate, Link, LinkTarget,
    MediaStream, Property, Record, RecordId, Scalar, StatusCode, StoreError, StoreResult, Value,
};

// =============================================================================
// RE-EXPORTS: Schema
// =============================================================================

pub use schema::{
    ComplexType, EntitySet, EntityType, NavigationBinding, NavigationDef, PrimitiveKind,
    PropertyDef, PropertyKind, Schema, TypeRef,
};

// =============================================================================
// RE-EXPORTS: Store Engine
// =============================================================================

pub use builder::RecordBuilder;
pub use link::{EntityLink, EntityLinkParser, LinkResolver};
pub use merge::{MergeEngine, UpdateMode};
pub use operations::{ActionTable, FunctionTable, OperationResult, Parameter};
pub use store::{Collection, Store};
