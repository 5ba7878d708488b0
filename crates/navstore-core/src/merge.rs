//! # Merge Engine
//!
//! Reconciles a stored record with a caller-supplied `ChangedRecord` and
//! maintains navigation links as part of the same update call.
//!
//! An update runs three steps, in order:
//! 1. Property reconciliation (patch or replace, recursive over complex values)
//! 2. Binding links: resolve each reference and link it (partner mirrored)
//! 3. Deep insert of inline children (`insert`), or unlinking of to-one
//!    navigations explicitly set to null (plain update)
//!
//! Bindings are applied before any inline child is created.
//! There is no rollback: a failure in step 3 leaves steps 1-2 applied.

use crate::builder::RecordBuilder;
use crate::link::LinkResolver;
use crate::schema::{EntitySet, EntityType, NavigationDef, PropertyDef, PropertyKind, Schema};
use crate::store::Store;
use crate::types::{
    Binding, ChangedRecord, Inline, LinkTarget, Property, RecordId, StoreError, StoreResult, Value,
    find_property_mut,
};
use tracing::debug;

/// How an update treats omitted content.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UpdateMode {
    /// Omitted properties keep their value (`true`) or are reset (`false`).
    pub patch: bool,
    /// Inline navigation content is deep-inserted (`true`) rather than
    /// interpreted as unlink requests (`false`).
    pub insert: bool,
}

impl UpdateMode {
    /// Partial update (PATCH).
    #[must_use]
    pub const fn patch() -> Self {
        Self {
            patch: true,
            insert: false,
        }
    }

    /// Full replace (PUT).
    #[must_use]
    pub const fn replace() -> Self {
        Self {
            patch: false,
            insert: false,
        }
    }

    /// Initial population of a freshly created record (POST, deep insert).
    #[must_use]
    pub const fn insert() -> Self {
        Self {
            patch: false,
            insert: true,
        }
    }
}

/// Applies updates and link changes to a `Store`.
pub struct MergeEngine;

impl MergeEngine {
    // =========================================================================
    // UPDATE
    // =========================================================================

    /// Update record `id` of `set` from `changed`.
    ///
    /// Key properties are never touched.
    pub fn update(
        store: &mut Store,
        resolver: &dyn LinkResolver,
        base_uri: &str,
        set: &str,
        id: RecordId,
        changed: &ChangedRecord,
        mode: UpdateMode,
    ) -> StoreResult<()> {
        let schema = store.schema_handle();
        let (entity_set, entity_type) = schema.require_entity_set(set)?;
        if !store.contains(set, id) {
            return Err(StoreError::NotFound(format!(
                "Record {} is not a member of {}",
                id, set
            )));
        }

        let record = store.record_mut(id)?;
        for def in entity_type.non_key_properties() {
            let existing = record.property_mut(&def.name).ok_or_else(|| {
                StoreError::Internal(format!(
                    "Property {} missing on record {} of {}",
                    def.name, id, entity_type.name
                ))
            })?;
            Self::update_property(&schema, def, existing, changed.property(&def.name), mode.patch)?;
        }

        if !changed.bindings.is_empty() {
            Self::apply_bindings(
                store,
                resolver,
                base_uri,
                entity_set,
                entity_type,
                id,
                &changed.bindings,
            )?;
        }

        if mode.insert {
            Self::deep_insert(store, resolver, base_uri, entity_set, entity_type, id, changed)
        } else {
            Self::unlink_nulled_navigations(store, entity_type, id, changed)
        }
    }

    /// Update a single non-key property of a stored record.
    ///
    /// `changed = None` with `patch = false` resets the property
    /// (null primitive, empty collection, recursively reset complex value).
    pub fn update_single_property(
        store: &mut Store,
        id: RecordId,
        name: &str,
        changed: Option<&Property>,
        patch: bool,
    ) -> StoreResult<()> {
        let schema = store.schema_handle();
        let record = store.record_mut(id)?;
        let entity_type = schema.require_entity_type(&record.entity_type)?;
        let def = entity_type.property(name).ok_or_else(|| {
            StoreError::BadRequest(format!("{} has no property {}", entity_type.name, name))
        })?;
        if entity_type.is_key(name) {
            return Err(StoreError::BadRequest(format!(
                "Key property {} cannot be changed",
                name
            )));
        }
        let existing = record.property_mut(name).ok_or_else(|| {
            StoreError::Internal(format!("Property {} missing on record {}", name, id))
        })?;
        Self::update_property(&schema, def, existing, changed, patch)
    }

    /// Reconcile one property with its changed counterpart.
    ///
    /// - Primitive: overwritten when given, or nulled when not patching.
    /// - Collections: always cleared, then refilled from the changed value;
    ///   complex elements are rebuilt fresh, never merged in place.
    /// - Complex: recurse per declared sub-property.
    pub fn update_property(
        schema: &Schema,
        def: &PropertyDef,
        existing: &mut Property,
        changed: Option<&Property>,
        patch: bool,
    ) -> StoreResult<()> {
        match (def.kind(), &mut existing.value) {
            (PropertyKind::Primitive(_), Value::Primitive(current)) => {
                if changed.is_some() || !patch {
                    *current = match changed.map(|p| &p.value) {
                        None => None,
                        Some(Value::Primitive(value)) => value.clone(),
                        Some(other) => return Err(shape_mismatch(def, other)),
                    };
                }
            }
            (PropertyKind::PrimitiveCollection(_), Value::PrimitiveCollection(items)) => {
                items.clear();
                match changed.map(|p| &p.value) {
                    None | Some(Value::Primitive(None)) => {}
                    Some(Value::PrimitiveCollection(given)) => items.extend(given.iter().cloned()),
                    Some(other) => return Err(shape_mismatch(def, other)),
                }
            }
            (PropertyKind::ComplexCollection(type_name), Value::ComplexCollection(items)) => {
                items.clear();
                match changed.map(|p| &p.value) {
                    None | Some(Value::Primitive(None)) => {}
                    Some(Value::ComplexCollection(given)) => {
                        let complex_type = schema.require_complex_type(type_name)?;
                        for element in given {
                            items.push(RecordBuilder::seeded_complex(
                                schema,
                                complex_type,
                                element,
                                patch,
                            )?);
                        }
                    }
                    Some(other) => return Err(shape_mismatch(def, other)),
                }
            }
            (PropertyKind::Complex(type_name), Value::Complex(current)) => {
                let given = match changed.map(|p| &p.value) {
                    None | Some(Value::Primitive(None)) => None,
                    Some(Value::Complex(value)) => Some(value),
                    Some(other) => return Err(shape_mismatch(def, other)),
                };
                let complex_type = schema.require_complex_type(type_name)?;
                for sub in &complex_type.properties {
                    let target =
                        find_property_mut(&mut current.properties, &sub.name).ok_or_else(|| {
                            StoreError::Internal(format!(
                                "Property {}/{} missing on stored complex value",
                                def.name, sub.name
                            ))
                        })?;
                    Self::update_property(
                        schema,
                        sub,
                        target,
                        given.and_then(|g| g.property(&sub.name)),
                        patch,
                    )?;
                }
            }
            (_, stored) => {
                return Err(StoreError::Internal(format!(
                    "Property {} stores a {} value, schema declares {:?}",
                    def.name,
                    stored.shape(),
                    def.kind()
                )));
            }
        }
        Ok(())
    }

    // =========================================================================
    // BINDINGS
    // =========================================================================

    fn apply_bindings(
        store: &mut Store,
        resolver: &dyn LinkResolver,
        base_uri: &str,
        entity_set: &EntitySet,
        entity_type: &EntityType,
        id: RecordId,
        bindings: &[Binding],
    ) -> StoreResult<()> {
        let schema = store.schema_handle();

        for binding in bindings {
            let navigation = entity_type.navigation(&binding.navigation).ok_or_else(|| {
                StoreError::BadRequest(format!(
                    "{} has no navigation property {}",
                    entity_type.name, binding.navigation
                ))
            })?;
            let target_set = binding_target(entity_set, navigation)?;

            if navigation.collection {
                for link in &binding.targets {
                    let target =
                        Self::resolve_binding(store, resolver, base_uri, target_set, link)?;
                    Self::link(store, &schema, navigation, id, target)?;
                }
            } else {
                let link = binding.targets.first().ok_or_else(|| {
                    StoreError::BadRequest(format!(
                        "Binding of {} carries no link",
                        navigation.name
                    ))
                })?;
                let target = Self::resolve_binding(store, resolver, base_uri, target_set, link)?;
                Self::link(store, &schema, navigation, id, target)?;
            }
        }

        Ok(())
    }

    fn resolve_binding(
        store: &Store,
        resolver: &dyn LinkResolver,
        base_uri: &str,
        target_set: &str,
        link: &str,
    ) -> StoreResult<RecordId> {
        let entity_link = resolver.resolve(store.schema(), base_uri, link)?;
        if entity_link.entity_set != target_set {
            return Err(StoreError::BadRequest(format!(
                "Binding link {} addresses {}, expected {}",
                link, entity_link.entity_set, target_set
            )));
        }
        store
            .find(target_set, &entity_link.keys)
            .map_err(|e| {
                StoreError::BadRequest(format!(
                    "Invalid entity binding link {}: {}",
                    link,
                    e.message()
                ))
            })?
            .ok_or_else(|| {
                StoreError::BadRequest(format!("Binding link {} matches no record", link))
            })
    }

    // =========================================================================
    // DEEP INSERT / UNLINK
    // =========================================================================

    fn deep_insert(
        store: &mut Store,
        resolver: &dyn LinkResolver,
        base_uri: &str,
        entity_set: &EntitySet,
        entity_type: &EntityType,
        id: RecordId,
        changed: &ChangedRecord,
    ) -> StoreResult<()> {
        let schema = store.schema_handle();

        for navigation in &entity_type.navigations {
            let Some(inline) = changed.inline(&navigation.name) else {
                continue;
            };
            let target_set = binding_target(entity_set, navigation)?;

            let children: Vec<&ChangedRecord> = match (navigation.collection, inline) {
                (_, Inline::Null) => continue,
                (true, Inline::Entities(children)) => children.iter().collect(),
                (_, Inline::Entity(child)) => vec![&**child],
                (false, Inline::Entities(_)) => {
                    return Err(StoreError::BadRequest(format!(
                        "To-one navigation {} cannot hold an entity collection",
                        navigation.name
                    )));
                }
            };

            let mut created = Vec::with_capacity(children.len());
            for child in children {
                created.push(Self::create_inline(store, resolver, base_uri, target_set, child)?);
            }
            debug!(
                record = %id,
                navigation = %navigation.name,
                children = created.len(),
                "deep insert"
            );
            for child in created {
                Self::link(store, &schema, navigation, id, child)?;
            }
        }

        Ok(())
    }

    fn create_inline(
        store: &mut Store,
        resolver: &dyn LinkResolver,
        base_uri: &str,
        target_set: &str,
        changed: &ChangedRecord,
    ) -> StoreResult<RecordId> {
        let id = store.create(target_set)?.id;
        Self::update(store, resolver, base_uri, target_set, id, changed, UpdateMode::insert())?;
        Ok(id)
    }

    /// Unlink every to-one navigation explicitly present as null.
    ///
    /// To-many navigations are never unlinked here; omitting or nulling them
    /// on update is a no-op.
    fn unlink_nulled_navigations(
        store: &mut Store,
        entity_type: &EntityType,
        id: RecordId,
        changed: &ChangedRecord,
    ) -> StoreResult<()> {
        let schema = store.schema_handle();
        for navigation in &entity_type.navigations {
            if !navigation.collection
                && matches!(changed.inline(&navigation.name), Some(Inline::Null))
            {
                Self::unlink(store, &schema, navigation, id)?;
            }
        }
        Ok(())
    }

    // =========================================================================
    // LINKS
    // =========================================================================

    /// Link `src` to `dst` through `navigation`, mirroring the partner link.
    pub fn create_link(
        store: &mut Store,
        src: RecordId,
        navigation: &str,
        dst: RecordId,
    ) -> StoreResult<()> {
        let schema = store.schema_handle();
        let navigation = navigation_of(store, &schema, src, navigation)?;
        Self::link(store, &schema, navigation, src, dst)
    }

    /// Remove `src`'s whole navigation link, and its mirror on every target.
    pub fn remove_link(store: &mut Store, src: RecordId, navigation: &str) -> StoreResult<()> {
        let schema = store.schema_handle();
        let navigation = navigation_of(store, &schema, src, navigation)?;
        Self::unlink(store, &schema, navigation, src)
    }

    fn link(
        store: &mut Store,
        schema: &Schema,
        navigation: &NavigationDef,
        src: RecordId,
        dst: RecordId,
    ) -> StoreResult<()> {
        let target = store
            .get(dst)
            .ok_or_else(|| StoreError::NotFound(format!("Record {} not found", dst)))?;
        if target.entity_type != navigation.target {
            return Err(StoreError::BadRequest(format!(
                "Navigation {} expects {}, record {} is {}",
                navigation.name, navigation.target, dst, target.entity_type
            )));
        }

        let displaced = store.attach(src, navigation, dst)?;

        if let Some(partner) = schema.partner(navigation)? {
            if let Some(previous) = displaced {
                store.detach(previous, &partner.name, src);
            }
            if let Some(previous) = store.attach(dst, partner, src)? {
                store.detach(previous, &navigation.name, dst);
            }
        }

        Ok(())
    }

    fn unlink(
        store: &mut Store,
        schema: &Schema,
        navigation: &NavigationDef,
        src: RecordId,
    ) -> StoreResult<()> {
        let Some(target) = store.take_link(src, &navigation.name) else {
            return Ok(());
        };

        if let Some(partner) = schema.partner(navigation)? {
            let targets = match target {
                LinkTarget::One(t) => vec![t],
                LinkTarget::Many(ts) => ts,
            };
            for t in targets {
                store.detach(t, &partner.name, src);
            }
        }

        debug!(record = %src, navigation = %navigation.name, "link removed");
        Ok(())
    }
}

fn binding_target<'a>(
    entity_set: &'a EntitySet,
    navigation: &NavigationDef,
) -> StoreResult<&'a str> {
    entity_set.binding_target(&navigation.name).ok_or_else(|| {
        StoreError::Internal(format!(
            "Navigation {} of entity set {} has no binding target",
            navigation.name, entity_set.name
        ))
    })
}

fn navigation_of<'s>(
    store: &Store,
    schema: &'s Schema,
    src: RecordId,
    navigation: &str,
) -> StoreResult<&'s NavigationDef> {
    let record = store
        .get(src)
        .ok_or_else(|| StoreError::NotFound(format!("Record {} not found", src)))?;
    let entity_type = schema.require_entity_type(&record.entity_type)?;
    entity_type.navigation(navigation).ok_or_else(|| {
        StoreError::BadRequest(format!(
            "{} has no navigation property {}",
            entity_type.name, navigation
        ))
    })
}

fn shape_mismatch(def: &PropertyDef, given: &Value) -> StoreError {
    StoreError::Internal(format!(
        "Property {} was given a {} value, schema declares {:?}",
        def.name,
        given.shape(),
        def.kind()
    ))
}

// =============================================================================
// TESTS
// =============================================================================
