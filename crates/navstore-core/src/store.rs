//! # Entity Store
//!
//! The single source of truth for record identity and existence.
//!
//! Records live in an arena (`RecordId -> Record`); each entity set is an
//! ordered list of arena ids. Insertion order is read order. Navigation links
//! hold `RecordId`s and are resolved through the arena, so partner links never
//! form ownership cycles.
//!
//! The store is synchronous and assumes a single caller. Nothing here locks,
//! and a failed multi-step operation is not rolled back.

use crate::builder::RecordBuilder;
use crate::operations::{ActionTable, FunctionTable, OperationResult, Parameter};
use crate::primitives::FIRST_RECORD_ID;
use crate::schema::{EntityType, NavigationDef, PropertyKind, Schema};
use crate::types::{
    KeyPredicate, Link, LinkTarget, MediaStream, Property, Record, RecordId, StoreError,
    StoreResult, Value,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::debug;

/// Read-only view of one entity set, in insertion order.
#[derive(Debug, Clone, Copy)]
pub struct Collection<'a> {
    store: &'a Store,
    name: &'a str,
    ids: &'a [RecordId],
}

impl<'a> Collection<'a> {
    /// The entity set name.
    #[must_use]
    pub fn name(&self) -> &'a str {
        self.name
    }

    /// Record ids in collection order.
    #[must_use]
    pub fn ids(&self) -> &'a [RecordId] {
        self.ids
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Records in collection order.
    pub fn iter(self) -> impl Iterator<Item = &'a Record> + 'a {
        let store = self.store;
        self.ids.iter().filter_map(move |id| store.records.get(id))
    }
}

/// In-memory entity store.
#[derive(Debug, Clone)]
pub struct Store {
    schema: Arc<Schema>,

    /// Record arena: RecordId -> Record
    records: BTreeMap<RecordId, Record>,

    /// Entity set name -> ordered member ids
    collections: BTreeMap<String, Vec<RecordId>>,

    /// Next available RecordId
    next_record_id: u64,
}

impl Store {
    /// Create an empty store for a schema.
    ///
    /// The schema is validated once; every entity set starts empty.
    pub fn new(schema: Schema) -> StoreResult<Self> {
        Self::with_schema(Arc::new(schema))
    }

    /// Create an empty store sharing an existing schema handle.
    pub fn with_schema(schema: Arc<Schema>) -> StoreResult<Self> {
        schema.validate()?;
        let collections = schema
            .entity_sets
            .iter()
            .map(|set| (set.name.clone(), Vec::new()))
            .collect();
        Ok(Self {
            schema,
            records: BTreeMap::new(),
            collections,
            next_record_id: FIRST_RECORD_ID,
        })
    }

    /// The schema this store was built for.
    #[must_use]
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// Shared handle to the schema.
    #[must_use]
    pub fn schema_handle(&self) -> Arc<Schema> {
        Arc::clone(&self.schema)
    }

    /// Total number of stored records across all sets.
    #[must_use]
    pub fn record_count(&self) -> usize {
        self.records.len()
    }

    // =========================================================================
    // READ
    // =========================================================================

    /// All records of an entity set, or `None` for an unknown set.
    #[must_use]
    pub fn read_all(&self, set: &str) -> Option<Collection<'_>> {
        self.collections
            .get_key_value(set)
            .map(|(name, ids)| Collection {
                store: self,
                name,
                ids,
            })
    }

    /// The first record of `set` whose key properties equal every predicate.
    ///
    /// Unknown sets and unmatched keys yield `Ok(None)`. A predicate whose
    /// literal cannot be converted to the key property's type is an error.
    pub fn read(&self, set: &str, keys: &[KeyPredicate]) -> StoreResult<Option<&Record>> {
        Ok(self.find(set, keys)?.and_then(|id| self.records.get(&id)))
    }

    /// Like `read`, returning the record's arena id.
    pub fn find(&self, set: &str, keys: &[KeyPredicate]) -> StoreResult<Option<RecordId>> {
        let Some(ids) = self.collections.get(set) else {
            return Ok(None);
        };
        let (_, entity_type) = self.schema.require_entity_set(set)?;

        let mut expected = Vec::with_capacity(keys.len());
        for predicate in keys {
            let kind = match entity_type.property(&predicate.name).map(|p| p.kind()) {
                Some(PropertyKind::Primitive(kind)) => kind,
                _ => {
                    return Err(StoreError::Internal(format!(
                        "{} is not a primitive property of {}",
                        predicate.name, entity_type.name
                    )));
                }
            };
            expected.push((predicate.name.as_str(), kind.coerce(&predicate.value)?));
        }

        Ok(ids.iter().copied().find(|id| {
            self.records.get(id).is_some_and(|record| {
                expected.iter().all(|(name, value)| {
                    record
                        .property(name)
                        .and_then(|p| p.value.as_scalar())
                        .is_some_and(|current| current == value)
                })
            })
        }))
    }

    /// Get a record by arena id.
    #[must_use]
    pub fn get(&self, id: RecordId) -> Option<&Record> {
        self.records.get(&id)
    }

    /// Check whether a record is a member of an entity set.
    #[must_use]
    pub fn contains(&self, set: &str, id: RecordId) -> bool {
        self.collections
            .get(set)
            .is_some_and(|ids| ids.contains(&id))
    }

    /// Targets of a record's navigation link, in link order.
    #[must_use]
    pub fn links(&self, id: RecordId, navigation: &str) -> Vec<RecordId> {
        self.records
            .get(&id)
            .and_then(|r| r.link(navigation))
            .map(|l| l.target.ids())
            .unwrap_or_default()
    }

    // =========================================================================
    // CREATE
    // =========================================================================

    /// Append a new record with a freshly allocated key to `set`.
    ///
    /// All non-key properties are default-valued.
    pub fn create(&mut self, set: &str) -> StoreResult<&Record> {
        let schema = Arc::clone(&self.schema);
        let (_, entity_type) = schema.require_entity_set(set)?;

        let key = {
            let existing = self.members(set)?;
            RecordBuilder::free_key(entity_type, &existing)?
        };

        self.insert(set, entity_type, key)
    }

    /// Append a new record with an explicit key to `set`.
    ///
    /// Every key property must be given and the key must not already be
    /// used in the set.
    pub fn create_with_key(&mut self, set: &str, key: Vec<Property>) -> StoreResult<&Record> {
        let schema = Arc::clone(&self.schema);
        let (_, entity_type) = schema.require_entity_set(set)?;

        let mut predicates = Vec::with_capacity(entity_type.keys.len());
        let mut typed_key = Vec::with_capacity(entity_type.keys.len());
        for def in entity_type.key_properties()? {
            let given = key
                .iter()
                .find(|p| p.name == def.name)
                .and_then(|p| p.value.as_scalar())
                .ok_or_else(|| {
                    StoreError::BadRequest(format!(
                        "Key property {} missing for {}",
                        def.name, entity_type.name
                    ))
                })?;
            let PropertyKind::Primitive(kind) = def.kind() else {
                return Err(StoreError::Internal(format!(
                    "Key property {} is not primitive",
                    def.name
                )));
            };
            let value = kind.coerce(given)?;
            predicates.push(KeyPredicate::new(def.name.clone(), value.clone()));
            typed_key.push(Property::new(def.name.clone(), Value::Primitive(Some(value))));
        }

        if self.find(set, &predicates)?.is_some() {
            return Err(StoreError::Internal(format!(
                "Duplicate key in entity set {}",
                set
            )));
        }

        self.insert(set, entity_type, typed_key)
    }

    fn insert(
        &mut self,
        set: &str,
        entity_type: &EntityType,
        key: Vec<Property>,
    ) -> StoreResult<&Record> {
        let mut properties = key;
        properties.extend(RecordBuilder::default_properties(&self.schema, entity_type)?);

        let id = RecordId(self.next_record_id);
        self.next_record_id = self.next_record_id.saturating_add(1);

        let mut record = Record::new(id, entity_type.name.clone());
        record.properties = properties;

        debug!(
            set,
            record = %id,
            key = ?record.properties.iter().take(entity_type.keys.len()).collect::<Vec<_>>(),
            "record created"
        );

        self.collections
            .get_mut(set)
            .ok_or_else(|| StoreError::NotFound(format!("Entity set {} not found", set)))?
            .push(id);
        Ok(&*self.records.entry(id).or_insert(record))
    }

    fn members(&self, set: &str) -> StoreResult<Vec<&Record>> {
        let ids = self
            .collections
            .get(set)
            .ok_or_else(|| StoreError::NotFound(format!("Entity set {} not found", set)))?;
        Ok(ids.iter().filter_map(|id| self.records.get(id)).collect())
    }

    // =========================================================================
    // DELETE
    // =========================================================================

    /// Delete a record from `set`.
    ///
    /// Every link in every set that targets the record is removed first;
    /// a to-many link emptied by the sweep is removed entirely.
    pub fn delete(&mut self, set: &str, id: RecordId) -> StoreResult<()> {
        if !self.collections.contains_key(set) {
            return Err(StoreError::NotFound(format!("Entity set {} not found", set)));
        }
        if !self.contains(set, id) {
            return Err(StoreError::NotFound(format!(
                "Record {} is not a member of {}",
                id, set
            )));
        }

        self.delete_links_to(id);

        if let Some(ids) = self.collections.get_mut(set) {
            ids.retain(|member| *member != id);
        }
        self.records.remove(&id);

        debug!(set, record = %id, "record deleted");
        Ok(())
    }

    /// Remove every link, in every set, that targets `to`.
    pub fn delete_links_to(&mut self, to: RecordId) {
        for record in self.records.values_mut() {
            if !record.links.iter().any(|l| l.target.contains(to)) {
                continue;
            }
            debug!(source = %record.id, target = %to, "inbound links removed");
            record.links.retain_mut(|link| match &mut link.target {
                LinkTarget::One(target) => *target != to,
                LinkTarget::Many(targets) => {
                    targets.retain(|t| *t != to);
                    !targets.is_empty()
                }
            });
        }
    }

    // =========================================================================
    // LINK PRIMITIVES (one side only; partner handling lives in the merge engine)
    // =========================================================================

    pub(crate) fn record_mut(&mut self, id: RecordId) -> StoreResult<&mut Record> {
        self.records
            .get_mut(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Record {} not found", id)))
    }

    /// Point `src`'s navigation link at `dst`.
    ///
    /// To-many links append (without duplicates). To-one links are replaced;
    /// the displaced target, if any, is returned.
    pub(crate) fn attach(
        &mut self,
        src: RecordId,
        navigation: &NavigationDef,
        dst: RecordId,
    ) -> StoreResult<Option<RecordId>> {
        if !self.records.contains_key(&dst) {
            return Err(StoreError::NotFound(format!("Record {} not found", dst)));
        }
        let record = self.record_mut(src)?;

        let displaced = match record.links.iter_mut().find(|l| l.navigation == navigation.name) {
            None => {
                let target = if navigation.collection {
                    LinkTarget::Many(vec![dst])
                } else {
                    LinkTarget::One(dst)
                };
                record.links.push(Link {
                    navigation: navigation.name.clone(),
                    target,
                });
                None
            }
            Some(link) => match &mut link.target {
                LinkTarget::Many(targets) if navigation.collection => {
                    if !targets.contains(&dst) {
                        targets.push(dst);
                    }
                    None
                }
                LinkTarget::One(current) if !navigation.collection => {
                    if *current == dst {
                        None
                    } else {
                        Some(std::mem::replace(current, dst))
                    }
                }
                _ => {
                    return Err(StoreError::Internal(format!(
                        "Link {} of {} does not match its declared cardinality",
                        navigation.name, src
                    )));
                }
            },
        };

        debug!(source = %src, navigation = %navigation.name, target = %dst, "link set");
        Ok(displaced)
    }

    /// Remove `dst` from `src`'s navigation link; an emptied link disappears.
    pub(crate) fn detach(&mut self, src: RecordId, navigation: &str, dst: RecordId) {
        let Some(record) = self.records.get_mut(&src) else {
            return;
        };
        record.links.retain_mut(|link| {
            if link.navigation != navigation {
                return true;
            }
            match &mut link.target {
                LinkTarget::One(target) => *target != dst,
                LinkTarget::Many(targets) => {
                    targets.retain(|t| *t != dst);
                    !targets.is_empty()
                }
            }
        });
    }

    /// Drop a record's whole navigation link, returning what it pointed at.
    pub(crate) fn take_link(&mut self, src: RecordId, navigation: &str) -> Option<LinkTarget> {
        let record = self.records.get_mut(&src)?;
        let index = record.links.iter().position(|l| l.navigation == navigation)?;
        Some(record.links.remove(index).target)
    }

    // =========================================================================
    // MEDIA
    // =========================================================================

    /// The media stream of a record.
    pub fn read_media(&self, id: RecordId) -> StoreResult<&MediaStream> {
        let record = self
            .records
            .get(&id)
            .ok_or_else(|| StoreError::NotFound(format!("Record {} not found", id)))?;
        record
            .media
            .as_ref()
            .ok_or_else(|| StoreError::NotFound(format!("Record {} has no media stream", id)))
    }

    /// Replace the media stream of a record of a media type.
    pub fn set_media(
        &mut self,
        id: RecordId,
        bytes: Vec<u8>,
        content_type: impl Into<String>,
    ) -> StoreResult<()> {
        let schema = Arc::clone(&self.schema);
        let record = self.record_mut(id)?;
        let entity_type = schema.require_entity_type(&record.entity_type)?;
        if !entity_type.has_stream {
            return Err(StoreError::BadRequest(format!(
                "{} is not a media entity type",
                entity_type.name
            )));
        }
        record.media = Some(MediaStream {
            content_type: content_type.into(),
            bytes,
        });
        debug!(record = %id, "media stream replaced");
        Ok(())
    }

    // =========================================================================
    // OPERATIONS
    // =========================================================================

    /// Invoke a function through a caller-supplied table; the result is returned unchanged.
    pub fn call_function(
        &self,
        table: &dyn FunctionTable,
        name: &str,
        parameters: &[Parameter],
    ) -> StoreResult<OperationResult> {
        debug!(function = name, "function call");
        table.invoke(name, parameters, self)
    }

    /// Invoke an action through a caller-supplied table; the result is returned unchanged.
    pub fn call_action(
        &mut self,
        table: &dyn ActionTable,
        name: &str,
        parameters: &[Parameter],
    ) -> StoreResult<OperationResult> {
        debug!(action = name, "action call");
        table.invoke(name, parameters, self)
    }
}

// =============================================================================
// TESTS
// =============================================================================
