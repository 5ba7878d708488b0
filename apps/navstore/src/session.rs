//! # Session
//!
//! A `Store` plus the link resolver and base URI used to address its records.
//! Seed files and scripts are applied through a session.

use crate::error::AppError;
use crate::payload::{changed_record, entity_link, record_json};
use navstore_core::{
    EntityLinkParser, LinkResolver, MergeEngine, Property, RecordId, Store, StoreError,
    UpdateMode,
};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as Json, json};
use tracing::{debug, info};

/// Default base URI stripped from binding links.
pub const DEFAULT_BASE_URI: &str = "http://localhost/navstore/";

// =============================================================================
// SEED DATA
// =============================================================================

/// Initial content of a store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Seed {
    /// Records per entity set, created in file order.
    #[serde(default)]
    pub sets: Vec<SeedSet>,
    /// Links created once every record exists.
    #[serde(default)]
    pub links: Vec<SeedLink>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedSet {
    pub name: String,
    #[serde(default)]
    pub records: Vec<Map<String, Json>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeedLink {
    pub from: String,
    pub navigation: String,
    pub to: String,
}

// =============================================================================
// SCRIPT STEPS
// =============================================================================

fn default_patch() -> bool {
    true
}

/// One operation of a script file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Create a record; keys are allocated unless all are given.
    Create {
        set: String,
        #[serde(default)]
        record: Map<String, Json>,
    },
    Read {
        link: String,
    },
    ReadAll {
        set: String,
    },
    Update {
        link: String,
        #[serde(default)]
        record: Map<String, Json>,
        #[serde(default = "default_patch")]
        patch: bool,
    },
    Delete {
        link: String,
    },
    Link {
        from: String,
        navigation: String,
        to: String,
    },
    Unlink {
        from: String,
        navigation: String,
    },
    SetMedia {
        link: String,
        content_type: String,
        data: String,
    },
    ReadMedia {
        link: String,
    },
}

impl Step {
    /// Operation name, for log lines.
    #[must_use]
    pub fn name(&self) -> &'static str {
        match self {
            Self::Create { .. } => "create",
            Self::Read { .. } => "read",
            Self::ReadAll { .. } => "read_all",
            Self::Update { .. } => "update",
            Self::Delete { .. } => "delete",
            Self::Link { .. } => "link",
            Self::Unlink { .. } => "unlink",
            Self::SetMedia { .. } => "set_media",
            Self::ReadMedia { .. } => "read_media",
        }
    }
}

// =============================================================================
// SESSION
// =============================================================================

/// A store addressed through binding-link text.
pub struct Session {
    store: Store,
    resolver: EntityLinkParser,
    base_uri: String,
}

impl Session {
    #[must_use]
    pub fn new(store: Store, base_uri: impl Into<String>) -> Self {
        Self {
            store,
            resolver: EntityLinkParser,
            base_uri: base_uri.into(),
        }
    }

    #[must_use]
    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Resolve a link to `(set, record)`; `Ok(None)` when no record matches.
    pub fn find(&self, link: &str) -> Result<Option<(String, RecordId)>, AppError> {
        let resolved = self
            .resolver
            .resolve(self.store.schema(), &self.base_uri, link)?;
        Ok(self
            .store
            .find(&resolved.entity_set, &resolved.keys)?
            .map(|id| (resolved.entity_set, id)))
    }

    /// Like `find`, with a missing record reported as NotFound.
    pub fn locate(&self, link: &str) -> Result<(String, RecordId), AppError> {
        self.find(link)?.ok_or_else(|| {
            AppError::Store(StoreError::NotFound(format!("No record matches {}", link)))
        })
    }

    /// Render a record of `set` as JSON.
    pub fn render(&self, set: &str, id: RecordId) -> Result<Json, AppError> {
        let (entity_set, _) = self.store.schema().require_entity_set(set)?;
        let record = self
            .store
            .get(id)
            .ok_or_else(|| StoreError::NotFound(format!("Record {} not found", id)))?;
        record_json(&self.store, entity_set, record)
    }

    /// Render every record of `set`, in collection order.
    pub fn render_all(&self, set: &str) -> Result<Json, AppError> {
        let collection = self
            .store
            .read_all(set)
            .ok_or_else(|| StoreError::NotFound(format!("Entity set {} not found", set)))?;
        collection
            .ids()
            .iter()
            .map(|id| self.render(set, *id))
            .collect::<Result<Vec<_>, _>>()
            .map(Json::Array)
    }

    // =========================================================================
    // SEEDING
    // =========================================================================

    /// Create every seed record, then every seed link.
    pub fn seed(&mut self, seed: &Seed) -> Result<(), AppError> {
        for set in &seed.sets {
            for record in &set.records {
                self.create(&set.name, record)?;
            }
        }
        for link in &seed.links {
            self.link(&link.from, &link.navigation, &link.to)?;
        }
        info!(
            sets = seed.sets.len(),
            links = seed.links.len(),
            records = self.store.record_count(),
            "seed applied"
        );
        Ok(())
    }

    // =========================================================================
    // STEPS
    // =========================================================================

    /// Execute one script step and return its JSON result.
    pub fn execute(&mut self, step: &Step) -> Result<Json, AppError> {
        debug!(op = step.name(), "executing step");
        match step {
            Step::Create { set, record } => {
                let id = self.create(set, record)?;
                self.render(set, id)
            }
            Step::Read { link } => match self.find(link)? {
                Some((set, id)) => self.render(&set, id),
                None => Ok(Json::Null),
            },
            Step::ReadAll { set } => match self.store.read_all(set) {
                Some(_) => self.render_all(set),
                None => Ok(Json::Null),
            },
            Step::Update {
                link,
                record,
                patch,
            } => {
                let (set, id) = self.locate(link)?;
                let mode = if *patch {
                    UpdateMode::patch()
                } else {
                    UpdateMode::replace()
                };
                self.update(&set, id, record, mode)?;
                self.render(&set, id)
            }
            Step::Delete { link } => {
                let (set, id) = self.locate(link)?;
                self.store.delete(&set, id)?;
                Ok(json!({ "deleted": link }))
            }
            Step::Link {
                from,
                navigation,
                to,
            } => {
                let (set, id) = self.link(from, navigation, to)?;
                self.render(&set, id)
            }
            Step::Unlink { from, navigation } => {
                let (set, id) = self.locate(from)?;
                MergeEngine::remove_link(&mut self.store, id, navigation)?;
                self.render(&set, id)
            }
            Step::SetMedia {
                link,
                content_type,
                data,
            } => {
                let (set, id) = self.locate(link)?;
                self.store
                    .set_media(id, data.as_bytes().to_vec(), content_type.as_str())?;
                self.render(&set, id)
            }
            Step::ReadMedia { link } => {
                let (_, id) = self.locate(link)?;
                let media = self.store.read_media(id)?;
                Ok(json!({
                    "content_type": media.content_type,
                    "data": String::from_utf8_lossy(&media.bytes),
                }))
            }
        }
    }

    fn create(&mut self, set: &str, record: &Map<String, Json>) -> Result<RecordId, AppError> {
        let schema = self.store.schema_handle();
        let (_, entity_type) = schema.require_entity_set(set)?;
        let changed = changed_record(&schema, entity_type, record)?;

        let key: Vec<Property> = entity_type
            .keys
            .iter()
            .filter_map(|k| changed.property(k).cloned())
            .collect();
        let id = if key.is_empty() {
            self.store.create(set)?.id
        } else if key.len() == entity_type.keys.len() {
            self.store.create_with_key(set, key)?.id
        } else {
            return Err(AppError::Payload(format!(
                "Record for {} gives {} of {} key properties",
                set,
                key.len(),
                entity_type.keys.len()
            )));
        };

        MergeEngine::update(
            &mut self.store,
            &self.resolver,
            &self.base_uri,
            set,
            id,
            &changed,
            UpdateMode::insert(),
        )?;

        if let Some(record) = self.store.get(id) {
            debug!(set, link = %entity_link(set, entity_type, record), "created");
        }
        Ok(id)
    }

    fn update(
        &mut self,
        set: &str,
        id: RecordId,
        record: &Map<String, Json>,
        mode: UpdateMode,
    ) -> Result<(), AppError> {
        let schema = self.store.schema_handle();
        let (_, entity_type) = schema.require_entity_set(set)?;
        let changed = changed_record(&schema, entity_type, record)?;
        MergeEngine::update(
            &mut self.store,
            &self.resolver,
            &self.base_uri,
            set,
            id,
            &changed,
            mode,
        )?;
        Ok(())
    }

    fn link(
        &mut self,
        from: &str,
        navigation: &str,
        to: &str,
    ) -> Result<(String, RecordId), AppError> {
        let (set, src) = self.locate(from)?;
        let (_, dst) = self.locate(to)?;
        MergeEngine::create_link(&mut self.store, src, navigation, dst)?;
        Ok((set, src))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use navstore_core::{EntitySet, EntityType, NavigationDef, PrimitiveKind, PropertyDef, Schema};

    fn session() -> Session {
        let schema = Schema::new()
            .with_entity_type(
                EntityType::new("ETDoc")
                    .with_key(PropertyDef::primitive("Id", PrimitiveKind::Int32))
                    .with_property(PropertyDef::primitive("Title", PrimitiveKind::String))
                    .with_navigation(NavigationDef::one("Folder", "ETFolder").with_partner("Docs"))
                    .with_stream(),
            )
            .with_entity_type(
                EntityType::new("ETFolder")
                    .with_key(PropertyDef::primitive("Name", PrimitiveKind::String))
                    .with_navigation(NavigationDef::many("Docs", "ETDoc").with_partner("Folder")),
            )
            .with_entity_set(EntitySet::new("Docs", "ETDoc").with_binding("Folder", "Folders"))
            .with_entity_type(
                EntityType::new("ETLine")
                    .with_key(PropertyDef::primitive("Order", PrimitiveKind::Int32))
                    .with_key(PropertyDef::primitive("Line", PrimitiveKind::Int32)),
            )
            .with_entity_set(EntitySet::new("Folders", "ETFolder").with_binding("Docs", "Docs"))
            .with_entity_set(EntitySet::new("Lines", "ETLine"));
        Session::new(Store::new(schema).expect("store"), DEFAULT_BASE_URI)
    }

    fn step(json: Json) -> Step {
        serde_json::from_value(json).expect("step")
    }

    #[test]
    fn create_with_explicit_key_and_binding() {
        let mut session = session();
        session
            .execute(&step(json!({
                "op": "create",
                "set": "Folders",
                "record": { "Name": "inbox" }
            })))
            .expect("folder");

        let doc = session
            .execute(&step(json!({
                "op": "create",
                "set": "Docs",
                "record": { "Title": "a", "Folder@odata.bind": "Folders('inbox')" }
            })))
            .expect("doc");

        assert_eq!(doc["@id"], json!("Docs(1)"));
        assert_eq!(doc["Folder@links"], json!(["Folders('inbox')"]));

        let folder = session
            .execute(&step(json!({ "op": "read", "link": "Folders('inbox')" })))
            .expect("read");
        assert_eq!(folder["Docs@links"], json!(["Docs(1)"]));
    }

    #[test]
    fn read_of_missing_record_is_null() {
        let mut session = session();
        let result = session
            .execute(&step(json!({ "op": "read", "link": "Docs(9)" })))
            .expect("read");
        assert_eq!(result, Json::Null);
    }

    #[test]
    fn update_defaults_to_patch() {
        let mut session = session();
        session
            .execute(&step(json!({ "op": "create", "set": "Docs", "record": { "Title": "a" } })))
            .expect("create");
        let patched = session
            .execute(&step(json!({ "op": "update", "link": "Docs(1)", "record": {} })))
            .expect("patch");
        assert_eq!(patched["Title"], json!("a"));

        let replaced = session
            .execute(&step(json!({
                "op": "update",
                "link": "Docs(1)",
                "record": {},
                "patch": false
            })))
            .expect("replace");
        assert_eq!(replaced["Title"], Json::Null);
    }

    #[test]
    fn media_round_trip() {
        let mut session = session();
        session
            .execute(&step(json!({ "op": "create", "set": "Docs" })))
            .expect("create");
        session
            .execute(&step(json!({
                "op": "set_media", "link": "Docs(1)", "content_type": "text/plain", "data": "hello"
            })))
            .expect("set media");
        let media = session
            .execute(&step(json!({ "op": "read_media", "link": "Docs(1)" })))
            .expect("read media");
        assert_eq!(media, json!({ "content_type": "text/plain", "data": "hello" }));
    }

    #[test]
    fn delete_of_missing_record_is_not_found() {
        let mut session = session();
        let err = session
            .execute(&step(json!({ "op": "delete", "link": "Docs(1)" })))
            .expect_err("missing");
        assert_eq!(err.status(), 404);
    }

    #[test]
    fn partial_composed_key_is_rejected() {
        let mut session = session();
        let err = session
            .execute(&step(json!({ "op": "create", "set": "Lines", "record": { "Order": 7 } })))
            .expect_err("partial key");
        assert!(matches!(err, AppError::Payload(_)));
        assert_eq!(session.store().record_count(), 0);

        let line = session
            .execute(&step(json!({
                "op": "create",
                "set": "Lines",
                "record": { "Order": 7, "Line": 2 }
            })))
            .expect("full key");
        assert_eq!(line["@id"], json!("Lines(Order=7,Line=2)"));
    }
}
