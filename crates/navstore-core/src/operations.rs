//! # Operations
//!
//! Functions and actions are defined by the caller. The store only routes
//! an invocation to the supplied table and hands back its result.

use crate::store::Store;
use crate::types::{Property, RecordId, StoreResult, Value};
use serde::{Deserialize, Serialize};

/// A named operation parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Parameter {
    pub name: String,
    pub value: Value,
}

impl Parameter {
    #[must_use]
    pub fn new(name: impl Into<String>, value: Value) -> Self {
        Self {
            name: name.into(),
            value,
        }
    }
}

/// Result of a function or action invocation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OperationResult {
    /// A primitive or complex result.
    Property(Property),
    /// A single record; `created` is set when the operation created it.
    Entity { id: RecordId, created: bool },
    /// A list of records.
    Entities(Vec<RecordId>),
}

/// Side-effect-free operations.
pub trait FunctionTable {
    fn invoke(&self, name: &str, parameters: &[Parameter], store: &Store)
    -> StoreResult<OperationResult>;
}

/// Operations that may mutate the store.
pub trait ActionTable {
    fn invoke(
        &self,
        name: &str,
        parameters: &[Parameter],
        store: &mut Store,
    ) -> StoreResult<OperationResult>;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntitySet, EntityType, PrimitiveKind, PropertyDef, Schema};
    use crate::types::StoreError;

    struct Counting;

    impl FunctionTable for Counting {
        fn invoke(
            &self,
            name: &str,
            _parameters: &[Parameter],
            store: &Store,
        ) -> StoreResult<OperationResult> {
            match name {
                "CountAll" => Ok(OperationResult::Property(Property::primitive(
                    "Count",
                    store.record_count() as i64,
                ))),
                "All" => Ok(OperationResult::Entities(
                    store.read_all("Things").map(|c| c.ids().to_vec()).unwrap_or_default(),
                )),
                _ => Err(StoreError::NotImplemented(format!("Function {} not found", name))),
            }
        }
    }

    struct Creating;

    impl ActionTable for Creating {
        fn invoke(
            &self,
            name: &str,
            parameters: &[Parameter],
            store: &mut Store,
        ) -> StoreResult<OperationResult> {
            if name != "MakeThing" {
                return Err(StoreError::NotImplemented(format!("Action {} not found", name)));
            }
            let key = parameters
                .iter()
                .find(|p| p.name == "Id")
                .map(|p| vec![Property::new("Id", p.value.clone())])
                .ok_or_else(|| StoreError::BadRequest("missing Id".into()))?;
            let id = store.create_with_key("Things", key)?.id;
            Ok(OperationResult::Entity { id, created: true })
        }
    }

    fn store() -> Store {
        Store::new(
            Schema::new()
                .with_entity_type(
                    EntityType::new("ETThing")
                        .with_key(PropertyDef::primitive("Id", PrimitiveKind::Int64)),
                )
                .with_entity_set(EntitySet::new("Things", "ETThing")),
        )
        .expect("store")
    }

    #[test]
    fn action_result_is_returned_unchanged() {
        let mut store = store();
        let result = store
            .call_action(&Creating, "MakeThing", &[Parameter::new("Id", Value::primitive(40))])
            .expect("action");
        let OperationResult::Entity { id, created } = result else {
            unreachable!("MakeThing returns an entity");
        };
        assert!(created);
        assert!(store.contains("Things", id));
    }

    #[test]
    fn function_sees_store_state() {
        let mut store = store();
        store.create("Things").expect("create");
        store.create("Things").expect("create");

        let count = store.call_function(&Counting, "CountAll", &[]).expect("function");
        assert_eq!(
            count,
            OperationResult::Property(Property::primitive("Count", 2))
        );
        let all = store.call_function(&Counting, "All", &[]).expect("function");
        assert!(matches!(all, OperationResult::Entities(ids) if ids.len() == 2));
    }

    #[test]
    fn unknown_operation_error_passes_through() {
        let mut store = store();
        assert!(matches!(
            store.call_function(&Counting, "Nope", &[]),
            Err(StoreError::NotImplemented(_))
        ));
        assert!(matches!(
            store.call_action(&Creating, "Nope", &[]),
            Err(StoreError::NotImplemented(_))
        ));
    }
}
