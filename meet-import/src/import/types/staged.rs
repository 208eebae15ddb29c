//! Staged entities: candidate rows awaiting commit

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::entity::EntityType;
use super::value::{Row, Value};

/// A named forward-reference to another staged entity, by key.
///
/// The binding name (the map key in [`StagedEntity::bindings`]) is the
/// foreign-key attribute the resolved identifier is written into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Binding {
    /// Entity type of the referenced target
    pub entity: EntityType,
    /// Staging key of the target in the entity store
    pub key: String,
}

impl Binding {
    pub fn new(entity: EntityType, key: impl Into<String>) -> Self {
        Binding {
            entity,
            key: key.into(),
        }
    }
}

/// One candidate row plus its ranked alternatives and unresolved bindings.
///
/// Created by the solver, owned by the entity store during resolution,
/// then consumed by the committer which overwrites `row`/`persisted_id`
/// in place once the row is persisted. Never destroyed within a run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StagedEntity {
    /// Candidate attributes
    pub row: Row,
    /// Identifier in the persisted store, once known
    pub persisted_id: Option<i64>,
    /// Ranked alternative matches, kept for operator review
    pub matches: Vec<Row>,
    /// Unresolved associations: fk attribute name -> target
    pub bindings: BTreeMap<String, Binding>,
}

impl StagedEntity {
    /// Stage a freshly synthesized candidate (no persisted counterpart)
    pub fn fresh(row: Row) -> Self {
        let matches = vec![row.clone()];
        StagedEntity {
            row,
            persisted_id: None,
            matches,
            bindings: BTreeMap::new(),
        }
    }

    /// Stage a row looked up directly from the persisted store
    pub fn from_store(row: Row) -> Self {
        let persisted_id = row.get("id").and_then(Value::as_int);
        let matches = vec![row.clone()];
        StagedEntity {
            row,
            persisted_id,
            matches,
            bindings: BTreeMap::new(),
        }
    }

    /// Stage a fuzzy-match best candidate with its ranked alternatives
    pub fn from_match(best: Row, alternatives: Vec<Row>) -> Self {
        let persisted_id = best.get("id").and_then(Value::as_int);
        StagedEntity {
            row: best,
            persisted_id,
            matches: alternatives,
            bindings: BTreeMap::new(),
        }
    }

    /// Record an association whose identifier is not yet known
    pub fn bind(&mut self, attribute: impl Into<String>, entity: EntityType, key: impl Into<String>) {
        self.bindings
            .insert(attribute.into(), Binding::new(entity, key));
    }

    /// Check whether this entity already carries a persisted identifier
    pub fn is_persisted(&self) -> bool {
        self.persisted_id.is_some()
    }

    /// Overwrite row and identifier with the persisted counterpart.
    ///
    /// Called by the committer after a successful insert/update so the
    /// final store reflects exactly what was persisted.
    pub fn adopt_persisted(&mut self, id: i64, row: Row) {
        self.persisted_id = Some(id);
        self.row = row;
        self.row.insert("id".into(), Value::Int(id));
    }

    /// Get a row attribute
    pub fn get(&self, attribute: &str) -> Option<&Value> {
        self.row.get(attribute)
    }

    /// Get a row attribute as a string slice
    pub fn get_str(&self, attribute: &str) -> Option<&str> {
        self.row.get(attribute).and_then(Value::as_str)
    }

    /// Set a row attribute
    pub fn set(&mut self, attribute: impl Into<String>, value: Value) {
        self.row.insert(attribute.into(), value);
    }
}
