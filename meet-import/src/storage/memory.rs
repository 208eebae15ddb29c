//! In-memory store backend for tests and dry runs

use std::collections::BTreeMap;

use anyhow::{Result, bail};
use chrono::Utc;

use super::MeetStore;
use crate::import::types::{EntityType, Row, Value};

type Table = BTreeMap<i64, Row>;

/// A transactional in-memory row store with store-assigned integer
/// identifiers and naive snapshot-based rollback.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tables: BTreeMap<EntityType, Table>,
    next_id: i64,
    snapshot: Option<(BTreeMap<EntityType, Table>, i64)>,
}

impl MemoryStore {
    pub fn new() -> Self {
        MemoryStore {
            tables: BTreeMap::new(),
            next_id: 1,
            snapshot: None,
        }
    }

    /// Seed a row directly (test setup); returns its identifier
    pub fn seed(&mut self, entity: EntityType, mut row: Row) -> i64 {
        let id = self.next_id;
        self.next_id += 1;
        row.insert("id".into(), Value::Int(id));
        row.entry("lock_version".into()).or_insert(Value::Int(0));
        self.tables.entry(entity).or_default().insert(id, row);
        id
    }

    /// Number of rows in one table
    pub fn count(&self, entity: EntityType) -> usize {
        self.tables.get(&entity).map_or(0, Table::len)
    }

    fn matches(row: &Row, constraints: &[(&str, Value)]) -> bool {
        constraints
            .iter()
            .all(|(column, value)| row.get(*column) == Some(value))
    }
}

impl MeetStore for MemoryStore {
    fn find_by_id(&self, entity: EntityType, id: i64) -> Option<Row> {
        self.tables.get(&entity)?.get(&id).cloned()
    }

    fn find_first(&self, entity: EntityType, constraints: &[(&str, Value)]) -> Option<Row> {
        self.tables
            .get(&entity)?
            .values()
            .find(|row| Self::matches(row, constraints))
            .cloned()
    }

    fn find_all(&self, entity: EntityType, constraints: &[(&str, Value)]) -> Vec<Row> {
        self.tables
            .get(&entity)
            .into_iter()
            .flat_map(Table::values)
            .filter(|row| Self::matches(row, constraints))
            .cloned()
            .collect()
    }

    fn insert(&mut self, entity: EntityType, attrs: &Row) -> Result<i64> {
        for required in entity.required_columns() {
            let blank = attrs.get(*required).is_none_or(Value::is_blank);
            if blank {
                bail!(
                    "validation failed for {}: missing required attribute '{}'",
                    entity,
                    required
                );
            }
        }
        let mut row = attrs.clone();
        let now = Value::DateTime(Utc::now());
        row.insert("created_at".into(), now.clone());
        row.insert("updated_at".into(), now);
        row.insert("lock_version".into(), Value::Int(0));
        Ok(self.seed(entity, row))
    }

    fn update(&mut self, entity: EntityType, id: i64, attrs: &Row) -> Result<()> {
        let Some(row) = self.tables.entry(entity).or_default().get_mut(&id) else {
            bail!("update of missing {} row id={}", entity, id);
        };
        for (column, value) in attrs {
            row.insert(column.clone(), value.clone());
        }
        row.insert("updated_at".into(), Value::DateTime(Utc::now()));
        let bumped = row.get("lock_version").and_then(Value::as_int).unwrap_or(0) + 1;
        row.insert("lock_version".into(), Value::Int(bumped));
        Ok(())
    }

    fn begin(&mut self) -> Result<()> {
        if self.snapshot.is_some() {
            bail!("transaction already open");
        }
        self.snapshot = Some((self.tables.clone(), self.next_id));
        Ok(())
    }

    fn commit(&mut self) -> Result<()> {
        if self.snapshot.take().is_none() {
            bail!("commit without an open transaction");
        }
        Ok(())
    }

    fn rollback(&mut self) -> Result<()> {
        let Some((tables, next_id)) = self.snapshot.take() else {
            bail!("rollback without an open transaction");
        };
        self.tables = tables;
        self.next_id = next_id;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> Row {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_insert_validates_required_columns() {
        let mut store = MemoryStore::new();
        let err = store
            .insert(EntityType::Team, &row(&[("city", "BOLOGNA".into())]))
            .unwrap_err();
        assert!(err.to_string().contains("name"));
    }

    #[test]
    fn test_rollback_restores_pre_transaction_state() {
        let mut store = MemoryStore::new();
        store
            .insert(EntityType::Team, &row(&[("name", "KEPT".into())]))
            .unwrap();

        store.begin().unwrap();
        store
            .insert(EntityType::Team, &row(&[("name", "DISCARDED".into())]))
            .unwrap();
        assert_eq!(store.count(EntityType::Team), 2);
        store.rollback().unwrap();
        assert_eq!(store.count(EntityType::Team), 1);
        assert!(store
            .find_first(EntityType::Team, &[("name", "DISCARDED".into())])
            .is_none());
    }

    #[test]
    fn test_update_bumps_lock_version_and_timestamp() {
        let mut store = MemoryStore::new();
        let id = store
            .insert(EntityType::Team, &row(&[("name", "ASD NUOTO X".into())]))
            .unwrap();
        store
            .update(EntityType::Team, id, &row(&[("city", "BOLOGNA".into())]))
            .unwrap();
        let persisted = store.find_by_id(EntityType::Team, id).unwrap();
        assert_eq!(persisted.get("lock_version"), Some(&Value::Int(1)));
        assert_eq!(persisted.get("city"), Some(&Value::Str("BOLOGNA".into())));
    }
}
