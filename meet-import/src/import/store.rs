//! Process-local staging store: `(EntityType, key) -> StagedEntity`.
//!
//! Owned by the solver while staging, then walked by the committer in
//! phase order. A key is never silently overwritten with a different
//! semantic identity: duplicates reuse the cached entry, and the only
//! sanctioned rewrite is the explicit [`EntityStore::promote`] operation.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::types::{EntityType, StagedEntity};

/// In-memory map of every staged entity, by type and derived key.
///
/// Session slots are keyed by zero-padded ordinal, so map order within
/// that type is ordinal order; other types use composite string keys.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct EntityStore {
    slots: BTreeMap<EntityType, BTreeMap<String, StagedEntity>>,
}

impl EntityStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Check presence of a key
    pub fn contains(&self, entity: EntityType, key: &str) -> bool {
        self.slots
            .get(&entity)
            .is_some_and(|m| m.contains_key(key))
    }

    /// Get a staged entity by key
    pub fn get(&self, entity: EntityType, key: &str) -> Option<&StagedEntity> {
        self.slots.get(&entity).and_then(|m| m.get(key))
    }

    /// Get a staged entity by key (mutable)
    pub fn get_mut(&mut self, entity: EntityType, key: &str) -> Option<&mut StagedEntity> {
        self.slots.get_mut(&entity).and_then(|m| m.get_mut(key))
    }

    /// Insert a staged entity, reusing the cached one when the key is
    /// already present (duplicate keys during resolution are expected).
    /// Returns a mutable reference to the cached entity.
    pub fn insert(
        &mut self,
        entity: EntityType,
        key: impl Into<String>,
        staged: StagedEntity,
    ) -> &mut StagedEntity {
        self.slots
            .entry(entity)
            .or_default()
            .entry(key.into())
            .or_insert(staged)
    }

    /// Iterate `(key, staged)` pairs of one entity type in key order
    pub fn iter(&self, entity: EntityType) -> impl Iterator<Item = (&String, &StagedEntity)> {
        self.slots.get(&entity).into_iter().flatten()
    }

    /// Snapshot the keys of one entity type
    pub fn keys(&self, entity: EntityType) -> Vec<String> {
        self.slots
            .get(&entity)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Find the first key of an entity type satisfying a predicate
    pub fn find_key_where(
        &self,
        entity: EntityType,
        predicate: impl Fn(&str) -> bool,
    ) -> Option<String> {
        self.slots
            .get(&entity)?
            .keys()
            .find(|k| predicate(k.as_str()))
            .cloned()
    }

    /// Number of staged entities of one type
    pub fn count(&self, entity: EntityType) -> usize {
        self.slots.get(&entity).map_or(0, BTreeMap::len)
    }

    /// Total staged entities across all types
    pub fn total(&self) -> usize {
        self.slots.values().map(BTreeMap::len).sum()
    }

    /// Rewrite `old_key` to `new_key` for one entity type, then fix up
    /// every binding (in every slot of every type) referencing the old key.
    ///
    /// When `new_key` is already staged, the two identities are the same
    /// entity discovered twice: the slot under `old_key` is dropped and
    /// only the bindings are redirected. Returns false when `old_key` was
    /// not staged at all.
    pub fn promote(&mut self, entity: EntityType, old_key: &str, new_key: &str) -> bool {
        if old_key == new_key {
            return self.contains(entity, old_key);
        }
        let Some(map) = self.slots.get_mut(&entity) else {
            return false;
        };
        let Some(staged) = map.remove(old_key) else {
            return false;
        };
        map.entry(new_key.to_string()).or_insert(staged);

        for slot in self.slots.values_mut() {
            for other in slot.values_mut() {
                for binding in other.bindings.values_mut() {
                    if binding.entity == entity && binding.key == old_key {
                        binding.key = new_key.to_string();
                    }
                }
            }
        }
        log::debug!("promoted {} key '{}' -> '{}'", entity, old_key, new_key);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::import::types::{Row, Value};

    fn named(name: &str) -> StagedEntity {
        let mut row = Row::new();
        row.insert("name".into(), Value::Str(name.into()));
        StagedEntity::fresh(row)
    }

    #[test]
    fn test_duplicate_insert_reuses_cached_entity() {
        let mut store = EntityStore::new();
        store.insert(EntityType::Team, "ASD NUOTO X", named("ASD NUOTO X"));
        store.insert(EntityType::Team, "ASD NUOTO X", named("SOMETHING ELSE"));
        assert_eq!(store.count(EntityType::Team), 1);
        assert_eq!(
            store
                .get(EntityType::Team, "ASD NUOTO X")
                .unwrap()
                .get_str("name"),
            Some("ASD NUOTO X")
        );
    }

    #[test]
    fn test_promotion_rewrites_slot_and_bindings() {
        let mut store = EntityStore::new();
        let partial = "ROSSI MARIO-1975-M-%";
        let complete = "ROSSI MARIO-1975-M-ASD NUOTO X";
        store.insert(EntityType::Swimmer, partial, named("ROSSI MARIO"));

        let mut badge = named("badge");
        badge.bind("swimmer_id", EntityType::Swimmer, partial);
        store.insert(EntityType::Badge, "badge-key", badge);

        assert!(store.promote(EntityType::Swimmer, partial, complete));
        assert!(!store.contains(EntityType::Swimmer, partial));
        assert!(store.contains(EntityType::Swimmer, complete));
        assert_eq!(
            store
                .get(EntityType::Badge, "badge-key")
                .unwrap()
                .bindings["swimmer_id"]
                .key,
            complete
        );
    }

    #[test]
    fn test_promotion_of_unknown_key_is_a_noop() {
        let mut store = EntityStore::new();
        assert!(!store.promote(EntityType::Swimmer, "missing", "whatever"));
    }
}
