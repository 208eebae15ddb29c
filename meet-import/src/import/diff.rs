//! Minimal non-destructive attribute diffs.
//!
//! The diff can never blank out an existing persisted value: blank
//! candidate attributes are dropped, and protected columns (identity,
//! lock counter, row timestamps) are never written.

use super::types::{EntityType, Row};

/// Attribute set for an insert: every non-blank, non-protected attribute
/// of the candidate row.
pub fn diff_for_insert(entity: EntityType, candidate: &Row) -> Row {
    candidate
        .iter()
        .filter(|(column, value)| !entity.is_protected(column) && !value.is_blank())
        .map(|(column, value)| (column.clone(), value.clone()))
        .collect()
}

/// Attribute set for an update: every candidate attribute that is
/// non-blank, differs from the persisted counterpart and is not protected.
///
/// An empty result means the persisted row already matches; the committer
/// treats that as a no-op (except for entity types forced through the
/// update path).
pub fn diff_for_update(entity: EntityType, candidate: &Row, persisted: &Row) -> Row {
    candidate
        .iter()
        .filter(|(column, value)| {
            !entity.is_protected(column)
                && !value.is_blank()
                && persisted.get(*column) != Some(*value)
        })
        .map(|(column, value)| (column.clone(), value.clone()))
        .collect()
}
