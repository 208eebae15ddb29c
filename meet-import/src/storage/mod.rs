//! Persisted-store seam.
//!
//! The destination relational store is an external collaborator; the
//! engine only consumes this trait. The in-tree [`MemoryStore`] backend
//! serves tests and dry runs.

pub mod memory;

pub use memory::MemoryStore;

use anyhow::Result;

use crate::import::types::{EntityType, Row, Value};

/// Synchronous create/read/update surface of the destination store.
///
/// `insert` validates before persisting; a validation failure is fatal to
/// the surrounding commit run. `begin`/`commit`/`rollback` delimit the
/// single atomic transaction every commit run executes inside.
pub trait MeetStore {
    /// Fetch one row by persisted identifier
    fn find_by_id(&self, entity: EntityType, id: i64) -> Option<Row>;

    /// Fetch the first row matching every given `(column, value)` constraint
    fn find_first(&self, entity: EntityType, constraints: &[(&str, Value)]) -> Option<Row>;

    /// Fetch all rows matching every given constraint (feeds fuzzy search)
    fn find_all(&self, entity: EntityType, constraints: &[(&str, Value)]) -> Vec<Row>;

    /// Validate and insert, returning the new persisted identifier
    fn insert(&mut self, entity: EntityType, attrs: &Row) -> Result<i64>;

    /// Apply an attribute diff to an existing row
    fn update(&mut self, entity: EntityType, id: i64, attrs: &Row) -> Result<()>;

    /// Open the commit transaction
    fn begin(&mut self) -> Result<()>;

    /// Commit the open transaction
    fn commit(&mut self) -> Result<()>;

    /// Roll the open transaction back, discarding every write since `begin`
    fn rollback(&mut self) -> Result<()>;
}
