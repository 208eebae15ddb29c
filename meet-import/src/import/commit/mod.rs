//! Committer: phase-ordered transactional persistence of the staging
//! cache.
//!
//! Walks the entity store in the fixed [`EntityType::COMMIT_PHASES`]
//! order inside one store transaction. Every staged entity has its
//! bindings resolved to persisted identifiers (guaranteed resolvable by
//! phase order; anything else is staging-graph corruption and fatal),
//! gets one chance at an educated re-seek, then goes through the
//! diff-based insert/update decision. Any fatal error rolls the whole
//! transaction back and discards the replay log.

pub mod replay;

pub use replay::{CommitRecord, Operation, ReplayLog};

use anyhow::{Context, Result, anyhow, bail};

use super::diff::{diff_for_insert, diff_for_update};
use super::store::EntityStore;
use super::types::{EntityType, Row, Value};
use crate::services::progress::{NullSink, ProgressSink, ProgressUpdate, publish_best_effort};
use crate::storage::MeetStore;

/// Topic the committer publishes progress on
const PROGRESS_TOPIC: &str = "import/commit";

/// Result of one committed run
#[derive(Debug)]
pub struct CommitOutcome {
    /// One record per applied persistence call, in emission order
    pub records: Vec<CommitRecord>,
    /// The replayable statement batch
    pub log: ReplayLog,
}

impl CommitOutcome {
    /// Count of applied operations of one kind
    pub fn count_by_operation(&self, operation: Operation) -> usize {
        self.records
            .iter()
            .filter(|r| r.operation == operation)
            .count()
    }

    pub fn insert_count(&self) -> usize {
        self.count_by_operation(Operation::Insert)
    }

    pub fn update_count(&self) -> usize {
        self.count_by_operation(Operation::Update)
    }
}

/// Transactional writer of a fully staged entity store
pub struct Committer<'a> {
    store: &'a mut dyn MeetStore,
    progress: &'a dyn ProgressSink,
}

impl<'a> Committer<'a> {
    pub fn new(store: &'a mut dyn MeetStore) -> Self {
        Committer {
            store,
            progress: &NullSink,
        }
    }

    pub fn with_progress(mut self, progress: &'a dyn ProgressSink) -> Self {
        self.progress = progress;
        self
    }

    /// Commit the whole staging cache inside one atomic transaction.
    ///
    /// On success every staged entity carries its persisted identifier
    /// and row. On failure the transaction is rolled back and no replay
    /// output is produced.
    pub fn commit(mut self, cache: &mut EntityStore) -> Result<CommitOutcome> {
        self.store
            .begin()
            .context("Failed to open commit transaction")?;
        let mut log = ReplayLog::new();
        log.begin();
        let mut records = Vec::new();

        match self.run(cache, &mut log, &mut records) {
            Ok(()) => {
                self.store
                    .commit()
                    .context("Failed to commit transaction")?;
                log.finish();
                log::debug!(
                    "commit complete: {} statements applied",
                    log.statement_count()
                );
                Ok(CommitOutcome { records, log })
            }
            Err(err) => {
                log::error!("commit aborted, rolling back: {:#}", err);
                if let Err(rollback_err) = self.store.rollback() {
                    log::error!("rollback itself failed: {:#}", rollback_err);
                }
                Err(err)
            }
        }
    }

    fn run(
        &mut self,
        cache: &mut EntityStore,
        log: &mut ReplayLog,
        records: &mut Vec<CommitRecord>,
    ) -> Result<()> {
        let total = EntityType::COMMIT_PHASES.len();
        for (index, entity) in EntityType::COMMIT_PHASES.into_iter().enumerate() {
            let phase = entity.to_string();
            publish_best_effort(
                self.progress,
                PROGRESS_TOPIC,
                &ProgressUpdate {
                    message: &phase,
                    current: index + 1,
                    total,
                },
            );
            for key in cache.keys(entity) {
                self.commit_one(cache, entity, &key, log, records)?;
            }
        }
        Ok(())
    }

    fn commit_one(
        &mut self,
        cache: &mut EntityStore,
        entity: EntityType,
        key: &str,
        log: &mut ReplayLog,
        records: &mut Vec<CommitRecord>,
    ) -> Result<()> {
        let resolved = self.resolve_bindings(cache, entity, key)?;
        let Some(staged) = cache.get_mut(entity, key) else {
            bail!("{} '{}' vanished from the staging cache", entity, key);
        };
        for (attribute, id) in resolved {
            staged.set(attribute, Value::Int(id));
        }

        // Rows unfindable earlier (their owning associations had no
        // identifiers yet) get one narrower, fully-resolved lookup now.
        if staged.persisted_id.is_none() {
            if let Some(row) = reseek(&*self.store, entity, &staged.row) {
                if let Some(id) = row.get("id").and_then(Value::as_int) {
                    log::debug!("re-seek adopted {} id={} for '{}'", entity, id, key);
                    staged.persisted_id = Some(id);
                }
            }
        }

        match staged.persisted_id {
            Some(id) => {
                let persisted = self.store.find_by_id(entity, id).ok_or_else(|| {
                    anyhow!("{} '{}' references missing persisted row id={}", entity, key, id)
                })?;
                let changes = diff_for_update(entity, &staged.row, &persisted);
                if changes.is_empty() && !entity.forces_update() {
                    // Convergent row: true no-op, no commit record
                    staged.adopt_persisted(id, persisted);
                    return Ok(());
                }
                self.store
                    .update(entity, id, &changes)
                    .with_context(|| format!("Failed to update {} '{}'", entity, key))?;
                let full = self.store.find_by_id(entity, id).unwrap_or(persisted);
                let statement = log.push_update(entity, id, &full);
                records.push(CommitRecord {
                    entity,
                    operation: Operation::Update,
                    persisted_id: id,
                    statement,
                });
                staged.adopt_persisted(id, full);
            }
            None => {
                let attrs = diff_for_insert(entity, &staged.row);
                let id = self
                    .store
                    .insert(entity, &attrs)
                    .with_context(|| format!("Insert rejected for {} '{}'", entity, key))?;
                let statement = log.push_insert(entity, &attrs);
                records.push(CommitRecord {
                    entity,
                    operation: Operation::Insert,
                    persisted_id: id,
                    statement,
                });
                let full = self.store.find_by_id(entity, id).unwrap_or(attrs);
                staged.adopt_persisted(id, full);
            }
        }
        Ok(())
    }

    /// Resolve every binding of one staged entity to a persisted
    /// identifier. Failures here are staging-graph errors, not user-data
    /// errors, and abort the run.
    fn resolve_bindings(
        &self,
        cache: &EntityStore,
        entity: EntityType,
        key: &str,
    ) -> Result<Vec<(String, i64)>> {
        let Some(staged) = cache.get(entity, key) else {
            bail!("{} '{}' vanished from the staging cache", entity, key);
        };
        let mut resolved = Vec::with_capacity(staged.bindings.len());
        for (attribute, binding) in &staged.bindings {
            let target = cache.get(binding.entity, &binding.key).ok_or_else(|| {
                anyhow!(
                    "binding '{}' of {} '{}' references missing {} '{}'",
                    attribute,
                    entity,
                    key,
                    binding.entity,
                    binding.key
                )
            })?;
            let id = target.persisted_id.ok_or_else(|| {
                anyhow!(
                    "binding '{}' of {} '{}' targets {} '{}' which has no persisted id",
                    attribute,
                    entity,
                    key,
                    binding.entity,
                    binding.key
                )
            })?;
            resolved.push((attribute.clone(), id));
        }
        Ok(resolved)
    }
}

/// Compound constraint columns for the per-type educated re-seek,
/// evaluated against the staged row after binding resolution
fn reseek_columns(entity: EntityType) -> &'static [&'static str] {
    match entity {
        EntityType::Calendar => &["meeting_id"],
        EntityType::Session => &["meeting_id", "session_order"],
        EntityType::TeamAffiliation => &["team_id", "season_id"],
        EntityType::Badge => &["swimmer_id", "team_id", "season_id"],
        EntityType::Event => &["meeting_session_id", "event_code"],
        EntityType::Program => &["meeting_event_id", "category_code", "gender_code"],
        EntityType::IndividualResult => &["meeting_program_id", "swimmer_id"],
        EntityType::Lap => &["meeting_individual_result_id", "distance"],
        EntityType::RelayResult => &["meeting_program_id", "team_id"],
        EntityType::RelaySwimmer => &["meeting_relay_result_id", "relay_order"],
        EntityType::RelayLap => &["meeting_relay_result_id", "distance"],
        EntityType::TeamScore => &["meeting_id", "team_id"],
        _ => &[],
    }
}

/// Look the persisted store up again with the narrower compound
/// constraint available only now that bindings are resolved
fn reseek(store: &dyn MeetStore, entity: EntityType, row: &Row) -> Option<Row> {
    let columns = reseek_columns(entity);
    if columns.is_empty() {
        return None;
    }
    let mut constraints = Vec::with_capacity(columns.len());
    for column in columns {
        let value = row.get(*column)?;
        if value.is_blank() {
            return None;
        }
        constraints.push((*column, value.clone()));
    }
    store.find_first(entity, &constraints)
}
