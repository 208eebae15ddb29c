//! Entity resolution and commit pipeline for meeting result imports.
//!
//! A parsed [`types::RecordTree`] goes through the [`solver::Solver`],
//! which resolves every line into staged entities keyed by deterministic
//! composite keys, then through the [`commit::Committer`], which persists
//! the staging cache in dependency-phase order inside one transaction and
//! emits the replayable statement log.

pub mod commit;
pub mod config;
pub mod diff;
pub mod keys;
pub mod solver;
pub mod store;
pub mod types;

pub use commit::{CommitOutcome, CommitRecord, Committer, Operation, ReplayLog};
pub use config::{CategoryRange, SeasonConfig};
pub use solver::{SolveReport, Solver};
pub use store::EntityStore;
