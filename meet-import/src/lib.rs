//! Meet result import engine.
//!
//! Turns a parsed meeting record tree into persisted relational rows:
//! the solver resolves every result line against a staging cache with
//! deterministic composite keys, and the committer writes the cache to
//! the destination store in dependency order inside one transaction,
//! producing a replayable statement log alongside.
//!
//! The destination store, entity matching, and progress notification are
//! trait seams ([`storage::MeetStore`], [`services::EntityFinder`],
//! [`services::ProgressSink`]); in-tree implementations cover in-memory
//! persistence, fuzzy matching, and log-based progress.

pub mod import;
pub mod services;
pub mod storage;

pub use import::{
    CommitOutcome, Committer, EntityStore, ReplayLog, SeasonConfig, SolveReport, Solver,
};
pub use services::{EntityFinder, FuzzyFinder, LogSink, NullFinder, NullSink, ProgressSink};
pub use storage::{MeetStore, MemoryStore};
