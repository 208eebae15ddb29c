//! Replay-log writer: one SQL statement per applied operation.
//!
//! The log is the operator-facing, replayable record of a commit run:
//! statements accumulate in emission order and the whole batch is
//! wrapped in transaction markers so it can be applied atomically on a
//! separate, unsynchronized copy of the store. Row timestamps are
//! substituted with a `CURRENT_TIMESTAMP` marker to keep replay
//! time-accurate.

use serde::{Deserialize, Serialize};

use crate::import::types::{EntityType, Row, Value};

/// Marker substituted for captured timestamps
const NOW: &str = "CURRENT_TIMESTAMP";

/// Kind of persistence operation a commit record documents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operation {
    Insert,
    Update,
}

impl std::fmt::Display for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Operation::Insert => write!(f, "insert"),
            Operation::Update => write!(f, "update"),
        }
    }
}

/// One successful persistence call, with its replayable statement
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CommitRecord {
    pub entity: EntityType,
    pub operation: Operation,
    pub persisted_id: i64,
    pub statement: String,
}

/// Ordered, replayable serialization of a whole commit run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReplayLog {
    statements: Vec<String>,
    dml_count: usize,
}

impl ReplayLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open the batch with the transaction-begin marker
    pub fn begin(&mut self) {
        self.statements.push("BEGIN TRANSACTION;".into());
    }

    /// Close the batch with the transaction-commit marker
    pub fn finish(&mut self) {
        self.statements.push("COMMIT;".into());
    }

    /// Serialize and record an insert; returns the statement.
    ///
    /// Row timestamps always come from the now marker, so any captured
    /// timestamp attribute is dropped rather than echoed twice (a
    /// Calendar candidate may carry `updated_at`, unprotected for that
    /// type).
    pub fn push_insert(&mut self, entity: EntityType, attrs: &Row) -> String {
        let mut columns: Vec<&str> = Vec::with_capacity(attrs.len() + 2);
        let mut values: Vec<String> = Vec::with_capacity(attrs.len() + 2);
        for (column, value) in attrs {
            if column == "created_at" || column == "updated_at" {
                continue;
            }
            columns.push(column);
            values.push(sql_literal(value));
        }
        columns.extend(["created_at", "updated_at"]);
        values.extend([NOW.to_string(), NOW.to_string()]);

        let statement = format!(
            "INSERT INTO {} ({}) VALUES ({});",
            entity.table_name(),
            columns.join(", "),
            values.join(", ")
        );
        self.push_dml(statement.clone());
        statement
    }

    /// Serialize and record an update of the full persisted row;
    /// returns the statement
    pub fn push_update(&mut self, entity: EntityType, id: i64, row: &Row) -> String {
        let mut assignments: Vec<String> = row
            .iter()
            .filter(|(column, _)| {
                // The update timestamp is always rewritten with the
                // now marker, whatever its protection status.
                !PROTECTED_IN_REPLAY.contains(&column.as_str())
            })
            .map(|(column, value)| format!("{}={}", column, sql_literal(value)))
            .collect();
        assignments.push(format!("updated_at={}", NOW));

        let statement = format!(
            "UPDATE {} SET {} WHERE id={};",
            entity.table_name(),
            assignments.join(", "),
            id
        );
        self.push_dml(statement.clone());
        statement
    }

    fn push_dml(&mut self, statement: String) {
        self.statements.push(statement);
        self.dml_count += 1;
    }

    /// Number of replayable DML statements (markers excluded)
    pub fn statement_count(&self) -> usize {
        self.dml_count
    }

    /// True when the run applied nothing
    pub fn is_empty(&self) -> bool {
        self.dml_count == 0
    }

    /// All statements in emission order, markers included
    pub fn statements(&self) -> &[String] {
        &self.statements
    }

    /// The whole batch as one executable script
    pub fn to_script(&self) -> String {
        self.statements.join("\n")
    }
}

/// Columns never echoed into a replay statement body
const PROTECTED_IN_REPLAY: &[&str] = &["id", "lock_version", "created_at", "updated_at"];

/// Quote a value as a SQL literal, escaping embedded quotes
fn sql_literal(value: &Value) -> String {
    match value {
        Value::Null => "NULL".into(),
        Value::Str(s) => format!("'{}'", s.replace('\'', "''")),
        Value::Int(i) => i.to_string(),
        Value::Float(f) => f.to_string(),
        Value::Bool(b) => if *b { "TRUE" } else { "FALSE" }.into(),
        Value::DateTime(dt) => format!("'{}'", dt.to_rfc3339()),
    }
}
