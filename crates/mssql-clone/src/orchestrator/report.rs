//! Run and per-database reports.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::copy::CopyResult;
use crate::error::{Result, EXIT_PARTIAL_FAILURE};

/// Per-database stage of the clone state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
    Scripting,
    Applying,
    Skipped,
    Copying,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Stage::Scripting => "scripting",
            Stage::Applying => "applying",
            Stage::Skipped => "skipped",
            Stage::Copying => "copying",
        };
        f.write_str(label)
    }
}

/// How one database's cycle ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum DatabaseOutcome {
    /// Schema applied and the data phase ran.
    Cloned,
    /// Schema applied; the source has no user tables.
    SchemaOnly,
    /// The cycle stopped at `stage`.
    Failed { stage: Stage, error: String },
}

/// Result of one per-database cycle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DatabaseReport {
    /// Source database name.
    pub source: String,

    /// Clone database name.
    pub clone_name: String,

    pub outcome: DatabaseOutcome,

    /// DDL statements executed against the clone.
    pub statements_applied: usize,

    /// Per-table copy results.
    pub tables: Vec<CopyResult>,

    /// The clone was dropped after a failed schema application.
    #[serde(default)]
    pub dropped: bool,
}

impl DatabaseReport {
    pub fn new(source: impl Into<String>, clone_name: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            clone_name: clone_name.into(),
            outcome: DatabaseOutcome::SchemaOnly,
            statements_applied: 0,
            tables: Vec::new(),
            dropped: false,
        }
    }

    pub fn tables_failed(&self) -> usize {
        self.tables.iter().filter(|t| !t.is_success()).count()
    }

    pub fn rows_copied(&self) -> u64 {
        self.tables.iter().map(|t| t.rows).sum()
    }

    /// True when the cycle completed and every table copied.
    pub fn is_success(&self) -> bool {
        !matches!(self.outcome, DatabaseOutcome::Failed { .. }) && self.tables_failed() == 0
    }
}

/// Final status of a run that got past connection validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Completed,
    CompletedWithFailures,
}

/// Result of a clone run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunReport {
    /// Unique run identifier.
    pub run_id: String,

    /// Suffix appended to every clone name.
    pub suffix: String,

    /// When the run started.
    pub started_at: DateTime<Utc>,

    /// When the run completed.
    pub completed_at: DateTime<Utc>,

    /// Total duration in seconds.
    pub duration_seconds: f64,

    pub status: RunStatus,

    /// One entry per selected source database, in processing order.
    pub databases: Vec<DatabaseReport>,
}

impl RunReport {
    pub fn databases_succeeded(&self) -> usize {
        self.databases.iter().filter(|d| d.is_success()).count()
    }

    pub fn databases_failed(&self) -> usize {
        self.databases.len() - self.databases_succeeded()
    }

    pub fn tables_copied(&self) -> usize {
        self.databases
            .iter()
            .flat_map(|d| d.tables.iter())
            .filter(|t| t.is_success())
            .count()
    }

    pub fn tables_failed(&self) -> usize {
        self.databases.iter().map(DatabaseReport::tables_failed).sum()
    }

    pub fn rows_copied(&self) -> u64 {
        self.databases.iter().map(DatabaseReport::rows_copied).sum()
    }

    /// 0 for a clean run, [`EXIT_PARTIAL_FAILURE`] when anything failed.
    pub fn exit_code(&self) -> u8 {
        match self.status {
            RunStatus::Completed => 0,
            RunStatus::CompletedWithFailures => EXIT_PARTIAL_FAILURE,
        }
    }

    /// Convert to JSON string.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

/// Status implied by a set of database reports.
pub fn run_status(databases: &[DatabaseReport]) -> RunStatus {
    if databases.iter().all(DatabaseReport::is_success) {
        RunStatus::Completed
    } else {
        RunStatus::CompletedWithFailures
    }
}
