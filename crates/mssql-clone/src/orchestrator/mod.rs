//! Clone orchestrator - main workflow coordinator.
//!
//! Drives the run through
//! `Idle → ConnectionValidating → (Aborted | Enumerating) → PerDatabase → Done`.
//! Connection validation, failing to enumerate at all, and any
//! [`Severity::Fatal`] error inside a database cycle abort the run; every
//! other per-database failure is contained in that database's report.

mod phases;
mod report;

pub use phases::{ClonePhases, SqlServerPhases};
pub use report::{run_status, DatabaseOutcome, DatabaseReport, RunReport, RunStatus, Stage};

use chrono::{Local, Utc};
use serde::Serialize;
use std::fmt;
use tracing::{debug, error, info, warn};

use crate::config::{CloneSuffix, Config};
use crate::core::{ClonedDatabase, DatabaseDescriptor};
use crate::error::{CloneError, Result, Severity};

/// State of the clone state machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CloneState {
    Idle,
    ConnectionValidating,
    Aborted,
    Enumerating,
    PerDatabase { database: String, stage: Stage },
    Done,
}

impl fmt::Display for CloneState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CloneState::Idle => f.write_str("idle"),
            CloneState::ConnectionValidating => f.write_str("connection validating"),
            CloneState::Aborted => f.write_str("aborted"),
            CloneState::Enumerating => f.write_str("enumerating"),
            CloneState::PerDatabase { database, stage } => write!(f, "{} ({})", database, stage),
            CloneState::Done => f.write_str("done"),
        }
    }
}

/// A source database and the clone a run would create for it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedClone {
    pub source: String,
    pub clone_name: String,
    pub collation: Option<String>,
}

/// Clone orchestrator.
pub struct Orchestrator<P: ClonePhases> {
    phases: P,
    suffix: CloneSuffix,
    drop_on_failure: bool,
    state: CloneState,
    abort: Option<CloneError>,
}

impl Orchestrator<SqlServerPhases> {
    /// Create an orchestrator against the configured server.
    ///
    /// The suffix is resolved here, once per run.
    pub fn new(config: Config) -> Self {
        let suffix = CloneSuffix::resolve(config.clone.suffix.as_deref(), Local::now());
        let drop_on_failure = config.clone.drop_on_failure;
        Self::with_phases(SqlServerPhases::new(config), suffix, drop_on_failure)
    }
}

impl<P: ClonePhases> Orchestrator<P> {
    pub fn with_phases(phases: P, suffix: CloneSuffix, drop_on_failure: bool) -> Self {
        Self {
            phases,
            suffix,
            drop_on_failure,
            state: CloneState::Idle,
            abort: None,
        }
    }

    pub fn state(&self) -> &CloneState {
        &self.state
    }

    pub fn suffix(&self) -> &CloneSuffix {
        &self.suffix
    }

    fn transition(&mut self, next: CloneState) {
        debug!("State: {} -> {}", self.state, next);
        self.state = next;
    }

    fn enter(&mut self, database: &str, stage: Stage) {
        self.transition(CloneState::PerDatabase {
            database: database.to_string(),
            stage,
        });
    }

    /// Validate, connect and enumerate. Any failure here is fatal.
    async fn start(&mut self) -> Result<Vec<DatabaseDescriptor>> {
        self.transition(CloneState::ConnectionValidating);
        if !self.phases.validate_connection().await {
            self.transition(CloneState::Aborted);
            return Err(CloneError::ConnectionUnavailable(self.phases.server_label()));
        }

        if let Err(e) = self.phases.connect().await {
            self.transition(CloneState::Aborted);
            return Err(e);
        }

        self.transition(CloneState::Enumerating);
        match self.phases.list_databases().await {
            Ok(databases) => Ok(databases),
            Err(e) => {
                self.transition(CloneState::Aborted);
                self.close().await;
                Err(e)
            }
        }
    }

    async fn close(&mut self) {
        if let Err(e) = self.phases.close().await {
            warn!("Closing the server connection failed: {}", e);
        }
    }

    /// Run the full clone: one cycle per selected user database.
    pub async fn run(&mut self) -> Result<RunReport> {
        let started_at = Utc::now();
        let run_id = uuid::Uuid::new_v4().to_string();
        info!("Starting clone run: {} (suffix {})", run_id, self.suffix);

        let databases = self.start().await?;

        let mut reports = Vec::with_capacity(databases.len());
        for database in &databases {
            reports.push(self.clone_database(database).await);
            if let Some(e) = self.abort.take() {
                error!("Aborting the clone run after {}: {}", database.name, e);
                self.transition(CloneState::Aborted);
                self.close().await;
                return Err(e);
            }
        }

        self.transition(CloneState::Done);
        self.close().await;

        let completed_at = Utc::now();
        let report = RunReport {
            run_id,
            suffix: self.suffix.to_string(),
            started_at,
            completed_at,
            duration_seconds: (completed_at - started_at).num_milliseconds() as f64 / 1000.0,
            status: run_status(&reports),
            databases: reports,
        };

        info!(
            "Clone run finished: {} of {} databases cloned, {} tables copied, {} tables failed, {} rows in {:.1}s",
            report.databases_succeeded(),
            report.databases.len(),
            report.tables_copied(),
            report.tables_failed(),
            report.rows_copied(),
            report.duration_seconds
        );

        Ok(report)
    }

    /// Validate and enumerate, returning what `run` would clone.
    pub async fn plan(&mut self) -> Result<Vec<PlannedClone>> {
        let databases = self.start().await?;
        self.transition(CloneState::Done);
        self.close().await;

        Ok(databases
            .into_iter()
            .map(|d| PlannedClone {
                clone_name: self.suffix.clone_name(&d.name),
                source: d.name,
                collation: d.collation,
            })
            .collect())
    }

    fn fail(&mut self, mut report: DatabaseReport, stage: Stage, e: CloneError) -> DatabaseReport {
        error!(
            "Cloning {} into {} failed while {}: {}",
            report.source, report.clone_name, stage, e
        );
        report.outcome = DatabaseOutcome::Failed {
            stage,
            error: e.to_string(),
        };
        if e.severity() == Severity::Fatal {
            self.abort = Some(e);
        }
        report
    }

    /// One per-database cycle. Never fails; the outcome is in the report.
    async fn clone_database(&mut self, source: &DatabaseDescriptor) -> DatabaseReport {
        let clone_name = self.suffix.clone_name(&source.name);
        let mut report = DatabaseReport::new(&source.name, &clone_name);
        info!("Cloning database {} into {}", source.name, clone_name);

        self.enter(&source.name, Stage::Scripting);
        let script = match self.phases.script_schema(source, &clone_name).await {
            Ok(script) => script,
            Err(e) => return self.fail(report, Stage::Scripting, e),
        };

        self.enter(&source.name, Stage::Applying);
        if let Err(e) = self.phases.create_database(source, &clone_name).await {
            return self.fail(report, Stage::Applying, e);
        }

        let applied = match self.phases.apply_schema(&clone_name, &script).await {
            Ok(applied) => applied,
            Err(e) => {
                if let CloneError::SchemaApply { statement_index, .. } = &e {
                    report.statements_applied = statement_index.saturating_sub(1);
                }
                if self.drop_on_failure {
                    match self.phases.drop_database(&clone_name).await {
                        Ok(()) => report.dropped = true,
                        Err(drop_error) => {
                            warn!("Could not drop {}: {}", clone_name, drop_error)
                        }
                    }
                }
                return self.fail(report, Stage::Applying, e);
            }
        };
        report.statements_applied = applied;

        let tables = match self.phases.list_tables(&clone_name).await {
            Ok(tables) => tables,
            Err(e) => return self.fail(report, Stage::Applying, e),
        };
        let cloned = ClonedDatabase {
            name: clone_name.clone(),
            statements_applied: report.statements_applied,
            tables,
        };

        if !cloned.has_tables() {
            self.enter(&source.name, Stage::Skipped);
            info!("{} has no user tables; skipping data copy", source.name);
            report.outcome = DatabaseOutcome::SchemaOnly;
            return report;
        }

        self.enter(&source.name, Stage::Copying);
        match self.phases.copy_data(source, &cloned.name, &cloned.tables).await {
            Ok(results) => {
                report.tables = results;
                report.outcome = DatabaseOutcome::Cloned;
                info!(
                    "Cloned {} into {}: {} of {} tables copied",
                    source.name,
                    clone_name,
                    report.tables.len() - report.tables_failed(),
                    report.tables.len()
                );
                report
            }
            Err(e) => self.fail(report, Stage::Copying, e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::copy::CopyResult;
    use crate::core::{ColumnDescriptor, TableDescriptor};
    use crate::scripting::SchemaScript;
    use async_trait::async_trait;
    use std::collections::{HashMap, HashSet};

    /// In-memory phases that record every call.
    #[derive(Default)]
    struct FakePhases {
        reachable: bool,
        databases: Vec<DatabaseDescriptor>,
        existing: HashSet<String>,
        failing_statement: HashMap<String, usize>,
        tables: HashMap<String, Vec<TableDescriptor>>,
        failing_table: Option<String>,
        misconfigured: Option<String>,
        calls: Vec<String>,
    }

    impl FakePhases {
        fn reachable(databases: &[&str]) -> Self {
            Self {
                reachable: true,
                databases: databases
                    .iter()
                    .map(|d| DatabaseDescriptor::user(*d, Some("SQL_Latin1_General_CP1_CI_AS")))
                    .collect(),
                ..Default::default()
            }
        }

        fn with_tables(mut self, database: &str, tables: Vec<TableDescriptor>) -> Self {
            self.tables.insert(database.to_string(), tables);
            self
        }

        fn called(&self, prefix: &str) -> Vec<&str> {
            self.calls
                .iter()
                .map(String::as_str)
                .filter(|c| c.starts_with(prefix))
                .collect()
        }
    }

    #[async_trait]
    impl ClonePhases for FakePhases {
        fn server_label(&self) -> String {
            "Server=tcp:db,1433;Database=master;Password=*****".into()
        }

        async fn validate_connection(&mut self) -> bool {
            self.calls.push("validate".into());
            self.reachable
        }

        async fn connect(&mut self) -> Result<()> {
            self.calls.push("connect".into());
            Ok(())
        }

        async fn list_databases(&mut self) -> Result<Vec<DatabaseDescriptor>> {
            self.calls.push("list_databases".into());
            Ok(self.databases.clone())
        }

        async fn script_schema(
            &mut self,
            source: &DatabaseDescriptor,
            clone_name: &str,
        ) -> Result<SchemaScript> {
            self.calls.push(format!("script {} {}", source.name, clone_name));
            Ok(SchemaScript::new(
                (1..=10).map(|i| format!("CREATE TABLE [dbo].[T{}] ([id] int)", i)).collect(),
            ))
        }

        async fn create_database(&mut self, _source: &DatabaseDescriptor, clone_name: &str) -> Result<()> {
            self.calls.push(format!("create {}", clone_name));
            if self.misconfigured.as_deref() == Some(clone_name) {
                return Err(CloneError::Config(format!("no connection for {}", clone_name)));
            }
            if !self.existing.insert(clone_name.to_string()) {
                return Err(CloneError::CloneExists(clone_name.to_string()));
            }
            Ok(())
        }

        async fn apply_schema(&mut self, clone_name: &str, script: &SchemaScript) -> Result<usize> {
            let source = clone_name.split('_').next().unwrap_or_default().to_string();
            match self.failing_statement.get(&source) {
                Some(&index) => {
                    for i in 1..index {
                        self.calls.push(format!("apply {} {}", clone_name, i));
                    }
                    Err(CloneError::SchemaApply {
                        database: clone_name.to_string(),
                        statement_index: index,
                        message: "Invalid object name".into(),
                    })
                }
                None => {
                    for i in 1..=script.len() {
                        self.calls.push(format!("apply {} {}", clone_name, i));
                    }
                    Ok(script.len())
                }
            }
        }

        async fn list_tables(&mut self, clone_name: &str) -> Result<Vec<TableDescriptor>> {
            self.calls.push(format!("list_tables {}", clone_name));
            if !self.existing.contains(clone_name) {
                return Err(CloneError::Config(format!("no database {}", clone_name)));
            }
            let source = clone_name.split('_').next().unwrap_or_default();
            Ok(self.tables.get(source).cloned().unwrap_or_default())
        }

        async fn copy_data(
            &mut self,
            _source: &DatabaseDescriptor,
            clone_name: &str,
            tables: &[TableDescriptor],
        ) -> Result<Vec<CopyResult>> {
            let mut results = Vec::new();
            for table in tables {
                self.calls.push(format!("copy {} {}", clone_name, table.select_list()?));
                let name = table.destination()?;
                if self.failing_table.as_deref() == Some(table.name.as_str()) {
                    results.push(CopyResult::failure(name, "bulk write failed"));
                } else {
                    results.push(CopyResult::success(name, 5));
                }
            }
            Ok(results)
        }

        async fn drop_database(&mut self, clone_name: &str) -> Result<()> {
            self.calls.push(format!("drop {}", clone_name));
            self.existing.remove(clone_name);
            Ok(())
        }

        async fn close(&mut self) -> Result<()> {
            self.calls.push("close".into());
            Ok(())
        }
    }

    fn suffix() -> CloneSuffix {
        CloneSuffix::resolve(Some("_20261019"), Local::now())
    }

    fn sales_tables() -> Vec<TableDescriptor> {
        vec![
            TableDescriptor::new(
                "dbo",
                "Orders",
                vec![
                    ColumnDescriptor::identity("id"),
                    ColumnDescriptor::new("total"),
                    ColumnDescriptor::computed("computedTax"),
                ],
            ),
            TableDescriptor::new(
                "dbo",
                "Customers",
                vec![ColumnDescriptor::new("id"), ColumnDescriptor::new("name")],
            ),
        ]
    }

    #[tokio::test]
    async fn test_unreachable_server_aborts_before_enumeration() {
        let phases = FakePhases::default();
        let mut orchestrator = Orchestrator::with_phases(phases, suffix(), false);

        let err = orchestrator.run().await.unwrap_err();

        assert!(matches!(err, CloneError::ConnectionUnavailable(_)));
        assert_eq!(orchestrator.state(), &CloneState::Aborted);
        assert_eq!(orchestrator.phases.calls, vec!["validate"]);
    }

    #[tokio::test]
    async fn test_sales_is_cloned_with_computed_columns_excluded() {
        let phases = FakePhases::reachable(&["Sales"]).with_tables("Sales", sales_tables());
        let mut orchestrator = Orchestrator::with_phases(phases, suffix(), false);

        let report = orchestrator.run().await.unwrap();

        assert_eq!(report.status, RunStatus::Completed);
        assert_eq!(report.exit_code(), 0);
        let sales = &report.databases[0];
        assert_eq!(sales.clone_name, "Sales_20261019");
        assert_eq!(sales.outcome, DatabaseOutcome::Cloned);
        assert_eq!(sales.statements_applied, 10);
        assert_eq!(
            orchestrator.phases.called("copy"),
            vec![
                "copy Sales_20261019 [id],[total]",
                "copy Sales_20261019 [id],[name]",
            ]
        );
        assert_eq!(orchestrator.state(), &CloneState::Done);
        assert_eq!(orchestrator.phases.calls.last().map(String::as_str), Some("close"));
    }

    #[tokio::test]
    async fn test_script_is_requested_before_database_is_created() {
        let phases = FakePhases::reachable(&["Sales"]);
        let mut orchestrator = Orchestrator::with_phases(phases, suffix(), false);
        orchestrator.run().await.unwrap();

        let calls = &orchestrator.phases.calls;
        assert_eq!(calls[3], "script Sales Sales_20261019");
        assert_eq!(calls[4], "create Sales_20261019");
    }

    #[tokio::test]
    async fn test_tables_are_listed_from_the_clone() {
        let phases = FakePhases::reachable(&["Sales"]).with_tables("Sales", sales_tables());
        let mut orchestrator = Orchestrator::with_phases(phases, suffix(), false);
        orchestrator.run().await.unwrap();

        let calls = &orchestrator.phases.calls;
        let listed = calls.iter().position(|c| c == "list_tables Sales_20261019");
        let last_apply = calls.iter().rposition(|c| c.starts_with("apply Sales_20261019"));
        assert!(listed.is_some());
        assert!(listed > last_apply);
    }

    #[tokio::test]
    async fn test_database_without_tables_skips_copier() {
        let phases = FakePhases::reachable(&["Empty"]);
        let mut orchestrator = Orchestrator::with_phases(phases, suffix(), false);

        let report = orchestrator.run().await.unwrap();

        assert_eq!(report.databases[0].outcome, DatabaseOutcome::SchemaOnly);
        assert!(orchestrator.phases.called("copy").is_empty());
        assert_eq!(report.status, RunStatus::Completed);
    }

    #[tokio::test]
    async fn test_failed_statement_stops_that_database_only() {
        let mut phases = FakePhases::reachable(&["Sales", "HR"])
            .with_tables("Sales", sales_tables())
            .with_tables("HR", sales_tables());
        phases.failing_statement.insert("Sales".into(), 3);
        let mut orchestrator = Orchestrator::with_phases(phases, suffix(), false);

        let report = orchestrator.run().await.unwrap();

        let phases = &orchestrator.phases;
        assert_eq!(
            phases.called("apply Sales_"),
            vec!["apply Sales_20261019 1", "apply Sales_20261019 2"]
        );
        assert!(phases.called("copy Sales_").is_empty());
        assert!(phases.called("drop").is_empty());
        assert_eq!(phases.called("apply HR_").len(), 10);
        assert_eq!(phases.called("copy HR_").len(), 2);

        let sales = &report.databases[0];
        assert_eq!(sales.statements_applied, 2);
        assert!(matches!(
            sales.outcome,
            DatabaseOutcome::Failed { stage: Stage::Applying, .. }
        ));
        assert!(!sales.dropped);
        assert!(report.databases[1].is_success());
        assert_eq!(report.status, RunStatus::CompletedWithFailures);
    }

    #[tokio::test]
    async fn test_drop_on_failure_removes_created_clone() {
        let mut phases = FakePhases::reachable(&["Sales"]);
        phases.failing_statement.insert("Sales".into(), 1);
        let mut orchestrator = Orchestrator::with_phases(phases, suffix(), true);

        let report = orchestrator.run().await.unwrap();

        assert!(report.databases[0].dropped);
        assert_eq!(orchestrator.phases.called("drop"), vec!["drop Sales_20261019"]);
    }

    #[tokio::test]
    async fn test_existing_clone_is_never_merged_or_dropped() {
        let mut phases = FakePhases::reachable(&["Sales", "HR"]).with_tables("Sales", sales_tables());
        phases.existing.insert("Sales_20261019".into());
        let mut orchestrator = Orchestrator::with_phases(phases, suffix(), true);

        let report = orchestrator.run().await.unwrap();

        let sales = &report.databases[0];
        match &sales.outcome {
            DatabaseOutcome::Failed { stage, error } => {
                assert_eq!(*stage, Stage::Applying);
                assert!(error.contains("already exists"));
            }
            other => panic!("unexpected outcome: {:?}", other),
        }
        let phases = &orchestrator.phases;
        assert!(phases.called("apply Sales_").is_empty());
        assert!(phases.called("drop").is_empty());
        assert_eq!(report.databases[1].outcome, DatabaseOutcome::SchemaOnly);
    }

    #[tokio::test]
    async fn test_table_failure_is_reported_not_fatal() {
        let mut phases = FakePhases::reachable(&["Sales"]).with_tables("Sales", sales_tables());
        phases.failing_table = Some("Orders".into());
        let mut orchestrator = Orchestrator::with_phases(phases, suffix(), false);

        let report = orchestrator.run().await.unwrap();

        let sales = &report.databases[0];
        assert_eq!(sales.outcome, DatabaseOutcome::Cloned);
        assert_eq!(sales.tables.len(), 2);
        assert_eq!(sales.tables_failed(), 1);
        assert_eq!(report.status, RunStatus::CompletedWithFailures);
        assert_eq!(report.exit_code(), crate::error::EXIT_PARTIAL_FAILURE);
    }

    #[tokio::test]
    async fn test_fatal_error_in_a_cycle_aborts_the_run() {
        let mut phases = FakePhases::reachable(&["Sales", "HR"]).with_tables("HR", sales_tables());
        phases.misconfigured = Some("Sales_20261019".into());
        let mut orchestrator = Orchestrator::with_phases(phases, suffix(), false);

        let err = orchestrator.run().await.unwrap_err();

        assert!(matches!(err, CloneError::Config(_)));
        assert_eq!(orchestrator.state(), &CloneState::Aborted);
        let phases = &orchestrator.phases;
        assert!(phases.called("script HR").is_empty());
        assert!(phases.called("create HR_").is_empty());
        assert_eq!(phases.calls.last().map(String::as_str), Some("close"));
    }

    #[tokio::test]
    async fn test_plan_lists_clone_names_without_cloning() {
        let phases = FakePhases::reachable(&["Sales", "HR"]);
        let mut orchestrator = Orchestrator::with_phases(phases, suffix(), false);

        let planned = orchestrator.plan().await.unwrap();

        let names: Vec<_> = planned.iter().map(|p| p.clone_name.as_str()).collect();
        assert_eq!(names, vec!["Sales_20261019", "HR_20261019"]);
        assert_eq!(
            orchestrator.phases.calls,
            vec!["validate", "connect", "list_databases", "close"]
        );
    }
}
