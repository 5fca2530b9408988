use super::{Orchestrator, RunContext};

use strata_core::connection::ConnectionString;
use strata_core::dialect::Dialect;
use strata_core::error::Error;
use strata_core::executor::{Connector, DriverError, Executor};
use strata_core::tracking::{VersionRecord, VersionStatus};

use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::TempDir;

const TABLE: &str = "__strata_db_version";
// Scripts containing this fail with a syntax error.
const BROKEN: &str = "THIS IS NOT SQL";

#[derive(Debug)]
struct FakeError {
    code: &'static str,
    message: &'static str,
    unique: bool,
}

impl FakeError {
    fn syntax() -> Self {
        Self {
            code: "1064",
            message: "syntax error near this",
            unique: false,
        }
    }

    fn duplicate() -> Self {
        Self {
            code: "1062",
            message: "duplicate entry for key ix_version",
            unique: true,
        }
    }

    fn lost() -> Self {
        Self {
            code: "2013",
            message: "lost connection during query",
            unique: false,
        }
    }
}

impl fmt::Display for FakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.code, self.message)
    }
}

impl std::error::Error for FakeError {}

impl DriverError for FakeError {
    fn code(&self) -> Option<String> {
        Some(self.code.to_string())
    }

    fn message(&self) -> String {
        self.message.to_string()
    }

    fn is_unique_violation(&self) -> bool {
        self.unique
    }
}

/// The state behind every connection to the fake database.
#[derive(Debug)]
struct Db {
    configured: bool,
    rows: Vec<VersionRecord>,
    /// Every statement and transaction command, in order.
    log: Vec<String>,
    /// Rows a tracking `UPDATE` or upsert reports as changed.
    changed_rows: u64,
    duplicate_on_insert: bool,
    tracking_down: bool,
}

impl Default for Db {
    fn default() -> Self {
        Self {
            configured: false,
            rows: Vec::new(),
            log: Vec::new(),
            changed_rows: 1,
            duplicate_on_insert: false,
            tracking_down: false,
        }
    }
}

#[derive(Debug, Clone, Default)]
struct FakeConnector(Arc<Mutex<Db>>);

impl Connector for FakeConnector {
    type Exec = FakeExecutor;

    async fn connect(&self, _connection: &ConnectionString) -> Result<FakeExecutor, FakeError> {
        Ok(FakeExecutor(Arc::clone(&self.0)))
    }
}

struct FakeExecutor(Arc<Mutex<Db>>);

impl FakeExecutor {
    fn db(&self) -> MutexGuard<'_, Db> {
        self.0.lock().unwrap()
    }

    fn command(&self, command: &str) -> Result<(), FakeError> {
        self.db().log.push(command.to_string());
        Ok(())
    }
}

impl Executor for FakeExecutor {
    type Error = FakeError;

    async fn execute(&mut self, sql: &str) -> Result<u64, FakeError> {
        let mut db = self.db();
        db.log.push(sql.trim().to_string());
        if sql.contains(BROKEN) {
            return Err(FakeError::syntax());
        }
        if !sql.contains(TABLE) {
            return Ok(0);
        }
        if sql.contains("CREATE TABLE") {
            db.configured = true;
            return Ok(0);
        }
        if db.tracking_down {
            return Err(FakeError::lost());
        }
        if sql.trim_start().starts_with("UPDATE") || sql.contains("ON DUPLICATE KEY") {
            return Ok(db.changed_rows);
        }
        if db.duplicate_on_insert {
            return Err(FakeError::duplicate());
        }
        Ok(1)
    }

    async fn exists(&mut self, sql: &str) -> Result<bool, FakeError> {
        let mut db = self.db();
        db.log.push(sql.trim().to_string());
        Ok(db.configured)
    }

    async fn scalar(&mut self, _sql: &str) -> Result<Option<String>, FakeError> {
        let db = self.db();
        Ok(db
            .rows
            .iter()
            .rev()
            .find(|row| row.is_successful())
            .map(|row| row.version.clone()))
    }

    async fn records(&mut self, _sql: &str) -> Result<Vec<VersionRecord>, FakeError> {
        Ok(self.db().rows.clone())
    }

    async fn begin(&mut self) -> Result<(), FakeError> {
        self.command("BEGIN")
    }

    async fn commit(&mut self) -> Result<(), FakeError> {
        self.command("COMMIT")
    }

    async fn rollback(&mut self) -> Result<(), FakeError> {
        self.command("ROLLBACK")
    }

    async fn close(self) -> Result<(), FakeError> {
        Ok(())
    }
}

fn failed_row(version: &str) -> VersionRecord {
    VersionRecord {
        sequence_id: 1,
        version: version.to_string(),
        applied_on_utc: Default::default(),
        applied_by_user: "app".to_string(),
        applied_by_tool: "strata".to_string(),
        applied_by_tool_version: "0.3.0".to_string(),
        status: VersionStatus::Failed,
        duration_ms: 3,
        failed_script_path: Some("v1.00/01_schema.sql".to_string()),
        failed_script_error: Some("(Error 1064) Error syntax error near this.".to_string()),
        additional_artifacts: None,
    }
}

struct Fixture {
    dir: TempDir,
    db: Arc<Mutex<Db>>,
    app: Orchestrator<FakeConnector>,
}

impl Fixture {
    fn new(dialect: Dialect) -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let connector = FakeConnector::default();
        let db = Arc::clone(&connector.0);
        let mut app = Orchestrator::new(connector, dialect);
        let url = match dialect {
            Dialect::SqlServer => "Server=localhost;Database=shop;User Id=app;",
            _ => "mysql://app@localhost:3306/shop",
        };
        app.initialize(url).unwrap();

        Self {
            dir: tempfile::tempdir().unwrap(),
            db,
            app,
        }
    }

    fn write(&self, rel: &str, contents: &str) -> &Self {
        let path = self.dir.path().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
        self
    }

    fn db(&self) -> MutexGuard<'_, Db> {
        self.db.lock().unwrap()
    }

    fn log(&self) -> Vec<String> {
        self.db().log.clone()
    }

    async fn run(&self) -> Result<usize, Error> {
        let result = self.app.run(self.dir.path(), &RunContext::new()).await?;
        Ok(result.applied().len())
    }
}

#[tokio::test]
async fn mysql_failure_keeps_earlier_statements() {
    let fx = Fixture::new(Dialect::MySql);
    fx.write(
        "v1.00/01_schema.sql",
        &format!("CREATE TABLE a (x int);\nINSERT INTO a VALUES (1);\n{BROKEN};\nINSERT INTO a VALUES (2);\n"),
    );

    let err = fx.run().await.unwrap_err();
    assert!(matches!(
        err.cause(),
        Error::ScriptExecution { version, script, record_error: None, .. }
            if version == "v1.00" && script == "v1.00/01_schema.sql"
    ));

    let log = fx.log();
    assert!(!log.iter().any(|sql| sql == "BEGIN" || sql == "ROLLBACK"));
    assert!(log.contains(&"CREATE TABLE a (x int);".to_string()));
    assert!(log.contains(&"INSERT INTO a VALUES (1);".to_string()));
    assert!(!log.contains(&"INSERT INTO a VALUES (2);".to_string()));
    let recorded = log.last().unwrap();
    assert!(recorded.starts_with(&format!("INSERT INTO `{TABLE}`")));
    assert!(recorded.contains("'Failed'"));
    assert!(recorded.contains("'v1.00/01_schema.sql'"));
}

#[tokio::test]
async fn mysql_sends_stored_program_whole() {
    let fx = Fixture::new(Dialect::MySql);
    let procedure = "CREATE PROCEDURE seed()\nBEGIN\n  INSERT INTO a VALUES (1);\n  INSERT INTO a VALUES (2);\nEND;";
    fx.write("v1.00/01_proc.sql", &format!("{procedure}\nCALL seed();\n"));

    assert_eq!(fx.run().await.unwrap(), 1);
    let log = fx.log();
    assert!(log.contains(&procedure.to_string()));
    assert!(log.contains(&"CALL seed();".to_string()));
}

#[tokio::test]
async fn sqlserver_retry_updates_failed_row() {
    let fx = Fixture::new(Dialect::SqlServer);
    {
        let mut db = fx.db();
        db.configured = true;
        db.rows.push(failed_row("v1.00"));
    }
    fx.write(
        "v1.00/01_schema.sql",
        "CREATE TABLE a (x int)\nGO\nINSERT INTO a VALUES (1)\n",
    );

    assert_eq!(fx.run().await.unwrap(), 1);
    let log = fx.log();
    let begin = log.iter().position(|sql| sql == "BEGIN").unwrap();
    let update = log
        .iter()
        .position(|sql| sql.starts_with(&format!("UPDATE [dbo].[{TABLE}]")))
        .unwrap();
    let commit = log.iter().position(|sql| sql == "COMMIT").unwrap();
    assert!(begin < update && update < commit);
    assert!(log[update].contains("N'Successful'"));
    assert!(log[update].contains("AND status = N'Failed'"));
    assert!(!log.iter().any(|sql| sql.starts_with(&format!("INSERT INTO [dbo].[{TABLE}]"))));
}

#[tokio::test]
async fn stale_failed_row_is_a_conflict() {
    let fx = Fixture::new(Dialect::SqlServer);
    {
        let mut db = fx.db();
        db.configured = true;
        db.rows.push(failed_row("v1.00"));
        // Another writer already turned the row Successful.
        db.changed_rows = 0;
    }
    fx.write("v1.00/01_schema.sql", "CREATE TABLE a (x int)\n");

    let err = fx.run().await.unwrap_err();
    assert!(matches!(err.cause(), Error::VersionConflict { version, .. } if version == "v1.00"));
    let log = fx.log();
    assert_eq!(log.last().map(String::as_str), Some("ROLLBACK"));
    assert!(!log.contains(&"COMMIT".to_string()));
}

#[tokio::test]
async fn duplicate_insert_is_a_conflict() {
    let fx = Fixture::new(Dialect::MySql);
    fx.db().duplicate_on_insert = true;
    fx.write("v1.00/01_schema.sql", "CREATE TABLE a (x int);\n");

    let err = fx.run().await.unwrap_err();
    assert!(matches!(
        err.cause(),
        Error::VersionConflict { version, message } if version == "v1.00" && message.contains("duplicate")
    ));
}

#[tokio::test]
async fn unrecorded_failure_is_reported() {
    let fx = Fixture::new(Dialect::MySql);
    {
        let mut db = fx.db();
        db.configured = true;
        db.tracking_down = true;
    }
    fx.write("v1.00/01_schema.sql", &format!("{BROKEN};\n"));

    let err = fx.run().await.unwrap_err();
    match err.cause() {
        Error::ScriptExecution { record_error, .. } => {
            assert!(record_error.as_deref().is_some_and(|e| e.contains("lost connection")));
        }
        other => panic!("unexpected error {other:?}"),
    }
    assert!(err.to_string().contains("failure not recorded"));
}

#[tokio::test]
async fn tracking_table_is_checked_before_selecting_versions() {
    let fx = Fixture::new(Dialect::MySql);
    fx.write("v1.00/01_schema.sql", "CREATE TABLE a (x int);\n");

    assert_eq!(fx.run().await.unwrap(), 1);
    let checks = fx
        .log()
        .iter()
        .filter(|sql| sql.contains("INFORMATION_SCHEMA.TABLES"))
        .count();
    // Once to find the table missing, once after creating it.
    assert_eq!(checks, 2);
}
