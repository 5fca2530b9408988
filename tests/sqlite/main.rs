use strata::executor::{Connector, Executor, SqlxSqliteConnector};
use strata::types::{NewRecord, TrackingStore, names};
use strata::{
    CancellationToken, ConnectionString, Dialect, Error, Orchestrator, Tokens, Version,
    VersionStatus,
};

mod runner;
use runner::TestRunner;

fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

fn three_versions(runner: &TestRunner) {
    runner
        .write("v1.00/01_users.sql", "CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT);")
        .write("v1.01/01_orders.sql", "CREATE TABLE orders (id INTEGER PRIMARY KEY, user_id INTEGER);")
        .write(
            "v1.02/01_items.sql",
            "CREATE TABLE items (id INTEGER PRIMARY KEY);\nINSERT INTO items (id) VALUES (1);",
        );
}

#[tokio::test]
async fn applies_all_pending_versions() {
    let runner = TestRunner::new();
    three_versions(&runner);

    let result = runner.run(&TestRunner::ctx()).await.unwrap();
    assert_eq!(result.applied_versions(), vec!["v1.00", "v1.01", "v1.02"]);
    assert_eq!(result.initial_version(), None);
    assert!(!result.verify_only());
    assert_eq!(result.applied()[0].scripts(), ["v1.00/01_users.sql"]);

    let history = runner.history().await;
    assert_eq!(history.len(), 3);
    assert!(history.iter().all(|r| r.status == VersionStatus::Successful));
    assert!(history.iter().all(|r| r.applied_by_tool == strata::TOOL_NAME));
    assert!(history.iter().all(|r| r.failed_script_path.is_none()));
    assert_eq!(runner.current().await.as_deref(), Some("v1.02"));

    let check = runner.check().await;
    assert!(check.table_exists("users").await);
    assert!(check.table_exists("orders").await);
    assert_eq!(check.count("items").await, 1);
    check.close().await;
}

#[tokio::test]
async fn second_run_is_a_no_op() {
    let runner = TestRunner::new();
    three_versions(&runner);
    runner.run(&TestRunner::ctx()).await.unwrap();
    let before = runner.history().await;

    let result = runner.run(&TestRunner::ctx()).await.unwrap();
    assert!(result.is_empty());
    assert_eq!(result.initial_version(), Some("v1.02"));
    assert_eq!(runner.history().await, before);
}

#[tokio::test]
async fn applies_window_up_to_target() {
    let runner = TestRunner::new();
    runner
        .write("v1.00/a.sql", "CREATE TABLE a (id INTEGER);")
        .write("v1.01/b.sql", "CREATE TABLE b (id INTEGER);")
        .write("v2.00/c.sql", "CREATE TABLE c (id INTEGER);")
        .write("v2.01/d.sql", "CREATE TABLE d (id INTEGER);");

    let first = runner
        .run(&TestRunner::ctx().with_target_version(v("v1.00")))
        .await
        .unwrap();
    assert_eq!(first.applied_versions(), vec!["v1.00"]);

    let second = runner
        .run(&TestRunner::ctx().with_target_version(v("v2.00")))
        .await
        .unwrap();
    assert_eq!(second.initial_version(), Some("v1.00"));
    assert_eq!(second.applied_versions(), vec!["v1.01", "v2.00"]);
    assert_eq!(runner.current().await.as_deref(), Some("v2.00"));

    let check = runner.check().await;
    assert!(check.table_exists("c").await);
    assert!(!check.table_exists("d").await);
    check.close().await;
}

#[tokio::test]
async fn target_at_or_below_current_applies_nothing() {
    let runner = TestRunner::new();
    three_versions(&runner);
    runner.run(&TestRunner::ctx()).await.unwrap();

    let result = runner
        .run(&TestRunner::ctx().with_target_version(v("v1.00")))
        .await
        .unwrap();
    assert!(result.is_empty());
    assert_eq!(runner.history().await.len(), 3);
}

#[tokio::test]
async fn failed_version_is_recorded_and_retried() {
    let runner = TestRunner::new();
    runner
        .write("v1.00/a.sql", "CREATE TABLE a (id INTEGER);")
        .write("v1.01/b.sql", "CREATE TABLE b (id INTEGER);")
        .write("v1.02/01_ok.sql", "CREATE TABLE half_done (id INTEGER);")
        .write("v1.02/02_broken.sql", "CREATE TABLE broken (;");

    let err = runner.run(&TestRunner::ctx()).await.unwrap_err();
    match err.cause() {
        Error::ScriptExecution { version, script, .. } => {
            assert_eq!(version, "v1.02");
            assert_eq!(script, "v1.02/02_broken.sql");
        }
        other => panic!("unexpected error {other:?}"),
    }
    let partial = err.partial_report().unwrap();
    assert_eq!(partial.applied_versions(), vec!["v1.00", "v1.01"]);

    assert_eq!(runner.current().await.as_deref(), Some("v1.01"));
    let history = runner.history().await;
    let failed = history.iter().find(|r| r.version == "v1.02").unwrap();
    assert_eq!(failed.status, VersionStatus::Failed);
    assert_eq!(failed.failed_script_path.as_deref(), Some("v1.02/02_broken.sql"));
    assert!(failed.failed_script_error.as_deref().unwrap().contains("SQLITE"));

    // The version rolled back as a whole.
    let check = runner.check().await;
    assert!(!check.table_exists("half_done").await);
    check.close().await;

    runner.write("v1.02/02_broken.sql", "CREATE TABLE broken (id INTEGER);");
    let retry = runner.run(&TestRunner::ctx()).await.unwrap();
    assert_eq!(retry.applied_versions(), vec!["v1.02"]);

    let history = runner.history().await;
    let rows = history.iter().filter(|r| r.version == "v1.02").collect::<Vec<_>>();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].status, VersionStatus::Successful);
    assert_eq!(rows[0].failed_script_path, None);
    assert_eq!(runner.current().await.as_deref(), Some("v1.02"));
}

#[tokio::test]
async fn stale_failed_row_does_not_overwrite_success() {
    let runner = TestRunner::new();
    runner
        .write("v1.00/a.sql", "CREATE TABLE a (id INTEGER);")
        .write("v1.01/b.sql", "CREATE TABLE b (;");
    runner.run(&TestRunner::ctx()).await.unwrap_err();
    let stale = runner
        .history()
        .await
        .into_iter()
        .find(|r| r.version == "v1.01")
        .unwrap();
    assert_eq!(stale.status, VersionStatus::Failed);

    // Another run applies v1.01 after `stale` was read.
    let check = runner.check().await;
    check
        .execute(
            "UPDATE __strata_db_version SET status = 'Successful', failed_script_path = NULL, \
             failed_script_error = NULL WHERE version = 'v1.01';",
        )
        .await;
    check.close().await;

    let tokens = Tokens::new()
        .with(names::DB_NAME, "app")
        .with(names::SCHEMA_NAME, "main")
        .with(names::TABLE_NAME, "__strata_db_version");
    let store = TrackingStore::new(Dialect::Sqlite, tokens);
    let record = NewRecord {
        version: "v1.01".to_string(),
        status: VersionStatus::Failed,
        applied_by_user: "app".to_string(),
        applied_by_tool: "strata".to_string(),
        applied_by_tool_version: "0.3.0".to_string(),
        duration_ms: 5,
        failed_script_path: Some("v1.01/b.sql".to_string()),
        failed_script_error: Some("syntax error".to_string()),
        additional_artifacts: None,
    };
    let connection = ConnectionString::parse(&runner.url()).unwrap();
    let mut exec = SqlxSqliteConnector::new().connect(&connection).await.unwrap();
    let err = store.record(&mut exec, &record, Some(&stale)).await.unwrap_err();
    exec.close().await.unwrap();
    assert!(matches!(err, Error::VersionConflict { version, .. } if version == "v1.01"));

    assert_eq!(runner.current().await.as_deref(), Some("v1.01"));
    let history = runner.history().await;
    let row = history.iter().find(|r| r.version == "v1.01").unwrap();
    assert_eq!(row.status, VersionStatus::Successful);
    assert_eq!(row.failed_script_path, None);
}

#[tokio::test]
async fn verify_leaves_database_unchanged() {
    let runner = TestRunner::new();
    runner.write("v1.00/a.sql", "CREATE TABLE a (id INTEGER);");
    runner.run(&TestRunner::ctx()).await.unwrap();
    runner
        .write("v1.01/b.sql", "CREATE TABLE b (id INTEGER);")
        .write("v1.02/c.sql", "CREATE TABLE c (id INTEGER);");

    let result = runner
        .run(&TestRunner::ctx().with_verify_only(true))
        .await
        .unwrap();
    assert!(result.verify_only());
    assert_eq!(result.applied_versions(), vec!["v1.01", "v1.02"]);
    assert!(result.applied().iter().all(|r| r.is_verified()));

    assert_eq!(runner.current().await.as_deref(), Some("v1.00"));
    assert_eq!(runner.history().await.len(), 1);
    let check = runner.check().await;
    assert!(!check.table_exists("b").await);
    assert!(!check.table_exists("c").await);
    check.close().await;
}

#[tokio::test]
async fn failed_verify_records_nothing() {
    let runner = TestRunner::new();
    runner.write("v1.00/a.sql", "CREATE TABLE a (id INTEGER);");
    runner.run(&TestRunner::ctx()).await.unwrap();
    runner
        .write("v1.01/b.sql", "CREATE TABLE b (id INTEGER);")
        .write("v1.02/c.sql", "CREATE TABLE c (;");

    let err = runner
        .run(&TestRunner::ctx().with_verify_only(true))
        .await
        .unwrap_err();
    assert!(matches!(err.cause(), Error::ScriptExecution { version, .. } if version == "v1.02"));

    let history = runner.history().await;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].version, "v1.00");
    let check = runner.check().await;
    assert!(!check.table_exists("b").await);
    check.close().await;
}

#[tokio::test]
async fn verify_is_refused_without_transactional_ddl() {
    let mut app = Orchestrator::new(SqlxSqliteConnector::new(), Dialect::MySql);
    app.initialize("mysql://app@localhost:3306/shop").unwrap();
    let dir = tempfile::tempdir().unwrap();

    let ctx = strata::RunContext::new().with_verify_only(true);
    let err = app.run(dir.path(), &ctx).await.unwrap_err();
    assert!(matches!(err, Error::UnsupportedOperation(_)));
}

#[tokio::test]
async fn substitutes_tokens() {
    let runner = TestRunner::new();
    runner.write(
        "v1.00/01_notes.sql",
        "CREATE TABLE ${PREFIX}_notes (body TEXT);
INSERT INTO ${PREFIX}_notes (body) VALUES ('${STRATA_TABLE_NAME}');
INSERT INTO ${PREFIX}_notes (body) VALUES ('${STRATA_VERSION}');
INSERT INTO ${PREFIX}_notes (body) VALUES ('${STRATA_DB_NAME}');",
    );

    let ctx = TestRunner::ctx()
        .with_token("PREFIX", "app")
        .with_token("STRATA_TABLE_NAME", "hijack");
    runner.run(&ctx).await.unwrap();

    let check = runner.check().await;
    let bodies = check.strings("SELECT body FROM app_notes ORDER BY rowid;").await;
    assert_eq!(bodies, vec!["__strata_db_version", "v1.00", "app"]);
    check.close().await;
}

#[tokio::test]
async fn unresolved_token_runs_nothing() {
    let runner = TestRunner::new();
    runner
        .write("v1.00/a.sql", "CREATE TABLE a (id INTEGER);")
        .write("v1.01/01_ok.sql", "CREATE TABLE b (id INTEGER);")
        .write("v1.01/02_tokens.sql", "CREATE TABLE ${MISSING} (id INTEGER);");

    let err = runner.run(&TestRunner::ctx()).await.unwrap_err();
    match err.cause() {
        Error::UnresolvedToken { keys, script } => {
            assert_eq!(keys, &["MISSING"]);
            assert_eq!(script.as_deref(), Some("v1.01/02_tokens.sql"));
        }
        other => panic!("unexpected error {other:?}"),
    }

    let history = runner.history().await;
    assert_eq!(history.len(), 1);
    let check = runner.check().await;
    assert!(!check.table_exists("b").await);
    check.close().await;
}

#[tokio::test]
async fn lists_versions_in_version_order() {
    let runner = TestRunner::new();
    runner
        .write("v1.00/a.sql", "CREATE TABLE a (id INTEGER);")
        .write("v1.01/b.sql", "CREATE TABLE b (id INTEGER);");
    runner.run(&TestRunner::ctx()).await.unwrap();

    // Reorder the rows so that insertion order no longer matches.
    let check = runner.check().await;
    check
        .execute("UPDATE __strata_db_version SET sequence_id = 99 WHERE version = 'v1.00';")
        .await;
    check.close().await;

    let versions = runner
        .history()
        .await
        .into_iter()
        .map(|r| r.version)
        .collect::<Vec<_>>();
    assert_eq!(versions, vec!["v1.00", "v1.01"]);
}

#[tokio::test]
async fn already_applied_pending_version_conflicts() {
    let runner = TestRunner::new();
    runner
        .write("v1.00/a.sql", "CREATE TABLE a (id INTEGER);")
        .write("v1.01/b.sql", "CREATE TABLE b (id INTEGER);");
    runner.run(&TestRunner::ctx()).await.unwrap();

    // v1.00 becomes the latest successful row, so v1.01 looks pending again.
    let check = runner.check().await;
    check
        .execute("UPDATE __strata_db_version SET sequence_id = 99 WHERE version = 'v1.00';")
        .await;
    check.close().await;
    assert_eq!(runner.current().await.as_deref(), Some("v1.00"));

    let err = runner.run(&TestRunner::ctx()).await.unwrap_err();
    assert!(matches!(err.cause(), Error::VersionConflict { version, .. } if version == "v1.01"));
    assert_eq!(runner.history().await.len(), 2);
}

#[tokio::test]
async fn cancelled_run_stops_before_next_version() {
    let runner = TestRunner::new();
    three_versions(&runner);
    let token = CancellationToken::new();
    token.cancel();

    let err = runner
        .run(&TestRunner::ctx().with_cancellation(token))
        .await
        .unwrap_err();
    assert!(matches!(err.cause(), Error::Cancelled(version) if version == "v1.00"));
    assert!(runner.history().await.is_empty());
}

#[tokio::test]
async fn imports_csv_files() {
    let runner = TestRunner::new();
    runner
        .write(
            "v1.00/01_colors.sql",
            "CREATE TABLE colors (id INTEGER PRIMARY KEY, name TEXT NOT NULL, hex TEXT);",
        )
        .write("v1.00/colors.csv", "id,name,hex\n1,red,#f00\n2,o'brien,\n");

    let result = runner.run(&TestRunner::ctx()).await.unwrap();
    assert_eq!(
        result.applied()[0].scripts(),
        ["v1.00/01_colors.sql", "v1.00/colors.csv"]
    );

    let check = runner.check().await;
    assert_eq!(check.count("colors").await, 2);
    let names = check.strings("SELECT name FROM colors ORDER BY id;").await;
    assert_eq!(names, vec!["red", "o'brien"]);
    assert_eq!(check.count("colors WHERE hex IS NULL").await, 1);
    check.close().await;
}

#[tokio::test]
async fn runs_special_folders() {
    let runner = TestRunner::new();
    runner
        .write("_init/01_audit.sql", "CREATE TABLE audit (note TEXT);")
        .write("_pre/01.sql", "INSERT INTO audit (note) VALUES ('pre');")
        .write("_post/01.sql", "INSERT INTO audit (note) VALUES ('post');")
        .write("_draft/01.sql", "INSERT INTO audit (note) VALUES ('draft');")
        .write("v1.00/a.sql", "INSERT INTO audit (note) VALUES ('v1.00');");

    runner.run(&TestRunner::ctx()).await.unwrap();
    let check = runner.check().await;
    let notes = check.strings("SELECT note FROM audit ORDER BY rowid;").await;
    assert_eq!(notes, vec!["pre", "v1.00", "post"]);
    check.close().await;

    // Nothing pending: no `_pre` or `_post`.
    runner.run(&TestRunner::ctx().with_drafts(true)).await.unwrap();
    let check = runner.check().await;
    assert_eq!(check.count("audit").await, 3);
    check.close().await;

    runner.write("v1.01/b.sql", "INSERT INTO audit (note) VALUES ('v1.01');");
    runner.run(&TestRunner::ctx().with_drafts(true)).await.unwrap();
    let check = runner.check().await;
    let notes = check.strings("SELECT note FROM audit ORDER BY rowid;").await;
    assert_eq!(
        notes,
        vec!["pre", "v1.00", "post", "pre", "v1.01", "post", "draft"]
    );
    check.close().await;
}

#[tokio::test]
async fn erases_in_descending_order() {
    let runner = TestRunner::new();
    runner
        .write("v1.00/a.sql", "CREATE TABLE a (id INTEGER);")
        .write("v1.00/_erase/drop.sql", "DROP TABLE a;")
        .write("v1.01/b.sql", "CREATE TABLE b (id INTEGER, a_id INTEGER);")
        .write("v1.01/_erase/drop.sql", "DROP TABLE b;")
        .write("_erase/cleanup.sql", "DROP TABLE IF EXISTS ${LEFTOVER};");
    runner.run(&TestRunner::ctx()).await.unwrap();

    let tokens = Tokens::new().with("LEFTOVER", "scratch");
    let scripts = runner.app().erase(runner.root(), &tokens).await.unwrap();
    assert_eq!(
        scripts,
        vec!["v1.01/_erase/drop.sql", "v1.00/_erase/drop.sql", "_erase/cleanup.sql"]
    );

    let check = runner.check().await;
    assert!(!check.table_exists("a").await);
    assert!(!check.table_exists("b").await);
    assert!(check.table_exists("__strata_db_version").await);
    check.close().await;
    assert_eq!(runner.history().await.len(), 2);
}

#[tokio::test]
async fn operations_require_initialize_once() {
    let app = Orchestrator::new(SqlxSqliteConnector::new(), Dialect::Sqlite);
    let dir = tempfile::tempdir().unwrap();

    let err = app.run(dir.path(), &strata::RunContext::new()).await.unwrap_err();
    assert!(matches!(err, Error::InvalidState(_)));
    assert!(matches!(app.get_all_versions().await, Err(Error::InvalidState(_))));
    assert!(matches!(app.baseline().await, Err(Error::InvalidState(_))));

    let mut app = app;
    app.initialize("sqlite://app.db").unwrap();
    assert!(matches!(
        app.initialize("sqlite://other.db"),
        Err(Error::InvalidState(_))
    ));
}

#[tokio::test]
async fn baseline_and_rebase_are_not_implemented() {
    let runner = TestRunner::new();
    assert!(matches!(
        runner.app().baseline().await,
        Err(Error::NotImplemented("baseline"))
    ));
    assert!(matches!(
        runner.app().rebase().await,
        Err(Error::NotImplemented("rebase"))
    ));
}

#[tokio::test]
async fn empty_tracking_table_reads_as_no_history() {
    let runner = TestRunner::new();
    runner.write("v1.00/a.sql", "CREATE TABLE a (id INTEGER);");
    // Below the first version: the table is created but nothing is applied.
    runner
        .run(&TestRunner::ctx().with_target_version(v("v0.01")))
        .await
        .unwrap();

    assert!(runner.history().await.is_empty());
    assert_eq!(runner.current().await, None);
}
