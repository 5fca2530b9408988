use std::path::{Path, PathBuf};
use strata::executor::SqlxSqliteConnector;
use strata::{Dialect, Orchestrator, RunContext, RunResult, StrataResult, VersionRecord};
use tempfile::TempDir;

/// An initialized orchestrator over a fresh SQLite file and an empty
/// migration tree, both in a temporary directory.
pub struct TestRunner {
    dir: TempDir,
    app: Orchestrator<SqlxSqliteConnector>,
}

impl TestRunner {
    pub fn new() -> Self {
        let _ = env_logger::builder().is_test(true).try_init();
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("migrations")).unwrap();
        let mut app = Orchestrator::new(SqlxSqliteConnector::new(), Dialect::Sqlite);
        app.initialize(&database_url(dir.path())).unwrap();

        Self { dir, app }
    }

    pub fn app(&self) -> &Orchestrator<SqlxSqliteConnector> {
        &self.app
    }

    pub fn root(&self) -> PathBuf {
        self.dir.path().join("migrations")
    }

    pub fn url(&self) -> String {
        database_url(self.dir.path())
    }

    /// Write a file relative to the migration root.
    pub fn write(&self, rel: &str, contents: &str) -> &Self {
        let path = self.root().join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, contents).unwrap();
        self
    }

    /// The run context the tests start from: creates the database file on
    /// the first run.
    pub fn ctx() -> RunContext {
        RunContext::new().with_auto_create_database(true)
    }

    pub async fn run(&self, ctx: &RunContext) -> StrataResult<RunResult> {
        self.app.run(self.root(), ctx).await
    }

    pub async fn history(&self) -> Vec<VersionRecord> {
        self.app.get_all_versions().await.unwrap()
    }

    pub async fn current(&self) -> Option<String> {
        self.app.get_current_version().await.unwrap()
    }

    pub async fn check(&self) -> TestCheck {
        TestCheck::new(&self.url()).await
    }
}

fn database_url(dir: &Path) -> String {
    format!("sqlite://{}", dir.join("app.db").display())
}

/// Direct access to the database to check what a run left behind.
pub struct TestCheck(sqlx::SqlitePool);

impl TestCheck {
    pub async fn new(url: &str) -> Self {
        let pool = sqlx::SqlitePool::connect(url).await.unwrap();
        Self(pool)
    }

    pub async fn table_exists(&self, name: &str) -> bool {
        let count: i64 =
            sqlx::query_scalar("SELECT count(*) FROM sqlite_master WHERE type = 'table' AND name = ?;")
                .bind(name)
                .fetch_one(&self.0)
                .await
                .unwrap();

        count == 1
    }

    pub async fn strings(&self, sql: &str) -> Vec<String> {
        sqlx::query_scalar(sql).fetch_all(&self.0).await.unwrap()
    }

    pub async fn count(&self, table: &str) -> i64 {
        sqlx::query_scalar(&format!("SELECT count(*) FROM {table};"))
            .fetch_one(&self.0)
            .await
            .unwrap()
    }

    pub async fn execute(&self, sql: &str) {
        sqlx::raw_sql(sql).execute(&self.0).await.unwrap();
    }

    pub async fn close(self) {
        self.0.close().await;
    }
}
