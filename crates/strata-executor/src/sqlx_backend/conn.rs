//! [`Executor`] for a single generic `sqlx` connection, and the
//! [`Connector`] that opens one.
//!
//! [`Executor`]: strata_core::executor::Executor
//! [`Connector`]: strata_core::executor::Connector
use strata_core::connection::ConnectionString;
use strata_core::executor::{Connector, Executor as MigrationExecutor};
use strata_core::tracking::VersionRecord;

use sqlx::{Connection, Database, Executor as _, FromRow, IntoArguments};
use std::marker::PhantomData;

/// The row count of a `sqlx` query result, which each database reports
/// through its own result type.
pub trait RowsAffected {
    fn rows_affected(&self) -> u64;
}

/// One `sqlx` connection as a migration executor backend.
///
/// Transactions are opened with plain `BEGIN`/`COMMIT`/`ROLLBACK` on the
/// connection because the orchestrator, not a closure, decides where a
/// transaction ends.
pub struct SqlxExecutor<Db: Database> {
    conn: Db::Connection,
}

impl<Db: Database> SqlxExecutor<Db> {
    /// Connect with default options from a connection string.
    pub async fn new(db_url: &str) -> Result<Self, sqlx::Error> {
        let conn = <Db::Connection as Connection>::connect(db_url).await?;
        Ok(Self { conn })
    }

    /// Connect with the given options.
    pub async fn new_with(
        opts: &<Db::Connection as Connection>::Options,
    ) -> Result<Self, sqlx::Error> {
        let conn = <Db::Connection as Connection>::connect_with(opts).await?;
        Ok(Self { conn })
    }

    /// Obtain a mutable reference to the underlying connection.
    pub fn conn_mut(&mut self) -> &mut Db::Connection {
        &mut self.conn
    }
}

/// `SqlxExecutor` can be an [`Executor`] fairly straightforwardly when enough
/// bounds involving `Db: sqlx::Database` are added to make it compile.
///
/// [`Executor`]: strata_core::executor::Executor
impl<Db> MigrationExecutor for SqlxExecutor<Db>
where
    Db: Database,
    for<'c> &'c mut Db::Connection: sqlx::Executor<'c, Database = Db>,
    for<'q> Db::Arguments<'q>: IntoArguments<'q, Db>,
    for<'r> VersionRecord: FromRow<'r, Db::Row>,
    for<'r> (String,): FromRow<'r, Db::Row>,
    Db::QueryResult: RowsAffected,
{
    type Error = sqlx::Error;

    async fn execute(&mut self, sql: &str) -> Result<u64, sqlx::Error> {
        log::trace!(target: "strata", "execute: {sql}");
        let result = (&mut self.conn).execute(sqlx::raw_sql(sql)).await?;
        Ok(RowsAffected::rows_affected(&result))
    }

    async fn exists(&mut self, sql: &str) -> Result<bool, sqlx::Error> {
        let row = (&mut self.conn).fetch_optional(sqlx::raw_sql(sql)).await?;
        Ok(row.is_some())
    }

    async fn scalar(&mut self, sql: &str) -> Result<Option<String>, sqlx::Error> {
        sqlx::query_scalar::<Db, String>(sql)
            .fetch_optional(&mut self.conn)
            .await
    }

    async fn records(&mut self, sql: &str) -> Result<Vec<VersionRecord>, sqlx::Error> {
        sqlx::query_as::<Db, VersionRecord>(sql)
            .fetch_all(&mut self.conn)
            .await
    }

    async fn begin(&mut self) -> Result<(), sqlx::Error> {
        self.execute("BEGIN").await?;
        Ok(())
    }

    async fn commit(&mut self) -> Result<(), sqlx::Error> {
        self.execute("COMMIT").await?;
        Ok(())
    }

    async fn rollback(&mut self) -> Result<(), sqlx::Error> {
        self.execute("ROLLBACK").await?;
        Ok(())
    }

    async fn close(self) -> Result<(), sqlx::Error> {
        self.conn.close().await
    }
}

/// Opens a [`SqlxExecutor`] for the database type `Db`.
pub struct SqlxConnector<Db: Database>(PhantomData<fn() -> Db>);

impl<Db: Database> SqlxConnector<Db> {
    pub fn new() -> Self {
        Self(PhantomData)
    }
}

impl<Db: Database> Default for SqlxConnector<Db> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Db: Database> Clone for SqlxConnector<Db> {
    fn clone(&self) -> Self {
        Self::new()
    }
}

impl<Db: Database> std::fmt::Debug for SqlxConnector<Db> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("SqlxConnector").field(&Db::NAME).finish()
    }
}

impl<Db> Connector for SqlxConnector<Db>
where
    Db: Database,
    SqlxExecutor<Db>: MigrationExecutor<Error = sqlx::Error>,
{
    type Exec = SqlxExecutor<Db>;

    async fn connect(&self, connection: &ConnectionString) -> Result<SqlxExecutor<Db>, sqlx::Error> {
        log::debug!(target: "strata", "connecting to {}", connection.redacted());
        SqlxExecutor::new(&connection.to_string()).await
    }
}
