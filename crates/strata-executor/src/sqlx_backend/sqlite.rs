use super::conn::{RowsAffected, SqlxConnector, SqlxExecutor};

use sqlx::sqlite::SqliteQueryResult;
use sqlx::Sqlite;

/// Specialization of [`SqlxExecutor`] to a SQLite connection.
pub type SqlxSqliteExecutor = SqlxExecutor<Sqlite>;

/// Specialization of [`SqlxConnector`] to SQLite.
pub type SqlxSqliteConnector = SqlxConnector<Sqlite>;

impl RowsAffected for SqliteQueryResult {
    fn rows_affected(&self) -> u64 {
        SqliteQueryResult::rows_affected(self)
    }
}
