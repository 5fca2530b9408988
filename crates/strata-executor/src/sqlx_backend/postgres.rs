use super::conn::{RowsAffected, SqlxConnector, SqlxExecutor};

use sqlx::postgres::PgQueryResult;
use sqlx::Postgres;

/// Specialization of [`SqlxExecutor`] to a PostgreSQL connection.
pub type SqlxPgExecutor = SqlxExecutor<Postgres>;

/// Specialization of [`SqlxConnector`] to PostgreSQL.
pub type SqlxPgConnector = SqlxConnector<Postgres>;

impl RowsAffected for PgQueryResult {
    fn rows_affected(&self) -> u64 {
        PgQueryResult::rows_affected(self)
    }
}
