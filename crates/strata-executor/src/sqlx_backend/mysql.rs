use super::conn::{RowsAffected, SqlxConnector, SqlxExecutor};

use sqlx::mysql::MySqlQueryResult;
use sqlx::MySql;

/// Specialization of [`SqlxExecutor`] to a MySQL connection.
pub type SqlxMySqlExecutor = SqlxExecutor<MySql>;

/// Specialization of [`SqlxConnector`] to MySQL.
pub type SqlxMySqlConnector = SqlxConnector<MySql>;

impl RowsAffected for MySqlQueryResult {
    fn rows_affected(&self) -> u64 {
        MySqlQueryResult::rows_affected(self)
    }
}
