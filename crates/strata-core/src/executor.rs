//! Provides [`Executor`], which represents one low-level database connection,
//! and [`Connector`], which opens them.
//!
//! The orchestrator owns transaction boundaries, so an executor exposes
//! `begin`/`commit`/`rollback` on its single connection instead of running a
//! closure in a transaction.
use crate::connection::ConnectionString;
use crate::tracking::VersionRecord;

use futures_core::Future;
use std::error::Error as StdError;

/// What a database client reports when a statement fails.
///
/// Dialects use this to turn an engine-native error into a normalized
/// diagnostic and to recognize uniqueness violations on the tracking table.
pub trait DriverError: StdError + Send + Sync + 'static {
    /// The engine error code (SQLSTATE, error number), present only when the
    /// error came from the database engine itself.
    fn code(&self) -> Option<String>;

    /// The engine's message without client-side decoration.
    fn message(&self) -> String {
        self.to_string()
    }

    /// Structured fields attached to the error, e.g. constraint or table.
    fn metadata(&self) -> Vec<(String, String)> {
        Vec::new()
    }

    /// The statement violated a unique constraint.
    fn is_unique_violation(&self) -> bool {
        false
    }
}

/// `Executor` is the query interface for migration operations on one open
/// connection.
pub trait Executor
where
    Self: Send + 'static,
{
    type Error: DriverError;

    /// Run SQL text, possibly several statements, discarding any rows.
    /// Returns the number of rows the statements changed.
    fn execute(&mut self, sql: &str) -> impl Future<Output = Result<u64, Self::Error>> + Send;

    /// Run a query and report whether it returned at least one row.
    fn exists(&mut self, sql: &str) -> impl Future<Output = Result<bool, Self::Error>> + Send;

    /// Run a query and return the first column of the first row as text.
    fn scalar(
        &mut self,
        sql: &str,
    ) -> impl Future<Output = Result<Option<String>, Self::Error>> + Send;

    /// Run a query selecting the tracking table columns.
    fn records(
        &mut self,
        sql: &str,
    ) -> impl Future<Output = Result<Vec<VersionRecord>, Self::Error>> + Send;

    /// Open a transaction on this connection.
    fn begin(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Commit the open transaction.
    fn commit(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Roll back the open transaction.
    fn rollback(&mut self) -> impl Future<Output = Result<(), Self::Error>> + Send;

    /// Close the connection.
    fn close(self) -> impl Future<Output = Result<(), Self::Error>> + Send
    where
        Self: Sized;
}

/// A type that can open an [`Executor`] from a connection string.
pub trait Connector
where
    Self: Send + Sync,
{
    type Exec: Executor;

    /// Connect to the database the connection string names.
    fn connect(
        &self,
        connection: &ConnectionString,
    ) -> impl Future<Output = Result<Self::Exec, <Self::Exec as Executor>::Error>> + Send;
}

#[cfg(feature = "sqlx")]
impl DriverError for sqlx::Error {
    fn code(&self) -> Option<String> {
        match self {
            sqlx::Error::Database(e) => e.code().map(|c| c.into_owned()),
            _ => None,
        }
    }

    fn message(&self) -> String {
        match self {
            sqlx::Error::Database(e) => e.message().to_string(),
            other => other.to_string(),
        }
    }

    fn metadata(&self) -> Vec<(String, String)> {
        let mut data = Vec::new();
        if let sqlx::Error::Database(e) = self {
            if let Some(constraint) = e.constraint() {
                data.push(("constraint".to_string(), constraint.to_string()));
            }
            if let Some(table) = e.table() {
                data.push(("table".to_string(), table.to_string()));
            }
        }
        data
    }

    fn is_unique_violation(&self) -> bool {
        match self {
            sqlx::Error::Database(e) => e.is_unique_violation(),
            _ => false,
        }
    }
}
