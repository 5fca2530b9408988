//! Implementations of [`Executor`] and [`Connector`] for database client
//! crates.
//!
//! Each backend is behind a feature: `sqlx_postgres`, `sqlx_mysql` and
//! `sqlx_sqlite`.  SQL Server has no built-in backend; a host that targets it
//! supplies its own [`Connector`].
//!
//! [`Executor`]: strata_core::executor::Executor
//! [`Connector`]: strata_core::executor::Connector
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(feature = "sqlx")]
#[cfg_attr(
    docsrs,
    doc(cfg(any(
        feature = "sqlx_mysql",
        feature = "sqlx_postgres",
        feature = "sqlx_sqlite"
    )))
)]
pub mod sqlx_backend;

#[cfg(feature = "sqlx_mysql")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlx_mysql")))]
pub use sqlx_backend::mysql::{SqlxMySqlConnector, SqlxMySqlExecutor};

#[cfg(feature = "sqlx_postgres")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlx_postgres")))]
pub use sqlx_backend::postgres::{SqlxPgConnector, SqlxPgExecutor};

#[cfg(feature = "sqlx_sqlite")]
#[cfg_attr(docsrs, doc(cfg(feature = "sqlx_sqlite")))]
pub use sqlx_backend::sqlite::{SqlxSqliteConnector, SqlxSqliteExecutor};
