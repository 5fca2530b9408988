//! Versioned SQL script migrations for PostgreSQL, SQL Server, MySQL and
//! SQLite.
//!
//! A migration tree is a folder of version folders (`v1.00`, `v1.01`, ...)
//! holding `.sql` scripts and `.csv` bulk files.  The [`Orchestrator`] applies
//! every version newer than the one recorded in the database's tracking table,
//! up to a target version, one transaction per version where the engine
//! allows it, and records each outcome.
//!
//! ```no_run
//! # #[cfg(feature = "sqlx_sqlite")]
//! # async fn migrate() -> strata::StrataResult<()> {
//! use strata::{Dialect, Orchestrator, RunContext};
//! use strata::executor::SqlxSqliteConnector;
//!
//! let mut app = Orchestrator::new(SqlxSqliteConnector::new(), Dialect::Sqlite);
//! app.initialize("sqlite://app.db")?;
//!
//! let ctx = RunContext::new().with_token("OWNER", "app");
//! let result = app.run("db/migrations", &ctx).await?;
//! println!("{result}");
//! # Ok(())
//! # }
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]

mod app;
pub use app::{Orchestrator, RunContext, TOOL_NAME};

#[cfg(feature = "cli")]
#[cfg_attr(docsrs, doc(cfg(feature = "cli")))]
pub use app::{CliReport, run_cli, run_cli_with};

pub use strata_core::connection::ConnectionString;
pub use strata_core::dialect::{Descriptor, Dialect, TemplateOp};
pub use strata_core::error::{Error, StrataResult};
pub use strata_core::report::{RunResult, VersionReport};
pub use strata_core::token::Tokens;
pub use strata_core::tracking::{VersionRecord, VersionStatus};
pub use strata_core::version::Version;

pub use tokio_util::sync::CancellationToken;

pub mod types {
    pub use strata_core::bulk::BulkTarget;
    pub use strata_core::source::{MigrationSource, ScriptUnit, UnitKind, VersionDir, special};
    pub use strata_core::token::{names, substitute};
    pub use strata_core::tracking::{NewRecord, TrackingStore};
}

pub mod executor {
    pub use strata_core::executor::{Connector, DriverError, Executor};
    pub use strata_executor::*;
}

#[cfg(feature = "cli")]
#[cfg_attr(docsrs, doc(cfg(feature = "cli")))]
pub use strata_cli as cli;
