//! The closed set of database engines a run can target.
//!
//! A [`Dialect`] is selected once per run from a platform identifier and
//! carries everything engine-specific the orchestrator needs: capability
//! flags in a [`Descriptor`], the tracking-table SQL in a [`TemplateSet`],
//! how to derive the administrative connection, how to break a script into
//! executable units, and how to read an engine error.
use crate::connection::ConnectionString;
use crate::error::{DatabaseError as _, Error, StrataResult};
use crate::executor::{DriverError, Executor};
use crate::token::{Tokens, substitute};

use serde::Serialize;
use std::str::FromStr;

mod mysql;
mod postgres;
mod split;
mod sqlite;
mod sqlserver;

/// Name of the tracking table unless overridden.
pub const DEFAULT_TRACKING_TABLE: &str = "__strata_db_version";

/// Capability profile of a database engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Descriptor {
    /// DDL can be rolled back with the enclosing transaction.
    pub supports_transactional_ddl: bool,
    /// Objects can be placed in a named schema.
    pub supports_schemas: bool,
    /// A multi-statement script can be sent as one batch.
    pub supports_batch_statements: bool,
    /// The engine has an insert-or-update statement for the tracking table.
    pub supports_upsert: bool,
    pub tracking_table_name: &'static str,
    /// Default schema of the tracking table, `None` where schemas are not
    /// supported.
    pub tracking_schema_name: Option<&'static str>,
}

/// Operations on the tracking table lifecycle that have a SQL template.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum TemplateOp {
    CheckDbExists,
    CreateDb,
    CreateSchema,
    CheckConfigured,
    Configure,
    GetCurrentVersion,
    GetAllVersions,
    InsertVersion,
    UpdateVersion,
    UpsertVersion,
}

impl TemplateOp {
    pub const ALL: [TemplateOp; 10] = [
        Self::CheckDbExists,
        Self::CreateDb,
        Self::CreateSchema,
        Self::CheckConfigured,
        Self::Configure,
        Self::GetCurrentVersion,
        Self::GetAllVersions,
        Self::InsertVersion,
        Self::UpdateVersion,
        Self::UpsertVersion,
    ];
}

impl std::fmt::Display for TemplateOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Self::CheckDbExists => "check-db-exists",
            Self::CreateDb => "create-db",
            Self::CreateSchema => "create-schema",
            Self::CheckConfigured => "check-configured",
            Self::Configure => "configure",
            Self::GetCurrentVersion => "get-current-version",
            Self::GetAllVersions => "get-all-versions",
            Self::InsertVersion => "insert-version",
            Self::UpdateVersion => "update-version",
            Self::UpsertVersion => "upsert-version",
        };
        f.write_str(name)
    }
}

/// SQL text with `${STRATA_*}` placeholders for each [`TemplateOp`].
#[derive(Debug, Clone, Copy)]
pub struct TemplateSet {
    pub(crate) check_db_exists: &'static str,
    pub(crate) create_db: &'static str,
    pub(crate) create_schema: Option<&'static str>,
    pub(crate) check_configured: &'static str,
    pub(crate) configure: &'static str,
    pub(crate) get_current_version: &'static str,
    pub(crate) get_all_versions: &'static str,
    pub(crate) insert_version: &'static str,
    pub(crate) update_version: &'static str,
    pub(crate) upsert_version: Option<&'static str>,
}

impl TemplateSet {
    pub fn get(&self, op: TemplateOp) -> Option<&'static str> {
        match op {
            TemplateOp::CheckDbExists => Some(self.check_db_exists),
            TemplateOp::CreateDb => Some(self.create_db),
            TemplateOp::CreateSchema => self.create_schema,
            TemplateOp::CheckConfigured => Some(self.check_configured),
            TemplateOp::Configure => Some(self.configure),
            TemplateOp::GetCurrentVersion => Some(self.get_current_version),
            TemplateOp::GetAllVersions => Some(self.get_all_versions),
            TemplateOp::InsertVersion => Some(self.insert_version),
            TemplateOp::UpdateVersion => Some(self.update_version),
            TemplateOp::UpsertVersion => self.upsert_version,
        }
    }
}

/// A supported database engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Dialect {
    PostgreSql,
    SqlServer,
    MySql,
    Sqlite,
}

impl Dialect {
    pub const ALL: [Dialect; 4] = [Self::PostgreSql, Self::SqlServer, Self::MySql, Self::Sqlite];

    /// Look up the dialect registered for a platform identifier.
    pub fn from_platform(platform: &str) -> StrataResult<Self> {
        match platform.trim().to_ascii_lowercase().as_str() {
            "postgresql" | "postgres" | "pg" => Ok(Self::PostgreSql),
            "sqlserver" | "mssql" => Ok(Self::SqlServer),
            "mysql" | "mariadb" => Ok(Self::MySql),
            "sqlite" => Ok(Self::Sqlite),
            _ => Err(Error::UnsupportedPlatform(platform.to_string())),
        }
    }

    /// The canonical platform identifier.
    pub fn platform(&self) -> &'static str {
        match self {
            Self::PostgreSql => "postgresql",
            Self::SqlServer => "sqlserver",
            Self::MySql => "mysql",
            Self::Sqlite => "sqlite",
        }
    }

    pub fn descriptor(&self) -> &'static Descriptor {
        match self {
            Self::PostgreSql => &postgres::DESCRIPTOR,
            Self::SqlServer => &sqlserver::DESCRIPTOR,
            Self::MySql => &mysql::DESCRIPTOR,
            Self::Sqlite => &sqlite::DESCRIPTOR,
        }
    }

    pub fn templates(&self) -> &'static TemplateSet {
        match self {
            Self::PostgreSql => &postgres::TEMPLATES,
            Self::SqlServer => &sqlserver::TEMPLATES,
            Self::MySql => &mysql::TEMPLATES,
            Self::Sqlite => &sqlite::TEMPLATES,
        }
    }

    /// The template for `op`, or an error if this dialect has none.
    pub fn template(&self, op: TemplateOp) -> StrataResult<&'static str> {
        self.templates().get(op).ok_or_else(|| {
            Error::UnsupportedOperation(format!("{op} is not supported by {}", self.platform()))
        })
    }

    /// Connection string for the target database.
    pub fn connection_string(&self, connection: &ConnectionString) -> ConnectionString {
        connection.clone()
    }

    /// Connection string for the database used to check for and create the
    /// target database.
    pub fn admin_connection_string(&self, connection: &ConnectionString) -> ConnectionString {
        match self {
            Self::PostgreSql => connection.with_database(Some("postgres")),
            Self::SqlServer => connection.with_database(Some("master")),
            Self::MySql => connection.with_database(None),
            Self::Sqlite => connection.with_param("mode", "rwc"),
        }
    }

    /// Name of the target database, the value of `${STRATA_DB_NAME}`.
    pub fn database_name(&self, connection: &ConnectionString) -> StrataResult<String> {
        let name = match self {
            Self::Sqlite => connection.sqlite_path().map(|path| {
                std::path::Path::new(&path)
                    .file_stem()
                    .map(|stem| stem.to_string_lossy().into_owned())
                    .unwrap_or(path)
            }),
            _ => connection.database(),
        };
        name.ok_or_else(|| {
            Error::InvalidConnectionString(format!(
                "{} does not name a database",
                connection.redacted()
            ))
        })
    }

    /// Break a script into units that can each be executed on their own.
    ///
    /// Dialects with batch support return the script unchanged as a single
    /// unit.  SQL Server splits on lines consisting only of `GO`; MySQL splits
    /// on statement delimiters, keeping stored program bodies whole.
    pub fn break_statements(&self, raw: &str) -> StrataResult<Vec<String>> {
        if self.descriptor().supports_batch_statements {
            if raw.trim().is_empty() {
                return Ok(Vec::new());
            }
            return Ok(vec![raw.to_string()]);
        }
        match self {
            Self::SqlServer => Ok(split::split_on_go(raw)),
            _ => Ok(split::split_on_terminator(raw)),
        }
    }

    /// Translate an engine error into a normalized diagnostic.
    ///
    /// Returns `None` for errors that did not come from the engine (no error
    /// code), in which case the caller falls back to the error's own message.
    pub fn try_parse_error(&self, err: &dyn DriverError) -> Option<String> {
        let code = err.code()?;
        let label = match self {
            Self::PostgreSql => "SQLSTATE",
            Self::SqlServer => "Msg",
            Self::MySql => "Error",
            Self::Sqlite => "SQLITE",
        };
        let metadata = err.metadata();
        let mut out = format!("({label} {code}) Error {}.", err.message().trim_end_matches('.'));
        if !metadata.is_empty() {
            let data = metadata
                .iter()
                .map(|(k, v)| format!("{k}: {v}"))
                .collect::<Vec<_>>()
                .join(", ");
            out.push_str(&format!(" Exception data: {data}"));
        }

        Some(out)
    }

    /// The error is a uniqueness violation, which on the tracking table means
    /// another writer recorded the version first.
    pub fn is_version_conflict(&self, err: &dyn DriverError) -> bool {
        err.is_unique_violation()
    }

    /// Quote an identifier for this engine.
    pub fn quote_identifier(&self, ident: &str) -> String {
        match self {
            Self::SqlServer => format!("[{}]", ident.replace(']', "]]")),
            Self::MySql => format!("`{}`", ident.replace('`', "``")),
            Self::PostgreSql | Self::Sqlite => format!("\"{}\"", ident.replace('"', "\"\"")),
        }
    }

    /// Bring an existing tracking table up to the current structure.
    ///
    /// Invoked once per run before any version is processed.  Returns whether
    /// a structural change was made.  The table layout has not changed since
    /// it was introduced, so this only confirms the table is present.
    pub async fn update_tracking_table_schema<E: Executor>(
        &self,
        executor: &mut E,
        tokens: &Tokens,
    ) -> StrataResult<bool> {
        let table = tokens.get(crate::token::names::TABLE_NAME).unwrap_or_default();
        let sql = substitute(self.template(TemplateOp::CheckConfigured)?, tokens)?;
        if !executor.exists(&sql).await.tracking_result()? {
            return Err(Error::TrackingTable(
                format!("tracking table {table} is missing").into(),
            ));
        }
        log::debug!(target: "strata", "tracking table {table} is current for {}", self.platform());

        Ok(false)
    }
}

impl FromStr for Dialect {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_platform(s)
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.platform())
    }
}
