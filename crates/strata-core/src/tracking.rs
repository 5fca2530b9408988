//! The version tracking table.
//!
//! [`TrackingStore`] renders a dialect's templates with the run's system
//! tokens and runs them through an [`Executor`].  It holds no connection of
//! its own, so the same store is used on the administrative connection, the
//! target connection, and inside or outside a transaction.
use crate::dialect::{Dialect, TemplateOp};
use crate::error::{DatabaseError, Error, StrataResult};
use crate::executor::Executor;
use crate::token::{Tokens, names, sql_literal, substitute};
use crate::version::Version;

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::cmp::Ordering;

/// Longest failure message stored in `failed_script_error`.
pub const MAX_ERROR_LEN: usize = 4000;

/// Outcome stored in the `status` column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum VersionStatus {
    Successful,
    Failed,
}

impl VersionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Successful => "Successful",
            Self::Failed => "Failed",
        }
    }
}

impl std::fmt::Display for VersionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, thiserror::Error)]
#[error("unknown version status {0}")]
pub struct UnknownStatus(String);

impl TryFrom<String> for VersionStatus {
    type Error = UnknownStatus;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        match value.as_str() {
            "Successful" => Ok(Self::Successful),
            "Failed" => Ok(Self::Failed),
            _ => Err(UnknownStatus(value)),
        }
    }
}

#[cfg(feature = "sqlx")]
impl<DB: sqlx::Database> sqlx::Type<DB> for VersionStatus
where
    String: sqlx::Type<DB>,
{
    fn type_info() -> DB::TypeInfo {
        <String as sqlx::Type<DB>>::type_info()
    }

    fn compatible(ty: &DB::TypeInfo) -> bool {
        <String as sqlx::Type<DB>>::compatible(ty)
    }
}

#[cfg(feature = "sqlx")]
impl<'r, DB: sqlx::Database> sqlx::Decode<'r, DB> for VersionStatus
where
    String: sqlx::Decode<'r, DB>,
{
    fn decode(value: DB::ValueRef<'r>) -> Result<Self, sqlx::error::BoxDynError> {
        let status = <String as sqlx::Decode<'r, DB>>::decode(value)?;
        Ok(Self::try_from(status)?)
    }
}

/// One row of the tracking table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
pub struct VersionRecord {
    pub sequence_id: i64,
    pub version: String,
    pub applied_on_utc: DateTime<Utc>,
    pub applied_by_user: String,
    pub applied_by_tool: String,
    pub applied_by_tool_version: String,
    pub status: VersionStatus,
    pub duration_ms: i64,
    pub failed_script_path: Option<String>,
    pub failed_script_error: Option<String>,
    pub additional_artifacts: Option<String>,
}

impl VersionRecord {
    pub fn is_successful(&self) -> bool {
        self.status == VersionStatus::Successful
    }

    pub fn parsed_version(&self) -> StrataResult<Version> {
        Version::parse(&self.version)
    }

    fn normalized(mut self) -> Self {
        self.failed_script_path = self.failed_script_path.filter(|s| !s.is_empty());
        self.failed_script_error = self.failed_script_error.filter(|s| !s.is_empty());
        self.additional_artifacts = self.additional_artifacts.filter(|s| !s.is_empty());
        self
    }
}

/// The values written when a version finishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewRecord {
    pub version: String,
    pub status: VersionStatus,
    pub applied_by_user: String,
    pub applied_by_tool: String,
    pub applied_by_tool_version: String,
    pub duration_ms: i64,
    pub failed_script_path: Option<String>,
    pub failed_script_error: Option<String>,
    pub additional_artifacts: Option<String>,
}

impl NewRecord {
    fn tokens(&self) -> Tokens {
        let error = self
            .failed_script_error
            .as_deref()
            .map(|e| truncate(e, MAX_ERROR_LEN))
            .unwrap_or_default();
        Tokens::new()
            .with(names::VERSION, sql_literal(&self.version))
            .with(names::STATUS, self.status.as_str())
            .with(names::APPLIED_BY_USER, sql_literal(&self.applied_by_user))
            .with(names::APPLIED_BY_TOOL, sql_literal(&self.applied_by_tool))
            .with(
                names::APPLIED_BY_TOOL_VERSION,
                sql_literal(&self.applied_by_tool_version),
            )
            .with(names::DURATION_MS, self.duration_ms.to_string())
            .with(
                names::FAILED_SCRIPT_PATH,
                sql_literal(self.failed_script_path.as_deref().unwrap_or_default()),
            )
            .with(names::FAILED_SCRIPT_ERROR, sql_literal(error))
            .with(
                names::ADDITIONAL_ARTIFACTS,
                sql_literal(self.additional_artifacts.as_deref().unwrap_or_default()),
            )
    }
}

fn truncate(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

/// Access to the tracking table of one run.
#[derive(Debug, Clone)]
pub struct TrackingStore {
    dialect: Dialect,
    tokens: Tokens,
}

impl TrackingStore {
    /// `tokens` must bind `STRATA_DB_NAME`, `STRATA_SCHEMA_NAME` and
    /// `STRATA_TABLE_NAME`.
    pub fn new(dialect: Dialect, tokens: Tokens) -> Self {
        Self { dialect, tokens }
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    pub fn tokens(&self) -> &Tokens {
        &self.tokens
    }

    /// Render the template for `op`, with `extra` bindings overriding the
    /// store's own.
    pub fn sql(&self, op: TemplateOp, extra: Option<&Tokens>) -> StrataResult<String> {
        let template = self.dialect.template(op)?;
        match extra {
            Some(extra) => substitute(template, &self.tokens.overlay(extra)),
            None => substitute(template, &self.tokens),
        }
    }

    /// Run check-db-exists on an administrative connection.
    pub async fn database_exists<E: Executor>(&self, admin: &mut E) -> StrataResult<bool> {
        let sql = self.sql(TemplateOp::CheckDbExists, None)?;
        admin.exists(&sql).await.strata_result()
    }

    /// Run create-db on an administrative connection.
    pub async fn create_database<E: Executor>(&self, admin: &mut E) -> StrataResult<()> {
        let sql = self.sql(TemplateOp::CreateDb, None)?;
        log::info!(
            target: "strata",
            "creating database {:?}",
            self.tokens.get(names::DB_NAME)
        );
        admin.execute(&sql).await.strata_result()?;
        Ok(())
    }

    /// Whether the tracking table exists.
    pub async fn is_configured<E: Executor>(&self, executor: &mut E) -> StrataResult<bool> {
        let sql = self.sql(TemplateOp::CheckConfigured, None)?;
        executor.exists(&sql).await.tracking_result()
    }

    /// Create the tracking table, and first its schema when that is not the
    /// dialect's default one.
    pub async fn configure<E: Executor>(&self, executor: &mut E) -> StrataResult<()> {
        let descriptor = self.dialect.descriptor();
        if descriptor.supports_schemas
            && self.tokens.get(names::SCHEMA_NAME) != descriptor.tracking_schema_name
        {
            let sql = self.sql(TemplateOp::CreateSchema, None)?;
            executor.execute(&sql).await.tracking_result()?;
        }
        let sql = self.sql(TemplateOp::Configure, None)?;
        log::debug!(
            target: "strata",
            "creating tracking table {:?}",
            self.tokens.get(names::TABLE_NAME)
        );
        executor.execute(&sql).await.tracking_result()?;
        Ok(())
    }

    /// The most recently applied successful version, if any.
    pub async fn current_version<E: Executor>(
        &self,
        executor: &mut E,
    ) -> StrataResult<Option<String>> {
        let sql = self.sql(TemplateOp::GetCurrentVersion, None)?;
        executor.scalar(&sql).await.tracking_result()
    }

    /// Every tracking row, ascending by version.
    ///
    /// Rows whose version does not parse sort after the rest in insertion
    /// order.
    pub async fn all_versions<E: Executor>(
        &self,
        executor: &mut E,
    ) -> StrataResult<Vec<VersionRecord>> {
        let sql = self.sql(TemplateOp::GetAllVersions, None)?;
        let mut records = executor
            .records(&sql)
            .await
            .tracking_result()?
            .into_iter()
            .map(VersionRecord::normalized)
            .collect::<Vec<_>>();
        records.sort_by(|a, b| match (a.parsed_version(), b.parsed_version()) {
            (Ok(x), Ok(y)) => x.cmp(&y),
            (Ok(_), Err(_)) => Ordering::Less,
            (Err(_), Ok(_)) => Ordering::Greater,
            (Err(_), Err(_)) => Ordering::Equal,
        });

        Ok(records)
    }

    /// Write the outcome of a version.
    ///
    /// With no `prior` row this inserts; a prior `Failed` row is replaced by
    /// upsert where the dialect has one, or updated in place.  A `Successful`
    /// row is never overwritten: the upsert and update only touch a row that
    /// is still `Failed`, and when no row changed another writer got there
    /// first.
    pub async fn record<E: Executor>(
        &self,
        executor: &mut E,
        record: &NewRecord,
        prior: Option<&VersionRecord>,
    ) -> StrataResult<()> {
        let op = match prior {
            None => TemplateOp::InsertVersion,
            Some(row) if row.is_successful() => {
                return Err(Error::VersionConflict {
                    version: record.version.clone(),
                    message: format!("already applied at {}", row.applied_on_utc),
                });
            }
            Some(_) if self.dialect.descriptor().supports_upsert => TemplateOp::UpsertVersion,
            Some(_) => TemplateOp::UpdateVersion,
        };
        let sql = self.sql(op, Some(&record.tokens()))?;
        log::trace!(target: "strata", "recording {} as {} with {op}", record.version, record.status);

        match executor.execute(&sql).await {
            Ok(0) if op != TemplateOp::InsertVersion => Err(Error::VersionConflict {
                version: record.version.clone(),
                message: "the row is no longer Failed".to_string(),
            }),
            Ok(_) => Ok(()),
            Err(e) if self.dialect.is_version_conflict(&e) => Err(Error::VersionConflict {
                version: record.version.clone(),
                message: e.to_string(),
            }),
            Err(e) => Err(Error::TrackingTable(Box::new(e))),
        }
    }
}
