use strata_core::bulk;
use strata_core::connection::ConnectionString;
use strata_core::dialect::Dialect;
use strata_core::error::{DatabaseError as _, Error, StrataResult};
use strata_core::executor::{Connector, Executor};
use strata_core::report::{AttachReport as _, RunResult, VersionReport};
use strata_core::source::{MigrationSource, ScriptUnit, UnitKind, VersionDir, special};
use strata_core::token::{Tokens, names, substitute};
use strata_core::tracking::{NewRecord, TrackingStore, VersionRecord, VersionStatus};
use strata_core::version::Version;

use std::path::Path;
use std::time::Instant;

#[cfg(feature = "cli")]
mod cli_opts;
#[cfg(feature = "cli")]
pub use cli_opts::{CliReport, run_cli, run_cli_with};

mod context;
pub use context::{RunContext, TOOL_NAME};

#[cfg(test)]
mod tests;

/// Stages of a run, logged as they are entered.
#[derive(Debug, Clone, Copy)]
enum RunState<'a> {
    Initializing,
    Connecting,
    EnsuringDatabase,
    EnsuringTrackingTable,
    SelectingPendingVersions,
    ApplyingVersion(&'a str),
    Completed,
    Aborted,
}

impl RunState<'_> {
    fn enter(self) {
        log::debug!(target: "strata", "run state: {self:?}");
    }
}

/// A script with its tokens substituted, broken into executable units.
struct Prepared {
    script: String,
    statements: Vec<String>,
}

/// A statement that failed, with the script it came from.
struct Failure<E> {
    script: String,
    error: E,
}

/// `Orchestrator` applies version folders to one database.
///
/// It is bound to a connection string exactly once with
/// [`initialize`](Self::initialize); every other operation fails with
/// [`Error::InvalidState`] until then.  Each operation opens its own
/// connection through the [`Connector`] and closes it before returning.
#[derive(Debug)]
pub struct Orchestrator<C> {
    connector: C,
    dialect: Dialect,
    connection: Option<ConnectionString>,
    tracking_schema: Option<String>,
    tracking_table: Option<String>,
}

impl<C: Connector> Orchestrator<C> {
    pub fn new(connector: C, dialect: Dialect) -> Self {
        Self {
            connector,
            dialect,
            connection: None,
            tracking_schema: None,
            tracking_table: None,
        }
    }

    /// Create an `Orchestrator` for the dialect registered under `platform`.
    pub fn for_platform(connector: C, platform: &str) -> StrataResult<Self> {
        let dialect = Dialect::from_platform(platform)?;
        Ok(Self::new(connector, dialect))
    }

    /// Keep the tracking table in this schema instead of the dialect default.
    pub fn with_tracking_schema(mut self, schema: impl Into<String>) -> Self {
        self.tracking_schema = Some(schema.into());
        self
    }

    /// Use this tracking table name instead of the default.
    pub fn with_tracking_table(mut self, table: impl Into<String>) -> Self {
        self.tracking_table = Some(table.into());
        self
    }

    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// Bind the connection string.  No connection is made.
    pub fn initialize(&mut self, connection_string: &str) -> StrataResult<()> {
        RunState::Initializing.enter();
        if self.connection.is_some() {
            return Err(Error::InvalidState("already initialized".into()));
        }
        let connection = ConnectionString::parse(connection_string)?;
        log::trace!(
            target: "strata",
            "initialized {} orchestrator for {}",
            self.dialect,
            connection.redacted()
        );
        self.connection = Some(connection);
        Ok(())
    }

    /// Apply the pending versions under `root`.
    ///
    /// On failure the error is [`Error::Partial`] carrying the report of the
    /// versions that finished first, unless the failure happened before any
    /// version was selected.
    pub async fn run(&self, root: impl AsRef<Path>, ctx: &RunContext) -> StrataResult<RunResult> {
        let connection = self.connection()?;
        let descriptor = self.dialect.descriptor();
        if ctx.verify_only() && !descriptor.supports_transactional_ddl {
            return Err(Error::UnsupportedOperation(format!(
                "verify requires transactional DDL, which {} does not have",
                self.dialect
            )));
        }
        let source = MigrationSource::load(root)?;
        let store = self.tracking_store(connection)?;
        let target = ctx
            .target_version()
            .or_else(|| source.latest())
            .cloned();

        RunState::Connecting.enter();
        // Verify never creates a database it could not roll back.
        if ctx.auto_create_database() && !ctx.verify_only() {
            RunState::EnsuringDatabase.enter();
            self.ensure_database(connection, &store).await?;
        }

        let target_cs = self.dialect.connection_string(connection);
        let mut exec = self
            .connector
            .connect(&target_cs)
            .await
            .connection_result(&target_cs.redacted())?;
        let outcome = self
            .run_connected(&mut exec, &source, &store, target.as_ref(), ctx)
            .await;
        close(exec).await;

        match &outcome {
            Ok(result) => {
                RunState::Completed.enter();
                log::info!(
                    target: "strata",
                    "{} {} versions",
                    if ctx.verify_only() { "verified" } else { "applied" },
                    result.applied().len()
                );
            }
            Err(e) => {
                RunState::Aborted.enter();
                log::error!(target: "strata", "run aborted: {e}");
            }
        }

        outcome
    }

    /// Every row of the tracking table, ascending by version.  Empty when the
    /// table does not exist yet.
    pub async fn get_all_versions(&self) -> StrataResult<Vec<VersionRecord>> {
        let connection = self.connection()?;
        let store = self.tracking_store(connection)?;
        let mut exec = self.connect_target(connection).await?;
        let records = match store.is_configured(&mut exec).await {
            Ok(true) => store.all_versions(&mut exec).await,
            Ok(false) => Ok(Vec::new()),
            Err(e) => Err(e),
        };
        close(exec).await;

        records
    }

    /// The most recently applied successful version, if any.
    pub async fn get_current_version(&self) -> StrataResult<Option<String>> {
        let connection = self.connection()?;
        let store = self.tracking_store(connection)?;
        let mut exec = self.connect_target(connection).await?;
        let current = match store.is_configured(&mut exec).await {
            Ok(true) => store.current_version(&mut exec).await,
            Ok(false) => Ok(None),
            Err(e) => Err(e),
        };
        close(exec).await;

        current
    }

    /// Run the `_erase` folders: each version's in descending version order,
    /// then the root one.  The tracking table is left as it is.
    ///
    /// Returns the scripts that ran.
    pub async fn erase(&self, root: impl AsRef<Path>, tokens: &Tokens) -> StrataResult<Vec<String>> {
        let connection = self.connection()?;
        let source = MigrationSource::load(root)?;
        let store = self.tracking_store(connection)?;
        let base = self.script_tokens(connection, &store, tokens, &RunContext::new());

        let mut prepared = Vec::new();
        for dir in source.versions().iter().rev() {
            let units = source.erase_units(dir)?;
            let tokens = base.clone().with(names::VERSION, dir.version().as_str());
            prepared.extend(self.prepare(&units, &tokens)?);
        }
        prepared.extend(self.prepare(&source.special_units(special::ERASE)?, &base)?);
        let scripts = prepared.iter().map(|p| p.script.clone()).collect::<Vec<_>>();
        if prepared.is_empty() {
            log::info!(target: "strata", "nothing to erase");
            return Ok(scripts);
        }

        let transactional = self.dialect.descriptor().supports_transactional_ddl;
        let mut exec = self.connect_target(connection).await?;
        let outcome = self
            .run_scripts(&mut exec, special::ERASE, &prepared, transactional)
            .await;
        close(exec).await;
        outcome?;

        log::info!(target: "strata", "erased with {} scripts", scripts.len());
        Ok(scripts)
    }

    /// Record versions as applied without running them.  Not implemented.
    pub async fn baseline(&self) -> StrataResult<()> {
        self.connection()?;
        Err(Error::NotImplemented("baseline"))
    }

    /// Rewrite the tracking table to match the source tree.  Not implemented.
    pub async fn rebase(&self) -> StrataResult<()> {
        self.connection()?;
        Err(Error::NotImplemented("rebase"))
    }

    fn connection(&self) -> StrataResult<&ConnectionString> {
        self.connection
            .as_ref()
            .ok_or_else(|| Error::InvalidState("initialize has not been called".into()))
    }

    fn tracking_store(&self, connection: &ConnectionString) -> StrataResult<TrackingStore> {
        let descriptor = self.dialect.descriptor();
        let db_name = self.dialect.database_name(connection)?;
        let schema = match (&self.tracking_schema, descriptor.tracking_schema_name) {
            (Some(schema), _) => schema.clone(),
            (None, Some(schema)) => schema.to_string(),
            (None, None) if self.dialect == Dialect::Sqlite => "main".to_string(),
            (None, None) => db_name.clone(),
        };
        let table = self
            .tracking_table
            .clone()
            .unwrap_or_else(|| descriptor.tracking_table_name.to_string());
        let tokens = Tokens::new()
            .with(names::DB_NAME, db_name)
            .with(names::SCHEMA_NAME, schema)
            .with(names::TABLE_NAME, table);

        Ok(TrackingStore::new(self.dialect, tokens))
    }

    /// Caller tokens with the system tokens laid over them.
    fn script_tokens(
        &self,
        connection: &ConnectionString,
        store: &TrackingStore,
        tokens: &Tokens,
        ctx: &RunContext,
    ) -> Tokens {
        let system = store
            .tokens()
            .clone()
            .with(names::APPLIED_BY_USER, self.applied_by_user(connection, ctx))
            .with(names::APPLIED_BY_TOOL, ctx.tool_name())
            .with(names::APPLIED_BY_TOOL_VERSION, ctx.tool_version());
        tokens.without_reserved().overlay(&system)
    }

    fn applied_by_user(&self, connection: &ConnectionString, ctx: &RunContext) -> String {
        connection
            .user()
            .unwrap_or_else(|| ctx.tool_name().to_string())
    }

    async fn connect_target(&self, connection: &ConnectionString) -> StrataResult<C::Exec> {
        let target_cs = self.dialect.connection_string(connection);
        self.connector
            .connect(&target_cs)
            .await
            .connection_result(&target_cs.redacted())
    }

    async fn ensure_database(
        &self,
        connection: &ConnectionString,
        store: &TrackingStore,
    ) -> StrataResult<()> {
        let admin_cs = self.dialect.admin_connection_string(connection);
        let mut admin = self
            .connector
            .connect(&admin_cs)
            .await
            .connection_result(&admin_cs.redacted())?;
        let outcome = match store.database_exists(&mut admin).await {
            Ok(true) => Ok(()),
            Ok(false) => store.create_database(&mut admin).await,
            Err(e) => Err(e),
        };
        close(admin).await;

        outcome
    }

    /// Everything after the target connection is open.  In verify mode the
    /// whole of it runs inside one transaction that is always rolled back.
    async fn run_connected(
        &self,
        exec: &mut C::Exec,
        source: &MigrationSource,
        store: &TrackingStore,
        target: Option<&Version>,
        ctx: &RunContext,
    ) -> StrataResult<RunResult> {
        if !ctx.verify_only() {
            return self.apply_pending(exec, source, store, target, ctx).await;
        }

        exec.begin().await.strata_result()?;
        let outcome = self.apply_pending(exec, source, store, target, ctx).await;
        let rolled_back = exec.rollback().await;
        match (outcome, rolled_back) {
            (Ok(result), Ok(())) => Ok(result),
            (Ok(_), Err(e)) => Err(Error::Execute(Box::new(e))),
            (Err(e), Ok(())) => Err(e),
            (Err(e), Err(rollback)) => {
                log::warn!(target: "strata", "rollback after failed verify: {rollback}");
                Err(e)
            }
        }
    }

    async fn apply_pending(
        &self,
        exec: &mut C::Exec,
        source: &MigrationSource,
        store: &TrackingStore,
        target: Option<&Version>,
        ctx: &RunContext,
    ) -> StrataResult<RunResult> {
        let connection = self.connection()?;
        let tokens = self.script_tokens(connection, store, ctx.tokens(), ctx);
        // Inside the run-wide verify transaction nothing opens its own.
        let transactional =
            self.dialect.descriptor().supports_transactional_ddl && !ctx.verify_only();

        RunState::EnsuringTrackingTable.enter();
        if !store.is_configured(exec).await? {
            store.configure(exec).await?;
            let init = self.prepare(&source.special_units(special::INIT)?, &tokens)?;
            self.run_scripts(exec, special::INIT, &init, transactional).await?;
        }
        let changed = self
            .dialect
            .update_tracking_table_schema(exec, store.tokens())
            .await?;
        if changed {
            log::info!(target: "strata", "tracking table structure updated");
        }

        RunState::SelectingPendingVersions.enter();
        let current = store.current_version(exec).await?;
        let current_version = current.as_deref().map(Version::parse).transpose()?;
        let mut result = RunResult::new(ctx.verify_only(), current.clone());
        let pending = match target {
            Some(target) => source.pending(current_version.as_ref(), target),
            None => Vec::new(),
        };
        if pending.is_empty() {
            log::info!(
                target: "strata",
                "no pending versions, current version {}",
                current.as_deref().unwrap_or("none")
            );
            return Ok(result);
        }
        log::debug!(
            target: "strata",
            "{} pending versions after {}",
            pending.len(),
            current.as_deref().unwrap_or("none")
        );
        let history = store.all_versions(exec).await?;

        let pre = self.prepare(&source.special_units(special::PRE)?, &tokens)?;
        self.run_scripts(exec, special::PRE, &pre, transactional)
            .await
            .with_report(&result)?;

        for dir in pending {
            let version = dir.version();
            if ctx.cancellation().is_cancelled() {
                return Err(Error::Cancelled(version.to_string())).with_report(&result);
            }
            let prior = history
                .iter()
                .find(|r| r.parsed_version().is_ok_and(|v| v == *version));
            if let Some(row) = prior.filter(|r| r.is_successful()) {
                return Err(Error::VersionConflict {
                    version: version.to_string(),
                    message: format!("already applied at {}", row.applied_on_utc),
                })
                .with_report(&result);
            }

            let report = self
                .apply_version(exec, source, store, dir, prior, &tokens, ctx, transactional)
                .await
                .with_report(&result)?;
            result.push(report);
        }

        let post = self.prepare(&source.special_units(special::POST)?, &tokens)?;
        self.run_scripts(exec, special::POST, &post, transactional)
            .await
            .with_report(&result)?;
        if ctx.include_drafts() {
            let draft = self.prepare(&source.special_units(special::DRAFT)?, &tokens)?;
            self.run_scripts(exec, special::DRAFT, &draft, transactional)
                .await
                .with_report(&result)?;
        }

        Ok(result)
    }

    #[allow(clippy::too_many_arguments)]
    async fn apply_version(
        &self,
        exec: &mut C::Exec,
        source: &MigrationSource,
        store: &TrackingStore,
        dir: &VersionDir,
        prior: Option<&VersionRecord>,
        tokens: &Tokens,
        ctx: &RunContext,
        transactional: bool,
    ) -> StrataResult<VersionReport> {
        let version = dir.version().to_string();
        RunState::ApplyingVersion(&version).enter();

        // Every script is resolved before anything runs, so a missing token
        // never leaves a version half applied.
        let tokens = tokens.clone().with(names::VERSION, version.as_str());
        let prepared = self.prepare(&source.version_units(dir)?, &tokens)?;
        let scripts = prepared.iter().map(|p| p.script.clone()).collect::<Vec<_>>();

        let started = Instant::now();
        if transactional {
            exec.begin().await.strata_result()?;
        }
        let executed = execute_all(exec, &prepared).await;
        let duration_ms = i64::try_from(started.elapsed().as_millis()).unwrap_or(i64::MAX);

        let mut record = NewRecord {
            version: version.clone(),
            status: VersionStatus::Successful,
            applied_by_user: self.applied_by_user(self.connection()?, ctx),
            applied_by_tool: ctx.tool_name().to_string(),
            applied_by_tool_version: ctx.tool_version().to_string(),
            duration_ms,
            failed_script_path: None,
            failed_script_error: None,
            additional_artifacts: ctx.additional_artifacts().map(str::to_string),
        };

        match executed {
            Ok(()) => {
                if let Err(e) = store.record(exec, &record, prior).await {
                    if transactional {
                        rollback(exec).await;
                    }
                    return Err(e);
                }
                if transactional {
                    exec.commit().await.strata_result()?;
                }
                log::info!(target: "strata", "applied {version} in {duration_ms}ms");

                let report = VersionReport::new(&version, scripts, transactional, duration_ms);
                if ctx.verify_only() {
                    return Ok(report.verified());
                }
                Ok(report)
            }
            Err(failure) => {
                let message = self.describe(&failure.error);
                log::error!(target: "strata", "{} failed: {message}", failure.script);
                if transactional {
                    rollback(exec).await;
                }
                let mut record_error = None;
                if !ctx.verify_only() {
                    record.status = VersionStatus::Failed;
                    record.failed_script_path = Some(failure.script.clone());
                    record.failed_script_error = Some(message.clone());
                    if let Err(e) = store.record(exec, &record, prior).await {
                        log::error!(target: "strata", "could not record failure of {version}: {e}");
                        record_error = Some(e.to_string());
                    }
                }

                Err(Error::ScriptExecution {
                    version,
                    script: failure.script,
                    message,
                    record_error,
                    source: Some(Box::new(failure.error)),
                })
            }
        }
    }

    /// Run prepared scripts outside of any version, in one transaction when
    /// `transactional`.
    async fn run_scripts(
        &self,
        exec: &mut C::Exec,
        folder: &str,
        prepared: &[Prepared],
        transactional: bool,
    ) -> StrataResult<()> {
        if prepared.is_empty() {
            return Ok(());
        }
        log::debug!(target: "strata", "running {} scripts of {folder}", prepared.len());

        if transactional {
            exec.begin().await.strata_result()?;
        }
        match execute_all(exec, prepared).await {
            Ok(()) => {
                if transactional {
                    exec.commit().await.strata_result()?;
                }
                Ok(())
            }
            Err(failure) => {
                if transactional {
                    rollback(exec).await;
                }
                Err(Error::ScriptExecution {
                    version: folder.to_string(),
                    message: self.describe(&failure.error),
                    script: failure.script,
                    record_error: None,
                    source: Some(Box::new(failure.error)),
                })
            }
        }
    }

    fn prepare(&self, units: &[ScriptUnit], tokens: &Tokens) -> StrataResult<Vec<Prepared>> {
        units
            .iter()
            .map(|unit| {
                let statements = match unit.kind() {
                    UnitKind::Sql => {
                        let raw = unit.read()?;
                        let sql = substitute(&raw, tokens).map_err(|e| e.in_script(unit.name()))?;
                        self.dialect.break_statements(&sql)?
                    }
                    UnitKind::Bulk => bulk::insert_statements(self.dialect, unit.path())?,
                };
                Ok(Prepared {
                    script: unit.name().to_string(),
                    statements,
                })
            })
            .collect()
    }

    fn describe(&self, error: &<C::Exec as Executor>::Error) -> String {
        self.dialect
            .try_parse_error(error)
            .unwrap_or_else(|| error.to_string())
    }
}

async fn execute_all<E: Executor>(exec: &mut E, prepared: &[Prepared]) -> Result<(), Failure<E::Error>> {
    for script in prepared {
        log::trace!(target: "strata", "executing {}", script.script);
        for statement in &script.statements {
            if let Err(error) = exec.execute(statement).await {
                return Err(Failure {
                    script: script.script.clone(),
                    error,
                });
            }
        }
    }

    Ok(())
}

async fn rollback<E: Executor>(exec: &mut E) {
    if let Err(e) = exec.rollback().await {
        log::warn!(target: "strata", "rollback failed: {e}");
    }
}

async fn close<E: Executor>(exec: E) {
    if let Err(e) = exec.close().await {
        log::warn!(target: "strata", "error closing connection: {e}");
    }
}
