use super::{Orchestrator, RunContext};

use display_json::{DebugAsJson, DisplayAsJsonPretty};
use serde::Serialize;
use strata_cli::{CliOpts, Command, ConnectOpts};
use strata_core::dialect::Dialect;
use strata_core::error::Error;
use strata_core::executor::Connector;
use strata_core::report::RunResult;
use strata_core::tracking::VersionRecord;

/// What a CLI command produced.
#[derive(Clone, Serialize, DebugAsJson, DisplayAsJsonPretty)]
#[serde(rename_all = "snake_case")]
pub enum CliReport {
    Run(RunResult),
    History(Vec<VersionRecord>),
    Erase(Vec<String>),
    Completed,
}

/// Parse command line options and run the command with a built-in `sqlx`
/// connector for the selected platform.
///
/// SQL Server has no built-in connector; use [`run_cli_with`] for it.
#[cfg_attr(docsrs, doc(cfg(feature = "cli")))]
pub async fn run_cli() -> anyhow::Result<CliReport> {
    let cli = CliOpts::new();
    match cli.connect_opts.platform {
        #[cfg(feature = "sqlx_postgres")]
        Dialect::PostgreSql => {
            let connector = strata_executor::SqlxPgConnector::new();
            execute(connector, cli).await
        }
        #[cfg(feature = "sqlx_mysql")]
        Dialect::MySql => {
            let connector = strata_executor::SqlxMySqlConnector::new();
            execute(connector, cli).await
        }
        #[cfg(feature = "sqlx_sqlite")]
        Dialect::Sqlite => {
            let connector = strata_executor::SqlxSqliteConnector::new();
            execute(connector, cli).await
        }
        other => Err(Error::UnsupportedPlatform(format!(
            "{other} has no built-in connector in this build"
        ))
        .into()),
    }
}

/// Parse command line options and run the command with `connector`.
#[cfg_attr(docsrs, doc(cfg(feature = "cli")))]
pub async fn run_cli_with<C: Connector>(connector: C) -> anyhow::Result<CliReport> {
    execute(connector, CliOpts::new()).await
}

async fn execute<C: Connector>(connector: C, cli: CliOpts) -> anyhow::Result<CliReport> {
    let app = orchestrator(connector, &cli.connect_opts)?;

    let report = match cli.command {
        Command::Run(args) => {
            let ctx = run_context(&args, false);
            CliReport::Run(app.run(args.path()?, &ctx).await?)
        }
        Command::Verify(args) => {
            let ctx = run_context(&args, true);
            CliReport::Run(app.run(args.path()?, &ctx).await?)
        }
        Command::List => CliReport::History(app.get_all_versions().await?),
        Command::Erase(args) => CliReport::Erase(app.erase(args.path()?, &args.tokens()).await?),
        Command::Baseline => {
            app.baseline().await?;
            CliReport::Completed
        }
        Command::Rebase => {
            app.rebase().await?;
            CliReport::Completed
        }
    };

    Ok(report)
}

fn orchestrator<C: Connector>(
    connector: C,
    opts: &ConnectOpts,
) -> anyhow::Result<Orchestrator<C>> {
    let mut app = Orchestrator::new(connector, opts.platform);
    if let Some(schema) = &opts.meta_schema {
        app = app.with_tracking_schema(schema);
    }
    if let Some(table) = &opts.meta_table {
        app = app.with_tracking_table(table);
    }
    app.initialize(opts.required_connection_string()?)?;

    Ok(app)
}

fn run_context(args: &strata_cli::RunArgs, verify_only: bool) -> RunContext {
    let mut ctx = RunContext::new()
        .with_tokens(args.tokens())
        .with_verify_only(verify_only)
        .with_auto_create_database(args.auto_create_db)
        .with_drafts(args.include_drafts);
    if let Some(version) = &args.target_version {
        ctx = ctx.with_target_version(version.clone());
    }
    ctx
}
