use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use strata_core::dialect::Dialect;
use strata_core::token::{Tokens, parse_pair};
use strata_core::version::Version;

pub extern crate clap;

/// Command-line interface for a `strata` migration application.
#[derive(Debug, Parser)]
#[command(version, about)]
pub struct CliOpts {
    #[clap(flatten)]
    pub connect_opts: ConnectOpts,
    #[clap(subcommand)]
    pub command: Command,
}

impl CliOpts {
    /// Create a new [`CliOpts`] by parsing command line options.
    pub fn new() -> Self {
        Self::parse()
    }
}

impl Default for CliOpts {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Apply pending versions up through the target version
    Run(RunArgs),
    /// Apply pending versions and roll everything back
    Verify(RunArgs),
    /// List the rows of the version tracking table
    List,
    /// Run the `_erase` scripts of every version, newest first
    Erase(EraseArgs),
    /// Record versions as applied without running them (not implemented)
    Baseline,
    /// Rewrite the tracking table to match the source tree (not implemented)
    Rebase,
}

#[derive(Debug, Args)]
pub struct ConnectOpts {
    /// Connection string for the target database, either from the command
    /// line or from the environment variable `STRATA_CONNECTION_STRING`.
    #[clap(long, short = 'c', env = "STRATA_CONNECTION_STRING")]
    pub connection_string: Option<String>,
    /// Database platform: postgresql, sqlserver, mysql or sqlite.
    #[clap(long, env = "STRATA_PLATFORM", default_value = "postgresql", value_parser = parse_dialect)]
    pub platform: Dialect,
    /// Schema of the version tracking table.
    #[clap(long)]
    pub meta_schema: Option<String>,
    /// Name of the version tracking table.
    #[clap(long)]
    pub meta_table: Option<String>,
}

impl ConnectOpts {
    pub fn required_connection_string(&self) -> anyhow::Result<&str> {
        self.connection_string.as_deref().ok_or_else(|| {
            anyhow::anyhow!(
                "the `--connection-string/-c` option or the `STRATA_CONNECTION_STRING` environment variable must be provided"
            )
        })
    }
}

#[derive(Debug, Args)]
pub struct RunArgs {
    /// Path to the folder containing version folders
    #[clap(long)]
    pub path: Option<PathBuf>,
    /// Apply pending versions up through this version (defaults to the last)
    #[clap(long, value_parser = parse_version)]
    pub target_version: Option<Version>,
    /// Create the target database if it does not exist
    #[clap(long)]
    pub auto_create_db: bool,
    /// Also run the scripts in `_draft`
    #[clap(long)]
    pub include_drafts: bool,
    /// Token for `${KEY}` placeholders in scripts, repeatable
    #[clap(short = 'k', long = "token", value_name = "KEY=VALUE", value_parser = parse_token)]
    pub tokens: Vec<(String, String)>,
}

impl RunArgs {
    pub fn path(&self) -> anyhow::Result<PathBuf> {
        resolve_path(self.path.as_ref())
    }

    pub fn tokens(&self) -> Tokens {
        self.tokens.iter().cloned().collect()
    }
}

#[derive(Debug, Args)]
pub struct EraseArgs {
    /// Path to the folder containing version folders
    #[clap(long)]
    pub path: Option<PathBuf>,
    /// Token for `${KEY}` placeholders in scripts, repeatable
    #[clap(short = 'k', long = "token", value_name = "KEY=VALUE", value_parser = parse_token)]
    pub tokens: Vec<(String, String)>,
}

impl EraseArgs {
    pub fn path(&self) -> anyhow::Result<PathBuf> {
        resolve_path(self.path.as_ref())
    }

    pub fn tokens(&self) -> Tokens {
        self.tokens.iter().cloned().collect()
    }
}

fn resolve_path(path: Option<&PathBuf>) -> anyhow::Result<PathBuf> {
    match path {
        Some(path) => Ok(path.clone()),
        None => Ok(std::env::current_dir()?),
    }
}

fn parse_dialect(s: &str) -> Result<Dialect, String> {
    Dialect::from_platform(s).map_err(|e| e.to_string())
}

fn parse_version(s: &str) -> Result<Version, String> {
    Version::parse(s).map_err(|e| e.to_string())
}

fn parse_token(s: &str) -> Result<(String, String), String> {
    parse_pair(s).map_err(|e| e.to_string())
}
