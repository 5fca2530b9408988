use crate::report::RunResult;

use std::error::Error as StdError;
use std::path::PathBuf;

/// Alias for a result whose error type is [`Error`].
pub type StrataResult<T> = Result<T, Error>;
pub(crate) type BoxDynError = Box<dyn StdError + Send + Sync + 'static>;

/// All the ways the lifecycle of applying versions can end in failure.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum Error {
    /// The target or administrative database could not be reached.
    #[error("could not connect to {target}: {source}")]
    Connection {
        target: String,
        #[source]
        source: BoxDynError,
    },
    /// The tracking table could not be created or read.
    #[error("tracking table error: {0}")]
    TrackingTable(#[source] BoxDynError),
    /// A statement of a script failed.  `record_error` is set when the
    /// `Failed` tracking row could not be written afterwards.
    #[error(
        "error executing {script} in version {version}: {message}{}",
        record_error.as_ref().map(|e| format!(" (failure not recorded: {e})")).unwrap_or_default()
    )]
    ScriptExecution {
        version: String,
        script: String,
        message: String,
        record_error: Option<String>,
        #[source]
        source: Option<BoxDynError>,
    },
    /// Another writer recorded the version first, or it was already applied.
    #[error("version {version} conflicts with the tracking table: {message}")]
    VersionConflict { version: String, message: String },
    /// A `${NAME}` placeholder had no value.
    #[error("unresolved tokens {keys:?}{}", script.as_ref().map(|s| format!(" in {s}")).unwrap_or_default())]
    UnresolvedToken {
        keys: Vec<String>,
        script: Option<String>,
    },
    /// The operation is not available for this dialect or configuration.
    #[error("unsupported operation: {0}")]
    UnsupportedOperation(String),
    /// Reserved operation that has no implementation yet.
    #[error("{0} is not implemented")]
    NotImplemented(&'static str),
    /// Operations were called out of order.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// No dialect is registered under the platform identifier.
    #[error("unsupported platform {0}")]
    UnsupportedPlatform(String),
    /// A version identifier could not be parsed.
    #[error("invalid version {0}")]
    InvalidVersion(String),
    /// A token definition could not be parsed.
    #[error("invalid token {0}, expected KEY=VALUE")]
    InvalidToken(String),
    /// The connection string is malformed.
    #[error("invalid connection string: {0}")]
    InvalidConnectionString(String),
    /// The run was cancelled before the version started.
    #[error("run cancelled before version {0}")]
    Cancelled(String),
    /// Error reading the migration source tree.
    #[error(transparent)]
    Source(#[from] SourceError),
    /// A database error outside of any script, e.g. opening a transaction.
    #[error("error executing statement: {0}")]
    Execute(#[source] BoxDynError),
    /// The run failed; `report` holds the versions that finished before it.
    #[error("{source} ({} versions finished before the failure)", report.applied().len())]
    Partial {
        #[source]
        source: Box<Error>,
        report: Box<RunResult>,
    },
}

impl Error {
    /// The error underneath any [`Error::Partial`] wrapping.
    pub fn cause(&self) -> &Error {
        match self {
            Self::Partial { source, .. } => Error::cause(source),
            other => other,
        }
    }

    /// The report of the run up to the failure.
    pub fn partial_report(&self) -> Option<&RunResult> {
        match self {
            Self::Partial { report, .. } => Some(report),
            _ => None,
        }
    }

    /// Attach the script being prepared to an unresolved token error.
    pub fn in_script(self, path: &str) -> Self {
        match self {
            Self::UnresolvedToken { keys, .. } => Self::UnresolvedToken {
                keys,
                script: Some(path.to_string()),
            },
            other => other,
        }
    }
}

/// Errors coming from resolving a directory of versions into an ordered
/// collection of script units.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum SourceError {
    /// Error interacting with the filesystem.
    #[error("error reading {path}: {source}")]
    Filesystem {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The root path is not a directory.
    #[error("{0} is not a directory")]
    NotADirectory(PathBuf),
    /// Two folders parse to the same version.
    #[error("duplicate version folders {0} and {1}")]
    DuplicateVersion(String, String),
    /// A bulk data file could not be read.
    #[error("error reading bulk file {path}: {source}")]
    Bulk {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    /// A bulk data file name does not name a table.
    #[error("bulk file {0} must be named <table>.csv or <schema>.<table>.csv")]
    BulkName(PathBuf),
}

impl SourceError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| Self::Filesystem { path, source }
    }
}

/// Converting a result with a generic `std::error::Error` to one with this
/// crate's error type.
pub trait DatabaseError<T, E> {
    fn strata_result(self) -> StrataResult<T>;
    fn tracking_result(self) -> StrataResult<T>;
    fn connection_result(self, target: &str) -> StrataResult<T>;
}

impl<T, E> DatabaseError<T, E> for Result<T, E>
where
    E: StdError + Send + Sync + 'static,
{
    fn strata_result(self) -> StrataResult<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(Error::Execute(Box::new(e))),
        }
    }

    fn tracking_result(self) -> StrataResult<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(Error::TrackingTable(Box::new(e))),
        }
    }

    fn connection_result(self, target: &str) -> StrataResult<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e) => Err(Error::Connection {
                target: target.to_string(),
                source: Box::new(e),
            }),
        }
    }
}
