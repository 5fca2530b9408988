use crate::error::{Error, StrataResult};

use display_json::{DebugAsJson, DisplayAsJsonPretty};
use serde::Serialize;

/// Attach the partial run report to an error when a run fails part way
/// through.
pub trait AttachReport<T> {
    /// Return the partial report as context for the error.
    fn with_report(self, report: &RunResult) -> StrataResult<T>;
}

impl<T> AttachReport<T> for StrataResult<T> {
    fn with_report(self, report: &RunResult) -> StrataResult<T> {
        match self {
            Ok(v) => Ok(v),
            Err(e @ Error::Partial { .. }) => Err(e),
            Err(e) => Err(Error::Partial {
                source: Box::new(e),
                report: Box::new(report.clone()),
            }),
        }
    }
}

/// The outcome of one run.
#[derive(Clone, Serialize, DebugAsJson, DisplayAsJsonPretty, Default)]
pub struct RunResult {
    verify_only: bool,
    initial_version: Option<String>,
    versions: Vec<VersionReport>,
}

impl RunResult {
    pub fn new(verify_only: bool, initial_version: Option<String>) -> Self {
        Self {
            verify_only,
            initial_version,
            versions: Vec::new(),
        }
    }

    pub fn push(&mut self, version: VersionReport) {
        self.versions.push(version);
    }

    /// Versions applied (or verified) by the run, in the order they ran.
    pub fn applied(&self) -> &[VersionReport] {
        &self.versions
    }

    /// Labels of the applied versions.
    pub fn applied_versions(&self) -> Vec<String> {
        self.versions.iter().map(|v| v.version.clone()).collect()
    }

    /// The current version before the run, `None` for a fresh target.
    pub fn initial_version(&self) -> Option<&str> {
        self.initial_version.as_deref()
    }

    pub fn verify_only(&self) -> bool {
        self.verify_only
    }

    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }
}

/// A formatted version result.
#[derive(Clone, Serialize, DebugAsJson, DisplayAsJsonPretty)]
pub struct VersionReport {
    version: String,
    state: VersionState,
    scripts: Vec<String>,
    transactional: Transactional,
    duration_ms: i64,
}

impl VersionReport {
    pub fn new(version: &str, scripts: Vec<String>, transactional: bool, duration_ms: i64) -> Self {
        Self {
            version: version.to_string(),
            state: VersionState::Applied,
            scripts,
            transactional: Transactional::from_boolean(transactional),
            duration_ms,
        }
    }

    /// Mark as run in verify mode and rolled back.
    pub fn verified(mut self) -> Self {
        self.state = VersionState::Verified;
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn scripts(&self) -> &[String] {
        &self.scripts
    }

    pub fn duration_ms(&self) -> i64 {
        self.duration_ms
    }

    pub fn is_verified(&self) -> bool {
        self.state == VersionState::Verified
    }
}

#[derive(Debug, Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Serialize)]
enum VersionState {
    Applied,
    Verified,
}

#[derive(Debug, Clone, Copy, Serialize)]
enum Transactional {
    NoTransaction,
    InTransaction,
}

impl Transactional {
    fn from_boolean(v: bool) -> Self {
        if v {
            return Self::InTransaction;
        };
        Self::NoTransaction
    }
}
