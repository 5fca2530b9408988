use strata_core::token::Tokens;
use strata_core::version::Version;

use tokio_util::sync::CancellationToken;

/// Name stamped in `applied_by_tool` unless overridden.
pub const TOOL_NAME: &str = "strata";

/// Options for one run, built up from [`RunContext::new`].
///
/// ```
/// use strata::{RunContext, Version};
///
/// let ctx = RunContext::new()
///     .with_target_version(Version::parse("v1.02").unwrap())
///     .with_token("OWNER", "app")
///     .with_auto_create_database(true);
/// assert_eq!(ctx.tokens().get("OWNER"), Some("app"));
/// ```
#[derive(Debug, Clone)]
pub struct RunContext {
    target_version: Option<Version>,
    tokens: Tokens,
    verify_only: bool,
    auto_create_database: bool,
    include_drafts: bool,
    additional_artifacts: Option<String>,
    tool_name: String,
    tool_version: String,
    cancellation: CancellationToken,
}

impl Default for RunContext {
    fn default() -> Self {
        Self {
            target_version: None,
            tokens: Tokens::new(),
            verify_only: false,
            auto_create_database: false,
            include_drafts: false,
            additional_artifacts: None,
            tool_name: TOOL_NAME.to_string(),
            tool_version: env!("CARGO_PKG_VERSION").to_string(),
            cancellation: CancellationToken::new(),
        }
    }
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Apply pending versions up to and including `version`.  Without it
    /// the latest version in the source tree is the target.
    pub fn with_target_version(mut self, version: Version) -> Self {
        self.target_version = Some(version);
        self
    }

    /// Replace the caller tokens.
    pub fn with_tokens(mut self, tokens: Tokens) -> Self {
        self.tokens = tokens;
        self
    }

    /// Bind one caller token, replacing an earlier value for the key.
    pub fn with_token(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tokens.insert(key, value);
        self
    }

    /// Run every pending version and roll all of it back.
    pub fn with_verify_only(mut self, verify_only: bool) -> Self {
        self.verify_only = verify_only;
        self
    }

    /// Create the target database first if it does not exist.
    pub fn with_auto_create_database(mut self, auto_create: bool) -> Self {
        self.auto_create_database = auto_create;
        self
    }

    /// Also run the root `_draft` folder after `_post`.
    pub fn with_drafts(mut self, include: bool) -> Self {
        self.include_drafts = include;
        self
    }

    /// Free-form note stored in `additional_artifacts` of every record.
    pub fn with_additional_artifacts(mut self, artifacts: impl Into<String>) -> Self {
        self.additional_artifacts = Some(artifacts.into());
        self
    }

    /// The tool identity stamped in `applied_by_tool` and
    /// `applied_by_tool_version`.
    pub fn with_tool(mut self, name: impl Into<String>, version: impl Into<String>) -> Self {
        self.tool_name = name.into();
        self.tool_version = version.into();
        self
    }

    /// Token checked before each pending version; once cancelled the run
    /// stops with [`Error::Cancelled`].
    ///
    /// [`Error::Cancelled`]: strata_core::error::Error::Cancelled
    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancellation = token;
        self
    }

    pub fn target_version(&self) -> Option<&Version> {
        self.target_version.as_ref()
    }

    pub fn tokens(&self) -> &Tokens {
        &self.tokens
    }

    pub fn verify_only(&self) -> bool {
        self.verify_only
    }

    pub fn auto_create_database(&self) -> bool {
        self.auto_create_database
    }

    pub fn include_drafts(&self) -> bool {
        self.include_drafts
    }

    pub fn additional_artifacts(&self) -> Option<&str> {
        self.additional_artifacts.as_deref()
    }

    pub fn tool_name(&self) -> &str {
        &self.tool_name
    }

    pub fn tool_version(&self) -> &str {
        &self.tool_version
    }

    pub fn cancellation(&self) -> &CancellationToken {
        &self.cancellation
    }
}
