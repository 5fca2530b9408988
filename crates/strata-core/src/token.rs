//! `${NAME}` placeholder substitution.
//!
//! Placeholders are case-sensitive and a placeholder without a value is an
//! error rather than being left in the output, so partially substituted SQL is
//! never sent to a database.
use crate::error::{Error, StrataResult};

use regex::{Captures, Regex};
use std::collections::BTreeMap;
use std::sync::OnceLock;

/// Token names the orchestrator provides.
///
/// The names in [`RESERVED`](names::RESERVED) are bound for every script and
/// replace caller tokens of the same name.  The rest are bound only when a
/// tracking row is written, so a script sees the caller's value for them.
pub mod names {
    pub const DB_NAME: &str = "STRATA_DB_NAME";
    pub const SCHEMA_NAME: &str = "STRATA_SCHEMA_NAME";
    pub const TABLE_NAME: &str = "STRATA_TABLE_NAME";
    pub const VERSION: &str = "STRATA_VERSION";
    pub const APPLIED_BY_USER: &str = "STRATA_APPLIED_BY_USER";
    pub const APPLIED_BY_TOOL: &str = "STRATA_APPLIED_BY_TOOL";
    pub const APPLIED_BY_TOOL_VERSION: &str = "STRATA_APPLIED_BY_TOOL_VERSION";
    pub const STATUS: &str = "STRATA_STATUS";
    pub const DURATION_MS: &str = "STRATA_DURATION_MS";
    pub const FAILED_SCRIPT_PATH: &str = "STRATA_FAILED_SCRIPT_PATH";
    pub const FAILED_SCRIPT_ERROR: &str = "STRATA_FAILED_SCRIPT_ERROR";
    pub const ADDITIONAL_ARTIFACTS: &str = "STRATA_ADDITIONAL_ARTIFACTS";

    pub const RESERVED: [&str; 7] = [
        DB_NAME,
        SCHEMA_NAME,
        TABLE_NAME,
        VERSION,
        APPLIED_BY_USER,
        APPLIED_BY_TOOL,
        APPLIED_BY_TOOL_VERSION,
    ];
}

fn token_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\$\{([A-Za-z0-9_]+)\}").unwrap())
}

/// A set of token bindings with unique keys.  Inserting a key that is already
/// bound replaces its value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokens(BTreeMap<String, String>);

impl Tokens {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse `KEY=VALUE` definitions.  The value is everything after the
    /// first `=` and may be empty; the key may not.
    pub fn parse<I, S>(defs: I) -> StrataResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut tokens = Self::new();
        for def in defs {
            let (key, value) = parse_pair(def.as_ref())?;
            tokens.insert(key, value);
        }
        Ok(tokens)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> &mut Self {
        self.0.insert(key.into(), value.into());
        self
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// These bindings with every reserved system name removed.
    pub fn without_reserved(&self) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(k, _)| !names::RESERVED.contains(&k.as_str()))
                .map(|(k, v)| (k.clone(), v.clone()))
                .collect(),
        )
    }

    /// A new set where `system` bindings take precedence over these.
    pub fn overlay(&self, system: &Tokens) -> Self {
        let mut merged = self.clone();
        merged.0.extend(system.0.clone());
        merged
    }
}

impl<K, V> FromIterator<(K, V)> for Tokens
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> Self {
        Self(
            iter.into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        )
    }
}

/// Split one `KEY=VALUE` definition.
pub fn parse_pair(def: &str) -> StrataResult<(String, String)> {
    match def.split_once('=') {
        Some((key, value)) if !key.trim().is_empty() => {
            Ok((key.trim().to_string(), value.to_string()))
        }
        _ => Err(Error::InvalidToken(def.to_string())),
    }
}

/// Replace every `${KEY}` in `template` with its bound value.
///
/// Fails with [`Error::UnresolvedToken`] naming every placeholder that has no
/// binding, in order of first appearance.
pub fn substitute(template: &str, tokens: &Tokens) -> StrataResult<String> {
    let mut missing: Vec<String> = Vec::new();
    for caps in token_re().captures_iter(template) {
        let key = &caps[1];
        if tokens.get(key).is_none() && !missing.iter().any(|m| m == key) {
            missing.push(key.to_string());
        }
    }
    if !missing.is_empty() {
        return Err(Error::UnresolvedToken {
            keys: missing,
            script: None,
        });
    }

    let out = token_re().replace_all(template, |caps: &Captures| {
        tokens.get(&caps[1]).unwrap_or_default().to_string()
    });

    Ok(out.into_owned())
}

/// Escape a value for use inside a single-quoted SQL string literal.
pub fn sql_literal(value: &str) -> String {
    value.replace('\'', "''")
}
