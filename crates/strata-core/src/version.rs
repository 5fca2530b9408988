//! Version identifiers of the form `vMAJOR.MINOR[.PATCH]`.
use crate::error::{Error, StrataResult};

use serde::{Serialize, Serializer};
use std::cmp::Ordering;
use std::hash::{Hash, Hasher};
use std::str::FromStr;

/// A version folder identifier.
///
/// Ordering is numeric on `(major, minor, patch)` with a missing patch read as
/// zero, so `v1.2` and `v1.02` are the same version.  The label is kept as it
/// was written because it is what ends up in the tracking table.
#[derive(Debug, Clone)]
pub struct Version {
    major: u32,
    minor: u32,
    patch: Option<u32>,
    label: String,
}

impl Version {
    pub fn parse(s: &str) -> StrataResult<Self> {
        let label = s.trim();
        let digits = label
            .strip_prefix('v')
            .or_else(|| label.strip_prefix('V'))
            .unwrap_or(label);
        let parts = digits
            .split('.')
            .map(|p| {
                if p.is_empty() || !p.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(Error::InvalidVersion(s.to_string()));
                }
                p.parse::<u32>()
                    .map_err(|_| Error::InvalidVersion(s.to_string()))
            })
            .collect::<StrataResult<Vec<_>>>()?;

        match parts[..] {
            [major, minor] => Ok(Self {
                major,
                minor,
                patch: None,
                label: label.to_string(),
            }),
            [major, minor, patch] => Ok(Self {
                major,
                minor,
                patch: Some(patch),
                label: label.to_string(),
            }),
            _ => Err(Error::InvalidVersion(s.to_string())),
        }
    }

    pub fn major(&self) -> u32 {
        self.major
    }

    pub fn minor(&self) -> u32 {
        self.minor
    }

    pub fn patch(&self) -> Option<u32> {
        self.patch
    }

    /// The identifier as written in the folder name.
    pub fn as_str(&self) -> &str {
        &self.label
    }

    fn key(&self) -> (u32, u32, u32) {
        (self.major, self.minor, self.patch.unwrap_or(0))
    }
}

impl FromStr for Version {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl PartialEq for Version {
    fn eq(&self, other: &Self) -> bool {
        self.key() == other.key()
    }
}

impl Eq for Version {}

impl Hash for Version {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key().hash(state);
    }
}

impl PartialOrd for Version {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Version {
    fn cmp(&self, other: &Self) -> Ordering {
        self.key().cmp(&other.key())
    }
}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.label)
    }
}

impl Serialize for Version {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.label)
    }
}
