//! Connection strings in URL form (`postgres://user@host/db`) or in the
//! `Key=Value;` form used by SQL Server clients.
use crate::error::{Error, StrataResult};

use std::str::FromStr;
use url::Url;

const DATABASE_KEYS: [&str; 2] = ["database", "initial catalog"];
const USER_KEYS: [&str; 4] = ["user id", "uid", "user", "username"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConnectionString {
    Url(Url),
    KeyValue(Vec<(String, String)>),
}

impl ConnectionString {
    pub fn parse(s: &str) -> StrataResult<Self> {
        let s = s.trim();
        if s.is_empty() {
            return Err(Error::InvalidConnectionString("empty".into()));
        }
        if s.contains("://") || s.starts_with("sqlite:") {
            let url = Url::parse(s).map_err(|e| Error::InvalidConnectionString(e.to_string()))?;
            return Ok(Self::Url(url));
        }

        let pairs = s
            .split(';')
            .filter(|part| !part.trim().is_empty())
            .map(|part| match part.split_once('=') {
                Some((k, v)) if !k.trim().is_empty() => {
                    Ok((k.trim().to_string(), v.trim().to_string()))
                }
                _ => Err(Error::InvalidConnectionString(format!(
                    "expected Key=Value, found `{part}`"
                ))),
            })
            .collect::<StrataResult<Vec<_>>>()?;

        Ok(Self::KeyValue(pairs))
    }

    /// The URL scheme, if this is a URL.
    pub fn scheme(&self) -> Option<&str> {
        match self {
            Self::Url(url) => Some(url.scheme()),
            Self::KeyValue(_) => None,
        }
    }

    /// The database named by the connection string.
    ///
    /// For URLs this is the first path segment; SQLite URLs are handled by the
    /// dialect since their path is a file.
    pub fn database(&self) -> Option<String> {
        match self {
            Self::Url(url) => url
                .path()
                .trim_start_matches('/')
                .split('/')
                .next()
                .filter(|db| !db.is_empty())
                .map(|db| percent_decode(db)),
            Self::KeyValue(pairs) => lookup(pairs, &DATABASE_KEYS),
        }
    }

    /// The file path of a `sqlite:` URL.
    pub fn sqlite_path(&self) -> Option<String> {
        match self {
            Self::Url(url) if url.scheme() == "sqlite" => {
                let path = format!("{}{}", url.host_str().unwrap_or_default(), url.path());
                Some(path).filter(|p| !p.is_empty())
            }
            _ => None,
        }
    }

    pub fn user(&self) -> Option<String> {
        match self {
            Self::Url(url) => Some(url.username())
                .filter(|u| !u.is_empty())
                .map(percent_decode),
            Self::KeyValue(pairs) => lookup(pairs, &USER_KEYS),
        }
    }

    /// A copy pointing at another database, or at none.
    pub fn with_database(&self, database: Option<&str>) -> Self {
        match self {
            Self::Url(url) => {
                let mut url = url.clone();
                match database {
                    Some(db) => url.set_path(&format!("/{db}")),
                    None => url.set_path(""),
                }
                Self::Url(url)
            }
            Self::KeyValue(pairs) => {
                let mut pairs = pairs
                    .iter()
                    .filter(|(k, _)| !DATABASE_KEYS.contains(&k.to_ascii_lowercase().as_str()))
                    .cloned()
                    .collect::<Vec<_>>();
                if let Some(db) = database {
                    pairs.push(("Database".to_string(), db.to_string()));
                }
                Self::KeyValue(pairs)
            }
        }
    }

    /// A copy with the URL query parameter `key` set to `value`.
    pub fn with_param(&self, key: &str, value: &str) -> Self {
        match self {
            Self::Url(url) => {
                let mut url = url.clone();
                let kept = url
                    .query_pairs()
                    .filter(|(k, _)| k != key)
                    .map(|(k, v)| (k.into_owned(), v.into_owned()))
                    .collect::<Vec<_>>();
                url.set_query(None);
                {
                    let mut query = url.query_pairs_mut();
                    for (k, v) in &kept {
                        query.append_pair(k, v);
                    }
                    query.append_pair(key, value);
                }
                Self::Url(url)
            }
            Self::KeyValue(pairs) => {
                let mut pairs = pairs
                    .iter()
                    .filter(|(k, _)| !k.eq_ignore_ascii_case(key))
                    .cloned()
                    .collect::<Vec<_>>();
                pairs.push((key.to_string(), value.to_string()));
                Self::KeyValue(pairs)
            }
        }
    }

    /// The connection string with any password masked, for logs and errors.
    pub fn redacted(&self) -> String {
        match self {
            Self::Url(url) => {
                let mut url = url.clone();
                if url.password().is_some() {
                    let _ = url.set_password(Some("***"));
                }
                url.to_string()
            }
            Self::KeyValue(pairs) => pairs
                .iter()
                .map(|(k, v)| {
                    if matches!(k.to_ascii_lowercase().as_str(), "password" | "pwd") {
                        format!("{k}=***")
                    } else {
                        format!("{k}={v}")
                    }
                })
                .collect::<Vec<_>>()
                .join(";"),
        }
    }
}

impl FromStr for ConnectionString {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl std::fmt::Display for ConnectionString {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Url(url) => f.write_str(url.as_str()),
            Self::KeyValue(pairs) => {
                let joined = pairs
                    .iter()
                    .map(|(k, v)| format!("{k}={v}"))
                    .collect::<Vec<_>>()
                    .join(";");
                f.write_str(&joined)
            }
        }
    }
}

fn lookup(pairs: &[(String, String)], keys: &[&str]) -> Option<String> {
    pairs
        .iter()
        .find(|(k, _)| keys.contains(&k.to_ascii_lowercase().as_str()))
        .map(|(_, v)| v.clone())
        .filter(|v| !v.is_empty())
}

fn percent_decode(s: &str) -> String {
    url::form_urlencoded::parse(format!("x={s}").as_bytes())
        .next()
        .map(|(_, v)| v.into_owned())
        .unwrap_or_else(|| s.to_string())
}
