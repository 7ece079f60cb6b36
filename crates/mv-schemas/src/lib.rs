//! Shared types passed between the versioner, the policy evaluator and run
//! clients. Nothing in here talks to a store.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Alias that always tracks the most recently submitted version of a name.
pub const LATEST_ALIAS: &str = "latest";

/// Free-form artifact metadata. Ordered so serialized manifests are stable.
pub type Metadata = BTreeMap<String, Value>;

/// Alias set carried by a stored artifact version.
pub type AliasSet = BTreeSet<String>;

// ---------------------------------------------------------------------------
// Query
// ---------------------------------------------------------------------------

/// `name:alias` (or `name:vN`) lookup key understood by every run client.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ArtifactQuery {
    pub name: String,
    /// Alias or version tag.
    pub alias: String,
}

impl ArtifactQuery {
    pub fn new(name: impl Into<String>, alias: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            alias: alias.into(),
        }
    }

    pub fn latest(name: impl Into<String>) -> Self {
        Self::new(name, LATEST_ALIAS)
    }

    /// True when `alias` is a version tag (`v0`, `v12`) rather than a named alias.
    pub fn is_version_tag(&self) -> bool {
        parse_version_tag(&self.alias).is_ok()
    }
}

impl fmt::Display for ArtifactQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.name, self.alias)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid artifact query '{0}'. expected <name>[:<alias>]")]
pub struct QueryParseError(pub String);

impl FromStr for ArtifactQuery {
    type Err = QueryParseError;

    /// A bare name means `name:latest`. The split happens on the last `:`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        let (name, alias) = match s.rsplit_once(':') {
            Some((name, alias)) => (name, alias),
            None => (s, LATEST_ALIAS),
        };
        if name.is_empty() || alias.is_empty() {
            return Err(QueryParseError(s.to_string()));
        }
        Ok(Self::new(name, alias))
    }
}

// ---------------------------------------------------------------------------
// Stored artifact version
// ---------------------------------------------------------------------------

/// A file attached to an artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactFile {
    /// File name inside the artifact (no directories).
    pub name: String,
    pub size_bytes: u64,
    /// Lowercase hex SHA-256 of the file contents.
    pub sha256: String,
}

/// Handle to one stored version of an artifact.
///
/// `aliases` is a local copy: mutating it has no effect until the owning run
/// client persists it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactRef {
    pub id: Uuid,
    pub name: String,
    pub artifact_type: String,
    #[serde(default)]
    pub description: String,
    /// Version tag, `v0`, `v1`, ...
    pub version: String,
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub aliases: AliasSet,
    #[serde(default)]
    pub files: Vec<ArtifactFile>,
    /// Run that submitted this version.
    pub run_id: Uuid,
    pub created_at_utc: DateTime<Utc>,
}

impl ArtifactRef {
    /// `name:vN`
    pub fn qualified_name(&self) -> String {
        format!("{}:{}", self.name, self.version)
    }

    pub fn version_index(&self) -> Result<u64, VersionParseError> {
        parse_version_tag(&self.version)
    }

    pub fn has_alias(&self, alias: &str) -> bool {
        self.aliases.contains(alias)
    }
}

// ---------------------------------------------------------------------------
// Version tags
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("malformed version tag '{0}'. expected v<N>")]
pub struct VersionParseError(pub String);

/// Parse `v3` into `3`.
pub fn parse_version_tag(tag: &str) -> Result<u64, VersionParseError> {
    let digits = tag
        .strip_prefix('v')
        .ok_or_else(|| VersionParseError(tag.to_string()))?;
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(VersionParseError(tag.to_string()));
    }
    digits
        .parse::<u64>()
        .map_err(|_| VersionParseError(tag.to_string()))
}

pub fn version_tag(index: u64) -> String {
    format!("v{index}")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn query_parse_and_display() {
        let q: ArtifactQuery = "resnet:production".parse().unwrap();
        assert_eq!(q, ArtifactQuery::new("resnet", "production"));
        assert_eq!(q.to_string(), "resnet:production");

        let bare: ArtifactQuery = "resnet".parse().unwrap();
        assert_eq!(bare.alias, LATEST_ALIAS);

        assert!("resnet:".parse::<ArtifactQuery>().is_err());
        assert!(":prod".parse::<ArtifactQuery>().is_err());
    }

    #[test]
    fn version_tags() {
        assert_eq!(parse_version_tag("v0").unwrap(), 0);
        assert_eq!(parse_version_tag("v3").unwrap(), 3);
        assert_eq!(parse_version_tag("v120").unwrap(), 120);
        assert!(parse_version_tag("3").is_err());
        assert!(parse_version_tag("v").is_err());
        assert!(parse_version_tag("v-1").is_err());
        assert!(parse_version_tag("latest").is_err());
        assert_eq!(version_tag(7), "v7");
    }

    #[test]
    fn version_query_detection() {
        assert!(ArtifactQuery::new("m", "v2").is_version_tag());
        assert!(!ArtifactQuery::new("m", "production").is_version_tag());
    }
}
