//! Service version resolution.
//!
//! Maps a caller-supplied selector onto the remote service's version
//! directory and decides whether the selected version must be cloned
//! before it can be mutated. Remote version state is authoritative, so
//! resolution re-runs on every mutating command instead of being cached.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::api::VersionDirectory;
use crate::error::{Error, Result};

/// Caller-supplied choice of service version.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum VersionSelector {
    #[default]
    Latest,
    Active,
    Number(u64),
}

impl fmt::Display for VersionSelector {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            VersionSelector::Latest => f.write_str("latest"),
            VersionSelector::Active => f.write_str("active"),
            VersionSelector::Number(n) => write!(f, "{}", n),
        }
    }
}

impl std::str::FromStr for VersionSelector {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "latest" => Ok(VersionSelector::Latest),
            "active" => Ok(VersionSelector::Active),
            other => other.parse::<u64>().map(VersionSelector::Number).map_err(|_| {
                Error::validation_invalid_argument(
                    "version",
                    "Version must be 'latest', 'active', or a number",
                    Some(other.to_string()),
                    None,
                )
            }),
        }
    }
}

/// Snapshot of one remote service version. Read and compared, never
/// mutated locally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteVersion {
    pub number: u64,
    pub active: bool,
    pub locked: bool,
}

impl RemoteVersion {
    /// A version that is locked or active cannot be edited in place.
    pub fn is_editable(&self) -> bool {
        !self.locked && !self.active
    }
}

/// The version a mutating operation will target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedVersion {
    pub number: u64,
    pub was_cloned: bool,
}

/// Select the operative version from a directory snapshot.
///
/// This is the pure first phase of resolution: it never clones and never
/// checks editability, so the selected entry's number is always returned
/// unchanged. `resolve` layers the mutation rules on top.
pub fn select<'a>(
    selector: &VersionSelector,
    versions: &'a [RemoteVersion],
    service_id: &str,
) -> Result<&'a RemoteVersion> {
    let found = match selector {
        VersionSelector::Latest => versions.iter().max_by_key(|v| v.number),
        VersionSelector::Active => versions.iter().find(|v| v.active),
        VersionSelector::Number(n) => versions.iter().find(|v| v.number == *n),
    };

    found.ok_or_else(|| Error::version_not_found(service_id, selector.to_string()))
}

/// Resolve the selector against the remote directory for a mutating
/// operation.
///
/// If the selected version is not editable: clone it when
/// `autoclone_allowed`, otherwise fail. The clone's number is returned
/// with `was_cloned = true`.
pub fn resolve(
    directory: &dyn VersionDirectory,
    service_id: &str,
    selector: &VersionSelector,
    autoclone_allowed: bool,
) -> Result<ResolvedVersion> {
    let versions = directory.list_versions(service_id)?;
    let selected = select(selector, &versions, service_id)?;

    if selected.is_editable() {
        return Ok(ResolvedVersion {
            number: selected.number,
            was_cloned: false,
        });
    }

    if !autoclone_allowed {
        return Err(Error::version_not_editable(service_id, selected.number));
    }

    let clone = directory.clone_version(service_id, selected.number)?;
    log_status!(
        "deploy",
        "Cloned locked version {} to editable version {}",
        selected.number,
        clone.number
    );

    Ok(ResolvedVersion {
        number: clone.number,
        was_cloned: true,
    })
}
