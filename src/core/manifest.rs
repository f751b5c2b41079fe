//! Package manifest (`roadie.toml`) loading.
//!
//! The manifest is read once at pipeline start and is read-only for the
//! rest of the invocation. Its absence is a hard error for any operation
//! that needs package metadata.

use std::fmt;
use std::path::Path;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

pub const MANIFEST_FILENAME: &str = "roadie.toml";

/// Source languages with a supported toolchain driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    AssemblyScript,
    JavaScript,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Language::Rust => "rust",
            Language::AssemblyScript => "assemblyscript",
            Language::JavaScript => "javascript",
        }
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Language {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "rust" => Ok(Language::Rust),
            "assemblyscript" => Ok(Language::AssemblyScript),
            "javascript" | "js" => Ok(Language::JavaScript),
            other => Err(Error::validation_invalid_argument(
                "language",
                format!("Unsupported language: {}", other),
                Some(other.to_string()),
                Some(vec![
                    "rust".to_string(),
                    "assemblyscript".to_string(),
                    "javascript".to_string(),
                ]),
            )),
        }
    }
}

/// Declared pipeline defaults, overridable per command invocation.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct ManifestDefaults {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend_port: Option<u16>,
    /// Build timeout in seconds.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
}

/// Local package metadata. Immutable once loaded.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct Manifest {
    pub name: String,
    pub language: Language,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_id: Option<String>,
    #[serde(default)]
    pub defaults: ManifestDefaults,
}

impl Manifest {
    /// Load the manifest from `dir/roadie.toml`.
    pub fn load(dir: &Path) -> Result<Self> {
        let path = dir.join(MANIFEST_FILENAME);
        if !path.exists() {
            return Err(Error::manifest_missing(path.display().to_string()));
        }

        let content = std::fs::read_to_string(&path).map_err(|e| {
            Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
        })?;

        let manifest: Manifest = toml::from_str(&content)
            .map_err(|e| Error::manifest_invalid(path.display().to_string(), e.to_string()))?;

        manifest.validate(&path)?;
        Ok(manifest)
    }

    fn validate(&self, path: &Path) -> Result<()> {
        let name_re = Regex::new(r"^[A-Za-z0-9][A-Za-z0-9_-]*$").unwrap();
        if !name_re.is_match(&self.name) {
            return Err(Error::manifest_invalid(
                path.display().to_string(),
                format!(
                    "Package name '{}' must be alphanumeric with '-' or '_'",
                    self.name
                ),
            ));
        }
        Ok(())
    }

    /// The service the package publishes to. Required for deploy-phase
    /// operations; build-only invocations never call this.
    pub fn require_service_id(&self) -> Result<&str> {
        self.service_id.as_deref().ok_or_else(|| {
            Error::config_missing_key(
                "service_id",
                Some(MANIFEST_FILENAME.to_string()),
            )
            .with_hint("Add service_id = \"<id>\" to roadie.toml")
        })
    }
}
