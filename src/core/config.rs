//! Pipeline configuration: the `OptionalField` wrapper, the Builder and
//! Deployer configuration structs, and the pure merge functions that apply
//! command-level overrides before any execution begins.

use std::path::PathBuf;

use serde::Serialize;

use crate::manifest::{Language, Manifest};
use crate::version::VersionSelector;

/// Default wall-clock limit for a toolchain invocation, in seconds.
pub const DEFAULT_BUILD_TIMEOUT_SECS: u64 = 600;

/// A configuration value that knows whether the user supplied it.
///
/// Distinguishes "unset" from "set to the zero value", which nullable
/// primitives cannot. Override merging only copies fields with
/// `was_set == true`.
#[derive(Debug, Clone, Default)]
pub struct OptionalField<T> {
    value: T,
    was_set: bool,
}

impl<T> OptionalField<T> {
    pub fn set(value: T) -> Self {
        Self {
            value,
            was_set: true,
        }
    }

    pub fn was_set(&self) -> bool {
        self.was_set
    }

    pub fn value(&self) -> &T {
        &self.value
    }
}

impl<T: Default> From<Option<T>> for OptionalField<T> {
    fn from(opt: Option<T>) -> Self {
        match opt {
            Some(value) => Self::set(value),
            None => Self::default(),
        }
    }
}

/// A named origin server definition on a service version.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BackendSpec {
    pub name: String,
    pub address: String,
    pub port: u16,
}

impl BackendSpec {
    /// Backends are named after their address unless configured otherwise.
    pub fn from_address(address: impl Into<String>, port: u16) -> Self {
        let address = address.into();
        Self {
            name: address.clone(),
            address,
            port,
        }
    }
}

/// Builder configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct BuildConfig {
    /// Source tree to compile; also where the manifest was loaded from.
    pub source_dir: PathBuf,
    /// Language override; defaults to the manifest's declared language.
    pub language: Option<Language>,
    /// Raw shell command override replacing the language driver entirely.
    pub command: Option<String>,
    /// Expected artifact path override, relative to `source_dir`.
    pub artifact: Option<PathBuf>,
    pub timeout_secs: u64,
    /// Rebuild even when the artifact is newer than every source file.
    pub force: bool,
}

impl BuildConfig {
    pub fn from_manifest(manifest: &Manifest, source_dir: PathBuf) -> Self {
        Self {
            source_dir,
            language: None,
            command: None,
            artifact: None,
            timeout_secs: manifest.defaults.timeout.unwrap_or(DEFAULT_BUILD_TIMEOUT_SECS),
            force: false,
        }
    }
}

/// Deployer configuration for one pipeline run.
#[derive(Debug, Clone)]
pub struct DeployConfig {
    pub service_id: String,
    pub selector: VersionSelector,
    pub autoclone: bool,
    pub domain: Option<String>,
    pub backend: Option<BackendSpec>,
    pub activate: bool,
    /// Package path or glob; defaults to the Packager's output location.
    pub package: Option<String>,
}

impl DeployConfig {
    pub fn from_manifest(manifest: &Manifest, service_id: String) -> Self {
        let backend = manifest.defaults.backend.as_ref().map(|address| {
            BackendSpec::from_address(
                address.clone(),
                manifest.defaults.backend_port.unwrap_or(80),
            )
        });
        Self {
            service_id,
            selector: VersionSelector::Latest,
            autoclone: false,
            domain: manifest.defaults.domain.clone(),
            backend,
            activate: true,
            package: None,
        }
    }
}

/// Command-level overrides for the publish pipeline.
///
/// Every field records whether the user explicitly set it; unset fields
/// leave the underlying Builder/Deployer configuration untouched.
#[derive(Debug, Clone, Default)]
pub struct PublishOverrides {
    // Build fields
    pub language: OptionalField<Option<Language>>,
    pub command: OptionalField<Option<String>>,
    pub timeout_secs: OptionalField<u64>,
    pub force: OptionalField<bool>,
    pub include_source: OptionalField<bool>,

    // Deploy fields
    pub selector: OptionalField<VersionSelector>,
    pub autoclone: OptionalField<bool>,
    pub domain: OptionalField<Option<String>>,
    pub backend: OptionalField<Option<String>>,
    pub backend_port: OptionalField<u16>,
    pub activate: OptionalField<bool>,
    pub package: OptionalField<Option<String>>,
}

/// Apply explicitly-set build overrides to a base configuration.
///
/// Pure: takes the base by value, returns the merged struct. Runs before
/// any pipeline side effects.
pub fn merged_build(base: BuildConfig, overrides: &PublishOverrides) -> BuildConfig {
    let mut merged = base;
    if overrides.language.was_set() {
        merged.language = overrides.language.value().clone();
    }
    if overrides.command.was_set() {
        merged.command = overrides.command.value().clone();
    }
    if overrides.timeout_secs.was_set() {
        merged.timeout_secs = *overrides.timeout_secs.value();
    }
    if overrides.force.was_set() {
        merged.force = *overrides.force.value();
    }
    merged
}

/// Apply explicitly-set deploy overrides to a base configuration.
pub fn merged_deploy(base: DeployConfig, overrides: &PublishOverrides) -> DeployConfig {
    let mut merged = base;
    if overrides.selector.was_set() {
        merged.selector = overrides.selector.value().clone();
    }
    if overrides.autoclone.was_set() {
        merged.autoclone = *overrides.autoclone.value();
    }
    if overrides.domain.was_set() {
        merged.domain = overrides.domain.value().clone();
    }
    if overrides.backend.was_set() {
        let port = if overrides.backend_port.was_set() {
            *overrides.backend_port.value()
        } else {
            merged.backend.as_ref().map(|b| b.port).unwrap_or(80)
        };
        merged.backend = overrides
            .backend
            .value()
            .as_ref()
            .map(|address| BackendSpec::from_address(address.clone(), port));
    } else if overrides.backend_port.was_set() {
        if let Some(backend) = &mut merged.backend {
            backend.port = *overrides.backend_port.value();
        }
    }
    if overrides.activate.was_set() {
        merged.activate = *overrides.activate.value();
    }
    if overrides.package.was_set() {
        merged.package = overrides.package.value().clone();
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_build() -> BuildConfig {
        BuildConfig {
            source_dir: PathBuf::from("/src/app"),
            language: Some(Language::Rust),
            command: None,
            artifact: None,
            timeout_secs: DEFAULT_BUILD_TIMEOUT_SECS,
            force: false,
        }
    }

    fn base_deploy() -> DeployConfig {
        DeployConfig {
            service_id: "svc1".to_string(),
            selector: VersionSelector::Latest,
            autoclone: false,
            domain: Some("app.example.com".to_string()),
            backend: Some(BackendSpec::from_address("origin.example.com", 443)),
            activate: true,
            package: None,
        }
    }

    #[test]
    fn optional_field_distinguishes_set_from_default() {
        let unset: OptionalField<bool> = OptionalField::default();
        assert!(!unset.was_set());

        let set_to_zero = OptionalField::set(false);
        assert!(set_to_zero.was_set());
        assert!(!*set_to_zero.value());
    }

    #[test]
    fn merge_leaves_unset_fields_untouched() {
        let merged = merged_build(base_build(), &PublishOverrides::default());
        assert_eq!(merged.timeout_secs, DEFAULT_BUILD_TIMEOUT_SECS);
        assert_eq!(merged.language, Some(Language::Rust));
        assert!(!merged.force);

        let merged = merged_deploy(base_deploy(), &PublishOverrides::default());
        assert_eq!(merged.domain.as_deref(), Some("app.example.com"));
        assert!(merged.activate);
    }

    #[test]
    fn merge_applies_only_explicitly_set_fields() {
        let overrides = PublishOverrides {
            timeout_secs: OptionalField::set(120),
            ..Default::default()
        };

        let merged = merged_build(base_build(), &overrides);
        assert_eq!(merged.timeout_secs, 120);

        // Everything else matches the base exactly.
        let base = base_build();
        assert_eq!(merged.language, base.language);
        assert_eq!(merged.command, base.command);
        assert_eq!(merged.force, base.force);
        assert_eq!(merged.source_dir, base.source_dir);
    }

    #[test]
    fn merge_can_set_a_field_to_its_zero_value() {
        let overrides = PublishOverrides {
            activate: OptionalField::set(false),
            ..Default::default()
        };
        let merged = merged_deploy(base_deploy(), &overrides);
        assert!(!merged.activate);
    }

    #[test]
    fn backend_port_override_updates_existing_backend() {
        let overrides = PublishOverrides {
            backend_port: OptionalField::set(8443),
            ..Default::default()
        };
        let merged = merged_deploy(base_deploy(), &overrides);
        assert_eq!(merged.backend.unwrap().port, 8443);
    }

    #[test]
    fn backend_override_builds_new_spec_with_port() {
        let overrides = PublishOverrides {
            backend: OptionalField::set(Some("other.example.com".to_string())),
            backend_port: OptionalField::set(9000),
            ..Default::default()
        };
        let merged = merged_deploy(base_deploy(), &overrides);
        let backend = merged.backend.unwrap();
        assert_eq!(backend.address, "other.example.com");
        assert_eq!(backend.name, "other.example.com");
        assert_eq!(backend.port, 9000);
    }
}
