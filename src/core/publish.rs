//! Publish orchestration: build, pack, and deploy as one fail-fast run.
//!
//! Command-level overrides are folded into the Builder/Deployer
//! configurations by pure merge functions before anything executes. The
//! build half runs to completion first; only on success does the deploy
//! half touch the remote service.

use std::path::Path;

use serde::Serialize;

use crate::api::{ResourceApi, VersionDirectory};
use crate::build::{self, BuildArtifact};
use crate::config::{self, BuildConfig, DeployConfig, PublishOverrides};
use crate::deploy::{self, DeployOutcome};
use crate::error::{Error, Result};
use crate::manifest::Manifest;
use crate::package::{self, Package};
use crate::version::{self, ResolvedVersion};

/// Result of a full publish run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishOutcome {
    pub name: String,
    pub build: BuildArtifact,
    pub package: Package,
    pub deploy: DeployOutcome,
}

/// Check that the selected version can be mutated before spending build
/// time. Selection only; no clone happens here. The authoritative
/// resolve (which may clone) runs again immediately before deploy,
/// because other clients can flip the remote lock state in between.
fn preflight_version_check(
    directory: &dyn VersionDirectory,
    deploy_config: &DeployConfig,
) -> Result<()> {
    let versions = directory.list_versions(&deploy_config.service_id)?;
    let selected = version::select(
        &deploy_config.selector,
        &versions,
        &deploy_config.service_id,
    )?;

    if !selected.is_editable() && !deploy_config.autoclone {
        return Err(Error::version_not_editable(
            &deploy_config.service_id,
            selected.number,
        ));
    }

    Ok(())
}

/// Build, pack, and deploy the package in the manifest's source directory.
pub fn publish(
    manifest: &Manifest,
    source_dir: &Path,
    overrides: &PublishOverrides,
    directory: &dyn VersionDirectory,
    resources: &dyn ResourceApi,
) -> Result<PublishOutcome> {
    // Pure configuration merge, before any side effects.
    let build_config = config::merged_build(
        BuildConfig::from_manifest(manifest, source_dir.to_path_buf()),
        overrides,
    );
    let service_id = manifest.require_service_id()?.to_string();
    let deploy_config = config::merged_deploy(
        DeployConfig::from_manifest(manifest, service_id),
        overrides,
    );
    let include_source = overrides.include_source.was_set() && *overrides.include_source.value();

    preflight_version_check(directory, &deploy_config)?;

    log_status!("publish", "Building package '{}'", manifest.name);
    let artifact = build::build(manifest, &build_config)?;

    let package = package::pack(&artifact, source_dir, &manifest.name, include_source)?;

    let resolved = resolve_for_deploy(directory, &deploy_config)?;
    log_status!(
        "publish",
        "Deploying to service {} version {}{}",
        deploy_config.service_id,
        resolved.number,
        if resolved.was_cloned { " (cloned)" } else { "" }
    );

    let deploy = deploy::deploy(directory, resources, &deploy_config, &resolved, &package)?;

    Ok(PublishOutcome {
        name: manifest.name.clone(),
        build: artifact,
        package,
        deploy,
    })
}

/// Resolve the deploy target immediately before use.
pub fn resolve_for_deploy(
    directory: &dyn VersionDirectory,
    deploy_config: &DeployConfig,
) -> Result<ResolvedVersion> {
    version::resolve(
        directory,
        &deploy_config.service_id,
        &deploy_config.selector,
        deploy_config.autoclone,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::fakes::FakeRemote;
    use crate::config::OptionalField;
    use crate::deploy::{DeployStage, EnsureOutcome};
    use crate::error::ErrorCode;
    use crate::manifest::{Language, ManifestDefaults, MANIFEST_FILENAME};
    use crate::version::{RemoteVersion, VersionSelector};
    use tempfile::TempDir;

    fn remote_versions() -> Vec<RemoteVersion> {
        vec![
            RemoteVersion {
                number: 1,
                active: true,
                locked: true,
            },
            RemoteVersion {
                number: 2,
                active: false,
                locked: false,
            },
        ]
    }

    fn manifest() -> Manifest {
        Manifest {
            name: "edge-app".to_string(),
            language: Language::Rust,
            service_id: Some("svc1".to_string()),
            defaults: ManifestDefaults {
                domain: Some("edge-app.example.com".to_string()),
                backend: Some("origin.example.com".to_string()),
                backend_port: Some(443),
                timeout: None,
            },
        }
    }

    fn source_dir() -> TempDir {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            dir.path().join(MANIFEST_FILENAME),
            "name = \"edge-app\"\nlanguage = \"rust\"\nservice_id = \"svc1\"\n",
        )
        .unwrap();
        std::fs::write(dir.path().join("main.rs"), "fn main() {}\n").unwrap();
        dir
    }

    /// Overrides that swap the cargo driver for a shell command usable in
    /// tests, keeping the rest of the pipeline real.
    fn overrides_with_command(command: &str) -> PublishOverrides {
        PublishOverrides {
            command: OptionalField::set(Some(command.to_string())),
            force: OptionalField::set(true),
            ..Default::default()
        }
    }

    const WRITE_WASM: &str =
        "mkdir -p target/wasm32-wasi/release && printf wasm > target/wasm32-wasi/release/edge_app.wasm";

    #[test]
    fn scenario_full_publish_targets_latest_editable_version() {
        let dir = source_dir();
        let remote = FakeRemote::with_versions(remote_versions());

        let outcome = publish(
            &manifest(),
            dir.path(),
            &overrides_with_command(WRITE_WASM),
            &remote,
            &remote,
        )
        .unwrap();

        // Latest maps to the editable version 2, no clone.
        assert_eq!(outcome.deploy.version, 2);
        assert!(!outcome.deploy.was_cloned);
        assert_eq!(outcome.deploy.domain, Some(EnsureOutcome::Created));
        assert_eq!(outcome.deploy.backend, Some(EnsureOutcome::Created));
        assert_eq!(outcome.deploy.last_completed, DeployStage::Activated);
        assert_eq!(remote.uploads().len(), 1);
        assert_eq!(remote.activated(), vec![2]);
        assert!(outcome.package.path.exists());
    }

    #[test]
    fn scenario_locked_version_without_autoclone_fails_before_build() {
        let dir = source_dir();
        let remote = FakeRemote::with_versions(remote_versions());

        let overrides = PublishOverrides {
            selector: OptionalField::set(VersionSelector::Number(1)),
            // Build command would fail loudly if it ever ran.
            command: OptionalField::set(Some("exit 99".to_string())),
            force: OptionalField::set(true),
            ..Default::default()
        };

        let err = publish(&manifest(), dir.path(), &overrides, &remote, &remote).unwrap_err();
        assert_eq!(err.code, ErrorCode::VersionNotEditable);
        // No build output, no package, no remote mutation.
        assert!(!dir.path().join("pkg").exists());
        assert_eq!(remote.resource_calls(), 0);
        assert_eq!(remote.clone_calls(), 0);
    }

    #[test]
    fn scenario_locked_version_with_autoclone_deploys_to_clone() {
        let dir = source_dir();
        let remote = FakeRemote::with_versions(remote_versions());

        let mut overrides = overrides_with_command(WRITE_WASM);
        overrides.selector = OptionalField::set(VersionSelector::Number(1));
        overrides.autoclone = OptionalField::set(true);

        let outcome = publish(&manifest(), dir.path(), &overrides, &remote, &remote).unwrap();
        assert!(outcome.deploy.was_cloned);
        assert_ne!(outcome.deploy.version, 1);
        assert_eq!(remote.clone_calls(), 1);
    }

    #[test]
    fn build_failure_prevents_any_deploy_call() {
        let dir = source_dir();
        let remote = FakeRemote::with_versions(remote_versions());

        let err = publish(
            &manifest(),
            dir.path(),
            &overrides_with_command("echo broken >&2; exit 1"),
            &remote,
            &remote,
        )
        .unwrap_err();

        assert_eq!(err.code, ErrorCode::ToolchainFailed);
        assert_eq!(remote.resource_calls(), 0);
        assert!(remote.activated().is_empty());
    }

    #[test]
    fn scenario_toolchain_timeout_never_reaches_packager() {
        let dir = source_dir();
        let remote = FakeRemote::with_versions(remote_versions());

        let mut overrides = overrides_with_command("sleep 30");
        overrides.timeout_secs = OptionalField::set(1);

        let err = publish(&manifest(), dir.path(), &overrides, &remote, &remote).unwrap_err();
        assert_eq!(err.code, ErrorCode::ToolchainTimeout);
        assert!(!dir.path().join("pkg").exists(), "no package may be written");
        assert_eq!(remote.resource_calls(), 0);
    }

    #[test]
    fn include_source_is_honored_when_explicitly_set() {
        let dir = source_dir();
        let remote = FakeRemote::with_versions(remote_versions());

        let mut overrides = overrides_with_command(WRITE_WASM);
        overrides.include_source = OptionalField::set(true);

        let outcome = publish(&manifest(), dir.path(), &overrides, &remote, &remote).unwrap();
        assert!(outcome.package.includes_source);
    }

    #[test]
    fn missing_service_id_fails_before_any_remote_call() {
        let dir = source_dir();
        let remote = FakeRemote::with_versions(remote_versions());

        let mut m = manifest();
        m.service_id = None;

        let err = publish(
            &m,
            dir.path(),
            &overrides_with_command(WRITE_WASM),
            &remote,
            &remote,
        )
        .unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigMissingKey);
        assert_eq!(remote.total_calls(), 0);
    }
}
