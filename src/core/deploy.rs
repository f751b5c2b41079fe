//! Deploy pipeline: ensure remote resources, upload the package, activate.
//!
//! One invocation walks a fixed state machine:
//!
//! ```text
//! VersionEnsured -> DomainEnsured -> BackendEnsured -> PackageUploaded
//!               -> (Activated | LeftInactive)
//! ```
//!
//! Each transition makes exactly one remote call and is never retried
//! here. A failure aborts the remaining transitions; already-completed
//! ensure steps are idempotent and left in place. The last completed
//! stage travels with every error so callers know exactly how much remote
//! state was mutated.

use serde::Serialize;

use crate::api::{ResourceApi, VersionDirectory};
use crate::config::{BackendSpec, DeployConfig};
use crate::error::{Error, ErrorCode, Result};
use crate::package::Package;
use crate::version::ResolvedVersion;

/// States of the deploy machine, in order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum DeployStage {
    VersionEnsured,
    DomainEnsured,
    BackendEnsured,
    PackageUploaded,
    Activated,
    LeftInactive,
}

impl DeployStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeployStage::VersionEnsured => "version_ensured",
            DeployStage::DomainEnsured => "domain_ensured",
            DeployStage::BackendEnsured => "backend_ensured",
            DeployStage::PackageUploaded => "package_uploaded",
            DeployStage::Activated => "activated",
            DeployStage::LeftInactive => "left_inactive",
        }
    }
}

/// Result of an idempotent create-if-absent step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EnsureOutcome {
    Created,
    Existing,
}

/// Successful deploy summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeployOutcome {
    pub service_id: String,
    pub version: u64,
    pub was_cloned: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub domain: Option<EnsureOutcome>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub backend: Option<EnsureOutcome>,
    pub package_digest: String,
    pub activated: bool,
    pub last_completed: DeployStage,
}

/// Stamp the last completed stage onto an error leaving the machine.
fn at_stage(err: Error, last_completed: DeployStage) -> Error {
    err.with_detail(
        "lastCompletedStage",
        serde_json::json!(last_completed.as_str()),
    )
}

/// Deploy a package to an already-resolved service version.
///
/// Resolution happens immediately before this call (remote lock state is
/// authoritative and re-checked per invocation), so the resolved version
/// is caller-owned for the duration of the run.
pub fn deploy(
    directory: &dyn VersionDirectory,
    resources: &dyn ResourceApi,
    config: &DeployConfig,
    resolved: &ResolvedVersion,
    package: &Package,
) -> Result<DeployOutcome> {
    let service_id = &config.service_id;
    let version = resolved.number;
    let mut last = DeployStage::VersionEnsured;

    let domain = match &config.domain {
        Some(name) => {
            let outcome = ensure_domain(resources, service_id, version, name)
                .map_err(|e| at_stage(e, last))?;
            log_status!("deploy", "Domain {} {:?} on version {}", name, outcome, version);
            Some(outcome)
        }
        None => None,
    };
    last = DeployStage::DomainEnsured;

    let backend = match &config.backend {
        Some(spec) => {
            let outcome = ensure_backend(resources, service_id, version, spec)
                .map_err(|e| at_stage(e, last))?;
            log_status!(
                "deploy",
                "Backend {} ({}:{}) {:?} on version {}",
                spec.name,
                spec.address,
                spec.port,
                outcome,
                version
            );
            Some(outcome)
        }
        None => None,
    };
    last = DeployStage::BackendEnsured;

    let bytes = std::fs::read(&package.path).map_err(|e| {
        at_stage(
            Error::internal_io(e.to_string(), Some(format!("read {}", package.path.display()))),
            last,
        )
    })?;
    resources
        .upload_package(service_id, version, &bytes)
        .map_err(|e| at_stage(wrap_upload_error(e, version), last))?;
    log_status!("deploy", "Uploaded package ({} bytes) to version {}", bytes.len(), version);
    last = DeployStage::PackageUploaded;

    let (activated, last) = if config.activate {
        directory
            .activate_version(service_id, version)
            .map_err(|e| at_stage(e, last))?;
        log_status!("deploy", "Activated version {}", version);
        (true, DeployStage::Activated)
    } else {
        log_status!("deploy", "Version {} left inactive (--no-activate)", version);
        (false, DeployStage::LeftInactive)
    };

    Ok(DeployOutcome {
        service_id: service_id.clone(),
        version,
        was_cloned: resolved.was_cloned,
        domain,
        backend,
        package_digest: package.digest.clone(),
        activated,
        last_completed: last,
    })
}

/// Create the domain unless a domain with the same name already exists.
fn ensure_domain(
    resources: &dyn ResourceApi,
    service_id: &str,
    version: u64,
    name: &str,
) -> Result<EnsureOutcome> {
    let existing = resources.list_domains(service_id, version)?;
    if existing.iter().any(|d| d.name == name) {
        return Ok(EnsureOutcome::Existing);
    }
    resources.create_domain(service_id, version, name)?;
    Ok(EnsureOutcome::Created)
}

/// Create the backend unless an identical one exists. A backend with the
/// same name but a different address or port is a conflicting definition.
fn ensure_backend(
    resources: &dyn ResourceApi,
    service_id: &str,
    version: u64,
    spec: &BackendSpec,
) -> Result<EnsureOutcome> {
    let existing = resources.list_backends(service_id, version)?;
    if let Some(found) = existing.iter().find(|b| b.name == spec.name) {
        if found.address == spec.address && found.port == spec.port {
            return Ok(EnsureOutcome::Existing);
        }
        return Err(Error::deploy_domain_conflict(
            "backend",
            &spec.name,
            format!(
                "existing backend points at {}:{}, requested {}:{}",
                found.address, found.port, spec.address, spec.port
            ),
        ));
    }
    resources.create_backend(service_id, version, spec)?;
    Ok(EnsureOutcome::Created)
}

fn wrap_upload_error(err: Error, version: u64) -> Error {
    match err.code {
        ErrorCode::RemoteUnavailable | ErrorCode::DeployUploadFailed => err,
        _ => Error::deploy_upload_failed(version, err.message),
    }
}
