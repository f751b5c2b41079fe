use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    ConfigMissingKey,

    ValidationInvalidArgument,

    ManifestMissing,
    ManifestInvalid,

    VersionNotFound,
    VersionNotEditable,

    ToolchainNotFound,
    ToolchainTimeout,
    ToolchainFailed,
    BuildArtifactMissing,

    PackageArchiveFailed,

    DeployDomainConflict,
    DeployUploadFailed,
    DeployActivationFailed,

    RemoteUnavailable,
    RemoteRequestFailed,

    InternalIoError,
    InternalJsonError,
    InternalUnexpected,
}

impl ErrorCode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ConfigMissingKey => "config.missing_key",

            ErrorCode::ValidationInvalidArgument => "validation.invalid_argument",

            ErrorCode::ManifestMissing => "manifest.missing",
            ErrorCode::ManifestInvalid => "manifest.invalid",

            ErrorCode::VersionNotFound => "version.not_found",
            ErrorCode::VersionNotEditable => "version.not_editable",

            ErrorCode::ToolchainNotFound => "toolchain.not_found",
            ErrorCode::ToolchainTimeout => "toolchain.timeout",
            ErrorCode::ToolchainFailed => "toolchain.failed",
            ErrorCode::BuildArtifactMissing => "build.artifact_missing",

            ErrorCode::PackageArchiveFailed => "package.archive_failed",

            ErrorCode::DeployDomainConflict => "deploy.domain_conflict",
            ErrorCode::DeployUploadFailed => "deploy.upload_failed",
            ErrorCode::DeployActivationFailed => "deploy.activation_failed",

            ErrorCode::RemoteUnavailable => "remote.unavailable",
            ErrorCode::RemoteRequestFailed => "remote.request_failed",

            ErrorCode::InternalIoError => "internal.io_error",
            ErrorCode::InternalJsonError => "internal.json_error",
            ErrorCode::InternalUnexpected => "internal.unexpected",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Hint {
    pub message: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidArgumentDetails {
    pub field: String,
    pub problem: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub value: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tried: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolchainFailedDetails {
    pub command: String,
    pub exit_code: i32,
    pub stderr_tail: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteRequestDetails {
    pub method: String,
    pub endpoint: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,
    pub error: String,
}

#[derive(Debug, Clone)]
pub struct Error {
    pub code: ErrorCode,
    pub message: String,
    pub details: Value,
    pub hints: Vec<Hint>,
    pub retryable: Option<bool>,
}

pub type Result<T> = std::result::Result<T, Error>;

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for Error {}

impl Error {
    pub fn new(code: ErrorCode, message: impl Into<String>, details: Value) -> Self {
        Self {
            code,
            message: message.into(),
            details,
            hints: Vec::new(),
            retryable: None,
        }
    }

    pub fn validation_invalid_argument(
        field: impl Into<String>,
        problem: impl Into<String>,
        value: Option<String>,
        tried: Option<Vec<String>>,
    ) -> Self {
        let details = serde_json::to_value(InvalidArgumentDetails {
            field: field.into(),
            problem: problem.into(),
            value,
            tried,
        })
        .unwrap_or_else(|_| Value::Object(serde_json::Map::new()));

        Self::new(
            ErrorCode::ValidationInvalidArgument,
            "Invalid argument",
            details,
        )
    }

    pub fn config_missing_key(key: impl Into<String>, context: Option<String>) -> Self {
        let key = key.into();
        let details = serde_json::json!({ "key": key, "context": context });
        Self::new(
            ErrorCode::ConfigMissingKey,
            format!("Missing required configuration: {}", key),
            details,
        )
    }

    pub fn manifest_missing(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::ManifestMissing,
            "Package manifest not found",
            serde_json::json!({ "path": path }),
        )
        .with_hint("Run this command from a package directory containing roadie.toml")
    }

    pub fn manifest_invalid(path: impl Into<String>, problem: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::ManifestInvalid,
            "Invalid package manifest",
            serde_json::json!({ "path": path.into(), "problem": problem.into() }),
        )
    }

    pub fn version_not_found(service_id: impl Into<String>, selector: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::VersionNotFound,
            "Service version not found",
            serde_json::json!({ "serviceId": service_id.into(), "selector": selector.into() }),
        )
    }

    pub fn version_not_editable(service_id: impl Into<String>, number: u64) -> Self {
        Self::new(
            ErrorCode::VersionNotEditable,
            format!("Service version {} is locked or active and cannot be edited", number),
            serde_json::json!({ "serviceId": service_id.into(), "number": number }),
        )
        .with_hint("Pass --autoclone to copy it into a new editable version")
    }

    pub fn toolchain_not_found(command: impl Into<String>, error: impl Into<String>) -> Self {
        let command = command.into();
        Self::new(
            ErrorCode::ToolchainNotFound,
            format!("Toolchain not found: {}", command),
            serde_json::json!({ "command": command, "error": error.into() }),
        )
        .with_hint("Check that the toolchain is installed and in PATH")
    }

    pub fn toolchain_timeout(command: impl Into<String>, timeout_secs: u64) -> Self {
        Self::new(
            ErrorCode::ToolchainTimeout,
            format!("Build timed out after {}s", timeout_secs),
            serde_json::json!({ "command": command.into(), "timeoutSecs": timeout_secs }),
        )
        .with_hint("Raise the limit with --timeout <seconds>")
    }

    pub fn toolchain_failed(details: ToolchainFailedDetails) -> Self {
        let message = format!("Build failed (exit code {})", details.exit_code);
        let details =
            serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(ErrorCode::ToolchainFailed, message, details)
    }

    pub fn build_artifact_missing(path: impl Into<String>) -> Self {
        let path = path.into();
        Self::new(
            ErrorCode::BuildArtifactMissing,
            "Toolchain reported success but produced no artifact",
            serde_json::json!({ "path": path }),
        )
    }

    pub fn package_archive_failed(path: impl Into<String>, error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::PackageArchiveFailed,
            "Failed to write package archive",
            serde_json::json!({ "path": path.into(), "error": error.into() }),
        )
    }

    pub fn deploy_domain_conflict(
        resource: impl Into<String>,
        name: impl Into<String>,
        problem: impl Into<String>,
    ) -> Self {
        let name = name.into();
        Self::new(
            ErrorCode::DeployDomainConflict,
            format!("Conflicting definition for '{}'", name),
            serde_json::json!({
                "resource": resource.into(),
                "name": name,
                "problem": problem.into(),
            }),
        )
    }

    pub fn deploy_upload_failed(version: u64, error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::DeployUploadFailed,
            "Package upload failed",
            serde_json::json!({ "version": version, "error": error.into() }),
        )
    }

    pub fn deploy_activation_failed(version: u64, error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::DeployActivationFailed,
            format!("Failed to activate version {}", version),
            serde_json::json!({ "version": version, "error": error.into() }),
        )
    }

    pub fn remote_unavailable(details: RemoteRequestDetails) -> Self {
        let message = format!("Remote API unreachable: {}", details.error);
        let details =
            serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(ErrorCode::RemoteUnavailable, message, details).retryable(true)
    }

    pub fn remote_request_failed(details: RemoteRequestDetails) -> Self {
        let message = match details.status {
            Some(status) => format!("Remote API error: HTTP {}", status),
            None => format!("Remote API error: {}", details.error),
        };
        let details =
            serde_json::to_value(details).unwrap_or_else(|_| Value::Object(serde_json::Map::new()));
        Self::new(ErrorCode::RemoteRequestFailed, message, details)
    }

    pub fn internal_io(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalIoError,
            "IO error",
            serde_json::json!({ "error": error.into(), "context": context }),
        )
    }

    pub fn internal_json(error: impl Into<String>, context: Option<String>) -> Self {
        Self::new(
            ErrorCode::InternalJsonError,
            "JSON error",
            serde_json::json!({ "error": error.into(), "context": context }),
        )
    }

    pub fn internal_unexpected(error: impl Into<String>) -> Self {
        Self::new(
            ErrorCode::InternalUnexpected,
            "Unexpected error",
            serde_json::json!({ "error": error.into() }),
        )
    }

    pub fn with_hint(mut self, message: impl Into<String>) -> Self {
        self.hints.push(Hint {
            message: message.into(),
        });
        self
    }

    /// Attach an extra key to the details object. No-op if details is not an object.
    pub fn with_detail(mut self, key: impl Into<String>, value: Value) -> Self {
        if let Value::Object(map) = &mut self.details {
            map.insert(key.into(), value);
        }
        self
    }

    pub fn retryable(mut self, retryable: bool) -> Self {
        self.retryable = Some(retryable);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn codes_are_dotted_and_stable() {
        assert_eq!(ErrorCode::VersionNotEditable.as_str(), "version.not_editable");
        assert_eq!(ErrorCode::ToolchainTimeout.as_str(), "toolchain.timeout");
        assert_eq!(ErrorCode::DeployDomainConflict.as_str(), "deploy.domain_conflict");
    }

    #[test]
    fn remote_unavailable_is_retryable() {
        let err = Error::remote_unavailable(RemoteRequestDetails {
            method: "GET".to_string(),
            endpoint: "/service/x/version".to_string(),
            status: None,
            error: "connection refused".to_string(),
        });
        assert_eq!(err.retryable, Some(true));
    }

    #[test]
    fn with_detail_extends_object_details() {
        let err = Error::deploy_upload_failed(3, "boom")
            .with_detail("lastCompletedStage", serde_json::json!("backend_ensured"));
        assert_eq!(
            err.details.get("lastCompletedStage").and_then(|v| v.as_str()),
            Some("backend_ensured")
        );
    }
}
