//! Local toolchain invocation.
//!
//! Runs the resolved build tool as an isolated child process under a
//! wall-clock timeout and validates the artifact it claims to produce.
//! Toolchains may misreport success, so the artifact is double-checked
//! for existence and non-zero size even after a zero exit.

use std::path::{Path, PathBuf};
use std::time::{Duration, SystemTime};

use serde::Serialize;

use crate::config::BuildConfig;
use crate::error::{Error, Result, ToolchainFailedDetails};
use crate::manifest::Manifest;
use crate::toolchain::{self, ResolvedToolchain};
use crate::utils::command::{run_with_timeout, shell_command};

/// Directories never scanned for source freshness and never packaged.
pub(crate) const SKIP_DIRS: &[&str] = &["target", "node_modules", "pkg", "build", "bin"];

/// Validated output of one toolchain run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildArtifact {
    pub path: PathBuf,
    pub size_bytes: u64,
    pub exit_code: i32,
}

/// Compile the package, producing a validated artifact.
pub fn build(manifest: &Manifest, config: &BuildConfig) -> Result<BuildArtifact> {
    let resolved = toolchain::resolve_toolchain(manifest, config)?;
    let artifact_path = config.source_dir.join(&resolved.artifact);

    if !config.force && artifact_is_fresh(&artifact_path, &config.source_dir) {
        log_status!(
            "build",
            "Artifact {} is newer than all sources, skipping build (use --force to rebuild)",
            resolved.artifact.display()
        );
        let size_bytes = validate_artifact(&artifact_path)?;
        return Ok(BuildArtifact {
            path: artifact_path,
            size_bytes,
            exit_code: 0,
        });
    }

    run_toolchain(&resolved, config)?;

    let size_bytes = validate_artifact(&artifact_path)?;
    log_status!(
        "build",
        "Built {} ({} bytes)",
        resolved.artifact.display(),
        size_bytes
    );

    Ok(BuildArtifact {
        path: artifact_path,
        size_bytes,
        exit_code: 0,
    })
}

fn run_toolchain(resolved: &ResolvedToolchain, config: &BuildConfig) -> Result<()> {
    log_status!("build", "Running {}", resolved.command);

    let cmd = shell_command(&resolved.command, Some(&config.source_dir));
    let result = run_with_timeout(cmd, Duration::from_secs(config.timeout_secs)).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            Error::toolchain_not_found(resolved.command.clone(), e.to_string())
        } else {
            Error::internal_io(e.to_string(), Some(resolved.command.clone()))
        }
    })?;

    if result.timed_out {
        return Err(Error::toolchain_timeout(
            resolved.command.clone(),
            config.timeout_secs,
        ));
    }

    if !result.success {
        // Shell exit 127 means the toolchain itself was not found.
        if result.exit_code == 127 {
            return Err(Error::toolchain_not_found(
                resolved.command.clone(),
                result.output.error_text().to_string(),
            ));
        }

        let mut err = Error::toolchain_failed(ToolchainFailedDetails {
            command: resolved.command.clone(),
            exit_code: result.exit_code,
            stderr_tail: output_tail(result.output.error_text(), 15),
        });
        if result.exit_code == 126 {
            err = err.with_hint("Permission denied. Check file permissions on the build script");
        }
        return Err(err);
    }

    Ok(())
}

/// Last `lines` lines of toolchain output, for error context.
fn output_tail(text: &str, lines: usize) -> String {
    let tail: Vec<&str> = text.lines().rev().take(lines).collect();
    tail.into_iter().rev().collect::<Vec<_>>().join("\n")
}

fn validate_artifact(path: &Path) -> Result<u64> {
    let metadata = match path.metadata() {
        Ok(m) if m.is_file() => m,
        _ => return Err(Error::build_artifact_missing(path.display().to_string())),
    };

    if metadata.len() == 0 {
        return Err(
            Error::build_artifact_missing(path.display().to_string())
                .with_detail("problem", serde_json::json!("artifact file is empty")),
        );
    }

    Ok(metadata.len())
}

/// Whether the artifact is newer than every file in the source tree.
///
/// Build-output directories are excluded from the scan so the artifact
/// never races against itself.
fn artifact_is_fresh(artifact: &Path, source_dir: &Path) -> bool {
    let artifact_mtime = match artifact.metadata().and_then(|m| m.modified()) {
        Ok(t) => t,
        Err(_) => return false,
    };

    match newest_source_mtime(source_dir) {
        Some(source_mtime) => artifact_mtime >= source_mtime,
        None => false,
    }
}

fn newest_source_mtime(dir: &Path) -> Option<SystemTime> {
    let mut newest: Option<SystemTime> = None;

    let entries = std::fs::read_dir(dir).ok()?;
    for entry in entries.flatten() {
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if name.starts_with('.') || SKIP_DIRS.contains(&name.as_ref()) {
            continue;
        }

        let candidate = if path.is_dir() {
            newest_source_mtime(&path)
        } else {
            entry.metadata().and_then(|m| m.modified()).ok()
        };

        if let Some(t) = candidate {
            if newest.map(|n| t > n).unwrap_or(true) {
                newest = Some(t);
            }
        }
    }

    newest
}
