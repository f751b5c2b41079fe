//! Toolchain driver selection.
//!
//! Each supported language maps to an external build tool invocation and
//! the artifact path that tool is expected to produce. An explicit command
//! override in the build configuration always wins.

use std::path::PathBuf;

use crate::config::BuildConfig;
use crate::error::{Error, Result};
use crate::manifest::{Language, Manifest};

/// How the build command was chosen, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolchainSource {
    ConfigCommand,
    LanguageDriver(Language),
}

/// A fully resolved toolchain invocation.
#[derive(Debug, Clone)]
pub struct ResolvedToolchain {
    /// Shell command line, run from the package source directory.
    pub command: String,
    /// Expected artifact path, relative to the source directory.
    pub artifact: PathBuf,
    pub source: ToolchainSource,
}

fn driver_for(language: Language, package_name: &str) -> (String, PathBuf) {
    match language {
        Language::Rust => {
            // Cargo normalizes dashes in artifact file names.
            let bin_name = package_name.replace('-', "_");
            (
                "cargo build --release --target wasm32-wasi".to_string(),
                PathBuf::from(format!("target/wasm32-wasi/release/{}.wasm", bin_name)),
            )
        }
        Language::AssemblyScript => (
            "npm run asbuild".to_string(),
            PathBuf::from("build/optimized.wasm"),
        ),
        Language::JavaScript => (
            "npm run build".to_string(),
            PathBuf::from("bin/main.wasm"),
        ),
    }
}

/// Resolve the toolchain for a build using the following priority:
/// 1. Explicit command override in the build config (always wins)
/// 2. Language override in the build config
/// 3. The manifest's declared language
pub fn resolve_toolchain(manifest: &Manifest, config: &BuildConfig) -> Result<ResolvedToolchain> {
    let language = config.language.unwrap_or(manifest.language);
    let (driver_command, driver_artifact) = driver_for(language, &manifest.name);

    if let Some(command) = &config.command {
        if command.trim().is_empty() {
            return Err(Error::validation_invalid_argument(
                "command",
                "Build command override must not be empty",
                None,
                None,
            ));
        }
        let artifact = config.artifact.clone().unwrap_or(driver_artifact);
        return Ok(ResolvedToolchain {
            command: command.clone(),
            artifact,
            source: ToolchainSource::ConfigCommand,
        });
    }

    let artifact = config.artifact.clone().unwrap_or(driver_artifact);
    Ok(ResolvedToolchain {
        command: driver_command,
        artifact,
        source: ToolchainSource::LanguageDriver(language),
    })
}
