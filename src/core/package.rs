//! Package archiving.
//!
//! Bundles the build artifact (and optionally the source tree) into a zip
//! archive with a SHA-256 digest computed over the final archive bytes.
//! Archives are deterministic: stable member ordering, fixed timestamps
//! and permissions, so repeated builds of unchanged input produce
//! byte-identical packages.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use sha2::{Digest, Sha256};
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::build::{BuildArtifact, SKIP_DIRS};
use crate::error::{Error, Result};

/// The deployable bundle produced from a build artifact.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Package {
    pub path: PathBuf,
    /// Lowercase hex SHA-256 of the archive bytes.
    pub digest: String,
    pub includes_source: bool,
}

/// Default package output path for a named package.
pub fn default_package_path(source_dir: &Path, package_name: &str) -> PathBuf {
    source_dir.join("pkg").join(format!("{}.zip", package_name))
}

/// Archive the artifact into `pkg/<name>.zip` under the source directory.
pub fn pack(
    artifact: &BuildArtifact,
    source_dir: &Path,
    package_name: &str,
    include_source: bool,
) -> Result<Package> {
    let out_path = default_package_path(source_dir, package_name);
    let archive_fail =
        |e: String| Error::package_archive_failed(out_path.display().to_string(), e);

    let bytes = write_archive(artifact, source_dir, include_source)
        .map_err(|e| archive_fail(e.to_string()))?;

    let digest = sha256_hex(&bytes);

    if let Some(parent) = out_path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| archive_fail(e.to_string()))?;
    }
    std::fs::write(&out_path, &bytes).map_err(|e| archive_fail(e.to_string()))?;

    log_status!(
        "pack",
        "Wrote {} ({} bytes, sha256 {})",
        out_path.display(),
        bytes.len(),
        &digest[..12]
    );

    Ok(Package {
        path: out_path,
        digest,
        includes_source: include_source,
    })
}

fn write_archive(
    artifact: &BuildArtifact,
    source_dir: &Path,
    include_source: bool,
) -> std::result::Result<Vec<u8>, Box<dyn std::error::Error>> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    // Fixed timestamp and permissions keep repeated packs byte-identical.
    let options = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default())
        .unix_permissions(0o644);

    let artifact_name = artifact
        .path
        .file_name()
        .and_then(|n| n.to_str())
        .ok_or("artifact path has no file name")?;

    let mut members: Vec<(String, PathBuf)> = Vec::new();
    members.push((format!("bin/{}", artifact_name), artifact.path.clone()));

    if include_source {
        let mut sources = Vec::new();
        collect_source_files(source_dir, source_dir, &mut sources)?;
        for rel in sources {
            let name = format!("src/{}", zip_member_name(&rel));
            members.push((name, source_dir.join(&rel)));
        }
    }

    members.sort_by(|a, b| a.0.cmp(&b.0));

    for (name, path) in members {
        let contents = std::fs::read(&path)?;
        writer.start_file(name, options)?;
        writer.write_all(&contents)?;
    }

    let cursor = writer.finish()?;
    Ok(cursor.into_inner())
}

/// Relative paths use forward slashes inside the archive on every platform.
fn zip_member_name(rel: &Path) -> String {
    rel.components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

fn collect_source_files(
    root: &Path,
    dir: &Path,
    out: &mut Vec<PathBuf>,
) -> std::io::Result<()> {
    for entry in std::fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        let name = entry.file_name();
        let name = name.to_string_lossy();

        if name.starts_with('.') || SKIP_DIRS.contains(&name.as_ref()) {
            continue;
        }

        if path.is_dir() {
            collect_source_files(root, &path, out)?;
        } else if let Ok(rel) = path.strip_prefix(root) {
            out.push(rel.to_path_buf());
        }
    }
    Ok(())
}

/// Digest an existing package file, for deploys of prebuilt bundles.
pub fn digest_file(path: &Path) -> Result<String> {
    let bytes = std::fs::read(path).map_err(|e| {
        Error::internal_io(e.to_string(), Some(format!("read {}", path.display())))
    })?;
    Ok(sha256_hex(&bytes))
}

fn sha256_hex(bytes: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fixture(dir: &TempDir) -> BuildArtifact {
        let source = dir.path();
        std::fs::write(source.join("roadie.toml"), "name = \"edge-app\"\n").unwrap();
        std::fs::write(source.join("main.rs"), "fn main() {}\n").unwrap();
        std::fs::create_dir_all(source.join("target")).unwrap();
        std::fs::write(source.join("target").join("app.wasm"), b"wasm-bytes").unwrap();

        BuildArtifact {
            path: source.join("target").join("app.wasm"),
            size_bytes: 10,
            exit_code: 0,
        }
    }

    #[test]
    fn packing_twice_is_byte_identical() {
        let dir = TempDir::new().unwrap();
        let artifact = fixture(&dir);

        let first = pack(&artifact, dir.path(), "edge-app", true).unwrap();
        let first_bytes = std::fs::read(&first.path).unwrap();

        let second = pack(&artifact, dir.path(), "edge-app", true).unwrap();
        let second_bytes = std::fs::read(&second.path).unwrap();

        assert_eq!(first_bytes, second_bytes);
        assert_eq!(first.digest, second.digest);
    }

    #[test]
    fn digest_covers_the_archive_bytes() {
        let dir = TempDir::new().unwrap();
        let artifact = fixture(&dir);

        let package = pack(&artifact, dir.path(), "edge-app", false).unwrap();
        let bytes = std::fs::read(&package.path).unwrap();
        assert_eq!(package.digest, sha256_hex(&bytes));
        assert_eq!(package.digest.len(), 64);
    }

    #[test]
    fn source_tree_is_included_on_request() {
        let dir = TempDir::new().unwrap();
        let artifact = fixture(&dir);

        let package = pack(&artifact, dir.path(), "edge-app", true).unwrap();
        assert!(package.includes_source);

        let file = std::fs::File::open(&package.path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();

        assert!(names.contains(&"bin/app.wasm".to_string()));
        assert!(names.contains(&"src/main.rs".to_string()));
        assert!(names.contains(&"src/roadie.toml".to_string()));
        // Build output never leaks into the source half of the archive.
        assert!(!names.iter().any(|n| n.starts_with("src/target/")));
    }

    #[test]
    fn artifact_only_without_source() {
        let dir = TempDir::new().unwrap();
        let artifact = fixture(&dir);

        let package = pack(&artifact, dir.path(), "edge-app", false).unwrap();
        let file = std::fs::File::open(&package.path).unwrap();
        let archive = zip::ZipArchive::new(file).unwrap();
        assert_eq!(archive.len(), 1);
    }

    #[test]
    fn members_are_sorted_for_determinism() {
        let dir = TempDir::new().unwrap();
        let artifact = fixture(&dir);
        std::fs::write(dir.path().join("zz.rs"), "// z\n").unwrap();
        std::fs::write(dir.path().join("aa.rs"), "// a\n").unwrap();

        let package = pack(&artifact, dir.path(), "edge-app", true).unwrap();
        let file = std::fs::File::open(&package.path).unwrap();
        let mut archive = zip::ZipArchive::new(file).unwrap();
        let names: Vec<String> = (0..archive.len())
            .map(|i| archive.by_index(i).unwrap().name().to_string())
            .collect();

        let mut sorted = names.clone();
        sorted.sort();
        assert_eq!(names, sorted);
    }
}
