//! Manifest generation (spec §4.G steps 1–5): walk a build directory,
//! hash each included file, sort, compute the bundle hash, capture build
//! metadata, and assemble a fresh [`ClientManifest`].

use crate::error::ManifestError;
use crate::model::{BuildMetadata, ClientManifest, FileEntry, SdkVerification, SourceRef};
use crate::{canonical::compute_bundle_hash, mime::guess_mime_type, sdk::detect_sdk_in_file};
use sha2::{Digest, Sha256};
use std::path::Path;
use uuid::Uuid;
use walkdir::WalkDir;

/// Inputs to manifest generation beyond the build directory itself (spec
/// §4.G: "an include/exclude pattern set, a client name, type, and an
/// allowed-egress list").
#[derive(Debug, Clone, Default)]
pub struct GenerateOptions {
    pub name: String,
    pub client_type: String,
    pub version: String,
    /// Glob patterns (relative to the build directory root, `/`-separated)
    /// a file must match to be included. Empty means "include everything".
    pub include: Vec<String>,
    /// Glob patterns that exclude an otherwise-included file.
    pub exclude: Vec<String>,
    pub allowed_egress: Vec<String>,
    pub source: Option<SourceRef>,
    pub api_surface: Option<serde_json::Value>,
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<glob::Pattern>, ManifestError> {
    patterns
        .iter()
        .map(|p| glob::Pattern::new(p).map_err(ManifestError::from))
        .collect()
}

fn relative_slash_path(root: &Path, path: &Path) -> String {
    path.strip_prefix(root)
        .unwrap_or(path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().into_owned())
        .collect::<Vec<_>>()
        .join("/")
}

/// Walks `build_dir`, computing `{path, hash, size, mimeType?}` for every
/// regular file that passes the include/exclude filter (spec §4.G step 1),
/// then sorts (step 2), hashes the bundle (step 3), captures build metadata
/// (step 4), and assembles the manifest with a fresh `manifestId` (step 5).
pub fn generate_manifest(
    build_dir: &Path,
    options: &GenerateOptions,
) -> Result<ClientManifest, ManifestError> {
    let include = compile_patterns(&options.include)?;
    let exclude = compile_patterns(&options.exclude)?;

    let mut files = Vec::new();
    let mut sdk_verification: Option<SdkVerification> = None;
    for entry in WalkDir::new(build_dir).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel_path = relative_slash_path(build_dir, entry.path());

        if !include.is_empty() && !include.iter().any(|p| p.matches(&rel_path)) {
            continue;
        }
        if exclude.iter().any(|p| p.matches(&rel_path)) {
            continue;
        }

        let contents = std::fs::read(entry.path())?;
        let hash = hex::encode(Sha256::digest(&contents));
        let size = contents.len() as u64;
        let mime_type = guess_mime_type(&rel_path).map(str::to_string);

        if sdk_verification.is_none() {
            sdk_verification = detect_sdk_in_file(&rel_path, &contents);
        }

        files.push(FileEntry {
            path: rel_path,
            hash,
            size,
            mime_type,
        });
    }

    if files.is_empty() {
        return Err(ManifestError::EmptyBundle);
    }
    files.sort_by(|a, b| a.path.cmp(&b.path));

    let bundle_hash = compute_bundle_hash(&files);

    Ok(ClientManifest {
        manifest_id: Uuid::new_v4(),
        name: options.name.clone(),
        client_type: options.client_type.clone(),
        version: options.version.clone(),
        files,
        bundle_hash,
        build: capture_build_metadata(),
        source: options.source.clone(),
        allowed_egress: options.allowed_egress.clone(),
        sdk_verification,
        api_surface: options.api_surface.clone(),
    })
}

/// Captures whatever build provenance the process environment makes
/// derivable (spec §4.G step 4: "timestamp, VCS fields if derivable, CI
/// env marker"). Fields stay `None` rather than guessing when a variable
/// isn't set.
fn capture_build_metadata() -> BuildMetadata {
    let commit = std::env::var("GITHUB_SHA")
        .ok()
        .or_else(|| std::env::var("GIT_COMMIT").ok());
    let branch = std::env::var("GITHUB_REF").ok();
    let ci = std::env::var("CI").ok().map(|_| {
        if std::env::var("GITHUB_ACTIONS").is_ok() {
            "github-actions".to_string()
        } else {
            "ci".to_string()
        }
    });

    BuildMetadata {
        timestamp: chrono::Utc::now().to_rfc3339(),
        commit,
        branch,
        ci,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn generates_manifest_with_sorted_hashed_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("b.css"), vec![0u8; 56]).unwrap();
        std::fs::write(dir.path().join("a.js"), vec![1u8; 1234]).unwrap();

        let options = GenerateOptions {
            name: "web-client".to_string(),
            client_type: "browser".to_string(),
            version: "1.0.0".to_string(),
            allowed_egress: vec!["api.example.com".to_string()],
            ..Default::default()
        };

        let manifest = generate_manifest(dir.path(), &options).unwrap();
        assert_eq!(manifest.files.len(), 2);
        assert_eq!(manifest.files[0].path, "a.js");
        assert_eq!(manifest.files[0].size, 1234);
        assert_eq!(manifest.files[1].path, "b.css");
        assert_eq!(manifest.files[1].size, 56);
        assert_eq!(
            manifest.bundle_hash,
            compute_bundle_hash(&manifest.files)
        );
    }

    #[test]
    fn exclude_pattern_drops_matching_files() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.js"), b"a").unwrap();
        std::fs::write(dir.path().join("a.js.map"), b"map").unwrap();

        let options = GenerateOptions {
            exclude: vec!["*.map".to_string()],
            ..Default::default()
        };
        let manifest = generate_manifest(dir.path(), &options).unwrap();
        assert_eq!(manifest.files.len(), 1);
        assert_eq!(manifest.files[0].path, "a.js");
    }

    #[test]
    fn detects_embedded_sdk_marker_during_generation() {
        let dir = tempdir().unwrap();
        std::fs::write(
            dir.path().join("vendor-sdk.js"),
            format!(
                "{}\n{} 1.2.3",
                crate::sdk::SDK_MARKER,
                crate::sdk::SDK_VERSION_MARKER_PREFIX
            ),
        )
        .unwrap();

        let manifest = generate_manifest(dir.path(), &GenerateOptions::default()).unwrap();
        let sdk = manifest.sdk_verification.unwrap();
        assert_eq!(sdk.sdk_version, "1.2.3");
        assert_eq!(sdk.sdk_path, "vendor-sdk.js");
    }

    #[test]
    fn empty_build_directory_is_an_error() {
        let dir = tempdir().unwrap();
        let err = generate_manifest(dir.path(), &GenerateOptions::default()).unwrap_err();
        assert!(matches!(err, ManifestError::EmptyBundle));
    }
}
