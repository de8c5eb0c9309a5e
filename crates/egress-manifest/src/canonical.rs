//! Canonical serialization for the Bundle Manifest Core (spec §4.G
//! "Canonical serialization for signing"): a JSON object with keys sorted
//! lexicographically and two-space indentation, so any implementation
//! produces byte-identical signable material for a given manifest.
//!
//! Unlike `egress-log-model`'s `canonical_signing_bytes` (which signs the
//! `Serialize` impl's *declaration* field order), the manifest's contract
//! is explicitly *sorted* keys. `serde_json::Map` is backed by a `BTreeMap`
//! unless the `preserve_order` feature is enabled — which this workspace
//! never turns on — so round-tripping a manifest through `serde_json::Value`
//! before re-serializing sorts every object's keys, recursively, for free.

use crate::error::ManifestError;
use crate::model::{ClientManifest, FileEntry};
use sha2::{Digest, Sha256};

/// The exact bytes the Signer signs and a verifier re-derives for a
/// manifest: its fields as a `serde_json::Value` (sorting every object's
/// keys), pretty-printed with two-space indentation.
pub fn canonical_signing_bytes(manifest: &ClientManifest) -> Result<Vec<u8>, ManifestError> {
    let value = serde_json::to_value(manifest)?;
    let text = serde_json::to_string_pretty(&value)?;
    Ok(text.into_bytes())
}

/// `bundleHash = SHA-256(Σ "path:hash" lines, sorted by path, joined by
/// "\n")` (spec §3, §4.G step 3). `files` need not already be sorted;
/// this sorts a local copy of the references so callers don't have to
/// remember to do it themselves before hashing.
pub fn compute_bundle_hash(files: &[FileEntry]) -> String {
    let mut sorted: Vec<&FileEntry> = files.iter().collect();
    sorted.sort_by(|a, b| a.path.cmp(&b.path));

    let joined = sorted
        .iter()
        .map(|f| format!("{}:{}", f.path, f.hash))
        .collect::<Vec<_>>()
        .join("\n");

    hex::encode(Sha256::digest(joined.as_bytes()))
}
