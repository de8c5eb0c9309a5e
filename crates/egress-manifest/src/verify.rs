//! Manifest verification (spec §4.G "Verification (three-level)"):
//! signature validity, bundle-hash recomputation, per-file content hash
//! checks when file bytes are supplied, and key-fingerprint consistency.
//! Like the Integrity Verifier, this accumulates every defect it finds
//! rather than stopping at the first one.

use crate::canonical::{canonical_signing_bytes, compute_bundle_hash};
use crate::error::ManifestError;
use crate::model::SignedManifest;
use egress_signer::PublicKey;
use sha2::{Digest, Sha256};
use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct ManifestVerificationResult {
    pub valid: bool,
    #[serde(rename = "signatureValid")]
    pub signature_valid: bool,
    #[serde(rename = "bundleHashValid")]
    pub bundle_hash_valid: bool,
    #[serde(rename = "fingerprintValid")]
    pub fingerprint_valid: bool,
    pub errors: Vec<String>,
}

/// Verifies `signed` against its own embedded public key. `file_contents`
/// maps manifest-relative paths to bytes for any files the caller wants
/// re-hashed against the stored per-file hash (spec §4.G: "if content is
/// provided"); paths not present in the map are simply not content-checked.
pub fn verify_signed_manifest(
    signed: &SignedManifest,
    file_contents: &HashMap<String, Vec<u8>>,
) -> Result<ManifestVerificationResult, ManifestError> {
    verify_against(signed, file_contents, None)
}

/// As [`verify_signed_manifest`], but additionally rejects an otherwise
/// valid manifest if its key fingerprint is not in `trusted_fingerprints`
/// (spec §4.G Registry: "`verifyBundleHash` ... accepts an optional
/// trusted-fingerprint list and rejects otherwise-valid manifests signed
/// by an unlisted key").
pub fn verify_with_trusted_fingerprints(
    signed: &SignedManifest,
    file_contents: &HashMap<String, Vec<u8>>,
    trusted_fingerprints: Option<&[String]>,
) -> Result<ManifestVerificationResult, ManifestError> {
    verify_against(signed, file_contents, trusted_fingerprints)
}

fn verify_against(
    signed: &SignedManifest,
    file_contents: &HashMap<String, Vec<u8>>,
    trusted_fingerprints: Option<&[String]>,
) -> Result<ManifestVerificationResult, ManifestError> {
    let mut errors = Vec::new();

    let signature_valid = match PublicKey::from_public_key_pem(&signed.public_key) {
        Ok(public_key) => {
            let canonical = canonical_signing_bytes(&signed.manifest)?;
            match public_key.verify_bytes(&canonical, &signed.signature) {
                Ok(()) => true,
                Err(_) => {
                    errors.push("signature does not verify against the embedded public key".to_string());
                    false
                }
            }
        }
        Err(_) => {
            errors.push("embedded public key is not valid PEM".to_string());
            false
        }
    };

    let recomputed_bundle_hash = compute_bundle_hash(&signed.manifest.files);
    let bundle_hash_valid = recomputed_bundle_hash == signed.manifest.bundle_hash;
    if !bundle_hash_valid {
        errors.push(format!(
            "bundleHash mismatch: stored {} recomputed {}",
            signed.manifest.bundle_hash, recomputed_bundle_hash
        ));
    }

    let recomputed_fingerprint = hex::encode(Sha256::digest(signed.public_key.as_bytes()));
    let fingerprint_valid = recomputed_fingerprint == signed.key_fingerprint;
    if !fingerprint_valid {
        errors.push("keyFingerprint does not match SHA-256(publicKey)".to_string());
    }

    for entry in &signed.manifest.files {
        if let Some(contents) = file_contents.get(&entry.path) {
            let actual_hash = hex::encode(Sha256::digest(contents));
            if actual_hash != entry.hash {
                errors.push(format!("content hash mismatch for {}", entry.path));
            }
        }
    }

    if let Some(trusted) = trusted_fingerprints {
        if !trusted.iter().any(|fp| fp == &signed.key_fingerprint) {
            errors.push(format!(
                "key fingerprint {} is not in the trusted fingerprint list",
                signed.key_fingerprint
            ));
        }
    }

    Ok(ManifestVerificationResult {
        valid: errors.is_empty(),
        signature_valid,
        bundle_hash_valid,
        fingerprint_valid,
        errors,
    })
}
