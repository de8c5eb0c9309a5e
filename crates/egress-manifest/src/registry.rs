//! The Manifest Registry (spec §4.G "Registry", §6 Manifest Registry
//! interface): keeps signed manifests addressable by id, bundle hash, and
//! "latest for this client name", plus a version-chain relation.
//!
//! Spec §9 "Cyclic manifest chain": `previousManifestId` is modeled as a
//! side table keyed on `manifestId`, resolved only when a caller walks the
//! chain — never embedded in [`crate::model::ClientManifest`] itself, so
//! the manifest's own signed bytes never depend on registry state.
//!
//! No global singleton: a `Registry` is explicit, constructed state handed
//! to whatever outer control plane binds the HTTP surface in spec §6 —
//! callers construct a fresh instance per test, per spec §9.

use crate::error::ManifestError;
use crate::model::SignedManifest;
use crate::verify::{verify_with_trusted_fingerprints, ManifestVerificationResult};
use dashmap::DashMap;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[derive(Default)]
pub struct Registry {
    by_id: DashMap<Uuid, SignedManifest>,
    by_bundle_hash: DashMap<String, Uuid>,
    latest_by_name: DashMap<String, Uuid>,
    /// `manifestId -> previousManifestId`, populated at registration time
    /// from whichever manifest was `latest` for the name before this one.
    previous: DashMap<Uuid, Uuid>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `signed`, returning its `manifestId`. When `set_latest` is
    /// true and a manifest is already `latest` for this `name`, the
    /// previous holder becomes this one's predecessor in the upgrade chain.
    pub fn register(&self, signed: SignedManifest, set_latest: bool) -> Uuid {
        let id = signed.manifest.manifest_id;
        let name = signed.manifest.name.clone();
        let bundle_hash = signed.manifest.bundle_hash.clone();

        if set_latest {
            if let Some(existing) = self.latest_by_name.get(&name).map(|r| *r) {
                if existing != id {
                    self.previous.insert(id, existing);
                }
            }
            self.latest_by_name.insert(name, id);
        }

        self.by_bundle_hash.insert(bundle_hash, id);
        self.by_id.insert(id, signed);
        id
    }

    pub fn get(&self, id: Uuid) -> Option<SignedManifest> {
        self.by_id.get(&id).map(|entry| entry.value().clone())
    }

    pub fn list(&self) -> Vec<SignedManifest> {
        self.by_id.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Removes a manifest. If it was `latest` for its name, that index
    /// entry is cleared too (there's no well-defined "next latest" to fall
    /// back to without re-deriving from the chain, which the spec doesn't
    /// ask this operation to do).
    pub fn delete(&self, id: Uuid) -> Option<SignedManifest> {
        self.previous.remove(&id);
        let (_, signed) = self.by_id.remove(&id)?;
        self.by_bundle_hash.remove(&signed.manifest.bundle_hash);
        if let Some(latest_id) = self.latest_by_name.get(&signed.manifest.name).map(|r| *r) {
            if latest_id == id {
                self.latest_by_name.remove(&signed.manifest.name);
            }
        }
        Some(signed)
    }

    pub fn get_by_bundle_hash(&self, bundle_hash: &str) -> Option<SignedManifest> {
        let id = *self.by_bundle_hash.get(bundle_hash)?;
        self.get(id)
    }

    pub fn get_latest_by_name(&self, name: &str) -> Option<SignedManifest> {
        let id = *self.latest_by_name.get(name)?;
        self.get(id)
    }

    /// Walks the `previousManifestId` relation starting at `id`, newest
    /// first. A cycle guard stops the walk rather than looping forever —
    /// the relation is meant to be a DAG, but nothing enforces that at
    /// registration time if a caller misuses `register`.
    pub fn chain(&self, id: Uuid) -> Vec<SignedManifest> {
        let mut result = Vec::new();
        let mut seen = HashSet::new();
        let mut current = Some(id);

        while let Some(cursor) = current {
            if !seen.insert(cursor) {
                break;
            }
            match self.get(cursor) {
                Some(signed) => result.push(signed),
                None => break,
            }
            current = self.previous.get(&cursor).map(|entry| *entry);
        }

        result
    }

    /// Quick trust check (spec §6 `POST /api/manifests/check-hash`):
    /// resolves `bundle_hash` to a registered manifest and verifies it,
    /// optionally against a trusted-fingerprint allowlist.
    pub fn verify_bundle_hash(
        &self,
        bundle_hash: &str,
        trusted_fingerprints: Option<&[String]>,
    ) -> Result<ManifestVerificationResult, ManifestError> {
        match self.get_by_bundle_hash(bundle_hash) {
            Some(signed) => {
                verify_with_trusted_fingerprints(&signed, &HashMap::new(), trusted_fingerprints)
            }
            None => Ok(ManifestVerificationResult {
                valid: false,
                signature_valid: false,
                bundle_hash_valid: false,
                fingerprint_valid: false,
                errors: vec![format!("no manifest registered with bundle hash {bundle_hash}")],
            }),
        }
    }
}

/// CBOR encoding for `SignedManifest`, alongside the default JSON form
/// (spec §6: "JSON over CBOR-optional" for the Manifest Registry surface).
pub fn to_cbor(signed: &SignedManifest) -> Result<Vec<u8>, ManifestError> {
    Ok(serde_cbor::to_vec(signed)?)
}

pub fn from_cbor(bytes: &[u8]) -> Result<SignedManifest, ManifestError> {
    Ok(serde_cbor::from_slice(bytes)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::{generate_manifest, GenerateOptions};
    use crate::sign::sign_manifest;
    use egress_signer::Signer;
    use tempfile::tempdir;

    fn signed_manifest(name: &str) -> SignedManifest {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.js"), format!("{name}-contents")).unwrap();
        let options = GenerateOptions {
            name: name.to_string(),
            ..Default::default()
        };
        let manifest = generate_manifest(dir.path(), &options).unwrap();
        let signer = Signer::generate().unwrap();
        sign_manifest(&signer, manifest).unwrap()
    }

    #[test]
    fn register_and_fetch_by_id_and_bundle_hash() {
        let registry = Registry::new();
        let signed = signed_manifest("web-client");
        let bundle_hash = signed.manifest.bundle_hash.clone();
        let id = registry.register(signed, true);

        assert!(registry.get(id).is_some());
        assert_eq!(registry.get_by_bundle_hash(&bundle_hash).unwrap().manifest.manifest_id, id);
        assert_eq!(registry.get_latest_by_name("web-client").unwrap().manifest.manifest_id, id);
    }

    #[test]
    fn registering_a_new_latest_chains_to_the_previous_one() {
        let registry = Registry::new();
        let first = signed_manifest("web-client");
        let first_id = registry.register(first, true);

        let second = signed_manifest("web-client");
        let second_id = registry.register(second, true);

        assert_eq!(
            registry.get_latest_by_name("web-client").unwrap().manifest.manifest_id,
            second_id
        );
        let chain = registry.chain(second_id);
        let chain_ids: Vec<Uuid> = chain.iter().map(|s| s.manifest.manifest_id).collect();
        assert_eq!(chain_ids, vec![second_id, first_id]);
    }

    #[test]
    fn delete_clears_all_indices() {
        let registry = Registry::new();
        let signed = signed_manifest("web-client");
        let bundle_hash = signed.manifest.bundle_hash.clone();
        let id = registry.register(signed, true);

        let removed = registry.delete(id);
        assert!(removed.is_some());
        assert!(registry.get(id).is_none());
        assert!(registry.get_by_bundle_hash(&bundle_hash).is_none());
        assert!(registry.get_latest_by_name("web-client").is_none());
    }

    #[test]
    fn verify_bundle_hash_rejects_unregistered_hash() {
        let registry = Registry::new();
        let result = registry.verify_bundle_hash("not-a-real-hash", None).unwrap();
        assert!(!result.valid);
    }

    #[test]
    fn cbor_round_trips_a_signed_manifest() {
        let signed = signed_manifest("web-client");
        let bytes = to_cbor(&signed).unwrap();
        let decoded = from_cbor(&bytes).unwrap();
        assert_eq!(decoded, signed);
    }
}
