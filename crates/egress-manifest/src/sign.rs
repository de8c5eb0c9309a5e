//! Signing a generated [`ClientManifest`] into a [`SignedManifest`] (spec
//! §4.G "Signing"), using the same RSA-2048/PKCS1v15/SHA-256 key and
//! padding scheme as the log chain (`egress-signer`).

use crate::canonical::canonical_signing_bytes;
use crate::error::ManifestError;
use crate::model::{ClientManifest, SignedManifest};
use egress_signer::Signer;

pub fn sign_manifest(signer: &Signer, manifest: ClientManifest) -> Result<SignedManifest, ManifestError> {
    let canonical = canonical_signing_bytes(&manifest)?;
    let signature = signer.sign_bytes(&canonical)?;
    let public_key = signer.public_key().to_public_key_pem()?;
    let key_fingerprint = signer.public_key().fingerprint();

    Ok(SignedManifest {
        manifest,
        signature,
        public_key,
        key_fingerprint,
        signed_at: chrono::Utc::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::generate::{generate_manifest, GenerateOptions};
    use tempfile::tempdir;

    #[test]
    fn signed_manifest_carries_a_stable_fingerprint() {
        let dir = tempdir().unwrap();
        std::fs::write(dir.path().join("a.js"), b"content").unwrap();
        let manifest = generate_manifest(dir.path(), &GenerateOptions::default()).unwrap();

        let signer = Signer::generate().unwrap();
        let signed = sign_manifest(&signer, manifest).unwrap();

        assert_eq!(signed.key_fingerprint, signer.public_key().fingerprint());
        assert!(!signed.signature.is_empty());
    }
}
