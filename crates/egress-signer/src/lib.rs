//! RSA-2048 signing and verification for [`egress_log_model::LogEntry`]
//! chains (spec §4.A, §6 P6). Signatures use RSASSA-PKCS1-v1_5 with
//! SHA-256, which — unlike PSS — is deterministic: the same entry signed
//! twice with the same key produces byte-identical signatures.

use egress_log_model::{canonical_signing_bytes, LogEntry};
use rsa::pkcs8::{DecodePrivateKey, DecodePublicKey, EncodePrivateKey, EncodePublicKey};
use rsa::{Pkcs1v15Sign, RsaPrivateKey, RsaPublicKey};
use sha2::{Digest, Sha256};

#[derive(Debug, thiserror::Error)]
pub enum SignerError {
    #[error("failed to generate RSA keypair: {0}")]
    KeyGeneration(rsa::Error),
    #[error("invalid PKCS#8 private key: {0}")]
    InvalidPrivateKey(#[from] rsa::pkcs8::Error),
    #[error("invalid SubjectPublicKeyInfo: {0}")]
    InvalidPublicKey(rsa::pkcs8::spki::Error),
    #[error("signing failed: {0}")]
    Sign(rsa::Error),
    #[error("signature verification failed")]
    InvalidSignature,
    #[error("signature is not valid base64: {0}")]
    Base64(#[from] base64::DecodeError),
}

/// Bit size mandated by spec §4.A ("RSA-2048 key pair").
pub const KEY_BITS: usize = 2048;

fn padding() -> Pkcs1v15Sign {
    Pkcs1v15Sign::new::<Sha256>()
}

fn hash(bytes: &[u8]) -> Vec<u8> {
    Sha256::digest(bytes).to_vec()
}

/// Holds an RSA-2048 keypair and signs [`LogEntry`] values over their
/// canonical bytes. One `Signer` is shared by every caller in a process —
/// the egress proxy and the audit layer both hand entries to the same
/// instance (spec §4.F).
#[derive(Clone)]
pub struct Signer {
    private_key: RsaPrivateKey,
    public_key: RsaPublicKey,
}

impl Signer {
    /// Generates a fresh RSA-2048 keypair.
    pub fn generate() -> Result<Self, SignerError> {
        let mut rng = rand::thread_rng();
        let private_key = RsaPrivateKey::new(&mut rng, KEY_BITS).map_err(SignerError::KeyGeneration)?;
        let public_key = RsaPublicKey::from(&private_key);
        Ok(Self {
            private_key,
            public_key,
        })
    }

    /// Loads a keypair from a PKCS#8 PEM-encoded private key, e.g. one
    /// persisted across restarts so the chain's key identity is stable.
    pub fn from_pkcs8_pem(pem: &str) -> Result<Self, SignerError> {
        let private_key = RsaPrivateKey::from_pkcs8_pem(pem)?;
        let public_key = RsaPublicKey::from(&private_key);
        Ok(Self {
            private_key,
            public_key,
        })
    }

    /// Exports the private key as PKCS#8 PEM. Callers must treat the result
    /// as a secret; it is intended for persisting the signer's identity
    /// across process restarts, not for routine handling.
    pub fn export_private_key_pem(&self) -> Result<String, SignerError> {
        Ok(self
            .private_key
            .to_pkcs8_pem(rsa::pkcs8::LineEnding::LF)?
            .to_string())
    }

    pub fn public_key(&self) -> PublicKey {
        PublicKey(self.public_key.clone())
    }

    /// Signs `entry`'s canonical bytes, returning a base64-encoded
    /// signature (spec §3 "Signed Log Entry" `signature` field).
    pub fn sign(&self, entry: &LogEntry) -> Result<String, SignerError> {
        let digest = hash(&canonical_signing_bytes(entry));
        let signature = self
            .private_key
            .sign(padding(), &digest)
            .map_err(SignerError::Sign)?;
        Ok(base64_encode(&signature))
    }

    /// Verifies `signature_b64` against `entry` using this signer's own
    /// public key. Most verification happens against a [`PublicKey`]
    /// recovered independently (see [`PublicKey::verify`]); this is a
    /// convenience for same-process round trips.
    pub fn verify(&self, entry: &LogEntry, signature_b64: &str) -> Result<(), SignerError> {
        self.public_key().verify(entry, signature_b64)
    }
}

/// A standalone RSA public key, detached from any [`Signer`], for
/// verifying signatures without holding the private key — what the
/// Integrity Verifier and Bundle Manifest verification both do.
#[derive(Clone)]
pub struct PublicKey(RsaPublicKey);

impl PublicKey {
    pub fn from_public_key_pem(pem: &str) -> Result<Self, SignerError> {
        Ok(Self(
            RsaPublicKey::from_public_key_pem(pem).map_err(SignerError::InvalidPublicKey)?,
        ))
    }

    pub fn to_public_key_pem(&self) -> Result<String, SignerError> {
        Ok(self
            .0
            .to_public_key_pem(rsa::pkcs8::LineEnding::LF)
            .map_err(SignerError::InvalidPublicKey)?)
    }

    pub fn verify(&self, entry: &LogEntry, signature_b64: &str) -> Result<(), SignerError> {
        let signature = base64_decode(signature_b64)?;
        let digest = hash(&canonical_signing_bytes(entry));
        self.0
            .verify(padding(), &digest, &signature)
            .map_err(|_| SignerError::InvalidSignature)
    }

    /// Verifies a signature over already-hashed, already-canonicalized
    /// bytes — used by the Bundle Manifest Core, which signs a different
    /// payload than log entries but with the same key/padding scheme.
    pub fn verify_bytes(&self, canonical_bytes: &[u8], signature_b64: &str) -> Result<(), SignerError> {
        let signature = base64_decode(signature_b64)?;
        let digest = hash(canonical_bytes);
        self.0
            .verify(padding(), &digest, &signature)
            .map_err(|_| SignerError::InvalidSignature)
    }

    /// SHA-256 of the PEM-encoded public key, hex-encoded (glossary "Key
    /// fingerprint": `SHA-256(publicKeyPEM) = keyFingerprint`, spec P7).
    pub fn fingerprint(&self) -> String {
        let pem = self
            .0
            .to_public_key_pem(rsa::pkcs8::LineEnding::LF)
            .expect("RSA public key always encodes to PEM");
        hex::encode(Sha256::digest(pem.as_bytes()))
    }
}

impl Signer {
    /// Signs arbitrary already-canonicalized bytes, used by the Bundle
    /// Manifest Core to sign its manifest payload with the same key and
    /// padding scheme as the log chain.
    pub fn sign_bytes(&self, canonical_bytes: &[u8]) -> Result<String, SignerError> {
        let digest = hash(canonical_bytes);
        let signature = self
            .private_key
            .sign(padding(), &digest)
            .map_err(SignerError::Sign)?;
        Ok(base64_encode(&signature))
    }
}

fn base64_encode(bytes: &[u8]) -> String {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.encode(bytes)
}

fn base64_decode(s: &str) -> Result<Vec<u8>, base64::DecodeError> {
    use base64::Engine;
    base64::engine::general_purpose::STANDARD.decode(s)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use egress_log_model::{FunctionId, InvocationId, Protocol};

    fn sample_entry() -> LogEntry {
        LogEntry::Egress {
            sequence: 1,
            function_id: FunctionId::new("fn-1"),
            invocation_id: InvocationId::new(),
            timestamp: Utc::now(),
            method: "GET".to_string(),
            host: "example.com".to_string(),
            port: 443,
            path: "/".to_string(),
            protocol: Protocol::Https,
        }
    }

    #[test]
    fn signing_is_deterministic() {
        let signer = Signer::generate().unwrap();
        let entry = sample_entry();
        assert_eq!(signer.sign(&entry).unwrap(), signer.sign(&entry).unwrap());
    }

    #[test]
    fn verify_accepts_valid_signature() {
        let signer = Signer::generate().unwrap();
        let entry = sample_entry();
        let sig = signer.sign(&entry).unwrap();
        signer.public_key().verify(&entry, &sig).unwrap();
    }

    #[test]
    fn verify_rejects_tampered_entry() {
        let signer = Signer::generate().unwrap();
        let entry = sample_entry();
        let sig = signer.sign(&entry).unwrap();

        let mut tampered = entry.clone();
        if let LogEntry::Egress { host, .. } = &mut tampered {
            *host = "evil.com".to_string();
        }
        assert!(signer.public_key().verify(&tampered, &sig).is_err());
    }

    #[test]
    fn verify_rejects_wrong_key() {
        let signer_a = Signer::generate().unwrap();
        let signer_b = Signer::generate().unwrap();
        let entry = sample_entry();
        let sig = signer_a.sign(&entry).unwrap();
        assert!(signer_b.public_key().verify(&entry, &sig).is_err());
    }

    #[test]
    fn pkcs8_round_trip_preserves_key() {
        let signer = Signer::generate().unwrap();
        let pem = signer.export_private_key_pem().unwrap();
        let reloaded = Signer::from_pkcs8_pem(&pem).unwrap();
        let entry = sample_entry();
        let sig = signer.sign(&entry).unwrap();
        reloaded.public_key().verify(&entry, &sig).unwrap();
    }

    #[test]
    fn fingerprint_is_stable_for_same_key_and_differs_across_keys() {
        let signer = Signer::generate().unwrap();
        assert_eq!(
            signer.public_key().fingerprint(),
            signer.public_key().fingerprint()
        );
        let other = Signer::generate().unwrap();
        assert_ne!(signer.public_key().fingerprint(), other.public_key().fingerprint());
    }
}
