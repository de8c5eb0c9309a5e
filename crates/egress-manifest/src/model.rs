//! The Client Manifest data model (spec §3, §4.G): a content-addressed
//! summary of a client bundle's files plus the build/SDK/egress metadata
//! that makes the summary useful to a verifier.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One file in a bundle (spec §3 Client Manifest `files`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileEntry {
    /// Path relative to the build directory root, using `/` separators
    /// regardless of host OS.
    pub path: String,
    /// Hex-encoded SHA-256 of the file's contents.
    pub hash: String,
    pub size: u64,
    #[serde(rename = "mimeType", skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
}

/// Build provenance captured at manifest-generation time (spec §4.G step
/// 4: "Capture build metadata").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct BuildMetadata {
    pub timestamp: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
    #[serde(rename = "branch", skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(rename = "ci", skip_serializing_if = "Option::is_none")]
    pub ci: Option<String>,
}

/// A pointer to the source this bundle was built from, when derivable.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceRef {
    pub repository: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub commit: Option<String>,
}

/// Records that the bundle's transparent client SDK was located and
/// fingerprinted (spec §4.G "Optional SDK verification hook"), so an
/// outer verifier can assert the client's network calls all go through
/// the controlled path without re-scanning the bundle itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SdkVerification {
    #[serde(rename = "sdkId")]
    pub sdk_id: String,
    #[serde(rename = "sdkVersion")]
    pub sdk_version: String,
    #[serde(rename = "sdkHash")]
    pub sdk_hash: String,
    #[serde(rename = "sdkPath")]
    pub sdk_path: String,
}

/// The surface a client bundle exposes, when the generator can derive one
/// (e.g. from a manifest of exported entry points). Opaque to this crate —
/// passed through unchanged.
pub type ApiSurface = serde_json::Value;

/// The Client Manifest itself (spec §3). Field order here is the
/// *declaration* order; [`crate::canonical::canonical_signing_bytes`] sorts
/// keys independently of this order, so it does not double as the signing
/// contract the way `LogEntry`'s field order does for `egress-log-model`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientManifest {
    #[serde(rename = "manifestId")]
    pub manifest_id: Uuid,
    pub name: String,
    #[serde(rename = "clientType")]
    pub client_type: String,
    pub version: String,
    pub files: Vec<FileEntry>,
    #[serde(rename = "bundleHash")]
    pub bundle_hash: String,
    pub build: BuildMetadata,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<SourceRef>,
    #[serde(rename = "allowedEgress")]
    pub allowed_egress: Vec<String>,
    #[serde(rename = "sdkVerification", skip_serializing_if = "Option::is_none")]
    pub sdk_verification: Option<SdkVerification>,
    #[serde(rename = "apiSurface", skip_serializing_if = "Option::is_none")]
    pub api_surface: Option<ApiSurface>,
}

/// A `ClientManifest` plus its signature and the key material needed to
/// check it independently (spec §3 "Signed Manifest").
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedManifest {
    pub manifest: ClientManifest,
    pub signature: String,
    #[serde(rename = "publicKey")]
    pub public_key: String,
    #[serde(rename = "keyFingerprint")]
    pub key_fingerprint: String,
    #[serde(rename = "signedAt")]
    pub signed_at: chrono::DateTime<chrono::Utc>,
}
