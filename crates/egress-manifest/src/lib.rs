//! The Bundle Manifest Core (spec §4.G): a content-addressed manifest
//! format for client bundles, independent of the egress log chain but
//! signed with the same `egress-signer` key material. Generates a
//! deterministic file-hash summary of a build directory, signs it,
//! verifies it at three levels, and tracks registered manifests in a
//! version-chained [`Registry`].

mod canonical;
mod error;
mod generate;
mod mime;
mod model;
mod registry;
mod sdk;
mod sign;
mod trust;
mod verify;

pub use canonical::{canonical_signing_bytes, compute_bundle_hash};
pub use error::ManifestError;
pub use generate::{generate_manifest, GenerateOptions};
pub use mime::guess_mime_type;
pub use model::{
    ApiSurface, BuildMetadata, ClientManifest, FileEntry, SdkVerification, SignedManifest,
    SourceRef,
};
pub use registry::{from_cbor, to_cbor, Registry};
pub use sdk::{detect_sdk_in_file, SDK_MARKER, SDK_VERSION_MARKER_PREFIX};
pub use sign::sign_manifest;
pub use trust::TrustConfig;
pub use verify::{verify_signed_manifest, verify_with_trusted_fingerprints, ManifestVerificationResult};
