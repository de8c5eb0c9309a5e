//! Optional SDK verification hook (spec §4.G): when a bundle contains a
//! file recognized as the transparent client SDK, the manifest records
//! `{sdkId, sdkVersion, sdkHash, sdkPath}` so an outer verifier can assert
//! the client's network calls all go through the controlled path without
//! re-scanning the bundle itself.
//!
//! Recognition is by content marker, not filename: a bundler can rename or
//! inline the SDK freely, so matching a known string constant the SDK
//! itself emits is the only approach robust to that.

use crate::model::SdkVerification;
use sha2::{Digest, Sha256};

/// Marker string the transparent client SDK embeds in its own source so a
/// manifest generator can recognize it regardless of bundling/minification.
pub const SDK_MARKER: &str = "__EGRESS_CAGE_TRANSPARENT_SDK__";

/// Line prefix the SDK emits immediately after the marker, carrying its
/// own version string.
pub const SDK_VERSION_MARKER_PREFIX: &str = "__EGRESS_CAGE_SDK_VERSION__:";

const DEFAULT_SDK_ID: &str = "egress-cage-transparent-sdk";

/// Checks one file's contents for the SDK marker, returning the
/// [`SdkVerification`] record to attach to the manifest if found.
pub fn detect_sdk_in_file(path: &str, contents: &[u8]) -> Option<SdkVerification> {
    let text = String::from_utf8_lossy(contents);
    if !text.contains(SDK_MARKER) {
        return None;
    }

    let version = text
        .lines()
        .find_map(|line| line.trim().strip_prefix(SDK_VERSION_MARKER_PREFIX))
        .map(|v| v.trim().to_string())
        .unwrap_or_else(|| "unknown".to_string());

    Some(SdkVerification {
        sdk_id: DEFAULT_SDK_ID.to_string(),
        sdk_version: version,
        sdk_hash: hex::encode(Sha256::digest(contents)),
        sdk_path: path.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detects_marker_and_extracts_version() {
        let source = format!(
            "// bundled sdk\n{}\n{} 2.3.1\nconsole.log('hi')",
            SDK_MARKER, SDK_VERSION_MARKER_PREFIX
        );
        let found = detect_sdk_in_file("vendor/sdk.js", source.as_bytes()).unwrap();
        assert_eq!(found.sdk_version, "2.3.1");
        assert_eq!(found.sdk_path, "vendor/sdk.js");
    }

    #[test]
    fn files_without_marker_are_not_detected() {
        assert!(detect_sdk_in_file("app.js", b"console.log('hello')").is_none());
    }

    #[test]
    fn missing_version_line_falls_back_to_unknown() {
        let source = format!("{}\nno version line here", SDK_MARKER);
        let found = detect_sdk_in_file("sdk.js", source.as_bytes()).unwrap();
        assert_eq!(found.sdk_version, "unknown");
    }
}
