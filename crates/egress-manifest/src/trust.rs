//! Trust configuration for the Manifest Registry (spec §4.G Registry:
//! "`verifyBundleHash` ... accepts an optional trusted-fingerprint list"):
//! the allowlist of key fingerprints a deployment accepts, layered from a
//! TOML file and `EGRESS_TRUST_*` environment variables the same way
//! [`crate::ClientManifest`]'s sibling configs in `egress-proxy` and
//! `egress-sandbox` are.

use crate::error::ManifestError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TrustConfig {
    #[serde(default)]
    pub trusted_fingerprints: Vec<String>,
}

impl TrustConfig {
    /// Reads `EGRESS_TRUST_TRUSTED_FINGERPRINTS` (comma-separated) over the
    /// empty default.
    pub fn from_env() -> Self {
        Self::layered(None).unwrap_or_default()
    }

    /// Loads a TOML file at `path` (if it exists) layered under
    /// `EGRESS_TRUST_*` environment variables.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ManifestError> {
        Self::layered(Some(path.as_ref()))
    }

    fn layered(path: Option<&Path>) -> Result<Self, ManifestError> {
        let mut builder = config::Config::builder().set_default("trusted_fingerprints", Vec::<String>::new())?;
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("EGRESS_TRUST")
                .try_parsing(true)
                .separator("_")
                .list_separator(",")
                .with_list_parse_key("trusted_fingerprints"),
        );
        Ok(builder.build()?.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_file_reads_trusted_fingerprint_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("trust.toml");
        std::fs::write(&path, "trusted_fingerprints = [\"abc123\", \"def456\"]\n").unwrap();

        let config = TrustConfig::from_file(&path).unwrap();
        assert_eq!(config.trusted_fingerprints, vec!["abc123", "def456"]);
    }

    #[test]
    fn missing_file_yields_empty_allowlist() {
        let dir = tempfile::tempdir().unwrap();
        let config = TrustConfig::from_file(dir.path().join("nope.toml")).unwrap();
        assert!(config.trusted_fingerprints.is_empty());
    }
}
