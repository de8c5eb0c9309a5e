#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("I/O error walking build directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to walk build directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("invalid include/exclude glob pattern: {0}")]
    Pattern(#[from] glob::PatternError),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("CBOR serialization error: {0}")]
    Cbor(#[from] serde_cbor::Error),
    #[error("signer error: {0}")]
    Signer(#[from] egress_signer::SignerError),
    #[error("build directory contains no matching files")]
    EmptyBundle,
    #[error("failed to load trust configuration: {0}")]
    Config(#[from] config::ConfigError),
}
