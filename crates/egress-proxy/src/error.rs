#[derive(Debug, thiserror::Error)]
pub enum ProxyError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("log store error: {0}")]
    LogStore(#[from] egress_log_store::LogStoreError),
    #[error("signer error: {0}")]
    Signer(#[from] egress_signer::SignerError),
    #[error("request line is not a valid absolute-form proxy request: {0}")]
    InvalidRequest(String),
    #[error("metrics registration failed: {0}")]
    Metrics(#[from] prometheus::Error),
    #[error("proxy is not running")]
    NotRunning,
    #[error("failed to load proxy configuration: {0}")]
    Config(#[from] config::ConfigError),
}
