#[derive(Debug, thiserror::Error)]
pub enum SandboxError {
    #[error("failed to spawn function process: {0}")]
    Spawn(std::io::Error),
    #[error("I/O error communicating with function process: {0}")]
    Io(std::io::Error),
    #[error("failed to serialize function context: {0}")]
    SerializeContext(#[from] serde_json::Error),
    #[error("timeout after {millis}ms")]
    Timeout { millis: u64 },
    #[error("{stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },
    #[error("invalid function response")]
    InvalidResponse,
    #[error("failed to load sandbox configuration: {0}")]
    Config(#[from] config::ConfigError),
}
