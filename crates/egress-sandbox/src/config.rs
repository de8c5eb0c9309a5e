use crate::error::SandboxError;
use serde::{Deserialize, Serialize};
use std::path::Path;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SandboxConfig {
    /// Executable to invoke for the function's user code.
    pub command: String,
    pub args: Vec<String>,
    /// Wall-clock timeout bounding the child process.
    pub timeout_ms: u64,
    /// Loopback URL of the Logging Proxy this sandbox's child should route
    /// all HTTP/HTTPS traffic through.
    pub proxy_url: String,
    /// Path to an L3 dynamic-loader interception shim shared object, if one
    /// is configured. `None` means L3 is unavailable.
    #[serde(default)]
    pub loader_shim_path: Option<String>,
    /// L4 syscall filter enforcement profile, applied only if L4 is
    /// available (spec §4.E table).
    pub syscall_filter_profile: SyscallFilterProfile,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyscallFilterProfile {
    Strict,
    Logging,
    Paranoid,
}

impl Default for SandboxConfig {
    fn default() -> Self {
        Self {
            command: "node".to_string(),
            args: Vec::new(),
            timeout_ms: 30_000,
            proxy_url: "http://127.0.0.1:0".to_string(),
            loader_shim_path: std::env::var("EGRESS_LOADER_SHIM_PATH").ok(),
            syscall_filter_profile: SyscallFilterProfile::Strict,
        }
    }
}

impl SandboxConfig {
    /// Reads `EGRESS_SANDBOX_*` environment variables over the defaults.
    pub fn from_env() -> Self {
        Self::layered(None).unwrap_or_default()
    }

    /// Loads a TOML file at `path` (if it exists) layered under
    /// `EGRESS_SANDBOX_*` environment variables, falling back to
    /// [`SandboxConfig::default`] for anything neither source sets.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, SandboxError> {
        Self::layered(Some(path.as_ref()))
    }

    fn layered(path: Option<&Path>) -> Result<Self, SandboxError> {
        let defaults = Self::default();
        let mut builder = config::Config::builder()
            .set_default("command", defaults.command.clone())?
            .set_default("args", defaults.args.clone())?
            .set_default("timeout_ms", defaults.timeout_ms)?
            .set_default("proxy_url", defaults.proxy_url.clone())?
            .set_default("syscall_filter_profile", "strict")?;
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("EGRESS_SANDBOX")
                .try_parsing(true)
                .separator("_")
                .list_separator(",")
                .with_list_parse_key("args"),
        );
        Ok(builder.build()?.try_deserialize()?)
    }
}
