use crate::error::ProxyError;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Proxy listener configuration. `port: 0` (the default) binds an
/// OS-chosen ephemeral port, per spec §4.D lifecycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub bind_host: String,
    pub port: u16,
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            bind_host: "127.0.0.1".to_string(),
            port: 0,
        }
    }
}

impl ProxyConfig {
    /// Reads `EGRESS_PROXY_HOST`/`EGRESS_PROXY_PORT` over the defaults,
    /// leaving unset variables at their default value.
    pub fn from_env() -> Self {
        Self::layered(None).unwrap_or_default()
    }

    /// Loads a TOML file at `path` (if it exists) layered under
    /// `EGRESS_PROXY_*` environment variables, falling back to
    /// [`ProxyConfig::default`] for anything neither source sets.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ProxyError> {
        Self::layered(Some(path.as_ref()))
    }

    fn layered(path: Option<&Path>) -> Result<Self, ProxyError> {
        let defaults = Self::default();
        let mut builder = config::Config::builder()
            .set_default("bind_host", defaults.bind_host.clone())?
            .set_default("port", defaults.port)?;
        if let Some(path) = path {
            builder = builder.add_source(config::File::from(path).required(false));
        }
        builder = builder.add_source(
            config::Environment::with_prefix("EGRESS_PROXY")
                .try_parsing(true)
                .separator("_"),
        );
        Ok(builder.build()?.try_deserialize()?)
    }
}
