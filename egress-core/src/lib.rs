//! Workspace root for egress-cage: re-exports the component crates behind
//! one place to depend on, aggregates their typed errors into
//! [`EgressCageError`] the way the teacher's CLI binaries fold
//! `DockLockError`/`CryptoError`/`StorageError`/`NetworkError` behind
//! `anyhow::Error` at their own boundary, and provides the tracing setup
//! and end-to-end wiring glue spec.md §2's data flow describes but leaves
//! to "the outer control plane" to assemble.
//!
//! No global singletons live here (spec §9): [`EgressCage`] is explicit,
//! caller-constructed state — one instance per function, not a
//! process-wide static.

pub use egress_audit::{RequestAudit, RequestAuditGuard, ABANDONED_STATUS};
pub use egress_log_model::{
    canonical_signing_bytes, FunctionId, InvocationId, LogEntry, Protocol, SignedLogEntry,
};
pub use egress_log_store::{FunctionSequencer, LogStore, LogStoreError, MemoryLogStore, SledLogStore};
pub use egress_manifest::{
    generate_manifest, sign_manifest, verify_signed_manifest, verify_with_trusted_fingerprints,
    ClientManifest, GenerateOptions, ManifestVerificationResult, Registry, SignedManifest,
    TrustConfig,
};
pub use egress_proxy::{InvocationTracker, Proxy, ProxyConfig, ProxyError};
pub use egress_sandbox::{
    CapabilityReport, FunctionResult, IsolationLevel, Sandbox, SandboxConfig, SandboxError,
    SandboxStats, SyscallFilterProfile,
};
pub use egress_signer::{PublicKey, Signer, SignerError};
pub use egress_verify::{verify_chain, IntegrityError, IntegrityReport};

use std::sync::Arc;

/// The core's error taxonomy folded into one enum (spec §7), for any
/// embedding binary or test harness that wants a single `Result` type
/// instead of matching on five crates' worth of variants individually.
#[derive(Debug, thiserror::Error)]
pub enum EgressCageError {
    #[error(transparent)]
    Signer(#[from] SignerError),
    #[error(transparent)]
    LogStore(#[from] LogStoreError),
    #[error(transparent)]
    Proxy(#[from] ProxyError),
    #[error(transparent)]
    Sandbox(#[from] SandboxError),
    #[error(transparent)]
    Manifest(#[from] egress_manifest::ManifestError),
}

/// Initializes a `tracing-subscriber` `fmt` layer honoring `RUST_LOG`
/// (default `info`), for embedding binaries and integration tests alike.
/// Safe to call more than once — later calls are no-ops.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

/// One function's audit machinery, wired together: the signer it shares
/// with every chain in the process, the sequencer enforcing the
/// per-`functionId` critical section (spec §5), and a Logging Proxy bound
/// to this function's `egress` chain (spec §2: "E forks a child process
/// configured to route all network traffic through D").
///
/// A [`Sandbox`] is constructed separately, once the proxy's bound port is
/// known — see [`EgressCage::start`] and [`EgressCage::sandbox_config`].
pub struct EgressCage<S: LogStore + 'static> {
    pub function_id: FunctionId,
    pub signer: Arc<Signer>,
    pub sequencer: Arc<FunctionSequencer<S>>,
    pub proxy: Proxy<S>,
}

impl<S: LogStore + 'static> EgressCage<S> {
    pub fn new(
        function_id: FunctionId,
        store: Arc<S>,
        signer: Arc<Signer>,
        proxy_config: ProxyConfig,
    ) -> Result<Self, EgressCageError> {
        let sequencer = Arc::new(FunctionSequencer::new(store));
        let proxy = Proxy::new(proxy_config, function_id.clone(), sequencer.clone(), signer.clone())?;
        Ok(Self {
            function_id,
            signer,
            sequencer,
            proxy,
        })
    }

    /// Starts the proxy listener, returning its bound port.
    pub async fn start(&mut self) -> Result<u16, EgressCageError> {
        self.proxy.start().await?;
        Ok(self.proxy.get_port().expect("port is set once start() succeeds"))
    }

    /// A [`SandboxConfig`] pointed at this cage's running proxy, so a
    /// [`Sandbox`] built from it routes the function's HTTP/HTTPS traffic
    /// through the chain this cage is logging (spec §4.E L1).
    pub fn sandbox_config(&self, command: impl Into<String>, timeout_ms: u64) -> SandboxConfig {
        let port = self.proxy.get_port().expect("call start() before sandbox_config()");
        SandboxConfig {
            command: command.into(),
            args: Vec::new(),
            timeout_ms,
            proxy_url: format!("http://127.0.0.1:{port}"),
            loader_shim_path: std::env::var("EGRESS_LOADER_SHIM_PATH").ok(),
            syscall_filter_profile: SyscallFilterProfile::Strict,
        }
    }

    /// Stops the proxy, draining in-flight connections naturally.
    pub async fn stop(&mut self) {
        self.proxy.stop().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn cage_wires_signer_sequencer_and_proxy_together() {
        let store = Arc::new(MemoryLogStore::new());
        let signer = Arc::new(Signer::generate().unwrap());
        let mut cage = EgressCage::new(
            FunctionId::new("fn-1"),
            store,
            signer,
            ProxyConfig::default(),
        )
        .unwrap();

        let port = cage.start().await.unwrap();
        assert!(port > 0);

        let sandbox_config = cage.sandbox_config("sh", 5_000);
        assert_eq!(sandbox_config.proxy_url, format!("http://127.0.0.1:{port}"));

        cage.stop().await;
    }
}
