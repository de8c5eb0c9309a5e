//! The Logging Proxy (spec §4.D): a loopback HTTP/CONNECT forward proxy
//! that logs a signed `egress` entry for every outbound request *before*
//! forwarding it, so the audit chain records an attempt even when the
//! attempt itself fails.

mod config;
mod error;
mod handlers;
mod headers;
mod invocation;
mod metrics;
mod state;

pub use config::ProxyConfig;
pub use error::ProxyError;
pub use headers::filter_hop_by_hop_headers;
pub use invocation::InvocationTracker;
pub use metrics::ProxyMetrics;

use egress_log_model::{FunctionId, InvocationId};
use egress_log_store::{FunctionSequencer, LogStore};
use egress_signer::Signer;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper_util::rt::TokioIo;
use prometheus::Registry;
use state::SharedState;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;

/// A running (or not-yet-started) Logging Proxy instance, generic over the
/// log store backend it appends `egress` entries to.
pub struct Proxy<S: LogStore + 'static> {
    config: ProxyConfig,
    state: Arc<SharedState<S>>,
    registry: Registry,
    port: Option<u16>,
    shutdown_tx: Option<watch::Sender<bool>>,
    accept_task: Option<JoinHandle<()>>,
    active_connections: Arc<AtomicUsize>,
    drain_notify: Arc<Notify>,
}

impl<S: LogStore + 'static> Proxy<S> {
    pub fn new(
        config: ProxyConfig,
        function_id: FunctionId,
        sequencer: Arc<FunctionSequencer<S>>,
        signer: Arc<Signer>,
    ) -> Result<Self, ProxyError> {
        let registry = Registry::new();
        let metrics = Arc::new(ProxyMetrics::new(&registry)?);
        let state = Arc::new(SharedState {
            function_id,
            sequencer,
            signer,
            invocation: Arc::new(InvocationTracker::new()),
            metrics,
        });
        Ok(Self {
            config,
            state,
            registry,
            port: None,
            shutdown_tx: None,
            accept_task: None,
            active_connections: Arc::new(AtomicUsize::new(0)),
            drain_notify: Arc::new(Notify::new()),
        })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn new_invocation(&self) -> InvocationId {
        self.state.invocation.new_invocation()
    }

    pub fn set_invocation_id(&self, id: InvocationId) {
        self.state.invocation.set_invocation_id(id)
    }

    /// Binds the listener (an OS-chosen ephemeral port when `config.port`
    /// is `0`) and spawns the accept loop.
    pub async fn start(&mut self) -> Result<(), ProxyError> {
        let listener = TcpListener::bind((self.config.bind_host.as_str(), self.config.port)).await?;
        let bound_port = listener.local_addr()?.port();
        self.port = Some(bound_port);

        let (shutdown_tx, mut shutdown_rx) = watch::channel(false);
        self.shutdown_tx = Some(shutdown_tx);

        let state = self.state.clone();
        let active_connections = self.active_connections.clone();
        let drain_notify = self.drain_notify.clone();

        let task = tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = shutdown_rx.changed() => break,
                    accepted = listener.accept() => {
                        let (stream, _) = match accepted {
                            Ok(pair) => pair,
                            Err(e) => {
                                tracing::warn!(error = %e, "accept failed");
                                continue;
                            }
                        };
                        let io = TokioIo::new(stream);
                        let state = state.clone();
                        let active_connections = active_connections.clone();
                        let drain_notify = drain_notify.clone();
                        active_connections.fetch_add(1, Ordering::SeqCst);

                        tokio::spawn(async move {
                            let service = service_fn(move |req| handlers::handle(req, state.clone()));
                            if let Err(e) = http1::Builder::new()
                                .serve_connection(io, service)
                                .with_upgrades()
                                .await
                            {
                                tracing::debug!(error = %e, "connection closed with error");
                            }
                            if active_connections.fetch_sub(1, Ordering::SeqCst) == 1 {
                                drain_notify.notify_waiters();
                            }
                        });
                    }
                }
            }
        });
        self.accept_task = Some(task);
        Ok(())
    }

    /// The actual bound port, once [`Proxy::start`] has run.
    pub fn get_port(&self) -> Option<u16> {
        self.port
    }

    /// Stops accepting new connections and waits for in-flight connections
    /// to finish naturally — no forced kill, per spec §5.
    pub async fn stop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(true);
        }
        if let Some(task) = self.accept_task.take() {
            let _ = task.await;
        }
        loop {
            let notified = self.drain_notify.notified();
            if self.active_connections.load(Ordering::SeqCst) == 0 {
                break;
            }
            notified.await;
        }
    }
}
