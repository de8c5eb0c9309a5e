use crate::invocation::InvocationTracker;
use crate::metrics::ProxyMetrics;
use egress_log_model::FunctionId;
use egress_log_store::{FunctionSequencer, LogStore};
use egress_signer::Signer;
use std::sync::Arc;

/// Everything a request handler needs, shared across connections via `Arc`.
pub struct SharedState<S: LogStore> {
    pub function_id: FunctionId,
    pub sequencer: Arc<FunctionSequencer<S>>,
    pub signer: Arc<Signer>,
    pub invocation: Arc<InvocationTracker>,
    pub metrics: Arc<ProxyMetrics>,
}
