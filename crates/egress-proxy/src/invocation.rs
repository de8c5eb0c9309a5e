//! Invocation correlation (spec §4.D): `newInvocation`/`setInvocationId`.
//! The spec is explicit that this is a single-threaded-sandbox assumption —
//! one proxy instance serves one invocation at a time — so a single shared
//! cell, not a per-request parameter, is the correct model here.

use egress_log_model::InvocationId;
use std::sync::RwLock;

#[derive(Default)]
pub struct InvocationTracker {
    current: RwLock<InvocationId>,
}

impl InvocationTracker {
    pub fn new() -> Self {
        Self {
            current: RwLock::new(InvocationId::new()),
        }
    }

    /// Generates a fresh id and makes it current.
    pub fn new_invocation(&self) -> InvocationId {
        let id = InvocationId::new();
        *self.current.write().expect("invocation lock poisoned") = id;
        id
    }

    /// Adopts an externally-generated id, for when the outer control plane
    /// wants request and egress entries to share one invocation id.
    pub fn set_invocation_id(&self, id: InvocationId) {
        *self.current.write().expect("invocation lock poisoned") = id;
    }

    pub fn current(&self) -> InvocationId {
        *self.current.read().expect("invocation lock poisoned")
    }
}
