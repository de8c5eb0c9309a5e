//! The Request/Response Audit Layer (spec §4.F): wraps inbound handling of
//! the outer control plane with its own signed chain, on the reserved
//! `FunctionId::runtime()` stream, sharing the Proxy's sequencing
//! discipline but kept independent from any function's egress chain.

use chrono::Utc;
use egress_log_model::{FunctionId, InvocationId, LogEntry, SignedLogEntry};
use egress_log_store::{FunctionSequencer, LogStore, LogStoreError};
use egress_signer::Signer;
use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, thiserror::Error)]
pub enum AuditError {
    #[error("log store error: {0}")]
    LogStore(#[from] LogStoreError),
}

pub struct RequestAudit<S: LogStore> {
    sequencer: Arc<FunctionSequencer<S>>,
    signer: Arc<Signer>,
    function_id: FunctionId,
}

impl<S: LogStore + 'static> RequestAudit<S> {
    pub fn new(sequencer: Arc<FunctionSequencer<S>>, signer: Arc<Signer>) -> Self {
        Self {
            sequencer,
            signer,
            function_id: FunctionId::runtime(),
        }
    }

    /// Logs the `request` entry before user code runs, returning a guard
    /// that must be completed with [`RequestAuditGuard::finish`].
    pub async fn begin_request(
        &self,
        invocation_id: InvocationId,
        method: String,
        path: String,
        source_ip: String,
        client_id: Option<String>,
        body: &[u8],
    ) -> Result<RequestAuditGuard<S>, AuditError> {
        let request_size = body.len() as u64;
        let request_hash = hex::encode(Sha256::digest(body));
        let signer = self.signer.clone();
        let function_id_for_entry = self.function_id.clone();

        let signed = self
            .sequencer
            .append_next(&self.function_id, move |sequence| {
                let function_id = function_id_for_entry.clone();
                async move {
                    let entry = LogEntry::Request {
                        sequence,
                        function_id,
                        invocation_id,
                        timestamp: Utc::now(),
                        method,
                        path,
                        source_ip,
                        client_id,
                        request_size,
                        request_hash,
                    };
                    let signature = signer
                        .sign(&entry)
                        .map_err(|e| LogStoreError::Build(e.to_string()))?;
                    Ok(SignedLogEntry { entry, signature })
                }
            })
            .await?;

        Ok(RequestAuditGuard {
            sequencer: self.sequencer.clone(),
            signer: self.signer.clone(),
            function_id: self.function_id.clone(),
            invocation_id,
            request_seq: signed.entry.sequence(),
            start: Instant::now(),
            finished: false,
        })
    }
}

/// RAII handle for one request's audit lifecycle. Dropping it without
/// calling [`finish`](RequestAuditGuard::finish) logs a synthetic 5xx
/// `response` entry with the elapsed time, so a handler that panics
/// mid-request still produces a contiguous chain (spec I1) instead of an
/// orphaned `request` entry.
pub struct RequestAuditGuard<S: LogStore> {
    sequencer: Arc<FunctionSequencer<S>>,
    signer: Arc<Signer>,
    function_id: FunctionId,
    invocation_id: InvocationId,
    request_seq: u64,
    start: Instant,
    finished: bool,
}

/// Status recorded when a guard is dropped without `finish` being called.
pub const ABANDONED_STATUS: u16 = 599;

impl<S: LogStore + 'static> RequestAuditGuard<S> {
    pub fn request_seq(&self) -> u64 {
        self.request_seq
    }

    /// Logs the `response` entry just before bytes are flushed to the
    /// client.
    pub async fn finish(mut self, status: u16, body: &[u8]) -> Result<SignedLogEntry, AuditError> {
        self.finished = true;
        self.log_response(status, body).await
    }

    async fn log_response(&self, status: u16, body: &[u8]) -> Result<SignedLogEntry, AuditError> {
        let response_size = body.len() as u64;
        let response_hash = hex::encode(Sha256::digest(body));
        let duration_ms = self.start.elapsed().as_millis() as u64;
        let request_seq = self.request_seq;
        let invocation_id = self.invocation_id;
        let signer = self.signer.clone();
        let function_id_for_entry = self.function_id.clone();

        self.sequencer
            .append_next(&self.function_id, move |sequence| {
                let function_id = function_id_for_entry.clone();
                async move {
                    let entry = LogEntry::Response {
                        sequence,
                        function_id,
                        invocation_id,
                        timestamp: Utc::now(),
                        request_seq,
                        status,
                        response_size,
                        response_hash,
                        duration_ms,
                    };
                    let signature = signer
                        .sign(&entry)
                        .map_err(|e| LogStoreError::Build(e.to_string()))?;
                    Ok(SignedLogEntry { entry, signature })
                }
            })
            .await
            .map_err(Into::into)
    }
}

impl<S: LogStore + 'static> Drop for RequestAuditGuard<S> {
    fn drop(&mut self) {
        if self.finished {
            return;
        }
        let sequencer = self.sequencer.clone();
        let signer = self.signer.clone();
        let function_id = self.function_id.clone();
        let invocation_id = self.invocation_id;
        let request_seq = self.request_seq;
        let duration_ms = self.start.elapsed().as_millis() as u64;

        tokio::spawn(async move {
            let body = br#"{"error":"request audit guard dropped before completion"}"#;
            let response_hash = hex::encode(Sha256::digest(body));
            let response_size = body.len() as u64;

            let result = sequencer
                .append_next(&function_id, move |sequence| {
                    let function_id = function_id.clone();
                    async move {
                        let entry = LogEntry::Response {
                            sequence,
                            function_id,
                            invocation_id,
                            timestamp: Utc::now(),
                            request_seq,
                            status: ABANDONED_STATUS,
                            response_size,
                            response_hash,
                            duration_ms,
                        };
                        let signature = signer
                            .sign(&entry)
                            .map_err(|e| LogStoreError::Build(e.to_string()))?;
                        Ok(SignedLogEntry { entry, signature })
                    }
                })
                .await;

            if let Err(e) = result {
                tracing::error!(error = %e, "failed to log synthetic response for abandoned request guard");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use egress_log_store::MemoryLogStore;

    async fn setup() -> (RequestAudit<MemoryLogStore>, Arc<MemoryLogStore>) {
        let store = Arc::new(MemoryLogStore::new());
        let sequencer = Arc::new(FunctionSequencer::new(store.clone()));
        let signer = Arc::new(Signer::generate().unwrap());
        (RequestAudit::new(sequencer, signer), store)
    }

    #[tokio::test]
    async fn request_and_response_form_a_contiguous_chain() {
        let (audit, store) = setup().await;
        let guard = audit
            .begin_request(
                InvocationId::new(),
                "GET".to_string(),
                "/".to_string(),
                "127.0.0.1".to_string(),
                None,
                b"",
            )
            .await
            .unwrap();
        assert_eq!(guard.request_seq(), 1);
        guard.finish(200, b"ok").await.unwrap();

        let entries = store.get_all(&FunctionId::runtime()).await.unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].entry.sequence(), 1);
        assert_eq!(entries[1].entry.sequence(), 2);
    }

    #[tokio::test]
    async fn dropping_guard_without_finish_logs_synthetic_response() {
        let (audit, store) = setup().await;
        {
            let _guard = audit
                .begin_request(
                    InvocationId::new(),
                    "GET".to_string(),
                    "/".to_string(),
                    "127.0.0.1".to_string(),
                    None,
                    b"",
                )
                .await
                .unwrap();
            // dropped here without calling finish()
        }
        // give the spawned fallback task a chance to run.
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        let entries = store.get_all(&FunctionId::runtime()).await.unwrap();
        assert_eq!(entries.len(), 2);
        if let LogEntry::Response { status, .. } = &entries[1].entry {
            assert_eq!(*status, ABANDONED_STATUS);
        } else {
            panic!("expected a response entry");
        }
    }
}
