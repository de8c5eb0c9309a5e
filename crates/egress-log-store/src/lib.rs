//! Durable storage for signed log chains, and [`FunctionSequencer`], the
//! per-`functionId` critical section that makes `getLatestSequence → build
//! → sign → append` atomic (spec §4.F, §6 P8). Two backends are provided:
//! [`MemoryLogStore`] (tests, the `storage::MemoryStorage` pattern) and
//! [`SledLogStore`] (the durable default, mirroring `storage::SledStorage`).

use async_trait::async_trait;
use dashmap::DashMap;
use egress_log_model::{FunctionId, SignedLogEntry};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};

#[derive(Debug, thiserror::Error)]
pub enum LogStoreError {
    #[error("storage backend error: {0}")]
    Backend(String),
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
    #[error("sled error: {0}")]
    Sled(#[from] sled::Error),
    #[error("entry builder failed: {0}")]
    Build(String),
}

/// Append-only storage for one log chain per `functionId`. Implementations
/// must never overwrite or reorder existing entries; sequencing is enforced
/// by [`FunctionSequencer`], not by the store itself.
#[async_trait]
pub trait LogStore: Send + Sync {
    async fn append(&self, entry: SignedLogEntry) -> Result<(), LogStoreError>;

    /// Highest sequence number stored for `function_id`, or `0` if the
    /// chain is empty (so the first entry is sequence `1`, per spec I1).
    async fn get_latest_sequence(&self, function_id: &FunctionId) -> Result<u64, LogStoreError>;

    /// All entries for `function_id`, in the order they were appended.
    async fn get_all(&self, function_id: &FunctionId) -> Result<Vec<SignedLogEntry>, LogStoreError>;

    /// Every distinct `functionId` with at least one entry.
    async fn list_function_ids(&self) -> Result<Vec<FunctionId>, LogStoreError>;
}

/// In-memory backend, used in tests and for short-lived sandboxes where
/// durability doesn't matter.
#[derive(Default)]
pub struct MemoryLogStore {
    chains: RwLock<HashMap<FunctionId, Vec<SignedLogEntry>>>,
}

impl MemoryLogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn append(&self, entry: SignedLogEntry) -> Result<(), LogStoreError> {
        let mut chains = self.chains.write().await;
        chains.entry(entry.entry.function_id().clone()).or_default().push(entry);
        Ok(())
    }

    async fn get_latest_sequence(&self, function_id: &FunctionId) -> Result<u64, LogStoreError> {
        let chains = self.chains.read().await;
        Ok(chains
            .get(function_id)
            .and_then(|entries| entries.last())
            .map(|e| e.entry.sequence())
            .unwrap_or(0))
    }

    async fn get_all(&self, function_id: &FunctionId) -> Result<Vec<SignedLogEntry>, LogStoreError> {
        let chains = self.chains.read().await;
        Ok(chains.get(function_id).cloned().unwrap_or_default())
    }

    async fn list_function_ids(&self) -> Result<Vec<FunctionId>, LogStoreError> {
        let chains = self.chains.read().await;
        Ok(chains.keys().cloned().collect())
    }
}

/// Embedded durable backend. Keys are `{functionId}\0{sequence:020}` so a
/// prefix scan over `{functionId}\0` returns a chain in sequence order
/// without a secondary index, the way `storage::SledStorage` leans on
/// `sled`'s own key ordering.
pub struct SledLogStore {
    db: sled::Db,
}

impl SledLogStore {
    pub fn open(path: impl AsRef<std::path::Path>) -> Result<Self, LogStoreError> {
        let db = sled::open(path).map_err(LogStoreError::Sled)?;
        Ok(Self { db })
    }

    pub fn in_memory() -> Result<Self, LogStoreError> {
        let db = sled::Config::new()
            .temporary(true)
            .open()
            .map_err(LogStoreError::Sled)?;
        Ok(Self { db })
    }

    fn key(function_id: &FunctionId, sequence: u64) -> Vec<u8> {
        let mut key = function_id.as_str().as_bytes().to_vec();
        key.push(0);
        key.extend_from_slice(format!("{:020}", sequence).as_bytes());
        key
    }

    fn prefix(function_id: &FunctionId) -> Vec<u8> {
        let mut prefix = function_id.as_str().as_bytes().to_vec();
        prefix.push(0);
        prefix
    }
}

#[async_trait]
impl LogStore for SledLogStore {
    async fn append(&self, entry: SignedLogEntry) -> Result<(), LogStoreError> {
        let key = Self::key(entry.entry.function_id(), entry.entry.sequence());
        let value = serde_json::to_vec(&entry)?;
        self.db.insert(key, value)?;
        self.db.flush_async().await?;
        Ok(())
    }

    async fn get_latest_sequence(&self, function_id: &FunctionId) -> Result<u64, LogStoreError> {
        let prefix = Self::prefix(function_id);
        match self.db.scan_prefix(&prefix).last() {
            Some(result) => {
                let (_, value) = result?;
                let entry: SignedLogEntry = serde_json::from_slice(&value)?;
                Ok(entry.entry.sequence())
            }
            None => Ok(0),
        }
    }

    async fn get_all(&self, function_id: &FunctionId) -> Result<Vec<SignedLogEntry>, LogStoreError> {
        let prefix = Self::prefix(function_id);
        let mut entries = Vec::new();
        for result in self.db.scan_prefix(&prefix) {
            let (_, value) = result?;
            entries.push(serde_json::from_slice(&value)?);
        }
        Ok(entries)
    }

    async fn list_function_ids(&self) -> Result<Vec<FunctionId>, LogStoreError> {
        let mut ids = std::collections::HashSet::new();
        for result in self.db.iter() {
            let (key, _) = result?;
            if let Some(pos) = key.iter().position(|b| *b == 0) {
                let id = String::from_utf8_lossy(&key[..pos]).to_string();
                ids.insert(FunctionId::new(id));
            }
        }
        Ok(ids.into_iter().collect())
    }
}

/// Serializes the `getLatestSequence → build → sign → append` critical
/// section per `functionId` (spec §6 P8): two concurrent callers for the
/// same chain never observe the same "latest sequence", so they never
/// produce a duplicate or out-of-order entry. Callers for different
/// `functionId`s never block each other.
pub struct FunctionSequencer<S: LogStore> {
    store: Arc<S>,
    locks: DashMap<FunctionId, Arc<Mutex<()>>>,
}

impl<S: LogStore> FunctionSequencer<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            locks: DashMap::new(),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    fn lock_for(&self, function_id: &FunctionId) -> Arc<Mutex<()>> {
        self.locks
            .entry(function_id.clone())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    /// Runs `build` inside the critical section, passing it the next
    /// sequence number for `function_id`, then appends whatever
    /// [`SignedLogEntry`] it returns. `build` is expected to stamp the
    /// entry with the current timestamp and sign it — both must happen
    /// while the lock is held, so the sequence number in the signed bytes
    /// always matches the store position it lands in.
    pub async fn append_next<F, Fut>(
        &self,
        function_id: &FunctionId,
        build: F,
    ) -> Result<SignedLogEntry, LogStoreError>
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = Result<SignedLogEntry, LogStoreError>>,
    {
        let lock = self.lock_for(function_id);
        let _guard = lock.lock().await;
        let next_sequence = self.store.get_latest_sequence(function_id).await? + 1;
        let entry = build(next_sequence).await?;
        self.store.append(entry.clone()).await?;
        Ok(entry)
    }
}
