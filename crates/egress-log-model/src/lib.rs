//! Shared data model for the egress audit chain: the tagged `LogEntry`
//! variants of spec §3, their signed wire form, and the canonical byte
//! serialization the Signer signs over.
//!
//! This crate knows nothing about signing, storage, or the network — it is
//! the common vocabulary that `egress-signer`, `egress-log-store`,
//! `egress-verify`, `egress-proxy` and `egress-audit` all build on, mirroring
//! how `bpi-enc` is factored out from the crates that call `domain_hash`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Opaque identifier of a logical log stream (spec §3 `functionId`).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FunctionId(String);

impl FunctionId {
    /// Reserved stream used by the Request/Response Audit Layer (spec §4.F:
    /// "a separate logical functionId (convention: a reserved id such as the
    /// runtime's own)").
    pub const RUNTIME_ID: &'static str = "__runtime__";

    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn runtime() -> Self {
        Self(Self::RUNTIME_ID.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FunctionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl Serialize for FunctionId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.0)
    }
}

impl<'de> Deserialize<'de> for FunctionId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        String::deserialize(deserializer).map(FunctionId)
    }
}

/// Correlates entries of one logical invocation (spec §3 `invocationId`,
/// glossary "Invocation id").
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct InvocationId(Uuid);

impl InvocationId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    pub fn from_uuid(id: Uuid) -> Self {
        Self(id)
    }

    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl Default for InvocationId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for InvocationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

impl Serialize for InvocationId {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for InvocationId {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Uuid::deserialize(deserializer).map(InvocationId)
    }
}

/// Transport used for an egress call (spec §3 `protocol`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Http,
    Https,
}

/// A single audit chain entry (spec §3 "Log Entry is a tagged variant with
/// three kinds"). The base fields (`sequence`, `functionId`, `invocationId`,
/// `timestamp`) appear first in every serialized form, followed by the
/// variant's own fields, in the order declared below — this ordering is the
/// canonical-serialization contract spec §4.A requires for signing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum LogEntry {
    Egress {
        sequence: u64,
        #[serde(rename = "functionId")]
        function_id: FunctionId,
        #[serde(rename = "invocationId")]
        invocation_id: InvocationId,
        timestamp: DateTime<Utc>,
        method: String,
        host: String,
        port: u16,
        path: String,
        protocol: Protocol,
    },
    Request {
        sequence: u64,
        #[serde(rename = "functionId")]
        function_id: FunctionId,
        #[serde(rename = "invocationId")]
        invocation_id: InvocationId,
        timestamp: DateTime<Utc>,
        method: String,
        path: String,
        #[serde(rename = "sourceIp")]
        source_ip: String,
        #[serde(rename = "clientId", skip_serializing_if = "Option::is_none")]
        client_id: Option<String>,
        #[serde(rename = "requestSize")]
        request_size: u64,
        #[serde(rename = "requestHash")]
        request_hash: String,
    },
    Response {
        sequence: u64,
        #[serde(rename = "functionId")]
        function_id: FunctionId,
        #[serde(rename = "invocationId")]
        invocation_id: InvocationId,
        timestamp: DateTime<Utc>,
        #[serde(rename = "requestSeq")]
        request_seq: u64,
        status: u16,
        #[serde(rename = "responseSize")]
        response_size: u64,
        #[serde(rename = "responseHash")]
        response_hash: String,
        #[serde(rename = "durationMs")]
        duration_ms: u64,
    },
}

impl LogEntry {
    pub fn kind(&self) -> &'static str {
        match self {
            LogEntry::Egress { .. } => "egress",
            LogEntry::Request { .. } => "request",
            LogEntry::Response { .. } => "response",
        }
    }

    pub fn sequence(&self) -> u64 {
        match self {
            LogEntry::Egress { sequence, .. }
            | LogEntry::Request { sequence, .. }
            | LogEntry::Response { sequence, .. } => *sequence,
        }
    }

    pub fn function_id(&self) -> &FunctionId {
        match self {
            LogEntry::Egress { function_id, .. }
            | LogEntry::Request { function_id, .. }
            | LogEntry::Response { function_id, .. } => function_id,
        }
    }

    pub fn invocation_id(&self) -> InvocationId {
        match self {
            LogEntry::Egress { invocation_id, .. }
            | LogEntry::Request { invocation_id, .. }
            | LogEntry::Response { invocation_id, .. } => *invocation_id,
        }
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            LogEntry::Egress { timestamp, .. }
            | LogEntry::Request { timestamp, .. }
            | LogEntry::Response { timestamp, .. } => *timestamp,
        }
    }
}

/// A `LogEntry` plus its signature, as persisted by the Log Store and served
/// on the wire (spec §3 "Signed Log Entry").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignedLogEntry {
    #[serde(flatten)]
    pub entry: LogEntry,
    /// Base64 encoding of the RSASSA-PKCS1-v1_5/SHA-256 signature over
    /// [`canonical_signing_bytes`] of `entry`.
    pub signature: String,
}

/// The exact bytes the Signer signs and the Verifier re-derives: the entry
/// serialized alone, compactly, with no `signature` field present (spec I3).
///
/// `serde_json::to_vec` on a struct/enum serializes fields in the order the
/// `Serialize` impl emits them — unlike going through `serde_json::Value`,
/// it never re-sorts keys — so the declared field order above is exactly the
/// signed byte order.
pub fn canonical_signing_bytes(entry: &LogEntry) -> Vec<u8> {
    serde_json::to_vec(entry).expect("LogEntry serialization is infallible")
}
