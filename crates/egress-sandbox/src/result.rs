use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The normalized shape every function invocation produces, whether the
/// child emitted it directly or it was synthesized from a bare value
/// (spec §4.E "result normalization").
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FunctionResult {
    #[serde(rename = "statusCode")]
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    pub body: serde_json::Value,
}

impl FunctionResult {
    /// Interprets a child's raw stdout JSON value as a `FunctionResult`:
    /// if it already looks like `{statusCode, headers?, body}`, it's used
    /// as-is; otherwise it's wrapped per spec §4.E.
    pub fn normalize(raw: serde_json::Value) -> Self {
        if let serde_json::Value::Object(ref map) = raw {
            if let Some(status_code) = map.get("statusCode").and_then(|v| v.as_u64()) {
                let headers = map.get("headers").and_then(|h| {
                    serde_json::from_value::<HashMap<String, String>>(h.clone()).ok()
                });
                let body = map.get("body").cloned().unwrap_or(serde_json::Value::Null);
                return Self {
                    status_code: status_code as u16,
                    headers,
                    body,
                };
            }
        }
        let mut headers = HashMap::new();
        headers.insert("Content-Type".to_string(), "application/json".to_string());
        Self {
            status_code: 200,
            headers: Some(headers),
            body: raw,
        }
    }
}

/// Measurements about one execution, independent of whether it succeeded.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct SandboxStats {
    pub duration_ms: u64,
    pub exit_code: Option<i32>,
}
