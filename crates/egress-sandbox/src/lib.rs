//! The Function Sandbox (spec §4.E): spawns user code as a child process,
//! routes it through the Logging Proxy, bounds it with a wall-clock
//! timeout, and normalizes whatever it emits into a [`FunctionResult`].

pub mod capability;
mod config;
mod error;
mod filter;
mod result;

pub use capability::{CapabilityReport, IsolationLevel};
pub use config::{SandboxConfig, SyscallFilterProfile};
pub use error::SandboxError;
pub use result::{FunctionResult, SandboxStats};

use std::process::Stdio;
use std::time::{Duration, Instant};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::process::Command;

pub struct Sandbox {
    config: SandboxConfig,
}

impl Sandbox {
    pub fn new(config: SandboxConfig) -> Self {
        Self { config }
    }

    pub fn capability_report(&self) -> CapabilityReport {
        capability::probe(self.config.loader_shim_path.as_deref())
    }

    /// Runs one invocation to completion or until the configured timeout,
    /// whichever comes first.
    pub async fn execute(
        &self,
        invocation_id: &str,
        function_id: &str,
        request: serde_json::Value,
    ) -> Result<(FunctionResult, SandboxStats), SandboxError> {
        let context = serde_json::json!({
            "invocationId": invocation_id,
            "functionId": function_id,
            "request": request,
        });
        let context_json = serde_json::to_string(&context)?;

        let mut command = Command::new(&self.config.command);
        command.args(&self.config.args);
        // L1: proxy env vars, case-both-variants (spec §4.E).
        command.env("HTTP_PROXY", &self.config.proxy_url);
        command.env("http_proxy", &self.config.proxy_url);
        command.env("HTTPS_PROXY", &self.config.proxy_url);
        command.env("https_proxy", &self.config.proxy_url);
        command.env("FUNCTION_CONTEXT", &context_json);
        command.env("INVOCATION_ID", invocation_id);
        command.env("FUNCTION_ID", function_id);
        command.stdin(Stdio::piped());
        command.stdout(Stdio::piped());
        command.stderr(Stdio::piped());

        let mut child = command.spawn().map_err(SandboxError::Spawn)?;

        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(context_json.as_bytes())
                .await
                .map_err(SandboxError::Io)?;
            // Drop closes the write half so the child sees EOF on stdin.
        }

        let mut stdout = child.stdout.take().expect("stdout was piped");
        let mut stderr = child.stderr.take().expect("stderr was piped");

        let start = Instant::now();
        let timeout = Duration::from_millis(self.config.timeout_ms);

        let exit_status = match tokio::time::timeout(timeout, child.wait()).await {
            Ok(status) => status.map_err(SandboxError::Io)?,
            Err(_elapsed) => {
                let _ = child.start_kill();
                let _ = child.wait().await;
                return Err(SandboxError::Timeout {
                    millis: self.config.timeout_ms,
                });
            }
        };
        let duration_ms = start.elapsed().as_millis() as u64;

        let mut stdout_bytes = Vec::new();
        let mut stderr_bytes = Vec::new();
        let _ = stdout.read_to_end(&mut stdout_bytes).await;
        let _ = stderr.read_to_end(&mut stderr_bytes).await;

        let stats = SandboxStats {
            duration_ms,
            exit_code: exit_status.code(),
        };

        if !exit_status.success() {
            return Err(SandboxError::NonZeroExit {
                code: exit_status.code(),
                stderr: String::from_utf8_lossy(&stderr_bytes).to_string(),
            });
        }

        let raw: serde_json::Value =
            serde_json::from_slice(&stdout_bytes).map_err(|_| SandboxError::InvalidResponse)?;

        Ok((FunctionResult::normalize(raw), stats))
    }
}
