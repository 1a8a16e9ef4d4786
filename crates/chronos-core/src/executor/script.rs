//! Subprocess executor adapter
//!
//! Success iff the child exits 0. The result bag carries the exit code
//! and trimmed stdout/stderr.

use async_trait::async_trait;
use serde_json::Value;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;

use crate::executor::{AdapterError, JobExecutor, Payload, ScriptPayload};

pub struct ScriptExecutor;

impl ScriptExecutor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for ScriptExecutor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl JobExecutor for ScriptExecutor {
    async fn execute(&self, payload: &Payload) -> Result<Value, AdapterError> {
        let Payload::Script(ScriptPayload {
            command,
            args,
            cwd,
            env,
            timeout_ms,
        }) = payload
        else {
            return Err(AdapterError::InvalidPayload(
                "script executor requires a script payload".to_string(),
            ));
        };

        let mut cmd = Command::new(command);
        cmd.args(args)
            .envs(env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(cwd) = cwd {
            cmd.current_dir(cwd);
        }

        let child = cmd
            .spawn()
            .map_err(|e| AdapterError::Failed(format!("spawn failed: {}", e)))?;

        let output = tokio::time::timeout(
            Duration::from_millis(*timeout_ms),
            child.wait_with_output(),
        )
        .await
        .map_err(|_| AdapterError::Failed(format!("script exceeded {}ms", timeout_ms)))?
        .map_err(|e| AdapterError::Failed(format!("wait failed: {}", e)))?;

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let exit_code = output.status.code().unwrap_or(-1);

        if !output.status.success() {
            return Err(AdapterError::Failed(format!(
                "exit code {}: {}",
                exit_code,
                if stderr.is_empty() { &stdout } else { &stderr }
            )));
        }

        Ok(serde_json::json!({
            "exitCode": exit_code,
            "stdout": stdout,
            "stderr": stderr,
        }))
    }
}
