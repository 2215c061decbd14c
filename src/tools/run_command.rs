//! `run_command` — execute a shell command with a timeout (§4.2, §5).
//!
//! Not allowlist-checked (§9 Open Questions: the spec intentionally leaves
//! this out); the orchestrator's safety net for this tool is the
//! snapshot/rollback around each attempt, not pre-execution validation.

use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::AsyncReadExt;
use tokio::process::Command as TokioCommand;

use super::{Tool, ToolResult};
use crate::provider::types::ToolDefinition;

const DEFAULT_TIMEOUT_SECS: u64 = 600; // §5: run_command default timeout is 10 minutes.

pub struct RunCommandTool {
    workdir: PathBuf,
    timeout: Duration,
}

impl RunCommandTool {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        RunCommandTool {
            workdir: workdir.into(),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

#[async_trait]
impl Tool for RunCommandTool {
    fn name(&self) -> &str {
        "run_command"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "run_command".into(),
            description: "Execute a shell command in the workspace with a bounded timeout.".into(),
            parameters: json!({
                "type": "object",
                "properties": { "command": { "type": "string" } },
                "required": ["command"],
            }),
        }
    }

    async fn execute(&self, arguments: &Value) -> ToolResult {
        let command = match arguments.get("command").and_then(Value::as_str) {
            Some(c) => c,
            None => return ToolResult::err("missing required argument: command"),
        };

        let mut child = match TokioCommand::new("/bin/bash")
            .arg("-c")
            .arg(command)
            .current_dir(&self.workdir)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
        {
            Ok(c) => c,
            Err(e) => return ToolResult::err(format!("failed to spawn command: {}", e)),
        };

        let stdout_handle = child.stdout.take();
        let stderr_handle = child.stderr.take();

        // Read both streams concurrently to avoid pipe-buffer deadlocks: a
        // command that fills stderr while we're still draining stdout would
        // otherwise hang forever.
        let run = async {
            let (stdout, stderr) = tokio::join!(read_to_string(stdout_handle), read_to_string(stderr_handle));
            let status = child.wait().await;
            (status, stdout, stderr)
        };

        match tokio::time::timeout(self.timeout, run).await {
            Ok((Ok(status), stdout, stderr)) => {
                let combined = format!("exit status: {}\nstdout:\n{}\nstderr:\n{}", status, stdout, stderr);
                if status.success() {
                    ToolResult::ok(combined)
                } else {
                    ToolResult::err(combined)
                }
            }
            Ok((Err(e), _, _)) => ToolResult::err(format!("command wait failed: {}", e)),
            Err(_) => ToolResult::err(format!("command timed out after {:?}", self.timeout)),
        }
    }
}

async fn read_to_string(handle: Option<impl AsyncReadExt + Unpin>) -> String {
    let mut buf = String::new();
    if let Some(mut h) = handle {
        let _ = h.read_to_string(&mut buf).await;
    }
    buf
}
