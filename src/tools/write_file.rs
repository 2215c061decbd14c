//! `write_file` — create or overwrite a file (§4.2).
//!
//! Allowlist enforcement (§4.6, §8) lives here rather than in the
//! orchestrator: the orchestrator configures the Editor's registry with an
//! [`AllowlistGuard`], and every mutating call is checked against it before
//! the filesystem is touched, so an out-of-allowlist write never has a side
//! effect to roll back.

use std::collections::HashSet;
use std::path::PathBuf;
use std::sync::Mutex;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{safe_join, Tool, ToolResult};
use crate::provider::types::ToolDefinition;

/// Checked before any mutating tool touches the filesystem. `None` means no
/// restriction (e.g. for an interactive `chat` invocation outside a plan).
#[derive(Clone)]
pub struct AllowlistGuard {
    allowlist: Option<HashSet<PathBuf>>,
}

impl AllowlistGuard {
    pub fn unrestricted() -> Self {
        AllowlistGuard { allowlist: None }
    }

    pub fn restricted(paths: impl IntoIterator<Item = PathBuf>) -> Self {
        AllowlistGuard {
            allowlist: Some(paths.into_iter().collect()),
        }
    }

    pub fn check(&self, relative_path: &std::path::Path) -> Result<(), String> {
        match &self.allowlist {
            None => Ok(()),
            Some(set) => {
                if set.contains(relative_path) {
                    Ok(())
                } else {
                    Err(format!(
                        "{} is not in the step's allowlist",
                        relative_path.display()
                    ))
                }
            }
        }
    }
}

pub struct WriteFileTool {
    root: PathBuf,
    guard: AllowlistGuard,
    touched: Mutex<Vec<PathBuf>>,
}

impl WriteFileTool {
    pub fn new(root: impl Into<PathBuf>, guard: AllowlistGuard) -> Self {
        WriteFileTool {
            root: root.into(),
            guard,
            touched: Mutex::new(Vec::new()),
        }
    }

    /// Paths actually written since construction, for the orchestrator's
    /// `modified_files` aggregation (§3, §4.6).
    pub fn touched_files(&self) -> Vec<PathBuf> {
        self.touched.lock().unwrap().clone()
    }
}

#[async_trait]
impl Tool for WriteFileTool {
    fn name(&self) -> &str {
        "write_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "write_file".into(),
            description: "Create or overwrite a file with the given contents.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "contents": { "type": "string" },
                },
                "required": ["path", "contents"],
            }),
        }
    }

    async fn execute(&self, arguments: &Value) -> ToolResult {
        let path = match arguments.get("path").and_then(Value::as_str) {
            Some(p) => p,
            None => return ToolResult::err("missing required argument: path"),
        };
        let contents = arguments.get("contents").and_then(Value::as_str).unwrap_or("");
        let relative = PathBuf::from(path);

        if let Err(e) = self.guard.check(&relative) {
            // AllowlistViolation: recovered locally, fed back as the tool's error (§7).
            return ToolResult::err(e);
        }

        let resolved = match safe_join(&self.root, &relative) {
            Ok(p) => p,
            Err(e) => return ToolResult::err(e.to_string()),
        };
        if let Some(parent) = resolved.parent() {
            if let Err(e) = tokio::fs::create_dir_all(parent).await {
                return ToolResult::err(format!("could not create parent directories: {}", e));
            }
        }
        match tokio::fs::write(&resolved, contents).await {
            Ok(()) => {
                self.touched.lock().unwrap().push(relative.clone());
                ToolResult::ok_with_modified(format!("wrote {}", path), vec![relative])
            }
            Err(e) => ToolResult::err(format!("could not write {}: {}", path, e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn writes_within_an_unrestricted_guard() {
        let dir = tempfile::tempdir().unwrap();
        let tool = WriteFileTool::new(dir.path(), AllowlistGuard::unrestricted());
        let result = tool.execute(&json!({"path": "a.txt", "contents": "hi"})).await;
        assert!(result.is_ok());
        assert_eq!(result.modified_files, vec![PathBuf::from("a.txt")]);
        assert_eq!(std::fs::read_to_string(dir.path().join("a.txt")).unwrap(), "hi");
    }

    #[tokio::test]
    async fn rejects_writes_outside_the_allowlist() {
        let dir = tempfile::tempdir().unwrap();
        let guard = AllowlistGuard::restricted(vec![PathBuf::from("src/auth.rs")]);
        let tool = WriteFileTool::new(dir.path(), guard);
        let result = tool.execute(&json!({"path": "src/user.rs", "contents": "x"})).await;
        assert!(result.error.is_some());
        assert!(!dir.path().join("src/user.rs").exists());
    }

    #[tokio::test]
    async fn allows_writes_inside_the_allowlist() {
        let dir = tempfile::tempdir().unwrap();
        let guard = AllowlistGuard::restricted(vec![PathBuf::from("src/auth.rs")]);
        let tool = WriteFileTool::new(dir.path(), guard);
        let result = tool.execute(&json!({"path": "src/auth.rs", "contents": "x"})).await;
        assert!(result.is_ok());
    }
}
