//! `apply_patch` — apply a unified-diff-like patch to one file (§4.2).
//!
//! Supports a single-file unified diff: a `--- a/<path>` / `+++ b/<path>`
//! header pair followed by one or more `@@ ... @@` hunks of context/`-`/`+`
//! lines. Allowlist enforcement mirrors [`super::write_file::WriteFileTool`].

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::write_file::AllowlistGuard;
use super::{safe_join, Tool, ToolResult};
use crate::provider::types::ToolDefinition;

pub struct ApplyPatchTool {
    root: PathBuf,
    guard: AllowlistGuard,
}

impl ApplyPatchTool {
    pub fn new(root: impl Into<PathBuf>, guard: AllowlistGuard) -> Self {
        ApplyPatchTool {
            root: root.into(),
            guard,
        }
    }

    /// Extract the `+++ b/<path>` target from a unified diff's header.
    fn target_path(patch: &str) -> Option<PathBuf> {
        for line in patch.lines() {
            if let Some(rest) = line.strip_prefix("+++ ") {
                let trimmed = rest.trim_start_matches("b/").trim();
                if trimmed != "/dev/null" {
                    return Some(PathBuf::from(trimmed));
                }
            }
        }
        None
    }

    /// Apply hunks line-by-line against `original`, returning the patched text.
    fn apply_hunks(original: &str, patch: &str) -> Result<String, String> {
        let original_lines: Vec<&str> = original.lines().collect();
        let mut output: Vec<String> = Vec::new();
        let mut cursor = 0usize;
        let mut in_hunk = false;

        for line in patch.lines() {
            if line.starts_with("@@") {
                in_hunk = true;
                continue;
            }
            if !in_hunk {
                continue;
            }
            if let Some(context) = line.strip_prefix(' ') {
                if cursor >= original_lines.len() || original_lines[cursor] != context {
                    return Err(format!("context mismatch at line {}", cursor + 1));
                }
                output.push(original_lines[cursor].to_string());
                cursor += 1;
            } else if let Some(removed) = line.strip_prefix('-') {
                if cursor >= original_lines.len() || original_lines[cursor] != removed {
                    return Err(format!("removal mismatch at line {}", cursor + 1));
                }
                cursor += 1;
            } else if let Some(added) = line.strip_prefix('+') {
                output.push(added.to_string());
            }
        }
        output.extend(original_lines[cursor..].iter().map(|s| s.to_string()));
        Ok(output.join("\n"))
    }
}

#[async_trait]
impl Tool for ApplyPatchTool {
    fn name(&self) -> &str {
        "apply_patch"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "apply_patch".into(),
            description: "Apply a unified-diff-like patch to a single file.".into(),
            parameters: json!({
                "type": "object",
                "properties": { "patch": { "type": "string" } },
                "required": ["patch"],
            }),
        }
    }

    async fn execute(&self, arguments: &Value) -> ToolResult {
        let patch = match arguments.get("patch").and_then(Value::as_str) {
            Some(p) => p,
            None => return ToolResult::err("missing required argument: patch"),
        };
        let relative = match Self::target_path(patch) {
            Some(p) => p,
            None => return ToolResult::err("patch carries no +++ target header"),
        };

        if let Err(e) = self.guard.check(&relative) {
            return ToolResult::err(e);
        }

        let resolved = match safe_join(&self.root, &relative) {
            Ok(p) => p,
            Err(e) => return ToolResult::err(e.to_string()),
        };
        let original = tokio::fs::read_to_string(&resolved).await.unwrap_or_default();
        let patched = match Self::apply_hunks(&original, patch) {
            Ok(p) => p,
            Err(e) => return ToolResult::err(format!("patch did not apply cleanly: {}", e)),
        };
        match tokio::fs::write(&resolved, patched).await {
            Ok(()) => ToolResult::ok_with_modified(format!("patched {}", relative.display()), vec![relative]),
            Err(e) => ToolResult::err(format!("could not write {}: {}", relative.display(), e)),
        }
    }
}
