//! `list_files` — directory listing with a glob filter, capped entries/depth (§4.2).

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{safe_join, Tool, ToolResult};
use crate::provider::types::ToolDefinition;

const MAX_ENTRIES: usize = 30;
const MAX_DEPTH: usize = 3;

pub struct ListFilesTool {
    root: PathBuf,
}

impl ListFilesTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ListFilesTool { root: root.into() }
    }

    fn walk(dir: &std::path::Path, base: &std::path::Path, depth: usize, pattern: Option<&str>, out: &mut Vec<String>) {
        if depth > MAX_DEPTH || out.len() >= MAX_ENTRIES {
            return;
        }
        let entries = match std::fs::read_dir(dir) {
            Ok(e) => e,
            Err(_) => return,
        };
        for entry in entries.flatten() {
            if out.len() >= MAX_ENTRIES {
                return;
            }
            let path = entry.path();
            let relative = path.strip_prefix(base).unwrap_or(&path).to_string_lossy().to_string();
            let matches = pattern.map(|p| relative.contains(p)).unwrap_or(true);
            if matches {
                out.push(relative.clone());
            }
            if path.is_dir() {
                Self::walk(&path, base, depth + 1, pattern, out);
            }
        }
    }
}

#[async_trait]
impl Tool for ListFilesTool {
    fn name(&self) -> &str {
        "list_files"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "list_files".into(),
            description: "List files under a directory, optionally filtered by a glob fragment.".into(),
            parameters: json!({
                "type": "object",
                "properties": {
                    "path": { "type": "string" },
                    "pattern": { "type": "string" },
                },
                "required": ["path"],
            }),
        }
    }

    async fn execute(&self, arguments: &Value) -> ToolResult {
        let path = arguments.get("path").and_then(Value::as_str).unwrap_or(".");
        let pattern = arguments.get("pattern").and_then(Value::as_str);
        let resolved = match safe_join(&self.root, std::path::Path::new(path)) {
            Ok(p) => p,
            Err(e) => return ToolResult::err(e.to_string()),
        };
        if !resolved.is_dir() {
            return ToolResult::err(format!("{} is not a directory", path));
        }
        let mut entries = Vec::new();
        Self::walk(&resolved, &self.root, 0, pattern, &mut entries);
        let note = if entries.len() >= MAX_ENTRIES {
            format!("\n... [truncated at {} entries]", MAX_ENTRIES)
        } else {
            String::new()
        };
        ToolResult::ok(format!("{}{}", entries.join("\n"), note))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lists_entries_relative_to_root() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "").unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        let tool = ListFilesTool::new(dir.path());
        let result = tool.execute(&json!({"path": "."})).await;
        let out = result.result.unwrap();
        assert!(out.contains("a.rs"));
        assert!(out.contains("b.txt"));
    }

    #[tokio::test]
    async fn filters_by_pattern() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "").unwrap();
        std::fs::write(dir.path().join("b.txt"), "").unwrap();
        let tool = ListFilesTool::new(dir.path());
        let result = tool.execute(&json!({"path": ".", "pattern": ".rs"})).await;
        let out = result.result.unwrap();
        assert!(out.contains("a.rs"));
        assert!(!out.contains("b.txt"));
    }
}
