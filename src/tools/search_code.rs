//! `search_code` — grep-style keyword search with caps on matches/context (§4.2).

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolResult};
use crate::provider::types::ToolDefinition;

const MAX_MATCHES: usize = 50;

pub struct SearchCodeTool {
    root: PathBuf,
}

impl SearchCodeTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        SearchCodeTool { root: root.into() }
    }

    fn walk(dir: &std::path::Path, needle: &str, matches: &mut Vec<String>) {
        let entries = match std::fs::read_dir(dir) {
            Ok(e) => e,
            Err(_) => return,
        };
        for entry in entries.flatten() {
            if matches.len() >= MAX_MATCHES {
                return;
            }
            let path = entry.path();
            if path.is_dir() {
                if path.file_name().and_then(|n| n.to_str()) == Some(".git") {
                    continue;
                }
                Self::walk(&path, needle, matches);
                continue;
            }
            let contents = match std::fs::read_to_string(&path) {
                Ok(c) => c,
                Err(_) => continue,
            };
            for (lineno, line) in contents.lines().enumerate() {
                if matches.len() >= MAX_MATCHES {
                    return;
                }
                if line.contains(needle) {
                    matches.push(format!("{}:{}: {}", path.display(), lineno + 1, line.trim()));
                }
            }
        }
    }
}

#[async_trait]
impl Tool for SearchCodeTool {
    fn name(&self) -> &str {
        "search_code"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "search_code".into(),
            description: "Grep-style keyword search across the workspace, capped at 50 matches.".into(),
            parameters: json!({
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"],
            }),
        }
    }

    async fn execute(&self, arguments: &Value) -> ToolResult {
        let query = match arguments.get("query").and_then(Value::as_str) {
            Some(q) if !q.is_empty() => q,
            _ => return ToolResult::err("missing required argument: query"),
        };
        let mut matches = Vec::new();
        Self::walk(&self.root, query, &mut matches);
        if matches.is_empty() {
            ToolResult::ok("no matches")
        } else {
            let truncated = matches.len() >= MAX_MATCHES;
            let mut body = matches.join("\n");
            if truncated {
                body.push_str(&format!("\n... [truncated at {} matches]", MAX_MATCHES));
            }
            ToolResult::ok(body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn finds_matching_lines_with_path_and_line_number() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.rs"), "fn auth() {}\nfn other() {}\n").unwrap();
        let tool = SearchCodeTool::new(dir.path());
        let result = tool.execute(&json!({"query": "auth"})).await;
        let out = result.result.unwrap();
        assert!(out.contains("a.rs"));
        assert!(out.contains("fn auth"));
    }

    #[tokio::test]
    async fn reports_no_matches_without_error() {
        let dir = tempfile::tempdir().unwrap();
        let tool = SearchCodeTool::new(dir.path());
        let result = tool.execute(&json!({"query": "nonexistent_token"})).await;
        assert_eq!(result.result.unwrap(), "no matches");
    }
}
