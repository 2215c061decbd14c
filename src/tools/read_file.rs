//! `read_file` — read-only file access, truncated to the first ~200 lines (§4.2).

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{safe_join, Tool, ToolResult};
use crate::provider::types::ToolDefinition;

const MAX_LINES: usize = 200;

pub struct ReadFileTool {
    root: PathBuf,
}

impl ReadFileTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ReadFileTool { root: root.into() }
    }
}

#[async_trait]
impl Tool for ReadFileTool {
    fn name(&self) -> &str {
        "read_file"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "read_file".into(),
            description: "Read a file's contents, truncated to the first ~200 lines.".into(),
            parameters: json!({
                "type": "object",
                "properties": { "path": { "type": "string" } },
                "required": ["path"],
            }),
        }
    }

    async fn execute(&self, arguments: &Value) -> ToolResult {
        let path = match arguments.get("path").and_then(Value::as_str) {
            Some(p) => p,
            None => return ToolResult::err("missing required argument: path"),
        };
        let resolved = match safe_join(&self.root, std::path::Path::new(path)) {
            Ok(p) => p,
            Err(e) => return ToolResult::err(e.to_string()),
        };
        match tokio::fs::read_to_string(&resolved).await {
            Ok(contents) => {
                let lines: Vec<&str> = contents.lines().collect();
                if lines.len() > MAX_LINES {
                    let mut truncated = lines[..MAX_LINES].join("\n");
                    truncated.push_str(&format!(
                        "\n... [truncated: {} of {} lines shown]",
                        MAX_LINES,
                        lines.len()
                    ));
                    ToolResult::ok(truncated)
                } else {
                    ToolResult::ok(contents)
                }
            }
            Err(e) => ToolResult::err(format!("could not read {}: {}", path, e)),
        }
    }
}
