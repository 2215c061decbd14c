//! `project_map` — bounded tree summary of the workspace (§4.2).

use std::path::PathBuf;

use async_trait::async_trait;
use serde_json::{json, Value};

use super::{Tool, ToolResult};
use crate::provider::types::ToolDefinition;

const MAX_DEPTH: usize = 4;
const MAX_ENTRIES: usize = 120;

pub struct ProjectMapTool {
    root: PathBuf,
}

impl ProjectMapTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        ProjectMapTool { root: root.into() }
    }

    fn render(dir: &std::path::Path, prefix: &str, depth: usize, budget: &mut usize, out: &mut String) {
        if depth > MAX_DEPTH || *budget == 0 {
            return;
        }
        let mut entries: Vec<_> = match std::fs::read_dir(dir) {
            Ok(e) => e.flatten().collect(),
            Err(_) => return,
        };
        entries.sort_by_key(|e| e.file_name());
        for entry in entries {
            if *budget == 0 {
                out.push_str(&format!("{}... [truncated]\n", prefix));
                return;
            }
            let name = entry.file_name().to_string_lossy().to_string();
            out.push_str(&format!("{}{}\n", prefix, name));
            *budget -= 1;
            if entry.path().is_dir() {
                Self::render(&entry.path(), &format!("{}  ", prefix), depth + 1, budget, out);
            }
        }
    }
}

#[async_trait]
impl Tool for ProjectMapTool {
    fn name(&self) -> &str {
        "project_map"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "project_map".into(),
            description: "Produce a bounded-depth tree summary of the workspace.".into(),
            parameters: json!({ "type": "object", "properties": {} }),
        }
    }

    async fn execute(&self, _arguments: &Value) -> ToolResult {
        let mut budget = MAX_ENTRIES;
        let mut out = String::new();
        Self::render(&self.root, "", 0, &mut budget, &mut out);
        ToolResult::ok(out)
    }
}
