//! Tool Registry (§4.2).
//!
//! A named set of side-effecting operations an agent can request. Each tool
//! carries a JSON-schema signature ([`ToolSpec`]) and a synchronous-from-the-
//! caller's-viewpoint executor ([`Tool::execute`]); the [`ToolRegistry`]
//! dispatches by name and brackets every call with `tool_start`/`tool_end`
//! events (§4.10) through an injected [`EventEmitter`].

pub mod apply_patch;
pub mod list_files;
pub mod project_map;
pub mod read_file;
pub mod run_command;
pub mod search_code;
pub mod web_search;
pub mod write_file;

use std::collections::HashMap;
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::event::EventEmitter;
use crate::provider::types::ToolDefinition;

/// Result of one tool invocation (§3).
///
/// Exactly one of `result`/`error` is populated, never both empty; tools
/// that mutate the filesystem populate `modified_files`.
#[derive(Debug, Clone, Default)]
pub struct ToolResult {
    pub result: Option<String>,
    pub error: Option<String>,
    pub modified_files: Vec<PathBuf>,
}

impl ToolResult {
    pub fn ok(result: impl Into<String>) -> Self {
        ToolResult {
            result: Some(result.into()),
            error: None,
            modified_files: Vec::new(),
        }
    }

    pub fn ok_with_modified(result: impl Into<String>, modified_files: Vec<PathBuf>) -> Self {
        ToolResult {
            result: Some(result.into()),
            error: None,
            modified_files,
        }
    }

    pub fn err(error: impl Into<String>) -> Self {
        ToolResult {
            result: None,
            error: Some(error.into()),
            modified_files: Vec::new(),
        }
    }

    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// The text fed back to the model as the tool message's content.
    pub fn as_message_content(&self) -> String {
        match (&self.result, &self.error) {
            (Some(r), _) => r.clone(),
            (None, Some(e)) => format!("error: {}", e),
            (None, None) => String::new(),
        }
    }
}

/// A single registered tool: its schema plus its executor.
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;
    fn definition(&self) -> ToolDefinition;
    async fn execute(&self, arguments: &Value) -> ToolResult;
}

/// Whether a tool only reads, or may mutate the filesystem (§5 concurrency rules).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolKind {
    Read,
    Mutating,
    Network,
}

struct RegisteredTool {
    tool: Arc<dyn Tool>,
    kind: ToolKind,
}

/// Dispatches named tool calls to their executors and brackets each with
/// `tool_start`/`tool_end` events.
#[derive(Clone)]
pub struct ToolRegistry {
    tools: Arc<HashMap<String, RegisteredTool>>,
    emitter: Option<Arc<EventEmitter>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        ToolRegistry {
            tools: Arc::new(HashMap::new()),
            emitter: None,
        }
    }

    pub fn with_emitter(mut self, emitter: Arc<EventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    /// Builder-style registration; consumes and returns `self` the way the
    /// rest of this crate's construction-time builders do.
    pub fn register(mut self, kind: ToolKind, tool: Arc<dyn Tool>) -> Self {
        let mut map = (*self.tools).clone_map();
        map.insert(
            tool.name().to_string(),
            RegisteredTool {
                tool,
                kind,
            },
        );
        self.tools = Arc::new(map);
        self
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|r| r.tool.clone())
    }

    pub fn kind_of(&self, name: &str) -> Option<ToolKind> {
        self.tools.get(name).map(|r| r.kind)
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|r| r.tool.definition()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    /// Execute `name` with `arguments`, calling `call_id` the identifier to
    /// correlate the bracketing `tool_start`/`tool_end` events.
    pub async fn execute(&self, call_id: &str, name: &str, arguments: &Value) -> ToolResult {
        if let Some(emitter) = &self.emitter {
            emitter.emit_tool_start(name, call_id);
        }
        let result = match self.tools.get(name) {
            Some(registered) => registered.tool.execute(arguments).await,
            None => ToolResult::err(format!("no such tool: {}", name)),
        };
        if let Some(emitter) = &self.emitter {
            emitter.emit_tool_end(name, call_id, result.is_ok());
        }
        result
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        ToolRegistry::new()
    }
}

// HashMap doesn't implement Clone for Arc<dyn Tool>-bearing values out of the
// box in a way that keeps builder ergonomics; this tiny helper keeps
// `register` a cheap, explicit copy-on-write step instead of requiring
// `RegisteredTool: Clone`.
trait CloneableMap {
    fn clone_map(&self) -> HashMap<String, RegisteredTool>;
}

impl CloneableMap for HashMap<String, RegisteredTool> {
    fn clone_map(&self) -> HashMap<String, RegisteredTool> {
        self.iter()
            .map(|(k, v)| {
                (
                    k.clone(),
                    RegisteredTool {
                        tool: v.tool.clone(),
                        kind: v.kind,
                    },
                )
            })
            .collect()
    }
}

/// Error raised by the shared path-safety check used by every filesystem tool (§4.2 ambient).
#[derive(Debug, Clone)]
pub enum PathSafetyError {
    Absolute(PathBuf),
    Escapes(PathBuf),
}

impl std::fmt::Display for PathSafetyError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PathSafetyError::Absolute(p) => write!(f, "path must be relative to the workspace root: {}", p.display()),
            PathSafetyError::Escapes(p) => write!(f, "path escapes the workspace root: {}", p.display()),
        }
    }
}

/// Resolve `requested` against `root`, rejecting absolute paths and any
/// component walk that would leave `root` (the same defensive approach the
/// grounding repository's filesystem tool uses).
pub fn safe_join(root: &Path, requested: &Path) -> Result<PathBuf, PathSafetyError> {
    if requested.is_absolute() {
        return Err(PathSafetyError::Absolute(requested.to_path_buf()));
    }
    let mut depth: i64 = 0;
    for component in requested.components() {
        match component {
            Component::ParentDir => {
                depth -= 1;
                if depth < 0 {
                    return Err(PathSafetyError::Escapes(requested.to_path_buf()));
                }
            }
            Component::Normal(_) => depth += 1,
            Component::CurDir => {}
            Component::RootDir | Component::Prefix(_) => {
                return Err(PathSafetyError::Absolute(requested.to_path_buf()));
            }
        }
    }
    Ok(root.join(requested))
}
