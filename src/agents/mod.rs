//! Specialized Agent contract and the five roles (§4.3, §9).
//!
//! Five roles share one control shape: build a role-specific system prompt
//! and tool subset, run a provider ↔ tool-registry loop under loop
//! detection, and return text plus the files actually modified. Rather than
//! five trait implementations, this follows the grounding repository's
//! approach of one concrete type whose fields carry the role-specific
//! differences (system prompt, tool subset, model).

use std::path::PathBuf;
use std::sync::Arc;

use serde_json::Value;

use crate::cancellation::CancellationToken;
use crate::error::{CoreError, CoreResult};
use crate::loop_detector::LoopDetector;
use crate::provider::types::{strip_tool_calls_for_finalization, ChatMessage, ChatRequest};
use crate::provider::Provider;
use crate::tools::ToolRegistry;

/// The five specialized roles named in §4.3.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AgentRole {
    Router,
    Query,
    Editor,
    Research,
    Review,
}

/// `(text, modified_files[])` — the result of one agent invocation (§4.3, §4.4).
#[derive(Debug, Clone, Default)]
pub struct AgentOutcome {
    pub text: String,
    pub modified_files: Vec<PathBuf>,
}

/// A role-specific wrapper over the provider and a subset of tools (§4.3).
pub struct Agent {
    role: AgentRole,
    system_prompt: String,
    tool_names: Vec<String>,
    model: String,
    provider: Arc<dyn Provider>,
    registry: ToolRegistry,
}

impl Agent {
    pub fn new(
        role: AgentRole,
        system_prompt: impl Into<String>,
        tool_names: Vec<String>,
        model: impl Into<String>,
        provider: Arc<dyn Provider>,
        registry: ToolRegistry,
    ) -> Self {
        Agent {
            role,
            system_prompt: system_prompt.into(),
            tool_names,
            model: model.into(),
            provider,
            registry,
        }
    }

    pub fn role(&self) -> AgentRole {
        self.role
    }

    /// Role-restricted read-only system prompt + tool subset constructor (§4.3 Query).
    pub fn query(model: impl Into<String>, provider: Arc<dyn Provider>, registry: ToolRegistry) -> Self {
        Agent::new(
            AgentRole::Query,
            "You are a read-only analysis agent. Investigate the workspace using the \
             available tools and answer the user's question. Never attempt to modify files.",
            vec![
                "read_file".into(),
                "list_files".into(),
                "project_map".into(),
                "search_code".into(),
            ],
            model,
            provider,
            registry,
        )
    }

    /// §4.3 Editor: read-only tools plus write_file/apply_patch/run_command.
    pub fn editor(model: impl Into<String>, provider: Arc<dyn Provider>, registry: ToolRegistry) -> Self {
        Agent::new(
            AgentRole::Editor,
            "You are an editing agent. Make the requested changes using the available \
             tools, staying strictly within any path allowlist enforced by the tools \
             themselves. Summarize what you changed when done.",
            vec![
                "read_file".into(),
                "list_files".into(),
                "project_map".into(),
                "search_code".into(),
                "write_file".into(),
                "apply_patch".into(),
                "run_command".into(),
            ],
            model,
            provider,
            registry,
        )
    }

    /// §4.3 Research: web_search plus read-only tools, no file mutation.
    pub fn research(model: impl Into<String>, provider: Arc<dyn Provider>, registry: ToolRegistry) -> Self {
        Agent::new(
            AgentRole::Research,
            "You are a research agent. Gather external information relevant to the task \
             using web search and the read-only workspace tools. You may not modify files.",
            vec![
                "web_search".into(),
                "read_file".into(),
                "list_files".into(),
                "project_map".into(),
                "search_code".into(),
            ],
            model,
            provider,
            registry,
        )
    }

    /// §4.3 Review: read-only tools plus run_command, producing a verdict (§4.11).
    pub fn review(model: impl Into<String>, provider: Arc<dyn Provider>, registry: ToolRegistry) -> Self {
        Agent::new(
            AgentRole::Review,
            "You are a review agent. Verify that the success criteria have been met by \
             examining the modified files and, if useful, running build/test/lint \
             commands. Respond with either the single word SUCCESS, or FAIL followed by \
             one bullet per concrete issue found.",
            vec![
                "read_file".into(),
                "list_files".into(),
                "project_map".into(),
                "search_code".into(),
                "run_command".into(),
            ],
            model,
            provider,
            registry,
        )
    }

    /// §4.3 Router: no tools, single pass classification (§4.4 ML fallback).
    pub fn router(model: impl Into<String>, provider: Arc<dyn Provider>, registry: ToolRegistry) -> Self {
        Agent::new(
            AgentRole::Router,
            "Classify the user's request into exactly one of: query, edit, plan, research. \
             Respond with only that single word.",
            vec![],
            model,
            provider,
            registry,
        )
    }

    /// Run the common tool-calling loop (§4.3) up to `max_iterations`,
    /// finalizing without tools if the cap is reached mid-loop.
    pub async fn execute(
        &self,
        mut history: Vec<ChatMessage>,
        max_iterations: u32,
        cancel: &CancellationToken,
    ) -> CoreResult<AgentOutcome> {
        let mut detector = LoopDetector::new();
        let mut modified_files = Vec::new();
        let tool_defs: Vec<_> = self
            .registry
            .definitions()
            .into_iter()
            .filter(|d| self.tool_names.contains(&d.name))
            .collect();

        let mut iteration = 0u32;
        loop {
            if cancel.is_cancelled() {
                return Err(CoreError::Cancelled);
            }
            iteration += 1;

            let request = ChatRequest::new(self.system_prompt.clone(), history.clone(), self.model.clone())
                .with_tools(tool_defs.clone());
            let response = self.provider.chat(request).await?;

            if !response.has_tool_calls() {
                if detector.record_response(&response.text) {
                    return Err(CoreError::LoopDetected("identical response repeated".into()));
                }
                return Ok(AgentOutcome {
                    text: response.text,
                    modified_files,
                });
            }

            history.push(ChatMessage::assistant_with_tool_calls(
                response.text.clone(),
                response.tool_calls.clone(),
            ));

            for call in &response.tool_calls {
                if detector.record_tool_call(&call.name, &call.arguments) {
                    return Err(CoreError::LoopDetected(format!(
                        "tool call {}({}) repeated too many times",
                        call.name, call.arguments
                    )));
                }

                let content = if !self.tool_names.contains(&call.name) {
                    format!("error: tool {} is not available to the {:?} role", call.name, self.role)
                } else {
                    let arguments: Value = serde_json::from_str(&call.arguments).unwrap_or(Value::Null);
                    let result = self.registry.execute(&call.id, &call.name, &arguments).await;
                    modified_files.extend(result.modified_files.clone());
                    result.as_message_content()
                };
                history.push(ChatMessage::tool_result(call.id.clone(), content));
            }

            if iteration >= max_iterations {
                return self.finalize(history, modified_files).await;
            }
        }
    }

    /// §4.3 step 6: a provider call with `tools = []`, after stripping
    /// `tool_calls` from assistant messages per the §4.1 key policy.
    async fn finalize(&self, history: Vec<ChatMessage>, modified_files: Vec<PathBuf>) -> CoreResult<AgentOutcome> {
        let cleaned = strip_tool_calls_for_finalization(&history);
        let system_prompt = format!("{}\n\nSummarize based on gathered information.", self.system_prompt);
        let request = ChatRequest::new(system_prompt, cleaned, self.model.clone());
        let response = self.provider.chat(request).await?;
        Ok(AgentOutcome {
            text: response.text,
            modified_files,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::test_support::ScriptedProvider;
    use crate::provider::types::{ChatResponse, ToolCall};
    use crate::tools::read_file::ReadFileTool;
    use crate::tools::ToolKind;

    fn registry_with_read_file(root: &std::path::Path) -> ToolRegistry {
        ToolRegistry::new().register(ToolKind::Read, Arc::new(ReadFileTool::new(root)))
    }

    #[tokio::test]
    async fn a_text_only_response_returns_immediately() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(
            "test",
            vec![ChatResponse {
                text: "the answer".into(),
                tool_calls: vec![],
                usage: None,
            }],
        ));
        let agent = Agent::query("model-a", provider, registry_with_read_file(dir.path()));
        let outcome = agent
            .execute(vec![ChatMessage::user("explain auth")], 15, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.text, "the answer");
        assert!(outcome.modified_files.is_empty());
    }

    #[tokio::test]
    async fn a_tool_call_then_text_executes_the_tool_and_returns_modified_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("a.txt"), "contents").unwrap();
        let provider = Arc::new(ScriptedProvider::new(
            "test",
            vec![
                ChatResponse {
                    text: "".into(),
                    tool_calls: vec![ToolCall {
                        id: "1".into(),
                        name: "read_file".into(),
                        arguments: "{\"path\":\"a.txt\"}".into(),
                    }],
                    usage: None,
                },
                ChatResponse {
                    text: "it contains 'contents'".into(),
                    tool_calls: vec![],
                    usage: None,
                },
            ],
        ));
        let agent = Agent::query("model-a", provider, registry_with_read_file(dir.path()));
        let outcome = agent
            .execute(vec![ChatMessage::user("what's in a.txt?")], 15, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.text, "it contains 'contents'");
    }

    #[tokio::test]
    async fn hitting_the_iteration_cap_runs_a_finalization_call() {
        let dir = tempfile::tempdir().unwrap();
        let tool_call = ChatResponse {
            text: "".into(),
            tool_calls: vec![ToolCall {
                id: "1".into(),
                name: "read_file".into(),
                arguments: "{\"path\":\"missing.txt\"}".into(),
            }],
            usage: None,
        };
        // Two identical turns would trip the loop detector before the cap; use
        // distinct args per turn by varying the path queried.
        let mut scripted = vec![];
        for i in 0..2 {
            scripted.push(ChatResponse {
                text: "".into(),
                tool_calls: vec![ToolCall {
                    id: i.to_string(),
                    name: "read_file".into(),
                    arguments: format!("{{\"path\":\"f{}.txt\"}}", i),
                }],
                usage: None,
            });
        }
        scripted.push(ChatResponse {
            text: "final summary".into(),
            tool_calls: vec![],
            usage: None,
        });
        let _ = tool_call;
        let provider = Arc::new(ScriptedProvider::new("test", scripted));
        let agent = Agent::query("model-a", provider, registry_with_read_file(dir.path()));
        let outcome = agent
            .execute(vec![ChatMessage::user("task")], 2, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.text, "final summary");
    }

    #[tokio::test]
    async fn a_tool_outside_the_role_subset_is_rejected_without_executing() {
        let dir = tempfile::tempdir().unwrap();
        let provider = Arc::new(ScriptedProvider::new(
            "test",
            vec![
                ChatResponse {
                    text: "".into(),
                    tool_calls: vec![ToolCall {
                        id: "1".into(),
                        name: "write_file".into(),
                        arguments: "{\"path\":\"a.txt\",\"contents\":\"x\"}".into(),
                    }],
                    usage: None,
                },
                ChatResponse {
                    text: "done".into(),
                    tool_calls: vec![],
                    usage: None,
                },
            ],
        ));
        let agent = Agent::query("model-a", provider, registry_with_read_file(dir.path()));
        let outcome = agent
            .execute(vec![ChatMessage::user("task")], 15, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(outcome.text, "done");
        assert!(!dir.path().join("a.txt").exists());
    }
}
