//! Shared request/response vocabulary for the LLM provider abstraction (§3, §4.1).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Role of a [`ChatMessage`] within a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Tool,
}

/// `(id, name, arguments)` — a single tool invocation requested by the model (§3).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    pub id: String,
    pub name: String,
    /// Raw JSON arguments, as produced by the model. Kept as a string so a
    /// malformed payload can still round-trip into an error tool message
    /// instead of failing to deserialize before the model ever sees it.
    pub arguments: String,
}

/// One entry of the conversation history (§3).
///
/// Invariant upheld by every producer in this crate: a `tool_call_id` only
/// ever appears on a `Role::Tool` message, and only after an assistant
/// message carrying the matching id in its `tool_calls`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub tool_calls: Option<Vec<ToolCall>>,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::System,
            content: content.into(),
            name: None,
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::User,
            content: content.into(),
            name: None,
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::Assistant,
            content: content.into(),
            name: None,
            tool_call_id: None,
            tool_calls: None,
        }
    }

    pub fn assistant_with_tool_calls(content: impl Into<String>, tool_calls: Vec<ToolCall>) -> Self {
        ChatMessage {
            role: Role::Assistant,
            content: content.into(),
            name: None,
            tool_call_id: None,
            tool_calls: Some(tool_calls),
        }
    }

    pub fn tool_result(tool_call_id: impl Into<String>, content: impl Into<String>) -> Self {
        ChatMessage {
            role: Role::Tool,
            content: content.into(),
            name: None,
            tool_call_id: Some(tool_call_id.into()),
            tool_calls: None,
        }
    }
}

/// JSON-schema shaped tool definition passed to the provider (§4.1, §4.2).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

/// One of the four intents a request may be tagged with, plus `route` used
/// internally by the Coordinator (§3).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Intent {
    Query,
    Edit,
    Plan,
    Research,
    Route,
}

/// Token accounting returned alongside a response, when the backend reports it.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: u32,
    pub output_tokens: u32,
    pub cached_tokens: u32,
}

/// Request sent to [`crate::provider::Provider::chat`] (§4.1).
#[derive(Debug, Clone)]
pub struct ChatRequest {
    pub system_prompt: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<ToolDefinition>,
    pub model: String,
    pub intent: Option<Intent>,
}

impl ChatRequest {
    pub fn new(system_prompt: impl Into<String>, messages: Vec<ChatMessage>, model: impl Into<String>) -> Self {
        ChatRequest {
            system_prompt: system_prompt.into(),
            messages,
            tools: Vec::new(),
            model: model.into(),
            intent: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_intent(mut self, intent: Intent) -> Self {
        self.intent = Some(intent);
        self
    }

    /// True when this request requests no tool use — the shape a
    /// finalization call (§4.1, §4.3 step 6) must have.
    pub fn is_finalization(&self) -> bool {
        self.tools.is_empty()
    }
}

/// Response returned by [`crate::provider::Provider::chat`] (§4.1).
#[derive(Debug, Clone, Default)]
pub struct ChatResponse {
    pub text: String,
    pub tool_calls: Vec<ToolCall>,
    pub usage: Option<TokenUsage>,
}

impl ChatResponse {
    pub fn has_tool_calls(&self) -> bool {
        !self.tool_calls.is_empty()
    }
}

/// Strip `tool_calls` from every assistant message in `history`, per the
/// §4.1 key policy: a finalization request must carry no tool-choice
/// directive and no trace of prior tool calls in the replayed history.
pub fn strip_tool_calls_for_finalization(history: &[ChatMessage]) -> Vec<ChatMessage> {
    history
        .iter()
        .map(|m| {
            let mut m = m.clone();
            if m.role == Role::Assistant {
                m.tool_calls = None;
            }
            m
        })
        .collect()
}
