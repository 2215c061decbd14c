//! Locally-hosted model server wire adapter (§4.1).
//!
//! A minimal, OpenAI-adjacent-but-not-identical protocol typical of
//! self-hosted inference servers (llama.cpp server, vLLM's native endpoint,
//! etc.): a flat `/completion` POST carrying `prompt` instead of a messages
//! array, and tool calls communicated as a `tool_calls` array on the
//! top-level response rather than nested under `choices[0].message`. This
//! adapter exists to prove the abstraction tolerates a second wire shape,
//! not to support every local server variant.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{CoreError, CoreResult};
use crate::provider::types::{ChatRequest, ChatResponse, Role, TokenUsage, ToolCall};
use crate::provider::Provider;

/// Adapter for a locally-hosted model server speaking the flat prompt/response protocol.
pub struct LocalServerProvider {
    http: reqwest::Client,
    base_url: String,
}

impl LocalServerProvider {
    pub fn new(base_url: impl Into<String>) -> Self {
        LocalServerProvider {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
        }
    }

    /// Flatten system prompt + history into the single prompt string the
    /// local server protocol expects, since it has no structured roles.
    fn render_prompt(request: &ChatRequest) -> String {
        let mut prompt = format!("[system]\n{}\n", request.system_prompt);
        for message in &request.messages {
            let tag = match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            };
            prompt.push_str(&format!("[{}]\n{}\n", tag, message.content));
        }
        prompt
    }
}

#[async_trait]
impl Provider for LocalServerProvider {
    fn backend_name(&self) -> &str {
        "local-server"
    }

    async fn chat(&self, request: ChatRequest) -> CoreResult<ChatResponse> {
        let prompt = Self::render_prompt(&request);
        let mut body = json!({
            "model": request.model,
            "prompt": prompt,
        });

        if !request.tools.is_empty() {
            let tools: Vec<_> = request
                .tools
                .iter()
                .map(|t| json!({ "name": t.name, "description": t.description, "schema": t.parameters }))
                .collect();
            body["tools"] = json!(tools);
        }

        let response = self
            .http
            .post(format!("{}/completion", self.base_url))
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::ProviderUnavailable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(CoreError::RateLimited("local server over capacity".into()));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(CoreError::ModelError(format!("local server status {}: {}", status, text)));
        }

        let parsed: LocalCompletion = response
            .json()
            .await
            .map_err(|e| CoreError::ModelError(format!("malformed local completion body: {}", e)))?;

        Ok(ChatResponse {
            text: parsed.content,
            tool_calls: parsed
                .tool_calls
                .unwrap_or_default()
                .into_iter()
                .map(|c| ToolCall {
                    id: c.id,
                    name: c.name,
                    arguments: c.arguments,
                })
                .collect(),
            usage: parsed.tokens_predicted.map(|t| TokenUsage {
                input_tokens: parsed.tokens_evaluated.unwrap_or(0),
                output_tokens: t,
                cached_tokens: 0,
            }),
        })
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LocalToolCall {
    id: String,
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct LocalCompletion {
    content: String,
    #[serde(default)]
    tool_calls: Option<Vec<LocalToolCall>>,
    #[serde(default)]
    tokens_predicted: Option<u32>,
    #[serde(default)]
    tokens_evaluated: Option<u32>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::types::ChatMessage;

    #[test]
    fn render_prompt_flattens_history_with_role_tags() {
        let request = ChatRequest::new("be terse", vec![ChatMessage::user("hi")], "local-7b");
        let prompt = LocalServerProvider::render_prompt(&request);
        assert!(prompt.contains("[system]\nbe terse"));
        assert!(prompt.contains("[user]\nhi"));
    }
}
