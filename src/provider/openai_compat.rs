//! OpenAI-compatible chat-completion wire adapter (§4.1).
//!
//! Talks directly to the `/v1/chat/completions` REST surface that OpenAI,
//! Groq, xAI's Grok, and most self-hosted gateways all implement, the same
//! family of backends the provider abstraction is required to tolerate.
//! Connection reuse follows the shared-client pattern the rest of this
//! stack's HTTP-backed clients use: one `reqwest::Client` per adapter,
//! cloned cheaply across calls.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{CoreError, CoreResult};
use crate::provider::types::{ChatRequest, ChatResponse, ChatMessage, Role, TokenUsage, ToolCall};
use crate::provider::Provider;

/// Adapter for any backend speaking the OpenAI-compatible chat-completion protocol.
pub struct OpenAICompatProvider {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    backend_name: String,
}

impl OpenAICompatProvider {
    pub fn new(base_url: impl Into<String>, api_key: impl Into<String>, backend_name: impl Into<String>) -> Self {
        OpenAICompatProvider {
            http: reqwest::Client::new(),
            base_url: base_url.into(),
            api_key: api_key.into(),
            backend_name: backend_name.into(),
        }
    }

    fn to_wire_message(message: &ChatMessage) -> WireMessage {
        WireMessage {
            role: match message.role {
                Role::System => "system",
                Role::User => "user",
                Role::Assistant => "assistant",
                Role::Tool => "tool",
            }
            .to_string(),
            content: message.content.clone(),
            name: message.name.clone(),
            tool_call_id: message.tool_call_id.clone(),
            tool_calls: message.tool_calls.as_ref().map(|calls| {
                calls
                    .iter()
                    .map(|c| WireToolCall {
                        id: c.id.clone(),
                        call_type: "function".into(),
                        function: WireFunctionCall {
                            name: c.name.clone(),
                            arguments: c.arguments.clone(),
                        },
                    })
                    .collect()
            }),
        }
    }
}

#[async_trait]
impl Provider for OpenAICompatProvider {
    fn backend_name(&self) -> &str {
        &self.backend_name
    }

    async fn chat(&self, request: ChatRequest) -> CoreResult<ChatResponse> {
        let mut wire_messages = vec![WireMessage {
            role: "system".into(),
            content: request.system_prompt.clone(),
            name: None,
            tool_call_id: None,
            tool_calls: None,
        }];
        wire_messages.extend(request.messages.iter().map(Self::to_wire_message));

        let mut body = json!({
            "model": request.model,
            "messages": wire_messages,
        });

        // §4.1 key policy: omit tool-choice and any tool definitions entirely
        // for a finalization call, rather than passing tool_choice=none.
        if !request.tools.is_empty() {
            let tools: Vec<_> = request
                .tools
                .iter()
                .map(|t| {
                    json!({
                        "type": "function",
                        "function": {
                            "name": t.name,
                            "description": t.description,
                            "parameters": t.parameters,
                        }
                    })
                })
                .collect();
            body["tools"] = json!(tools);
        }

        let response = self
            .http
            .post(format!("{}/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::ProviderUnavailable(e.to_string()))?;

        let status = response.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            if log::log_enabled!(log::Level::Warn) {
                log::warn!("{}: rate limited (429)", self.backend_name);
            }
            return Err(CoreError::RateLimited(format!("{} returned 429", self.backend_name)));
        }
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            if log::log_enabled!(log::Level::Error) {
                log::error!("{}: status {}: {}", self.backend_name, status, text);
            }
            return Err(CoreError::ModelError(format!("{} status {}: {}", self.backend_name, status, text)));
        }

        let parsed: WireCompletion = response
            .json()
            .await
            .map_err(|e| CoreError::ModelError(format!("malformed completion body: {}", e)))?;

        let choice = parsed
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| CoreError::ModelError("completion carried no choices".into()))?;

        let tool_calls = choice
            .message
            .tool_calls
            .unwrap_or_default()
            .into_iter()
            .map(|c| ToolCall {
                id: c.id,
                name: c.function.name,
                arguments: c.function.arguments,
            })
            .collect();

        Ok(ChatResponse {
            text: choice.message.content.unwrap_or_default(),
            tool_calls,
            usage: parsed.usage.map(|u| TokenUsage {
                input_tokens: u.prompt_tokens,
                output_tokens: u.completion_tokens,
                cached_tokens: 0,
            }),
        })
    }
}

#[derive(Debug, Clone, Serialize)]
struct WireMessage {
    role: String,
    content: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireToolCall {
    id: String,
    #[serde(rename = "type")]
    call_type: String,
    function: WireFunctionCall,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct WireFunctionCall {
    name: String,
    arguments: String,
}

#[derive(Debug, Deserialize)]
struct WireCompletion {
    choices: Vec<WireChoice>,
    #[serde(default)]
    usage: Option<WireUsage>,
}

#[derive(Debug, Deserialize)]
struct WireChoice {
    message: WireResponseMessage,
}

#[derive(Debug, Deserialize)]
struct WireResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<WireToolCall>>,
}

#[derive(Debug, Deserialize)]
struct WireUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn to_wire_message_preserves_tool_call_shape() {
        let msg = ChatMessage::assistant_with_tool_calls(
            "",
            vec![ToolCall {
                id: "call_1".into(),
                name: "read_file".into(),
                arguments: "{\"path\":\"a.rs\"}".into(),
            }],
        );
        let wire = OpenAICompatProvider::to_wire_message(&msg);
        let calls = wire.tool_calls.unwrap();
        assert_eq!(calls[0].function.name, "read_file");
        assert_eq!(calls[0].id, "call_1");
    }
}
