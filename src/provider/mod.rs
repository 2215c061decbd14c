//! LLM Provider Abstraction (§4.1).
//!
//! One operation, `chat`, fronts two concrete wire families: an
//! OpenAI-compatible chat-completion protocol ([`openai_compat`]) and a
//! locally-hosted model server protocol ([`local_server`]). Both share the
//! [`Provider`] trait so callers never know which backend they are talking
//! to.

pub mod local_server;
pub mod openai_compat;
pub mod types;

use async_trait::async_trait;

use crate::error::CoreResult;
pub use types::{ChatRequest, ChatResponse, ChatMessage, Intent, Role, TokenUsage, ToolCall, ToolDefinition};

/// Uniform request/response interface over heterogeneous LLM backends (§4.1).
///
/// Implementations MUST uphold:
/// - non-empty `tools` ⇒ either tool-calls or a terminal text response, never both omitted;
/// - empty `tools` ⇒ never return tool-calls (callers rely on this for finalization, §4.3);
/// - transport failures surface as `CoreError::ProviderUnavailable`, quota failures as
///   `CoreError::RateLimited`, and semantically invalid model output as `CoreError::ModelError`.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Human-readable backend name, e.g. `"openai-compatible"` or `"local-server"`.
    fn backend_name(&self) -> &str;

    async fn chat(&self, request: ChatRequest) -> CoreResult<ChatResponse>;
}
