//! `web_search` — external information retrieval, Research agent only (§4.2, §4.3).

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};

use super::{Tool, ToolResult};
use crate::provider::types::ToolDefinition;

const MAX_RESULTS: usize = 5;

pub struct WebSearchTool {
    http: reqwest::Client,
    endpoint: String,
    api_key: Option<String>,
}

impl WebSearchTool {
    pub fn new(endpoint: impl Into<String>, api_key: Option<String>) -> Self {
        WebSearchTool {
            http: reqwest::Client::new(),
            endpoint: endpoint.into(),
            api_key,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchResult>,
}

#[derive(Debug, Deserialize)]
struct SearchResult {
    title: String,
    url: String,
    #[serde(default)]
    snippet: String,
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "web_search".into(),
            description: "Search the web for external information relevant to the task.".into(),
            parameters: json!({
                "type": "object",
                "properties": { "query": { "type": "string" } },
                "required": ["query"],
            }),
        }
    }

    async fn execute(&self, arguments: &Value) -> ToolResult {
        let query = match arguments.get("query").and_then(Value::as_str) {
            Some(q) => q,
            None => return ToolResult::err("missing required argument: query"),
        };

        let mut request = self.http.get(&self.endpoint).query(&[("q", query)]);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }

        let response = match request.send().await {
            Ok(r) => r,
            Err(e) => return ToolResult::err(format!("web search transport error: {}", e)),
        };
        if !response.status().is_success() {
            return ToolResult::err(format!("web search returned status {}", response.status()));
        }
        let parsed: SearchResponse = match response.json().await {
            Ok(p) => p,
            Err(e) => return ToolResult::err(format!("malformed web search response: {}", e)),
        };

        let body = parsed
            .results
            .into_iter()
            .take(MAX_RESULTS)
            .map(|r| format!("- {} ({})\n  {}", r.title, r.url, r.snippet))
            .collect::<Vec<_>>()
            .join("\n");

        if body.is_empty() {
            ToolResult::ok("no results")
        } else {
            ToolResult::ok(body)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn definition_requires_query() {
        let tool = WebSearchTool::new("https://example.test/search", None);
        let def = tool.definition();
        assert_eq!(def.name, "web_search");
    }
}
