//! Review verifier (§4.7): invokes the Review agent and parses its verdict (§4.11).

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{parse_verdict, VerifyOutcome, Verifier};
use crate::agents::Agent;
use crate::cancellation::CancellationToken;
use crate::error::CoreResult;
use crate::provider::types::ChatMessage;

const REVIEW_MAX_ITERATIONS: u32 = 10;

pub struct ReviewVerifier {
    agent: Agent,
    success_criteria: Vec<String>,
}

impl ReviewVerifier {
    pub fn new(agent: Agent, success_criteria: Vec<String>) -> Self {
        ReviewVerifier { agent, success_criteria }
    }
}

#[async_trait]
impl Verifier for ReviewVerifier {
    fn name(&self) -> &str {
        "review"
    }

    async fn verify(&self, _workspace: &Path, changed_files: &[PathBuf]) -> CoreResult<VerifyOutcome> {
        let criteria = self.success_criteria.iter().map(|c| format!("- {}", c)).collect::<Vec<_>>().join("\n");
        let files = changed_files
            .iter()
            .map(|f| f.display().to_string())
            .collect::<Vec<_>>()
            .join("\n");

        let prompt = format!(
            "Success criteria:\n{}\n\nModified files:\n{}\n\nVerify whether the success criteria are met.",
            criteria, files
        );

        let outcome = self
            .agent
            .execute(vec![ChatMessage::user(prompt)], REVIEW_MAX_ITERATIONS, &CancellationToken::new())
            .await?;

        Ok(parse_verdict(&outcome.text))
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::provider::test_support::ScriptedProvider;
    use crate::provider::types::ChatResponse;
    use crate::tools::ToolRegistry;

    #[tokio::test]
    async fn a_success_verdict_from_the_review_agent_passes() {
        let provider = Arc::new(ScriptedProvider::new(
            "test",
            vec![ChatResponse {
                text: "SUCCESS".into(),
                tool_calls: vec![],
                usage: None,
            }],
        ));
        let agent = Agent::review("model-a", provider, ToolRegistry::new());
        let verifier = ReviewVerifier::new(agent, vec!["tests pass: cargo test".into()]);
        let outcome = verifier.verify(Path::new("/workspace"), &[PathBuf::from("src/lib.rs")]).await.unwrap();
        assert!(outcome.ok);
    }

    #[tokio::test]
    async fn a_fail_verdict_surfaces_the_listed_issues() {
        let provider = Arc::new(ScriptedProvider::new(
            "test",
            vec![ChatResponse {
                text: "FAIL\n- missing test coverage for retry_request".into(),
                tool_calls: vec![],
                usage: None,
            }],
        ));
        let agent = Agent::review("model-a", provider, ToolRegistry::new());
        let verifier = ReviewVerifier::new(agent, vec!["tests pass: cargo test".into()]);
        let outcome = verifier.verify(Path::new("/workspace"), &[PathBuf::from("src/lib.rs")]).await.unwrap();
        assert!(!outcome.ok);
        assert_eq!(outcome.issues.len(), 1);
    }
}
