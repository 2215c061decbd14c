//! Agent Coordinator (§4.4): the entry point for a single interactive task.
//!
//! Classifies intent (ML classifier with a Router-agent fallback), picks
//! the matching specialized agent, runs its tool-calling loop under an
//! intent-aware iteration cap, and reports back text plus modified files.

use std::path::PathBuf;
use std::sync::Arc;

use crate::agents::{Agent, AgentRole};
use crate::cancellation::CancellationToken;
use crate::error::CoreError;
use crate::provider::types::{ChatMessage, Intent};

/// `(class, confidence)` from an external intent-classification capability (§4.4).
pub trait IntentClassifier: Send + Sync {
    fn classify(&self, text: &str) -> (Intent, f64);
}

/// Coarse complexity signal used to advise plan escalation (§4.4).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Complexity {
    Simple,
    Complex,
    Multistep,
}

pub trait ComplexityClassifier: Send + Sync {
    fn classify(&self, text: &str) -> (Complexity, f64);
}

/// Always reports low confidence so the Coordinator falls back to the
/// Router agent; used in tests and by deployments with no ML classifier
/// wired up yet.
pub struct NoopIntentClassifier;

impl IntentClassifier for NoopIntentClassifier {
    fn classify(&self, _text: &str) -> (Intent, f64) {
        (Intent::Query, 0.0)
    }
}

pub struct NoopComplexityClassifier;

impl ComplexityClassifier for NoopComplexityClassifier {
    fn classify(&self, _text: &str) -> (Complexity, f64) {
        (Complexity::Simple, 0.0)
    }
}

const DEFAULT_INTENT_THRESHOLD: f64 = 0.7;
const DEFAULT_COMPLEXITY_THRESHOLD: f64 = 0.55;

fn iteration_cap(intent: Intent) -> u32 {
    match intent {
        Intent::Query => 15,
        Intent::Edit => 25,
        Intent::Plan => 20,
        Intent::Research => 30,
        Intent::Route => 20,
    }
}

/// `(text, modified_files[], error?)` per §4.4.
#[derive(Debug, Clone, Default)]
pub struct CoordinatorResult {
    pub text: String,
    pub modified_files: Vec<PathBuf>,
    pub error: Option<String>,
}

/// Advisory signal returned alongside a result: the caller decides whether
/// to escalate to the Plan Orchestrator (§4.4 "this is advisory").
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escalation {
    None,
    SuggestPlan,
}

pub struct AgentCoordinator {
    intent_threshold: f64,
    complexity_threshold: f64,
    intent_classifier: Arc<dyn IntentClassifier>,
    complexity_classifier: Arc<dyn ComplexityClassifier>,
    router: Agent,
    query: Agent,
    editor: Agent,
    research: Agent,
}

impl AgentCoordinator {
    pub fn new(
        intent_classifier: Arc<dyn IntentClassifier>,
        complexity_classifier: Arc<dyn ComplexityClassifier>,
        router: Agent,
        query: Agent,
        editor: Agent,
        research: Agent,
    ) -> Self {
        AgentCoordinator {
            intent_threshold: DEFAULT_INTENT_THRESHOLD,
            complexity_threshold: DEFAULT_COMPLEXITY_THRESHOLD,
            intent_classifier,
            complexity_classifier,
            router,
            query,
            editor,
            research,
        }
    }

    pub fn with_intent_threshold(mut self, threshold: f64) -> Self {
        self.intent_threshold = threshold;
        self
    }

    pub fn with_complexity_threshold(mut self, threshold: f64) -> Self {
        self.complexity_threshold = threshold;
        self
    }

    /// §4.4: classify intent, run the matching agent under its iteration
    /// cap, and report the advisory escalation signal alongside the result.
    pub async fn handle(
        &self,
        task: &str,
        cancel: &CancellationToken,
    ) -> (CoordinatorResult, Escalation) {
        let intent = self.classify_intent(task).await;

        let escalation = match self.complexity_classifier.classify(task) {
            (Complexity::Complex, confidence) if confidence >= self.complexity_threshold => Escalation::SuggestPlan,
            _ => Escalation::None,
        };

        let agent = match intent {
            Intent::Query | Intent::Route => &self.query,
            Intent::Edit => &self.editor,
            Intent::Research => &self.research,
            Intent::Plan => &self.editor,
        };

        let history = vec![ChatMessage::user(task)];
        let cap = iteration_cap(intent);

        match agent.execute(history, cap, cancel).await {
            Ok(outcome) => (
                CoordinatorResult {
                    text: outcome.text,
                    modified_files: outcome.modified_files,
                    error: None,
                },
                escalation,
            ),
            Err(err) => (self.failure_result(err), escalation),
        }
    }

    /// First consult the ML classifier; fall back to the Router agent below
    /// `intent_threshold` confidence (§4.4).
    async fn classify_intent(&self, task: &str) -> Intent {
        let (intent, confidence) = self.intent_classifier.classify(task);
        if confidence >= self.intent_threshold {
            return intent;
        }

        let cancel = CancellationToken::new();
        let history = vec![ChatMessage::user(task)];
        match self.router.execute(history, 1, &cancel).await {
            Ok(outcome) => parse_router_verdict(&outcome.text),
            Err(_) => Intent::Query,
        }
    }

    /// §4.4 failure semantics: `ProviderUnavailable`/`RateLimited` surface as
    /// errors to the caller; loop-detector aborts leave already-applied tool
    /// effects in place and are reported, not retried here.
    fn failure_result(&self, err: CoreError) -> CoordinatorResult {
        CoordinatorResult {
            text: String::new(),
            modified_files: Vec::new(),
            error: Some(err.to_string()),
        }
    }
}

fn parse_router_verdict(text: &str) -> Intent {
    match text.trim().to_lowercase().as_str() {
        "query" => Intent::Query,
        "edit" => Intent::Edit,
        "plan" => Intent::Plan,
        "research" => Intent::Research,
        _ => Intent::Query,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::test_support::ScriptedProvider;
    use crate::provider::types::ChatResponse;
    use crate::tools::ToolRegistry;

    fn agents_with_scripted(texts: Vec<&str>) -> (Agent, Agent, Agent, Agent) {
        let make = |t: &str| {
            let provider = Arc::new(ScriptedProvider::new(
                "test",
                vec![ChatResponse {
                    text: t.to_string(),
                    tool_calls: vec![],
                    usage: None,
                }],
            ));
            (provider, ToolRegistry::new())
        };
        let (p1, r1) = make(texts[0]);
        let (p2, r2) = make(texts[1]);
        let (p3, r3) = make(texts[2]);
        let (p4, r4) = make(texts[3]);
        (
            Agent::router("model-a", p1, r1),
            Agent::query("model-a", p2, r2),
            Agent::editor("model-a", p3, r3),
            Agent::research("model-a", p4, r4),
        )
    }

    #[tokio::test]
    async fn high_confidence_ml_classification_skips_the_router() {
        let (router, query, editor, research) = agents_with_scripted(vec!["edit", "q", "edited the file", "r"]);
        struct AlwaysEdit;
        impl IntentClassifier for AlwaysEdit {
            fn classify(&self, _text: &str) -> (Intent, f64) {
                (Intent::Edit, 0.95)
            }
        }
        let coordinator = AgentCoordinator::new(
            Arc::new(AlwaysEdit),
            Arc::new(NoopComplexityClassifier),
            router,
            query,
            editor,
            research,
        );
        let (result, _) = coordinator.handle("fix the bug", &CancellationToken::new()).await;
        assert_eq!(result.text, "edited the file");
        assert!(result.error.is_none());
    }

    #[tokio::test]
    async fn low_confidence_falls_back_to_the_router_agent() {
        let (router, query, editor, research) = agents_with_scripted(vec!["query", "answered", "e", "r"]);
        let coordinator = AgentCoordinator::new(
            Arc::new(NoopIntentClassifier),
            Arc::new(NoopComplexityClassifier),
            router,
            query,
            editor,
            research,
        );
        let (result, _) = coordinator.handle("what does this do?", &CancellationToken::new()).await;
        assert_eq!(result.text, "answered");
    }

    #[tokio::test]
    async fn a_confident_complex_classification_suggests_escalation() {
        let (router, query, editor, research) = agents_with_scripted(vec!["edit", "q", "done", "r"]);
        struct AlwaysEdit;
        impl IntentClassifier for AlwaysEdit {
            fn classify(&self, _text: &str) -> (Intent, f64) {
                (Intent::Edit, 0.95)
            }
        }
        struct AlwaysComplex;
        impl ComplexityClassifier for AlwaysComplex {
            fn classify(&self, _text: &str) -> (Complexity, f64) {
                (Complexity::Complex, 0.9)
            }
        }
        let coordinator = AgentCoordinator::new(
            Arc::new(AlwaysEdit),
            Arc::new(AlwaysComplex),
            router,
            query,
            editor,
            research,
        );
        let (_, escalation) = coordinator.handle("rewrite the auth layer", &CancellationToken::new()).await;
        assert_eq!(escalation, Escalation::SuggestPlan);
    }

    #[tokio::test]
    async fn a_provider_error_surfaces_without_panicking() {
        let provider = Arc::new(ScriptedProvider::new("test", vec![]));
        let query = Agent::query("model-a", provider, ToolRegistry::new());
        let (router, _, editor, research) = agents_with_scripted(vec!["query", "unused", "e", "r"]);
        struct AlwaysQuery;
        impl IntentClassifier for AlwaysQuery {
            fn classify(&self, _text: &str) -> (Intent, f64) {
                (Intent::Query, 0.95)
            }
        }
        let coordinator = AgentCoordinator::new(
            Arc::new(AlwaysQuery),
            Arc::new(NoopComplexityClassifier),
            router,
            query,
            editor,
            research,
        );
        let (result, _) = coordinator.handle("anything", &CancellationToken::new()).await;
        assert!(result.error.is_some());
    }
}
