//! Plan Orchestrator "Maestro" (§4.6): runs a [`Plan`] step by step under
//! snapshot/rollback, a verifier set, and model-switching retries.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;

use crate::agents::AgentOutcome;
use crate::cancellation::CancellationToken;
use crate::checkpoint::{Checkpoint, PlanLock};
use crate::config::Mode;
use crate::error::{CoreError, CoreResult};
use crate::event::EventEmitter;
use crate::plan::{Plan, PlanStep};
use crate::selector::{self, Action, FeedbackSource, ModelCatalog, UsageSource};
use crate::store::feedback::{FeedbackEvent, FeedbackOrigin, FeedbackStore, Sentiment};
use crate::verifier::{run_verifier_set, VerifyOutcome, Verifier};

const DEFAULT_MAX_RETRIES: u32 = 3;

/// Runs one Editor attempt for a step under its allowlist (§4.6).
///
/// A trait rather than a concrete `Agent` because the allowlist differs per
/// step and is baked into the tool registry at construction time; the
/// caller supplies whatever wiring produces that per-step registry.
#[async_trait]
pub trait StepExecutor: Send + Sync {
    async fn execute_step(
        &self,
        step: &PlanStep,
        model: &str,
        retry_feedback: Option<&str>,
        cancel: &CancellationToken,
    ) -> CoreResult<AgentOutcome>;
}

/// Records and restores workspace state around a step attempt (§4.6
/// "snapshot semantics") — a git stash/commit pointer in production.
pub trait WorkspaceSnapshotter: Send + Sync {
    fn snapshot(&self) -> CoreResult<String>;
    fn rollback(&self, snapshot_ref: &str) -> CoreResult<()>;
}

/// Optional per-plan spend ceiling (§4.6 "Budget").
#[derive(Debug, Clone, Copy)]
pub struct Budget {
    pub limit: f64,
    pub spent: f64,
}

impl Budget {
    pub fn new(limit: f64) -> Self {
        Budget { limit, spent: 0.0 }
    }

    fn charge(&mut self, amount: f64) -> CoreResult<()> {
        self.spent += amount;
        if self.spent > self.limit {
            return Err(CoreError::BudgetExceeded(format!("spent {:.2} of {:.2}", self.spent, self.limit)));
        }
        Ok(())
    }
}

pub struct Orchestrator {
    executor: Arc<dyn StepExecutor>,
    snapshotter: Arc<dyn WorkspaceSnapshotter>,
    verifiers_for_step: Box<dyn Fn(&PlanStep) -> Vec<Box<dyn Verifier>> + Send + Sync>,
    emitter: Option<Arc<EventEmitter>>,
    workspace: PathBuf,
    checkpoint_path: PathBuf,
    max_retries: u32,
    catalog: ModelCatalog,
    usage: Arc<dyn UsageSource>,
    feedback: Arc<dyn FeedbackSource>,
    feedback_store: Arc<FeedbackStore>,
    mode: Mode,
    language: Option<String>,
    budget: Option<Budget>,
}

impl Orchestrator {
    pub fn new(
        executor: Arc<dyn StepExecutor>,
        snapshotter: Arc<dyn WorkspaceSnapshotter>,
        verifiers_for_step: Box<dyn Fn(&PlanStep) -> Vec<Box<dyn Verifier>> + Send + Sync>,
        workspace: impl Into<PathBuf>,
        checkpoint_path: impl Into<PathBuf>,
        catalog: ModelCatalog,
        usage: Arc<dyn UsageSource>,
        feedback: Arc<dyn FeedbackSource>,
        feedback_store: Arc<FeedbackStore>,
        mode: Mode,
    ) -> Self {
        Orchestrator {
            executor,
            snapshotter,
            verifiers_for_step,
            emitter: None,
            workspace: workspace.into(),
            checkpoint_path: checkpoint_path.into(),
            max_retries: DEFAULT_MAX_RETRIES,
            catalog,
            usage,
            feedback,
            feedback_store,
            mode,
            language: None,
            budget: None,
        }
    }

    pub fn with_emitter(mut self, emitter: Arc<EventEmitter>) -> Self {
        self.emitter = Some(emitter);
        self
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_language(mut self, language: impl Into<String>) -> Self {
        self.language = Some(language.into());
        self
    }

    pub fn with_budget(mut self, budget: Budget) -> Self {
        self.budget = Some(budget);
        self
    }

    /// Run every step of `plan` not already marked complete in its
    /// checkpoint, starting each step's first attempt on `initial_model`
    /// (§4.6 central loop).
    pub async fn run_plan(&self, plan: &Plan, initial_model: &str, cancel: &CancellationToken) -> CoreResult<()> {
        let _lock = PlanLock::acquire(&self.checkpoint_path)?;
        let mut checkpoint = Checkpoint::load_or_new(&self.checkpoint_path, &plan.id)?;
        let mut budget = self.budget;

        for step in &plan.steps {
            if checkpoint.is_complete(step.index) {
                continue;
            }
            self.run_step(step, initial_model, &mut checkpoint, &mut budget, cancel).await?;
        }
        Ok(())
    }

    async fn run_step(
        &self,
        step: &PlanStep,
        initial_model: &str,
        checkpoint: &mut Checkpoint,
        budget: &mut Option<Budget>,
        cancel: &CancellationToken,
    ) -> CoreResult<()> {
        if let Some(emitter) = &self.emitter {
            emitter.emit_step_start(step.index, &step.title);
        }

        let snapshot_ref = self.snapshotter.snapshot()?;
        let mut current_model = initial_model.to_string();
        let mut retry_feedback: Option<String> = None;
        // Counts attempts that have already *failed*; only consulted after a
        // failure, so `max_retries = 0` still runs and verifies once before
        // giving up (§8 boundary property) instead of bailing pre-emptively.
        let mut failed_attempts = 0u32;
        let verifiers = (self.verifiers_for_step)(step);

        loop {
            if cancel.is_cancelled() {
                self.snapshotter.rollback(&snapshot_ref)?;
                checkpoint.record_failure("cancelled", Utc::now().to_rfc3339(), &self.checkpoint_path)?;
                return Err(CoreError::Cancelled);
            }

            if let Some(b) = budget.as_mut() {
                b.charge(1.0)?;
            }

            let outcome = match self
                .executor
                .execute_step(step, &current_model, retry_feedback.as_deref(), cancel)
                .await
            {
                Ok(outcome) => outcome,
                Err(err) if is_fatal(&err) => return Err(err),
                Err(err) => {
                    self.snapshotter.rollback(&snapshot_ref)?;
                    failed_attempts += 1;
                    if failed_attempts > self.max_retries {
                        return Err(self.abandon_step(step, &current_model, &[err.to_string()], &[]));
                    }
                    retry_feedback = Some(build_retry_prompt(step, &[err.to_string()]));
                    continue;
                }
            };

            let verify_result = run_verifier_set(&verifiers, &self.workspace, &outcome.modified_files).await?;

            if verify_result.ok {
                checkpoint.mark_complete(step.index, Utc::now().to_rfc3339(), snapshot_ref.clone(), &self.checkpoint_path)?;
                if let Some(emitter) = &self.emitter {
                    emitter.emit_step_end(step.index, true, None);
                }
                self.synthesize_feedback(&current_model, step, Sentiment::Good, &outcome.modified_files);
                return Ok(());
            }

            self.snapshotter.rollback(&snapshot_ref)?;
            failed_attempts += 1;
            if failed_attempts > self.max_retries {
                if let Some(emitter) = &self.emitter {
                    emitter.emit_step_end(step.index, false, Some("max_retries"));
                }
                log::warn!("step \"{}\" exhausted {} retries", step.title, self.max_retries);
                return Err(self.abandon_step(step, &current_model, &verify_result.issues, &outcome.modified_files));
            }

            // §4.6 "if error-category suggests switching models": a model that
            // just failed verification earns a bad mark before we consider
            // replacing it (§8 scenario 3).
            self.synthesize_feedback(&current_model, step, Sentiment::Bad, &outcome.modified_files);
            if failed_attempts > 1 {
                if let Ok((_, model_id)) = self.select_model_for_retry(step) {
                    current_model = model_id;
                }
            }
            retry_feedback = Some(build_retry_prompt(step, &verify_result.issues));
        }
    }

    fn select_model_for_retry(&self, step: &PlanStep) -> CoreResult<(String, String)> {
        let _ = step;
        selector::select(
            &self.catalog,
            Action::Edit,
            self.language.as_deref(),
            crate::coordinator::Complexity::Simple,
            self.mode,
            self.usage.as_ref(),
            self.feedback.as_ref(),
        )
    }

    /// Builds the `VerifierFailure` for a step that exhausted its retries,
    /// recording a final bad mark for the model that was running it.
    fn abandon_step(&self, step: &PlanStep, model: &str, issues: &[String], files: &[PathBuf]) -> CoreError {
        self.synthesize_feedback(model, step, Sentiment::Bad, files);
        CoreError::VerifierFailure(format!(
            "step \"{}\" did not pass verification within {} attempts: {}",
            step.title,
            self.max_retries + 1,
            issues.join("; ")
        ))
    }

    /// Writes a synthesized feedback event so future Selector calls learn
    /// from this step's outcome (§4.9, §3 "Feedback event").
    fn synthesize_feedback(&self, model: &str, step: &PlanStep, sentiment: Sentiment, files: &[PathBuf]) {
        let event = FeedbackEvent {
            timestamp: Utc::now().to_rfc3339(),
            agent: "editor".into(),
            backend: self.backend_for_model(model),
            model: model.to_string(),
            action: Action::Edit,
            language: self.language.clone(),
            sentiment,
            task: step.title.clone(),
            files: files.to_vec(),
            wrong_response: None,
            correct_response: None,
            diff_path: None,
            context: None,
            origin: FeedbackOrigin::Synthesized,
        };
        if let Err(e) = self.feedback_store.append(&event) {
            log::warn!("failed to record synthesized feedback for step \"{}\": {}", step.title, e);
        }
    }

    fn backend_for_model(&self, model_id: &str) -> String {
        self.catalog
            .iter()
            .find(|m| m.id == model_id)
            .map(|m| m.backend.clone())
            .unwrap_or_else(|| "unknown".to_string())
    }
}

fn is_fatal(err: &CoreError) -> bool {
    matches!(err, CoreError::ProviderUnavailable(_) | CoreError::Cancelled)
}

fn build_retry_prompt(step: &PlanStep, issues: &[String]) -> String {
    let bullets = issues.iter().map(|i| format!("- {}", i)).collect::<Vec<_>>().join("\n");
    format!(
        "The previous attempt at \"{}\" did not satisfy the success criteria:\n{}\n\nPlease address these issues and try again.",
        step.title, bullets
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    use crate::plan::PlanStep;
    use crate::selector::Capabilities;

    struct AlwaysSucceeds;
    #[async_trait]
    impl StepExecutor for AlwaysSucceeds {
        async fn execute_step(
            &self,
            _step: &PlanStep,
            _model: &str,
            _retry_feedback: Option<&str>,
            _cancel: &CancellationToken,
        ) -> CoreResult<AgentOutcome> {
            Ok(AgentOutcome { text: "done".into(), modified_files: vec![PathBuf::from("src/lib.rs")] })
        }
    }

    struct FailsThenSucceeds {
        calls: Mutex<u32>,
    }
    #[async_trait]
    impl StepExecutor for FailsThenSucceeds {
        async fn execute_step(
            &self,
            _step: &PlanStep,
            _model: &str,
            _retry_feedback: Option<&str>,
            _cancel: &CancellationToken,
        ) -> CoreResult<AgentOutcome> {
            let mut calls = self.calls.lock().unwrap();
            *calls += 1;
            Ok(AgentOutcome { text: "attempt".into(), modified_files: vec![PathBuf::from("src/lib.rs")] })
        }
    }

    struct NoopSnapshotter;
    impl WorkspaceSnapshotter for NoopSnapshotter {
        fn snapshot(&self) -> CoreResult<String> {
            Ok("ref-1".into())
        }
        fn rollback(&self, _snapshot_ref: &str) -> CoreResult<()> {
            Ok(())
        }
    }

    struct NoUsage;
    impl UsageSource for NoUsage {
        fn requests_today(&self, _backend: &str, _model: &str) -> u32 {
            0
        }
        fn last_call_errored(&self, _backend: &str, _model: &str) -> bool {
            false
        }
    }
    struct NoFeedback;
    impl FeedbackSource for NoFeedback {
        fn match_counts(&self, _backend: &str, _model: &str, _action: Action, _language: Option<&str>) -> (u32, u32) {
            (0, 0)
        }
    }

    fn sample_plan() -> Plan {
        Plan {
            id: "plan-a".into(),
            title: "title".into(),
            goal: "goal".into(),
            steps: vec![PlanStep {
                index: 1,
                title: "step one".into(),
                content: "do it".into(),
                allowlist: vec![PathBuf::from("src/lib.rs")],
                success_criteria: vec!["a".into(), "b".into()],
                dependencies: vec![],
            }],
        }
    }

    fn empty_catalog_selector_inputs() -> ModelCatalog {
        vec![selector::ModelInfo {
            id: "model-a".into(),
            backend: "groq".into(),
            cost_per_million: 1.0,
            rate_limit_daily: 1000,
            context_window: 32_000,
            throughput_tps: 50.0,
            capabilities: Capabilities { supports_tools: true, supports_file_ops: true, supports_code_execution: false, notes: String::new() },
        }]
    }

    #[tokio::test]
    async fn a_step_that_passes_verification_on_the_first_try_completes() {
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(
            Arc::new(AlwaysSucceeds),
            Arc::new(NoopSnapshotter),
            Box::new(|_step: &PlanStep| Vec::<Box<dyn Verifier>>::new()),
            dir.path().to_path_buf(),
            dir.path().join("checkpoint.json"),
            empty_catalog_selector_inputs(),
            Arc::new(NoUsage),
            Arc::new(NoFeedback),
            Arc::new(FeedbackStore::new(dir.path().join("feedback.jsonl"))),
            Mode::Any,
        );
        let plan = sample_plan();
        orchestrator.run_plan(&plan, "model-a", &CancellationToken::new()).await.unwrap();

        let checkpoint = Checkpoint::load_or_new(&dir.path().join("checkpoint.json"), "plan-a").unwrap();
        assert!(checkpoint.is_complete(1));
    }

    #[tokio::test]
    async fn exceeding_max_retries_surfaces_a_verifier_failure() {
        struct AlwaysFails;
        #[async_trait]
        impl Verifier for AlwaysFails {
            fn name(&self) -> &str {
                "always-fails"
            }
            async fn verify(&self, _workspace: &std::path::Path, _changed: &[PathBuf]) -> CoreResult<VerifyOutcome> {
                Ok(VerifyOutcome::failure(vec!["nope".into()]))
            }
        }
        let dir = tempfile::tempdir().unwrap();
        let orchestrator = Orchestrator::new(
            Arc::new(FailsThenSucceeds { calls: Mutex::new(0) }),
            Arc::new(NoopSnapshotter),
            Box::new(|_step: &PlanStep| -> Vec<Box<dyn Verifier>> { vec![Box::new(AlwaysFails)] }),
            dir.path().to_path_buf(),
            dir.path().join("checkpoint.json"),
            empty_catalog_selector_inputs(),
            Arc::new(NoUsage),
            Arc::new(NoFeedback),
            Arc::new(FeedbackStore::new(dir.path().join("feedback.jsonl"))),
            Mode::Any,
        )
        .with_max_retries(2);
        let plan = sample_plan();
        let err = orchestrator.run_plan(&plan, "model-a", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, CoreError::VerifierFailure(_)));
    }

    #[tokio::test]
    async fn zero_max_retries_still_runs_and_verifies_once_before_failing() {
        struct AlwaysFails;
        #[async_trait]
        impl Verifier for AlwaysFails {
            fn name(&self) -> &str {
                "always-fails"
            }
            async fn verify(&self, _workspace: &std::path::Path, _changed: &[PathBuf]) -> CoreResult<VerifyOutcome> {
                Ok(VerifyOutcome::failure(vec!["nope".into()]))
            }
        }
        let dir = tempfile::tempdir().unwrap();
        let executor = Arc::new(FailsThenSucceeds { calls: Mutex::new(0) });
        let feedback_store = Arc::new(FeedbackStore::new(dir.path().join("feedback.jsonl")));
        let orchestrator = Orchestrator::new(
            executor.clone(),
            Arc::new(NoopSnapshotter),
            Box::new(|_step: &PlanStep| -> Vec<Box<dyn Verifier>> { vec![Box::new(AlwaysFails)] }),
            dir.path().to_path_buf(),
            dir.path().join("checkpoint.json"),
            empty_catalog_selector_inputs(),
            Arc::new(NoUsage),
            Arc::new(NoFeedback),
            feedback_store.clone(),
            Mode::Any,
        )
        .with_max_retries(0);
        let plan = sample_plan();
        let err = orchestrator.run_plan(&plan, "model-a", &CancellationToken::new()).await.unwrap_err();
        assert!(matches!(err, CoreError::VerifierFailure(_)));
        assert_eq!(*executor.calls.lock().unwrap(), 1, "should execute exactly once before bailing");

        let snapshot = feedback_store.snapshot().unwrap();
        let (successes, failures) = snapshot.match_counts("groq", "model-a", Action::Edit, None);
        assert_eq!((successes, failures), (0, 1));
    }

    #[tokio::test]
    async fn a_completed_step_is_skipped_on_resume() {
        let dir = tempfile::tempdir().unwrap();
        let checkpoint_path = dir.path().join("checkpoint.json");
        let mut checkpoint = Checkpoint::load_or_new(&checkpoint_path, "plan-a").unwrap();
        checkpoint.mark_complete(1, "t", "ref", &checkpoint_path).unwrap();

        struct Panics;
        #[async_trait]
        impl StepExecutor for Panics {
            async fn execute_step(
                &self,
                _step: &PlanStep,
                _model: &str,
                _retry_feedback: Option<&str>,
                _cancel: &CancellationToken,
            ) -> CoreResult<AgentOutcome> {
                panic!("should not run a completed step");
            }
        }

        let orchestrator = Orchestrator::new(
            Arc::new(Panics),
            Arc::new(NoopSnapshotter),
            Box::new(|_step: &PlanStep| Vec::<Box<dyn Verifier>>::new()),
            dir.path().to_path_buf(),
            checkpoint_path,
            empty_catalog_selector_inputs(),
            Arc::new(NoUsage),
            Arc::new(NoFeedback),
            Arc::new(FeedbackStore::new(dir.path().join("feedback.jsonl"))),
            Mode::Any,
        );
        let plan = sample_plan();
        orchestrator.run_plan(&plan, "model-a", &CancellationToken::new()).await.unwrap();
    }
}
