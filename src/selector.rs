//! Model Selector (§4.8): scores a catalog of models and picks the best fit
//! for `(action, language, complexity)`.

use serde::{Deserialize, Serialize};

use crate::config::Mode;
use crate::coordinator::Complexity;
use crate::error::{CoreError, CoreResult};

/// The action a selected model will be used for (§4.8).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Action {
    Edit,
    Review,
    Plan,
    Research,
    Route,
}

/// Tool/file-op/code-execution support flags for one catalog entry (§3).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Capabilities {
    pub supports_tools: bool,
    pub supports_file_ops: bool,
    pub supports_code_execution: bool,
    #[serde(default)]
    pub notes: String,
}

/// One entry of the model catalog (§3, §6.4).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModelInfo {
    pub id: String,
    pub backend: String,
    pub cost_per_million: f64,
    pub rate_limit_daily: u32,
    pub context_window: u32,
    pub throughput_tps: f64,
    pub capabilities: Capabilities,
}

/// `Vec<ModelInfo>` deserialized from `models_catalog.json` (§6.4 ambient).
pub type ModelCatalog = Vec<ModelInfo>;

/// Today's request count for `(backend, model)`, and whether its most recent
/// call errored — the inputs the utilization/error penalties need (§4.8).
pub trait UsageSource: Send + Sync {
    fn requests_today(&self, backend: &str, model: &str) -> u32;
    fn last_call_errored(&self, backend: &str, model: &str) -> bool;
}

/// Historical `(success, failure)` feedback counts for `(backend, model,
/// action, language)` (§4.8, §4.9).
pub trait FeedbackSource: Send + Sync {
    fn match_counts(&self, backend: &str, model: &str, action: Action, language: Option<&str>) -> (u32, u32);
}

const UTILIZATION_WEIGHT: f64 = 50.0;
const HIGH_UTILIZATION_THRESHOLD: f64 = 0.9;
const HIGH_UTILIZATION_PENALTY: f64 = 20.0;
const LAST_ERROR_PENALTY: f64 = 30.0;
const COST_PENALTY_CAP: f64 = 30.0;
const CONTEXT_BONUS_CAP: f64 = 10.0;
const THROUGHPUT_BONUS_CAP: f64 = 10.0;
const FEEDBACK_SUCCESS_BONUS: f64 = 20.0;
const FEEDBACK_FAILURE_PENALTY: f64 = 40.0;
const SIZE_HEURISTIC_BONUS: f64 = 15.0;
const LARGE_HEURISTIC_BONUS: f64 = 20.0;
const CODER_HEURISTIC_BONUS: f64 = 25.0;

fn hard_filters_pass(model: &ModelInfo, action: Action, mode: Mode) -> bool {
    if matches!(action, Action::Edit | Action::Review) && !model.capabilities.supports_file_ops {
        return false;
    }
    if mode == Mode::Local && model.backend != "local" {
        return false;
    }
    true
}

fn score(
    model: &ModelInfo,
    action: Action,
    language: Option<&str>,
    complexity: Complexity,
    usage: &dyn UsageSource,
    feedback: &dyn FeedbackSource,
) -> f64 {
    let mut s = 100.0;

    let utilization = if model.rate_limit_daily > 0 {
        usage.requests_today(&model.backend, &model.id) as f64 / model.rate_limit_daily as f64
    } else {
        0.0
    };
    s -= utilization * UTILIZATION_WEIGHT;
    if utilization >= HIGH_UTILIZATION_THRESHOLD {
        s -= HIGH_UTILIZATION_PENALTY;
    }

    if usage.last_call_errored(&model.backend, &model.id) {
        s -= LAST_ERROR_PENALTY;
    }

    s -= model.cost_per_million.min(COST_PENALTY_CAP);

    s += (model.context_window as f64 / 100_000.0).min(CONTEXT_BONUS_CAP);
    s += (model.throughput_tps / 100.0).min(THROUGHPUT_BONUS_CAP);

    let (successes, failures) = feedback.match_counts(&model.backend, &model.id, action, language);
    s += successes as f64 * FEEDBACK_SUCCESS_BONUS;
    s -= failures as f64 * FEEDBACK_FAILURE_PENALTY;

    let id_lower = model.id.to_lowercase();
    if matches!(complexity, Complexity::Simple) && ["instant", "8b", "3b"].iter().any(|t| id_lower.contains(t)) {
        s += SIZE_HEURISTIC_BONUS;
    }
    if matches!(complexity, Complexity::Complex | Complexity::Multistep)
        && ["70b", "large"].iter().any(|t| id_lower.contains(t))
    {
        s += LARGE_HEURISTIC_BONUS;
    }
    if matches!(action, Action::Edit | Action::Review) && ["coder", "code"].iter().any(|t| id_lower.contains(t)) {
        s += CODER_HEURISTIC_BONUS;
    }

    s
}

/// Score every eligible model in `catalog` and return the `(backend, id)` of
/// the winner (§4.8). Fails with `NoSuitableModel` when every score is ≤ 0
/// or no model passes the hard filters.
pub fn select(
    catalog: &ModelCatalog,
    action: Action,
    language: Option<&str>,
    complexity: Complexity,
    mode: Mode,
    usage: &dyn UsageSource,
    feedback: &dyn FeedbackSource,
) -> CoreResult<(String, String)> {
    let mut scored: Vec<(f64, &ModelInfo)> = catalog
        .iter()
        .filter(|m| hard_filters_pass(m, action, mode))
        .map(|m| (score(m, action, language, complexity, usage, feedback), m))
        .collect();

    scored.sort_by(|a, b| {
        b.0.partial_cmp(&a.0)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| (a.1.backend.as_str(), a.1.id.as_str()).cmp(&(b.1.backend.as_str(), b.1.id.as_str())))
    });

    match scored.first() {
        Some((s, model)) if *s > 0.0 => Ok((model.backend.clone(), model.id.clone())),
        _ => Err(CoreError::NoSuitableModel),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

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

    fn model(id: &str, backend: &str, supports_file_ops: bool) -> ModelInfo {
        ModelInfo {
            id: id.into(),
            backend: backend.into(),
            cost_per_million: 2.0,
            rate_limit_daily: 1000,
            context_window: 128_000,
            throughput_tps: 80.0,
            capabilities: Capabilities {
                supports_tools: true,
                supports_file_ops,
                supports_code_execution: false,
                notes: String::new(),
            },
        }
    }

    #[test]
    fn edit_requires_supports_file_ops() {
        let catalog = vec![model("chat-only", "openai", false), model("coder-large", "openai", true)];
        let (_, id) = select(&catalog, Action::Edit, None, Complexity::Simple, Mode::Any, &NoUsage, &NoFeedback).unwrap();
        assert_eq!(id, "coder-large");
    }

    #[test]
    fn local_mode_restricts_to_the_local_backend() {
        let catalog = vec![model("cloud-model", "openai", true), model("local-model", "local", true)];
        let (backend, _) = select(&catalog, Action::Edit, None, Complexity::Simple, Mode::Local, &NoUsage, &NoFeedback).unwrap();
        assert_eq!(backend, "local");
    }

    #[test]
    fn a_coder_model_id_wins_edit_over_a_generic_one_with_equal_fundamentals() {
        let catalog = vec![model("chat-7b", "openai", true), model("coder-7b", "openai", true)];
        let (_, id) = select(&catalog, Action::Edit, None, Complexity::Simple, Mode::Any, &NoUsage, &NoFeedback).unwrap();
        assert_eq!(id, "coder-7b");
    }

    #[test]
    fn no_eligible_model_returns_no_suitable_model() {
        let catalog = vec![model("chat-only", "openai", false)];
        let err = select(&catalog, Action::Edit, None, Complexity::Simple, Mode::Any, &NoUsage, &NoFeedback).unwrap_err();
        assert!(matches!(err, CoreError::NoSuitableModel));
    }

    #[test]
    fn heavy_utilization_and_a_recent_error_can_sink_a_score_to_zero() {
        struct Saturated;
        impl UsageSource for Saturated {
            fn requests_today(&self, _backend: &str, _model: &str) -> u32 {
                1000
            }
            fn last_call_errored(&self, _backend: &str, _model: &str) -> bool {
                true
            }
        }
        let catalog = vec![model("only-option", "openai", true)];
        let err = select(&catalog, Action::Edit, None, Complexity::Simple, Mode::Any, &Saturated, &NoFeedback).unwrap_err();
        assert!(matches!(err, CoreError::NoSuitableModel));
    }
}
