//! Feedback store (§4.9, §3 "Feedback event"): explicit good/bad marks plus
//! outcomes synthesized from execution, consumed by the Selector's scoring
//! and, via the extra context fields, by offline training of the ML
//! classifiers.

use std::fs::OpenOptions;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::selector::{Action, FeedbackSource};

/// Where a [`FeedbackEvent`] originated (§4.9).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FeedbackOrigin {
    /// An explicit good/bad mark from the user (terminal hook or UI action).
    Explicit,
    /// Derived from an execution outcome, e.g. a successful plan step.
    Synthesized,
}

/// `good`/`bad` per §3's Feedback event data model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Sentiment {
    Good,
    Bad,
}

/// `(timestamp, agent, model, sentiment, task, files[], wrong_response?,
/// correct_response?, diff_path?, context)` per §3, plus `backend`/`action`/
/// `language` so the Selector can project `match_counts` without re-deriving
/// them from `context`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedbackEvent {
    pub timestamp: String,
    pub agent: String,
    pub backend: String,
    pub model: String,
    pub action: Action,
    pub language: Option<String>,
    pub sentiment: Sentiment,
    pub task: String,
    #[serde(default)]
    pub files: Vec<PathBuf>,
    #[serde(default)]
    pub wrong_response: Option<String>,
    #[serde(default)]
    pub correct_response: Option<String>,
    #[serde(default)]
    pub diff_path: Option<PathBuf>,
    #[serde(default)]
    pub context: Option<String>,
    pub origin: FeedbackOrigin,
}

/// Append-only JSONL feedback store (§4.9, §6.6).
pub struct FeedbackStore {
    path: PathBuf,
}

impl FeedbackStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        FeedbackStore { path: path.into() }
    }

    pub fn append(&self, event: &FeedbackEvent) -> CoreResult<()> {
        let line = serde_json::to_string(event)?;
        let mut file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        writeln!(file, "{}", line)?;
        Ok(())
    }

    fn load_all(&self) -> CoreResult<Vec<FeedbackEvent>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let file = std::fs::File::open(&self.path)?;
        let mut events = Vec::new();
        for (lineno, line) in BufReader::new(file).lines().enumerate() {
            let line = line?;
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<FeedbackEvent>(&line) {
                Ok(event) => events.push(event),
                Err(e) => warn!("skipping malformed feedback record at {}:{}: {}", self.path.display(), lineno + 1, e),
            }
        }
        Ok(events)
    }

    pub fn snapshot(&self) -> CoreResult<FeedbackSnapshot> {
        Ok(FeedbackSnapshot { events: self.load_all()? })
    }
}

pub struct FeedbackSnapshot {
    events: Vec<FeedbackEvent>,
}

impl FeedbackSource for FeedbackSnapshot {
    fn match_counts(&self, backend: &str, model: &str, action: Action, language: Option<&str>) -> (u32, u32) {
        let mut successes = 0;
        let mut failures = 0;
        for event in &self.events {
            if event.backend != backend || event.model != model || event.action != action {
                continue;
            }
            if let Some(lang) = language {
                if event.language.as_deref() != Some(lang) {
                    continue;
                }
            }
            match event.sentiment {
                Sentiment::Good => successes += 1,
                Sentiment::Bad => failures += 1,
            }
        }
        (successes, failures)
    }
}
