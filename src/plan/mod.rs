//! Plan data types (§3, §4.5) and document parser (§4.5, §6.1).

pub mod parser;

use std::path::PathBuf;

/// One step of a [`Plan`] (§3).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanStep {
    pub index: usize,
    pub title: String,
    pub content: String,
    pub allowlist: Vec<PathBuf>,
    pub success_criteria: Vec<String>,
    pub dependencies: Vec<usize>,
}

/// An ordered sequence of [`PlanStep`]s produced by [`parser::parse`] (§4.5).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plan {
    pub id: String,
    pub title: String,
    pub goal: String,
    pub steps: Vec<PlanStep>,
}

impl Plan {
    pub fn step(&self, index: usize) -> Option<&PlanStep> {
        self.steps.iter().find(|s| s.index == index)
    }
}
