//! Lint verifier (§4.7): runs the language's linter and reports severity counts.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{run_shell, VerifyOutcome, Verifier};
use crate::error::CoreResult;

const MARKERS: &[(&str, &str)] = &[
    ("Cargo.toml", "cargo clippy --quiet -- -D warnings"),
    ("package.json", "npx eslint ."),
    ("go.mod", "go vet ./..."),
];

pub struct LintVerifier {
    workspace: PathBuf,
}

impl LintVerifier {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        LintVerifier { workspace: workspace.into() }
    }
}

fn applicable_command(workspace: &Path) -> Option<&'static str> {
    MARKERS.iter().find(|(marker, _)| workspace.join(marker).exists()).map(|(_, cmd)| *cmd)
}

#[async_trait]
impl Verifier for LintVerifier {
    fn name(&self) -> &str {
        "lint"
    }

    async fn verify(&self, workspace: &Path, _changed_files: &[PathBuf]) -> CoreResult<VerifyOutcome> {
        let command = match applicable_command(workspace) {
            Some(c) => c,
            None => return Ok(VerifyOutcome::success()),
        };

        let (ok, combined) = run_shell(&self.workspace, command).await?;

        if ok {
            Ok(VerifyOutcome::success())
        } else {
            let issues: Vec<String> = combined
                .lines()
                .filter(|l| l.to_lowercase().contains("warning") || l.to_lowercase().contains("error"))
                .map(str::to_string)
                .collect();
            if issues.is_empty() {
                Ok(VerifyOutcome::failure(vec![combined.trim().to_string()]))
            } else {
                Ok(VerifyOutcome::failure(issues))
            }
        }
    }
}
