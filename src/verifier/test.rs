//! Test verifier (§4.7): runs the language's test runner and parses pass/fail counts.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{run_shell, VerifyOutcome, Verifier};
use crate::error::CoreResult;

const MARKERS: &[(&str, &str)] = &[
    ("Cargo.toml", "cargo test --quiet"),
    ("package.json", "npm test --silent"),
    ("go.mod", "go test ./..."),
];

pub struct TestVerifier {
    workspace: PathBuf,
}

impl TestVerifier {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        TestVerifier { workspace: workspace.into() }
    }
}

fn applicable_command(workspace: &Path) -> Option<&'static str> {
    MARKERS.iter().find(|(marker, _)| workspace.join(marker).exists()).map(|(_, cmd)| *cmd)
}

/// Best-effort `(passed, failed)` extraction from common test-runner output
/// shapes (`cargo test`'s "N passed; M failed", `go test`'s "FAIL"/"ok" lines).
fn parse_counts(output: &str) -> (u32, u32) {
    let mut passed = 0;
    let mut failed = 0;
    for line in output.lines() {
        if let Some(rest) = line.trim().strip_prefix("test result: ") {
            for part in rest.split(';') {
                let part = part.trim();
                if let Some(n) = part.strip_suffix(" passed").and_then(|s| s.trim().parse::<u32>().ok()) {
                    passed += n;
                } else if let Some(n) = part.strip_suffix(" failed").and_then(|s| s.trim().parse::<u32>().ok()) {
                    failed += n;
                }
            }
        } else if line.trim_start().starts_with("--- FAIL") {
            failed += 1;
        } else if line.trim_start().starts_with("--- PASS") {
            passed += 1;
        }
    }
    (passed, failed)
}

#[async_trait]
impl Verifier for TestVerifier {
    fn name(&self) -> &str {
        "test"
    }

    async fn verify(&self, workspace: &Path, _changed_files: &[PathBuf]) -> CoreResult<VerifyOutcome> {
        let command = match applicable_command(workspace) {
            Some(c) => c,
            None => return Ok(VerifyOutcome::success()),
        };

        let (ok, combined) = run_shell(&self.workspace, command).await?;
        let (passed, failed) = parse_counts(&combined);

        if ok && failed == 0 {
            Ok(VerifyOutcome::success())
        } else {
            let summary = if passed + failed > 0 {
                format!("{} passed, {} failed", passed, failed)
            } else {
                combined.trim().to_string()
            };
            Ok(VerifyOutcome::failure(vec![summary]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_cargo_test_result_line() {
        let (passed, failed) = parse_counts("test result: FAILED. 3 passed; 1 failed; 0 ignored\n");
        assert_eq!((passed, failed), (3, 1));
    }

    #[test]
    fn parses_go_test_fail_markers() {
        let (passed, failed) = parse_counts("--- PASS: TestA\n--- FAIL: TestB\n--- PASS: TestC\n");
        assert_eq!((passed, failed), (2, 1));
    }
}
