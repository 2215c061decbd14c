//! Verifier Set (§4.7) and the Reviewer Verdict Grammar (§4.11).

pub mod build;
pub mod lint;
pub mod review;
pub mod test;

use std::path::{Path, PathBuf};
use std::process::Stdio;

use async_trait::async_trait;
use tokio::io::AsyncReadExt;
use tokio::process::Command;

use crate::error::CoreResult;

/// `verify(workspace, changed_files) -> (ok, issues[])` (§4.7).
#[async_trait]
pub trait Verifier: Send + Sync {
    fn name(&self) -> &str;
    async fn verify(&self, workspace: &Path, changed_files: &[PathBuf]) -> CoreResult<VerifyOutcome>;
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VerifyOutcome {
    pub ok: bool,
    pub issues: Vec<String>,
}

impl VerifyOutcome {
    pub fn success() -> Self {
        VerifyOutcome { ok: true, issues: Vec::new() }
    }

    pub fn failure(issues: Vec<String>) -> Self {
        VerifyOutcome { ok: false, issues }
    }
}

/// Run `verifiers` in order (build → test → lint → review per §4.7),
/// stopping at the first failure since its issues are the most actionable.
pub async fn run_verifier_set(
    verifiers: &[Box<dyn Verifier>],
    workspace: &Path,
    changed_files: &[PathBuf],
) -> CoreResult<VerifyOutcome> {
    if changed_files.is_empty() {
        // §4.6 "skipping verification": a read-only/advisory step has nothing
        // for build/test/lint to act on.
        return Ok(VerifyOutcome::success());
    }
    for verifier in verifiers {
        let outcome = verifier.verify(workspace, changed_files).await?;
        if !outcome.ok {
            return Ok(outcome);
        }
    }
    Ok(VerifyOutcome::success())
}

/// Run `command` under a shell rooted at `workspace`, returning
/// `(succeeded, combined stdout+stderr)`. Reads stdout and stderr
/// concurrently — sequential reads deadlock once a command fills the pipe
/// buffer of whichever stream isn't being drained yet.
pub(crate) async fn run_shell(workspace: &Path, command: &str) -> CoreResult<(bool, String)> {
    let mut child = Command::new("/bin/bash")
        .arg("-c")
        .arg(command)
        .current_dir(workspace)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()?;

    let stdout_pipe = child.stdout.take();
    let stderr_pipe = child.stderr.take();
    let (stdout, stderr) = tokio::join!(read_to_string(stdout_pipe), read_to_string(stderr_pipe));
    let status = child.wait().await?;
    Ok((status.success(), format!("{}{}", stdout, stderr)))
}

async fn read_to_string(handle: Option<impl AsyncReadExt + Unpin>) -> String {
    let mut buf = String::new();
    if let Some(mut h) = handle {
        let _ = h.read_to_string(&mut buf).await;
    }
    buf
}

const DISQUALIFYING_TOKENS: [&str; 4] = ["fail", "error", "issue", "problem"];

/// Parse the Review agent's free text into `(ok, issues[])` per §4.11.
pub fn parse_verdict(text: &str) -> VerifyOutcome {
    let lowered = text.to_lowercase();
    let disqualified = DISQUALIFYING_TOKENS.iter().any(|t| lowered.contains(t));

    if lowered.contains("success") && !disqualified {
        return VerifyOutcome::success();
    }

    let issues: Vec<String> = text
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .filter(|l| {
            l.starts_with('-')
                || l.starts_with('•')
                || ["issue", "missing", "error"].iter().any(|t| l.to_lowercase().contains(t))
        })
        .map(|l| l.trim_start_matches(['-', '•']).trim().to_string())
        .collect();

    if issues.is_empty() {
        VerifyOutcome::failure(vec![text.trim().to_string()])
    } else {
        VerifyOutcome::failure(issues)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_bare_success_token_is_a_clean_pass() {
        let outcome = parse_verdict("SUCCESS");
        assert!(outcome.ok);
        assert!(outcome.issues.is_empty());
    }

    #[test]
    fn success_with_an_embedded_issue_word_is_disqualified() {
        let outcome = parse_verdict("SUCCESS. One issue: missing doc comment on retry_request.");
        assert!(!outcome.ok);
        assert_eq!(outcome.issues.len(), 1);
    }

    #[test]
    fn fail_with_bulleted_issues_extracts_each_line() {
        let outcome = parse_verdict("FAIL\n- missing error handling in http.rs\n- test caller_test.rs not updated");
        assert!(!outcome.ok);
        assert_eq!(outcome.issues.len(), 2);
    }

    #[test]
    fn an_unstructured_failure_becomes_a_single_issue() {
        let outcome = parse_verdict("the retry loop never terminates on a 500 response");
        assert!(!outcome.ok);
        assert_eq!(outcome.issues.len(), 1);
        assert_eq!(outcome.issues[0], "the retry loop never terminates on a 500 response");
    }
}
