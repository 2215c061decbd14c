//! Build verifier (§4.7): runs the language-appropriate build command.

use std::path::{Path, PathBuf};

use async_trait::async_trait;

use super::{run_shell, VerifyOutcome, Verifier};
use crate::error::CoreResult;

/// Workspace marker -> (build command, source extensions it governs).
const MARKERS: &[(&str, &str, &[&str])] = &[
    ("Cargo.toml", "cargo build --quiet", &["rs"]),
    ("package.json", "npm run build --silent", &["js", "ts", "jsx", "tsx"]),
    ("go.mod", "go build ./...", &["go"]),
];

pub struct BuildVerifier {
    workspace: PathBuf,
}

impl BuildVerifier {
    pub fn new(workspace: impl Into<PathBuf>) -> Self {
        BuildVerifier { workspace: workspace.into() }
    }
}

fn applicable_command(workspace: &Path, changed_files: &[PathBuf]) -> Option<&'static str> {
    MARKERS.iter().find_map(|(marker, command, extensions)| {
        if !workspace.join(marker).exists() {
            return None;
        }
        let touches = changed_files.iter().any(|f| {
            f.extension().and_then(|e| e.to_str()).map(|e| extensions.contains(&e)).unwrap_or(false)
        });
        touches.then_some(*command)
    })
}

#[async_trait]
impl Verifier for BuildVerifier {
    fn name(&self) -> &str {
        "build"
    }

    async fn verify(&self, workspace: &Path, changed_files: &[PathBuf]) -> CoreResult<VerifyOutcome> {
        let command = match applicable_command(workspace, changed_files) {
            Some(c) => c,
            None => return Ok(VerifyOutcome::success()),
        };
        let (ok, output) = run_shell(&self.workspace, command).await?;
        if ok {
            Ok(VerifyOutcome::success())
        } else {
            Ok(VerifyOutcome::failure(vec![output.trim().to_string()]))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn a_rust_only_change_set_selects_cargo_build() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\nname=\"x\"\n").unwrap();
        let changed = vec![PathBuf::from("src/lib.rs")];
        assert_eq!(applicable_command(dir.path(), &changed), Some("cargo build --quiet"));
    }

    #[test]
    fn no_marker_means_no_applicable_build_command() {
        let dir = tempfile::tempdir().unwrap();
        let changed = vec![PathBuf::from("src/lib.rs")];
        assert_eq!(applicable_command(dir.path(), &changed), None);
    }
}
