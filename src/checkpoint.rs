//! Plan checkpoint persistence (§3, §4.6, §6.2) and the advisory lockfile
//! that keeps one plan id owned by a single Orchestrator instance (§5).

use std::collections::BTreeSet;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// `(plan_id, completed_steps, last_error?, timestamp, workspace_ref)` (§3, §6.2).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Checkpoint {
    pub plan_id: String,
    pub completed_steps: BTreeSet<usize>,
    pub last_error: Option<String>,
    pub timestamp: String,
    pub workspace_ref: String,
}

impl Checkpoint {
    pub fn new(plan_id: impl Into<String>) -> Self {
        Checkpoint {
            plan_id: plan_id.into(),
            completed_steps: BTreeSet::new(),
            last_error: None,
            timestamp: String::new(),
            workspace_ref: String::new(),
        }
    }

    pub fn is_complete(&self, step_index: usize) -> bool {
        self.completed_steps.contains(&step_index)
    }

    /// Read an existing checkpoint from `path`, or construct a fresh one for
    /// `plan_id` if the file doesn't exist yet.
    pub fn load_or_new(path: &Path, plan_id: &str) -> CoreResult<Self> {
        if !path.exists() {
            return Ok(Checkpoint::new(plan_id));
        }
        let bytes = fs::read_to_string(path)?;
        let checkpoint: Checkpoint = serde_json::from_str(&bytes)
            .map_err(|e| CoreError::CheckpointCorrupt(format!("{}: {}", path.display(), e)))?;
        if checkpoint.plan_id != plan_id {
            return Err(CoreError::CheckpointCorrupt(format!(
                "checkpoint at {} is for plan {:?}, expected {:?}",
                path.display(),
                checkpoint.plan_id,
                plan_id
            )));
        }
        Ok(checkpoint)
    }

    /// Record step `index` as complete, stamp `timestamp`/`workspace_ref`,
    /// and rewrite the file atomically (write to a sibling temp file, then
    /// rename over the target) so a crash mid-write never corrupts it.
    pub fn mark_complete(
        &mut self,
        index: usize,
        timestamp: impl Into<String>,
        workspace_ref: impl Into<String>,
        path: &Path,
    ) -> CoreResult<()> {
        self.completed_steps.insert(index);
        self.last_error = None;
        self.timestamp = timestamp.into();
        self.workspace_ref = workspace_ref.into();
        self.persist(path)
    }

    pub fn record_failure(&mut self, error: impl Into<String>, timestamp: impl Into<String>, path: &Path) -> CoreResult<()> {
        self.last_error = Some(error.into());
        self.timestamp = timestamp.into();
        self.persist(path)
    }

    fn persist(&self, path: &Path) -> CoreResult<()> {
        let tmp_path = path.with_extension("tmp");
        let json = serde_json::to_string_pretty(self)?;
        {
            let mut tmp = File::create(&tmp_path)?;
            tmp.write_all(json.as_bytes())?;
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

/// Advisory lock over one plan id's checkpoint, preventing two Orchestrator
/// instances from running the same plan concurrently (§5).
pub struct PlanLock {
    lock_path: PathBuf,
}

impl PlanLock {
    /// Acquire the lock, failing if another process already holds it.
    pub fn acquire(checkpoint_path: &Path) -> CoreResult<Self> {
        let lock_path = checkpoint_path.with_extension("lock");
        OpenOptions::new()
            .create_new(true)
            .write(true)
            .open(&lock_path)
            .map_err(|_| {
                CoreError::CheckpointCorrupt(format!(
                    "plan at {} is already locked by another orchestrator",
                    checkpoint_path.display()
                ))
            })?;
        Ok(PlanLock { lock_path })
    }
}

impl Drop for PlanLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.lock_path);
    }
}
