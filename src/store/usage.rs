//! Usage store (§4.9): per-day, per-`backend/model` counters.

use std::fs::{self, File};
use std::io::Write;
use std::path::PathBuf;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::error::CoreResult;
use crate::provider::types::TokenUsage;
use crate::selector::UsageSource;

/// One day's accumulated counters for one `(backend, model)` pair (§4.9).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct UsageRecord {
    pub date: String,
    pub backend: String,
    pub model: String,
    pub requests: u32,
    pub input_tokens: u64,
    pub output_tokens: u64,
    pub cached_tokens: u64,
    pub last_error: Option<String>,
}

/// Append-only JSONL usage store, one complete record per line (§4.9, §6.6).
pub struct UsageStore {
    path: PathBuf,
}

impl UsageStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        UsageStore { path: path.into() }
    }

    /// Read every record, silently skipping malformed lines — tolerated per
    /// §4.9 since a crash mid-write only ever loses its own line.
    fn load_all(&self) -> CoreResult<Vec<UsageRecord>> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let contents = fs::read_to_string(&self.path)?;
        let mut records = Vec::new();
        for (lineno, line) in contents.lines().enumerate() {
            if line.trim().is_empty() {
                continue;
            }
            match serde_json::from_str::<UsageRecord>(line) {
                Ok(record) => records.push(record),
                Err(e) => warn!("skipping malformed usage record at {}:{}: {}", self.path.display(), lineno + 1, e),
            }
        }
        Ok(records)
    }

    fn save_all(&self, records: &[UsageRecord]) -> CoreResult<()> {
        let tmp_path = self.path.with_extension("tmp");
        {
            let mut tmp = File::create(&tmp_path)?;
            for record in records {
                let line = serde_json::to_string(record)?;
                writeln!(tmp, "{}", line)?;
            }
            tmp.sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        Ok(())
    }

    /// Record one completed provider call, merging into today's `(backend,
    /// model)` record if one already exists (§4.9: "read the latest file,
    /// update in-memory, write atomically").
    pub fn record(
        &self,
        date: &str,
        backend: &str,
        model: &str,
        usage: TokenUsage,
        error: Option<String>,
    ) -> CoreResult<()> {
        let mut records = self.load_all()?;
        match records
            .iter_mut()
            .find(|r| r.date == date && r.backend == backend && r.model == model)
        {
            Some(existing) => {
                existing.requests += 1;
                existing.input_tokens += usage.input_tokens as u64;
                existing.output_tokens += usage.output_tokens as u64;
                existing.cached_tokens += usage.cached_tokens as u64;
                if error.is_some() {
                    existing.last_error = error;
                }
            }
            None => records.push(UsageRecord {
                date: date.to_string(),
                backend: backend.to_string(),
                model: model.to_string(),
                requests: 1,
                input_tokens: usage.input_tokens as u64,
                output_tokens: usage.output_tokens as u64,
                cached_tokens: usage.cached_tokens as u64,
                last_error: error,
            }),
        }
        self.save_all(&records)
    }

    /// A point-in-time view of today's records, for feeding the Selector.
    pub fn snapshot(&self, today: impl Into<String>) -> CoreResult<UsageSnapshot> {
        Ok(UsageSnapshot { records: self.load_all()?, today: today.into() })
    }
}

pub struct UsageSnapshot {
    records: Vec<UsageRecord>,
    today: String,
}

impl UsageSnapshot {
    fn find(&self, backend: &str, model: &str) -> Option<&UsageRecord> {
        self.records.iter().find(|r| r.date == self.today && r.backend == backend && r.model == model)
    }
}

impl UsageSource for UsageSnapshot {
    fn requests_today(&self, backend: &str, model: &str) -> u32 {
        self.find(backend, model).map(|r| r.requests).unwrap_or(0)
    }

    fn last_call_errored(&self, backend: &str, model: &str) -> bool {
        self.find(backend, model).map(|r| r.last_error.is_some()).unwrap_or(false)
    }
}
