//! Structured event stream for observers (§4.10, §6.3).
//!
//! Events flow in one direction: producers call [`EventEmitter::emit`], which
//! appends a JSONL line to the session log and then fans the event out to any
//! in-process subscribers over a bounded broadcast channel. A full channel
//! drops the oldest pending events with a `warn!` rather than blocking the
//! caller — the file write already happened, so nothing is lost for
//! post-mortem purposes.
//!
//! ```text
//!  Coordinator / Orchestrator
//!           |
//!           v  emit(event)
//!     +-----------+        append        +----------------+
//!     | EventEmitter |------------------->| events.jsonl   |
//!     +-----------+                       +----------------+
//!           |
//!           | broadcast::send (best effort)
//!           v
//!     in-process subscribers (dashboard, editor plugin)
//! ```

use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::broadcast;

/// One event as written to the JSONL stream, per §6.3.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObserverEvent {
    #[serde(rename = "type")]
    pub event_type: EventType,
    pub timestamp: chrono::DateTime<Utc>,
    pub data: BTreeMap<String, Value>,
}

/// The fixed set of observer event types named in §3/§4.10.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    Message,
    Status,
    ToolStart,
    ToolEnd,
    StepStart,
    StepEnd,
    Confirm,
    OpenFile,
    Complete,
    Notify,
}

impl ObserverEvent {
    pub fn new(event_type: EventType, data: BTreeMap<String, Value>) -> Self {
        ObserverEvent {
            event_type,
            timestamp: Utc::now(),
            data,
        }
    }
}

/// A single process-wide, append-only event stream (§4.10).
///
/// Construct one per session with [`EventEmitter::open`]; clone the returned
/// `broadcast::Receiver` handles via [`EventEmitter::subscribe`] for any
/// in-process consumer.
pub struct EventEmitter {
    file: Mutex<std::fs::File>,
    sender: broadcast::Sender<ObserverEvent>,
}

impl EventEmitter {
    /// Open (creating if absent) the JSONL file at `path` for append, and
    /// set up a bounded broadcast channel with capacity `channel_capacity`.
    pub fn open(path: impl AsRef<Path>, channel_capacity: usize) -> std::io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let (sender, _receiver) = broadcast::channel(channel_capacity.max(1));
        Ok(EventEmitter {
            file: Mutex::new(file),
            sender,
        })
    }

    /// Subscribe to the in-process event fan-out. Independent of the file log.
    pub fn subscribe(&self) -> broadcast::Receiver<ObserverEvent> {
        self.sender.subscribe()
    }

    /// Append `event` to the JSONL log, then best-effort broadcast it.
    ///
    /// Non-blocking by contract (§4.10): the file write always proceeds even
    /// with zero subscribers, and a full channel just drops the oldest
    /// pending event rather than stalling the caller.
    pub fn emit(&self, event: ObserverEvent) {
        if let Ok(line) = serde_json::to_string(&event) {
            if let Ok(mut file) = self.file.lock() {
                let _ = writeln!(file, "{}", line);
            }
        }
        if self.sender.send(event).is_err() {
            // No subscribers currently listening; the file write above already persisted it.
        }
    }

    pub fn emit_tool_start(&self, tool_name: &str, call_id: &str) {
        let mut data = BTreeMap::new();
        data.insert("tool".into(), Value::String(tool_name.to_string()));
        data.insert("call_id".into(), Value::String(call_id.to_string()));
        self.emit(ObserverEvent::new(EventType::ToolStart, data));
    }

    pub fn emit_tool_end(&self, tool_name: &str, call_id: &str, ok: bool) {
        let mut data = BTreeMap::new();
        data.insert("tool".into(), Value::String(tool_name.to_string()));
        data.insert("call_id".into(), Value::String(call_id.to_string()));
        data.insert("ok".into(), Value::Bool(ok));
        self.emit(ObserverEvent::new(EventType::ToolEnd, data));
    }

    pub fn emit_step_start(&self, index: usize, title: &str) {
        let mut data = BTreeMap::new();
        data.insert("index".into(), Value::from(index));
        data.insert("title".into(), Value::String(title.to_string()));
        self.emit(ObserverEvent::new(EventType::StepStart, data));
    }

    pub fn emit_step_end(&self, index: usize, success: bool, reason: Option<&str>) {
        let mut data = BTreeMap::new();
        data.insert("index".into(), Value::from(index));
        data.insert("success".into(), Value::Bool(success));
        if let Some(r) = reason {
            data.insert("reason".into(), Value::String(r.to_string()));
        }
        self.emit(ObserverEvent::new(EventType::StepEnd, data));
    }

    pub fn emit_complete(&self, success: bool, reason: Option<&str>) {
        let mut data = BTreeMap::new();
        data.insert("success".into(), Value::Bool(success));
        if let Some(r) = reason {
            data.insert("reason".into(), Value::String(r.to_string()));
        }
        self.emit(ObserverEvent::new(EventType::Complete, data));
    }
}

/// Default session log path under a per-user directory (§6.6).
pub fn default_event_log_path(user_dir: &Path) -> PathBuf {
    user_dir.join("events.jsonl")
}
