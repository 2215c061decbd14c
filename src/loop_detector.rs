//! Loop Detector (§4.4).
//!
//! Per-task guard against runaway tool-call repetition and identical-
//! response loops. Tracks a hash of the last tool call and the last
//! response text; consecutive identical hashes increment a counter, any
//! other value resets it.

use sha2::{Digest, Sha256};

const DEFAULT_TOOL_CALL_THRESHOLD: u32 = 5;
const DEFAULT_RESPONSE_THRESHOLD: u32 = 3;

fn hash(input: &str) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hasher.finalize().into()
}

/// Per-invocation tool-call / response repetition guard (§4.4, §8).
pub struct LoopDetector {
    tool_call_threshold: u32,
    response_threshold: u32,
    last_tool_call_hash: Option<[u8; 32]>,
    consecutive_tool_calls: u32,
    last_response_hash: Option<[u8; 32]>,
    consecutive_responses: u32,
}

impl LoopDetector {
    pub fn new() -> Self {
        LoopDetector {
            tool_call_threshold: DEFAULT_TOOL_CALL_THRESHOLD,
            response_threshold: DEFAULT_RESPONSE_THRESHOLD,
            last_tool_call_hash: None,
            consecutive_tool_calls: 0,
            last_response_hash: None,
            consecutive_responses: 0,
        }
    }

    pub fn with_tool_call_threshold(mut self, threshold: u32) -> Self {
        self.tool_call_threshold = threshold;
        self
    }

    pub fn with_response_threshold(mut self, threshold: u32) -> Self {
        self.response_threshold = threshold;
        self
    }

    /// Record a tool call `name(args)`. Returns `true` if this call pushed
    /// the consecutive-repetition count to or past the threshold.
    pub fn record_tool_call(&mut self, name: &str, arguments: &str) -> bool {
        let key = hash(&format!("{}:{}", name, arguments));
        if self.last_tool_call_hash == Some(key) {
            self.consecutive_tool_calls += 1;
        } else {
            self.last_tool_call_hash = Some(key);
            self.consecutive_tool_calls = 1;
        }
        self.consecutive_tool_calls >= self.tool_call_threshold
    }

    /// Record a textual response. Returns `true` if this response pushed
    /// the consecutive-repetition count to or past the threshold.
    pub fn record_response(&mut self, text: &str) -> bool {
        let key = hash(text);
        if self.last_response_hash == Some(key) {
            self.consecutive_responses += 1;
        } else {
            self.last_response_hash = Some(key);
            self.consecutive_responses = 1;
        }
        self.consecutive_responses >= self.response_threshold
    }
}

impl Default for LoopDetector {
    fn default() -> Self {
        LoopDetector::new()
    }
}
