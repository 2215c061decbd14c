//! Crate-wide error type.
//!
//! Every fallible operation in this crate returns [`CoreResult<T>`], and every
//! distinguishable failure named by the component specs is a variant of
//! [`CoreError`]. Recovered errors (`AllowlistViolation`, `ToolError`) are
//! turned back into tool messages by callers instead of propagating further;
//! everything else is meant to reach the process boundary.

use std::fmt;

/// Crate-wide error enum. See module docs for recovery policy per variant.
#[derive(Debug, Clone)]
pub enum CoreError {
    /// The provider's transport failed (network, DNS, TLS, connection reset).
    ProviderUnavailable(String),
    /// The provider reported the request was throttled or quota-exhausted.
    RateLimited(String),
    /// The model produced a semantically invalid or malformed response.
    ModelError(String),
    /// A plan document failed to parse into at least one step with success criteria.
    InvalidPlan(String),
    /// A `write_file`/`apply_patch` target fell outside the step's allowlist.
    AllowlistViolation(String),
    /// A tool executed but failed at the application level.
    ToolError(String),
    /// A verifier (build/test/lint/review) reported failure.
    VerifierFailure(String),
    /// The loop detector fired on runaway tool-call or response repetition.
    LoopDetected(String),
    /// The caller's cancellation signal fired.
    Cancelled,
    /// A per-plan monetary or token budget was exceeded.
    BudgetExceeded(String),
    /// No catalog model scored above zero for the requested selection.
    NoSuitableModel,
    /// A checkpoint file failed to parse or its invariants did not hold.
    CheckpointCorrupt(String),
    /// `setup.yaml` or the model catalog failed to load or validate.
    ConfigError(String),
    /// Lower-level I/O failure not otherwise classified.
    Io(String),
    /// Lower-level (de)serialization failure not otherwise classified.
    Serde(String),
}

impl fmt::Display for CoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CoreError::ProviderUnavailable(m) => write!(f, "provider unavailable: {}", m),
            CoreError::RateLimited(m) => write!(f, "rate limited: {}", m),
            CoreError::ModelError(m) => write!(f, "model error: {}", m),
            CoreError::InvalidPlan(m) => write!(f, "invalid plan: {}", m),
            CoreError::AllowlistViolation(m) => write!(f, "allowlist violation: {}", m),
            CoreError::ToolError(m) => write!(f, "tool error: {}", m),
            CoreError::VerifierFailure(m) => write!(f, "verifier failure: {}", m),
            CoreError::LoopDetected(m) => write!(f, "loop detected: {}", m),
            CoreError::Cancelled => write!(f, "cancelled"),
            CoreError::BudgetExceeded(m) => write!(f, "budget exceeded: {}", m),
            CoreError::NoSuitableModel => write!(f, "no suitable model"),
            CoreError::CheckpointCorrupt(m) => write!(f, "checkpoint corrupt: {}", m),
            CoreError::ConfigError(m) => write!(f, "configuration error: {}", m),
            CoreError::Io(m) => write!(f, "io error: {}", m),
            CoreError::Serde(m) => write!(f, "serialization error: {}", m),
        }
    }
}

impl std::error::Error for CoreError {}

impl From<std::io::Error> for CoreError {
    fn from(e: std::io::Error) -> Self {
        CoreError::Io(e.to_string())
    }
}

impl From<serde_json::Error> for CoreError {
    fn from(e: serde_json::Error) -> Self {
        CoreError::Serde(e.to_string())
    }
}

impl From<serde_yaml::Error> for CoreError {
    fn from(e: serde_yaml::Error) -> Self {
        CoreError::ConfigError(e.to_string())
    }
}

impl From<reqwest::Error> for CoreError {
    fn from(e: reqwest::Error) -> Self {
        CoreError::ProviderUnavailable(e.to_string())
    }
}

/// Convenience alias used throughout the crate's public APIs.
pub type CoreResult<T> = Result<T, CoreError>;

/// Exit code this error maps to per the CLI surface's contract (§6.5).
impl CoreError {
    pub fn exit_code(&self) -> i32 {
        match self {
            CoreError::ConfigError(_) => 3,
            CoreError::InvalidPlan(_) => 2,
            _ => 1,
        }
    }

    /// True for errors recovered locally as a tool message rather than surfaced.
    pub fn is_recoverable_locally(&self) -> bool {
        matches!(self, CoreError::AllowlistViolation(_) | CoreError::ToolError(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exit_codes_match_cli_contract() {
        assert_eq!(CoreError::ConfigError("bad".into()).exit_code(), 3);
        assert_eq!(CoreError::InvalidPlan("no steps".into()).exit_code(), 2);
        assert_eq!(CoreError::NoSuitableModel.exit_code(), 1);
    }

    #[test]
    fn recoverable_classification() {
        assert!(CoreError::ToolError("x".into()).is_recoverable_locally());
        assert!(CoreError::AllowlistViolation("x".into()).is_recoverable_locally());
        assert!(!CoreError::LoopDetected("x".into()).is_recoverable_locally());
    }
}
