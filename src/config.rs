//! Process-wide configuration (`setup.yaml`, §6.4/§6.6).
//!
//! The core does not perform installation or first-run setup — that is a
//! front-end concern — but it does need a typed, validated view of the
//! configuration file once one exists on disk.

use std::collections::HashMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{CoreError, CoreResult};

/// Deployment mode affecting Selector eligibility (§4.8 hard filters).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    /// Only local-backend models are eligible.
    Local,
    /// All backends in the catalog are eligible.
    Any,
}

impl Default for Mode {
    fn default() -> Self {
        Mode::Any
    }
}

/// `defaults.*` section of `setup.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Defaults {
    #[serde(default)]
    pub mode: Mode,
    pub backend: String,
    pub profile: String,
    #[serde(default = "default_intent_threshold")]
    pub ml_intent_threshold: f64,
    #[serde(default = "default_complex_threshold")]
    pub ml_complex_threshold: f64,
    /// Unused by the core; consumed by the context builder front-end.
    #[serde(default)]
    pub graph_max_files: Option<u32>,
}

fn default_intent_threshold() -> f64 {
    0.7
}

fn default_complex_threshold() -> f64 {
    0.55
}

/// Per-role model ids for one named profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentModels {
    pub router: String,
    pub query: String,
    pub editor: String,
    pub research: String,
    #[serde(default)]
    pub review: Option<String>,
}

/// A single named profile under a backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Profile {
    pub agent_models: AgentModels,
}

/// `backend.<name>` section of `setup.yaml`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

/// Top-level `setup.yaml` contents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub defaults: Defaults,
    #[serde(default)]
    pub backend: HashMap<String, BackendConfig>,
}

impl Config {
    /// Load and validate `setup.yaml` from `path`.
    ///
    /// Validation failures (unknown profile, missing per-role model for the
    /// selected profile) return `CoreError::ConfigError` rather than panicking;
    /// no component is ever constructed from an unvalidated config.
    pub fn load(path: &Path) -> CoreResult<Self> {
        let bytes = std::fs::read_to_string(path)?;
        let config: Config = serde_yaml::from_str(&bytes)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> CoreResult<()> {
        let backend = self.backend.get(&self.defaults.backend).ok_or_else(|| {
            CoreError::ConfigError(format!(
                "defaults.backend {:?} has no matching backend.* section",
                self.defaults.backend
            ))
        })?;
        if !backend.profiles.contains_key(&self.defaults.profile) {
            return Err(CoreError::ConfigError(format!(
                "defaults.profile {:?} has no matching profile under backend {:?}",
                self.defaults.profile, self.defaults.backend
            )));
        }
        Ok(())
    }

    /// The `AgentModels` for the configured default backend/profile.
    pub fn active_agent_models(&self) -> CoreResult<&AgentModels> {
        let backend = self
            .backend
            .get(&self.defaults.backend)
            .ok_or_else(|| CoreError::ConfigError("no active backend".into()))?;
        let profile = backend.profiles.get(&self.defaults.profile).ok_or_else(|| {
            CoreError::ConfigError("no active profile".into())
        })?;
        Ok(&profile.agent_models)
    }
}
