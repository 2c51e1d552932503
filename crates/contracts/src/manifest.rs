//! PipelineManifest - file-based pipeline description
//!
//! Describes the stages and runtime settings of a pipeline. Loaded from TOML
//! or JSON by the config loader.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{ModuleGroup, DEFAULT_PIPE_CAPACITY};

/// Manifest version
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum ManifestVersion {
    #[default]
    V1,
}

/// Complete pipeline manifest
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineManifest {
    /// Manifest version
    #[serde(default)]
    pub version: ManifestVersion,

    /// Module group (pipeline direction)
    #[serde(default)]
    pub group: ModuleGroup,

    /// Source stage
    pub source: StageEntry,

    /// Compression stage (optional)
    #[serde(default)]
    pub compress: Option<StageEntry>,

    /// Encryption stage (optional)
    #[serde(default)]
    pub encrypt: Option<StageEntry>,

    /// Sink stage
    pub sink: StageEntry,

    /// Runtime settings
    #[serde(default)]
    pub runtime: RuntimeSettings,
}

/// Stage entry: a selector string or a module table
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StageEntry {
    /// `name::key=value::...`
    Selector(String),

    /// `{ module = "...", params = { ... } }`
    Table {
        module: String,
        #[serde(default)]
        params: BTreeMap<String, serde_json::Value>,
    },
}

impl StageEntry {
    pub fn module_name(&self) -> &str {
        match self {
            Self::Selector(selector) => selector.split("::").next().unwrap_or_default(),
            Self::Table { module, .. } => module,
        }
    }
}

/// Runtime settings for the stage runtime and coordinator
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuntimeSettings {
    /// Bytes buffered per pipe
    #[serde(default = "default_pipe_capacity")]
    pub pipe_capacity: usize,

    /// Overall deadline in seconds (0 = none)
    #[serde(default)]
    pub timeout_secs: u64,

    /// Time granted to remaining stages after the first failure
    #[serde(default = "default_failure_grace_secs")]
    pub failure_grace_secs: u64,
}

fn default_pipe_capacity() -> usize {
    DEFAULT_PIPE_CAPACITY
}

fn default_failure_grace_secs() -> u64 {
    30
}

impl Default for RuntimeSettings {
    fn default() -> Self {
        Self {
            pipe_capacity: default_pipe_capacity(),
            timeout_secs: 0,
            failure_grace_secs: default_failure_grace_secs(),
        }
    }
}

impl RuntimeSettings {
    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }

    pub fn failure_grace(&self) -> Duration {
        Duration::from_secs(self.failure_grace_secs)
    }
}
