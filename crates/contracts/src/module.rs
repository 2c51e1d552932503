//! Module trait - the contract every pipeline plugin implements
//!
//! Identity, configuration, stream binding and execution entry points.

use std::fmt;
use std::str::FromStr;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::{ConfigRecord, ModuleError, PipeReader, PipeWriter};

/// Module group
///
/// The group selects the direction of the pipeline and therefore the
/// order in which the optional transform stages run.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum ModuleGroup {
    /// origin -> compress -> encrypt -> destination
    #[default]
    Backup,
    /// archive -> decrypt -> decompress -> destination
    Restore,
}

impl ModuleGroup {
    pub const ALL: [ModuleGroup; 2] = [ModuleGroup::Backup, ModuleGroup::Restore];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Backup => "backup",
            Self::Restore => "restore",
        }
    }

    /// Stage slots in execution order for this group
    pub fn stage_order(&self) -> [StageType; 4] {
        match self {
            Self::Backup => [
                StageType::Source,
                StageType::Compress,
                StageType::Encrypt,
                StageType::Sink,
            ],
            Self::Restore => [
                StageType::Source,
                StageType::Encrypt,
                StageType::Compress,
                StageType::Sink,
            ],
        }
    }
}

impl fmt::Display for ModuleGroup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for ModuleGroup {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "backup" => Ok(Self::Backup),
            "restore" => Ok(Self::Restore),
            other => Err(format!("unknown module group '{other}'")),
        }
    }
}

/// Stage slot a module occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StageType {
    Source,
    Compress,
    Encrypt,
    Sink,
}

impl StageType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Source => "source",
            Self::Compress => "compress",
            Self::Encrypt => "encrypt",
            Self::Sink => "sink",
        }
    }

    /// Whether the stage consumes an upstream stream
    pub fn has_input(&self) -> bool {
        !matches!(self, Self::Source)
    }

    /// Whether the stage produces a downstream stream
    pub fn has_output(&self) -> bool {
        !matches!(self, Self::Sink)
    }
}

impl fmt::Display for StageType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

/// Registry key `(group, stage type, name)`
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ModuleKey {
    pub group: ModuleGroup,
    pub stage: StageType,
    pub name: String,
}

impl ModuleKey {
    pub fn new(group: ModuleGroup, stage: StageType, name: impl Into<String>) -> Self {
        Self {
            group,
            stage,
            name: name.into(),
        }
    }
}

impl fmt::Display for ModuleKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.group, self.stage, self.name)
    }
}

/// Pluggable pipeline stage
///
/// Lifecycle: created by the registry, configured once through
/// [`Module::apply_config`], bound once through [`Module::bind_streams`],
/// then executed once through [`Module::run`]. An instance is never reused
/// across runs.
///
/// Dropping a module releases whichever stream endpoints it still owns.
/// Endpoints should stay in the module until then: the runtime records a
/// failing stage as root cause before dropping it.
#[async_trait]
pub trait Module: Send {
    /// Module name (registry lookup and diagnostics)
    fn name(&self) -> &str;

    /// Stage slot this module occupies
    fn stage_type(&self) -> StageType;

    /// Fresh zero-valued configuration record
    fn default_config(&self) -> Box<dyn ConfigRecord>;

    /// Validate and commit a populated configuration record
    ///
    /// # Errors
    /// Returns [`ModuleError::InvalidConfig`] when the record fails validation
    fn apply_config(&mut self, config: Box<dyn ConfigRecord>) -> Result<(), ModuleError>;

    /// Attach stream endpoints
    ///
    /// Sources receive only a writer, sinks only a reader, transforms both.
    fn bind_streams(
        &mut self,
        writer: Option<PipeWriter>,
        reader: Option<PipeReader>,
    ) -> Result<(), ModuleError>;

    /// Execute the stage to completion
    ///
    /// Consumes the reader fully (if any) and produces all output on the
    /// writer (if any) before returning.
    async fn run(&mut self) -> Result<(), ModuleError>;
}

/// A module resolved and configured for one slot of a pipeline
pub struct PipelineStage {
    pub stage: StageType,
    pub name: String,
    pub module: Box<dyn Module>,
}

impl PipelineStage {
    pub fn new(module: Box<dyn Module>) -> Self {
        Self {
            stage: module.stage_type(),
            name: module.name().to_string(),
            module,
        }
    }

    /// `stage/name` label used in logs
    pub fn label(&self) -> String {
        format!("{}/{}", self.stage, self.name)
    }
}

impl fmt::Debug for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PipelineStage")
            .field("stage", &self.stage)
            .field("name", &self.name)
            .finish_non_exhaustive()
    }
}
