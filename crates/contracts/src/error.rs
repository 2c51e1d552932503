//! Layered error definitions
//!
//! Categorized by phase: selector / registry / config / init / bind / run

use thiserror::Error;

use crate::{FieldKind, ModuleGroup, StageType};

/// Unified pipeline error
#[derive(Debug, Error)]
pub enum PipelineError {
    // ===== Build-time Errors =====
    /// Selector string cannot be split into name + parameters
    #[error("malformed selector '{selector}': {message}")]
    MalformedSpec { selector: String, message: String },

    /// Requested module absent from the registry
    #[error("module {group}/{stage}/{name} not found")]
    ModuleNotFound {
        group: ModuleGroup,
        stage: StageType,
        name: String,
    },

    /// Parameter value cannot be coerced into the field's kind
    #[error("invalid value '{value}' for parameter '{key}' (expected {expected}): {reason}")]
    InvalidParamType {
        key: String,
        value: String,
        expected: FieldKind,
        reason: String,
    },

    /// Parameter matched a field whose kind the loader cannot populate
    #[error("parameter '{key}' targets a field of unsupported kind '{kind}'")]
    UnsupportedFieldType { key: String, kind: FieldKind },

    /// Module rejected its configuration
    #[error("init module {stage}/{name} failed: {source}")]
    ModuleInitFailed {
        stage: StageType,
        name: String,
        #[source]
        source: ModuleError,
    },

    /// Module rejected its stream endpoints
    #[error("module {stage}/{name} pipe initialization failed: {source}")]
    BindError {
        stage: StageType,
        name: String,
        #[source]
        source: ModuleError,
    },

    // ===== Run-time Errors =====
    /// Stage failed during execution
    #[error("module {stage}/{name} execution failed: {source}")]
    RunError {
        stage: StageType,
        name: String,
        #[source]
        source: ModuleError,
    },

    // ===== Configuration File Errors =====
    /// Manifest parse error
    #[error("config parse error: {message}")]
    ConfigParse {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Manifest or pipeline shape validation error
    #[error("config validation error at '{field}': {message}")]
    ConfigValidation { field: String, message: String },

    /// IO error
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl PipelineError {
    /// Create malformed selector error
    pub fn malformed_spec(selector: impl Into<String>, message: impl Into<String>) -> Self {
        Self::MalformedSpec {
            selector: selector.into(),
            message: message.into(),
        }
    }

    /// Create configuration parse error
    pub fn config_parse(message: impl Into<String>) -> Self {
        Self::ConfigParse {
            message: message.into(),
            source: None,
        }
    }

    /// Create configuration validation error
    pub fn config_validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::ConfigValidation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Stage `(type, name)` the error is attributed to, if any
    pub fn stage(&self) -> Option<(StageType, &str)> {
        match self {
            Self::ModuleInitFailed { stage, name, .. }
            | Self::BindError { stage, name, .. }
            | Self::RunError { stage, name, .. } => Some((*stage, name.as_str())),
            Self::ModuleNotFound { stage, name, .. } => Some((*stage, name.as_str())),
            _ => None,
        }
    }
}

/// Error returned by a module's entry points
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Configuration failed validation
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Configuration record is not the type this module declared
    #[error("configuration record has unexpected type (expected {expected})")]
    ConfigMismatch { expected: &'static str },

    /// Required endpoint not supplied
    #[error("missing {0} endpoint")]
    MissingEndpoint(&'static str),

    /// Endpoint supplied to a stage that cannot use it
    #[error("unexpected {0} endpoint")]
    UnexpectedEndpoint(&'static str),

    /// `run` called before `bind_streams`
    #[error("module is not bound to any stream")]
    NotBound,

    /// Stream or file IO failure
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Malformed data or codec failure
    #[error("codec error: {0}")]
    Codec(String),

    /// External process failure
    #[error("process '{program}' failed: {message}")]
    Process { program: String, message: String },

    /// Stage stopped by the coordinator
    #[error("cancelled")]
    Cancelled,

    /// Stage panicked
    #[error("panicked: {0}")]
    Panicked(String),

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl ModuleError {
    pub fn codec(message: impl Into<String>) -> Self {
        Self::Codec(message.into())
    }

    pub fn process(program: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Process {
            program: program.into(),
            message: message.into(),
        }
    }

    /// Whether the failure is a consequence of a peer closing its endpoint
    pub fn is_broken_pipe(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::BrokenPipe)
    }

    /// Whether the failure comes from an upstream stage dropping its writer
    /// without finishing the stream
    pub fn is_upstream_abort(&self) -> bool {
        matches!(self, Self::Io(e) if e.kind() == std::io::ErrorKind::ConnectionAborted)
    }
}

impl From<validator::ValidationErrors> for ModuleError {
    fn from(errors: validator::ValidationErrors) -> Self {
        Self::InvalidConfig(errors.to_string())
    }
}
