//! # Config Loader
//!
//! Turns user input into a [`PipelineRequest`].
//!
//! Responsibilities:
//! - Parse selector strings (`name::key=value::...`)
//! - Parse and validate TOML/JSON pipeline manifests
//! - Merge `BACKPIPE_<STAGE>_<KEY>` environment parameters
//! - Populate module configuration records from raw parameters
//!
//! # Example
//!
//! ```no_run
//! use config_loader::ConfigLoader;
//! use std::path::Path;
//!
//! let manifest = ConfigLoader::load_from_path(Path::new("pipeline.toml")).unwrap();
//! let request = ConfigLoader::request_from_manifest(&manifest).unwrap();
//! println!("Source: {}", request.source);
//! ```

mod env;
mod params;
mod parser;
mod request;
mod selector;
mod validator;

pub use contracts::{PipelineManifest, PipelineRequest, Selector};
pub use env::{apply_env_params, params_from_env, stage_env_prefix, ENV_PREFIX};
pub use params::{coerce, load_params, normalize_key, parse_bool};
pub use parser::ConfigFormat;
pub use request::request_from_selectors;
pub use selector::{parse_optional_selector, parse_selector, SEGMENT_SEPARATOR};

use contracts::PipelineError;
use std::path::Path;

/// Manifest loader
///
/// Provides static methods to load a manifest from files or strings.
pub struct ConfigLoader;

impl ConfigLoader {
    /// Load a manifest from a file path
    ///
    /// Format is detected from the file extension (.toml / .json).
    ///
    /// # Errors
    /// - File read failure
    /// - Unsupported format
    /// - Parse failure
    /// - Validation failure
    pub fn load_from_path(path: &Path) -> Result<PipelineManifest, PipelineError> {
        let format = Self::detect_format(path)?;
        let content = Self::read_file(path)?;
        Self::load_from_str(&content, format)
    }

    /// Load a manifest from a string
    pub fn load_from_str(
        content: &str,
        format: ConfigFormat,
    ) -> Result<PipelineManifest, PipelineError> {
        let manifest = parser::parse(content, format)?;
        validator::validate(&manifest)?;
        Ok(manifest)
    }

    /// Convert a manifest into a request
    pub fn request_from_manifest(
        manifest: &PipelineManifest,
    ) -> Result<PipelineRequest, PipelineError> {
        request::request_from_manifest(manifest)
    }

    /// Serialize a manifest to a TOML string
    pub fn to_toml(manifest: &PipelineManifest) -> Result<String, PipelineError> {
        toml::to_string_pretty(manifest)
            .map_err(|e| PipelineError::config_parse(format!("TOML serialize error: {e}")))
    }
}

impl ConfigLoader {
    fn detect_format(path: &Path) -> Result<ConfigFormat, PipelineError> {
        let ext = path.extension().and_then(|e| e.to_str()).ok_or_else(|| {
            PipelineError::config_parse("cannot determine file format from extension")
        })?;

        ConfigFormat::from_extension(ext).ok_or_else(|| {
            PipelineError::config_parse(format!("unsupported config format: .{ext}"))
        })
    }

    fn read_file(path: &Path) -> Result<String, PipelineError> {
        Ok(std::fs::read_to_string(path)?)
    }
}
