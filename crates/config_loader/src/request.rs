//! PipelineRequest construction
//!
//! Every selector is parsed before any of them is resolved, so a malformed
//! selector fails the request before the registry is consulted.

use contracts::{
    ModuleGroup, ParamMap, PipelineError, PipelineManifest, PipelineRequest, Selector, StageEntry,
    StageType,
};

use crate::selector::{parse_optional_selector, parse_selector};
use crate::validator::optional_entry;

/// Build a request from raw selector strings
///
/// Blank optional selectors mean the stage is not requested.
pub fn request_from_selectors(
    group: ModuleGroup,
    source: &str,
    compress: Option<&str>,
    encrypt: Option<&str>,
    sink: &str,
) -> Result<PipelineRequest, PipelineError> {
    let source = parse_selector(source)?;
    let compress = parse_optional_selector(compress)?;
    let encrypt = parse_optional_selector(encrypt)?;
    let sink = parse_selector(sink)?;

    Ok(PipelineRequest {
        group,
        source,
        compress,
        encrypt,
        sink,
    })
}

/// Build a request from a validated manifest
///
/// Blank compress or encrypt entries mean the stage is not requested.
pub fn request_from_manifest(manifest: &PipelineManifest) -> Result<PipelineRequest, PipelineError> {
    let source = selector_from_entry(StageType::Source, &manifest.source)?;
    let compress = optional_entry(manifest.compress.as_ref())
        .map(|entry| selector_from_entry(StageType::Compress, entry))
        .transpose()?;
    let encrypt = optional_entry(manifest.encrypt.as_ref())
        .map(|entry| selector_from_entry(StageType::Encrypt, entry))
        .transpose()?;
    let sink = selector_from_entry(StageType::Sink, &manifest.sink)?;

    Ok(PipelineRequest {
        group: manifest.group,
        source,
        compress,
        encrypt,
        sink,
    })
}

fn selector_from_entry(stage: StageType, entry: &StageEntry) -> Result<Selector, PipelineError> {
    match entry {
        StageEntry::Selector(raw) => parse_selector(raw),
        StageEntry::Table { module, params } => {
            let params = params
                .iter()
                .map(|(key, value)| {
                    scalar_to_string(value)
                        .map(|value| (key.clone(), value))
                        .ok_or_else(|| {
                            PipelineError::config_validation(
                                format!("{stage}.params.{key}"),
                                "parameter values must be strings, numbers or booleans",
                            )
                        })
                })
                .collect::<Result<ParamMap, _>>()?;

            Ok(Selector {
                name: module.trim().to_string(),
                params,
            })
        }
    }
}

/// Render a scalar manifest value the way it would appear in a selector
fn scalar_to_string(value: &serde_json::Value) -> Option<String> {
    match value {
        serde_json::Value::String(s) => Some(s.clone()),
        serde_json::Value::Number(n) => Some(n.to_string()),
        serde_json::Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}
