//! Manifest validation
//!
//! Rules:
//! - source and sink name a module; a blank compress or encrypt entry
//!   means the stage is absent
//! - table parameters are scalars (string, number, boolean)
//! - pipe_capacity > 0

use contracts::{PipelineError, PipelineManifest, StageEntry, StageType};

/// Validate a parsed manifest
///
/// Returns the first error encountered.
pub fn validate(manifest: &PipelineManifest) -> Result<(), PipelineError> {
    for (stage, entry) in stage_entries(manifest) {
        validate_stage_entry(stage, entry)?;
    }
    validate_runtime(manifest)?;
    Ok(())
}

/// Present stage entries with their slot, gaps skipped
pub(crate) fn stage_entries(
    manifest: &PipelineManifest,
) -> impl Iterator<Item = (StageType, &StageEntry)> {
    [
        (StageType::Source, Some(&manifest.source)),
        (StageType::Compress, optional_entry(manifest.compress.as_ref())),
        (StageType::Encrypt, optional_entry(manifest.encrypt.as_ref())),
        (StageType::Sink, Some(&manifest.sink)),
    ]
    .into_iter()
    .filter_map(|(stage, entry)| entry.map(|entry| (stage, entry)))
}

/// An optional stage entry, `None` when it is missing or names no module
pub(crate) fn optional_entry(entry: Option<&StageEntry>) -> Option<&StageEntry> {
    entry.filter(|entry| !entry.module_name().trim().is_empty())
}

fn validate_stage_entry(stage: StageType, entry: &StageEntry) -> Result<(), PipelineError> {
    if entry.module_name().trim().is_empty() {
        return Err(PipelineError::config_validation(
            stage.as_str(),
            "module name cannot be empty",
        ));
    }

    if let StageEntry::Table { params, .. } = entry {
        for (key, value) in params {
            if value.is_array() || value.is_object() || value.is_null() {
                return Err(PipelineError::config_validation(
                    format!("{stage}.params.{key}"),
                    "parameter values must be strings, numbers or booleans",
                ));
            }
        }
    }
    Ok(())
}

fn validate_runtime(manifest: &PipelineManifest) -> Result<(), PipelineError> {
    if manifest.runtime.pipe_capacity == 0 {
        return Err(PipelineError::config_validation(
            "runtime.pipe_capacity",
            "pipe_capacity must be > 0",
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use contracts::{ModuleGroup, RuntimeSettings};

    fn minimal_manifest() -> PipelineManifest {
        PipelineManifest {
            version: Default::default(),
            group: ModuleGroup::Backup,
            source: StageEntry::Selector("stdin".into()),
            compress: Some(StageEntry::Table {
                module: "zstd".into(),
                params: [("level".to_string(), serde_json::json!(9))]
                    .into_iter()
                    .collect(),
            }),
            encrypt: None,
            sink: StageEntry::Selector("stdout".into()),
            runtime: RuntimeSettings::default(),
        }
    }

    #[test]
    fn test_valid_manifest() {
        assert!(validate(&minimal_manifest()).is_ok());
    }

    #[test]
    fn test_empty_module_name() {
        let mut manifest = minimal_manifest();
        manifest.sink = StageEntry::Selector("  ".into());
        let err = validate(&manifest).unwrap_err().to_string();
        assert!(err.contains("sink"), "got: {err}");
        assert!(err.contains("cannot be empty"), "got: {err}");
    }

    #[test]
    fn test_blank_optional_stage_is_absent() {
        let mut manifest = minimal_manifest();
        manifest.compress = Some(StageEntry::Selector(String::new()));
        manifest.encrypt = Some(StageEntry::Table {
            module: " ".into(),
            params: Default::default(),
        });
        validate(&manifest).unwrap();

        let stages: Vec<_> = stage_entries(&manifest).map(|(s, _)| s).collect();
        assert_eq!(stages, [StageType::Source, StageType::Sink]);
    }

    #[test]
    fn test_nested_param_rejected() {
        let mut manifest = minimal_manifest();
        manifest.compress = Some(StageEntry::Table {
            module: "zstd".into(),
            params: [("level".to_string(), serde_json::json!([1, 2]))]
                .into_iter()
                .collect(),
        });
        let err = validate(&manifest).unwrap_err().to_string();
        assert!(err.contains("compress.params.level"), "got: {err}");
    }

    #[test]
    fn test_zero_pipe_capacity() {
        let mut manifest = minimal_manifest();
        manifest.runtime.pipe_capacity = 0;
        let err = validate(&manifest).unwrap_err().to_string();
        assert!(err.contains("pipe_capacity must be > 0"), "got: {err}");
    }

    #[test]
    fn test_stage_entries_skip_absent() {
        let manifest = minimal_manifest();
        let stages: Vec<_> = stage_entries(&manifest).map(|(s, _)| s).collect();
        assert_eq!(
            stages,
            [StageType::Source, StageType::Compress, StageType::Sink]
        );
    }
}
