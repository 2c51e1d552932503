//! `validate` command implementation.

use std::sync::Arc;

use anyhow::{Context, Result};
use contracts::PipelineError;
use serde::Serialize;
use tracing::info;

use crate::cli::ValidateArgs;
use crate::pipeline::{builtin_registry, resolve, Pipeline, PipelineConfig};

/// Validation result for JSON output
#[derive(Serialize)]
struct ValidationResult {
    valid: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    group: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    stages: Vec<StageSummary>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
    /// Error category, e.g. `module_not_found`
    #[serde(skip_serializing_if = "Option::is_none")]
    kind: Option<&'static str>,
}

#[derive(Serialize)]
struct StageSummary {
    stage: String,
    module: String,
    /// Parameter names only; values may be credentials
    params: Vec<String>,
}

/// Execute the `validate` command
pub fn run_validate(args: &ValidateArgs) -> Result<()> {
    info!("Validating pipeline");

    let result = validate(args);

    if args.json {
        let json = serde_json::to_string_pretty(&result)
            .context("Failed to serialize validation result")?;
        println!("{}", json);
    } else {
        print_validation_result(&result);
    }

    if result.valid {
        Ok(())
    } else {
        anyhow::bail!("Pipeline validation failed")
    }
}

fn validate(args: &ValidateArgs) -> ValidationResult {
    let outcome = resolve(&args.stages, std::env::vars()).and_then(|resolved| {
        let pipeline = Pipeline::new(
            PipelineConfig {
                request: resolved.request.clone(),
                pipe_capacity: resolved.runtime.pipe_capacity,
                timeout: resolved.runtime.timeout(),
                failure_grace: resolved.runtime.failure_grace(),
                metrics_port: None,
            },
            Arc::new(builtin_registry()),
        );
        let stages = pipeline.build()?;
        Ok((resolved.request, stages))
    });

    match outcome {
        Ok((request, stages)) => ValidationResult {
            valid: true,
            group: Some(request.group.to_string()),
            stages: stages
                .iter()
                .map(|stage| StageSummary {
                    stage: stage.stage.to_string(),
                    module: stage.name.clone(),
                    params: request
                        .selector(stage.stage)
                        .map(|selector| selector.params.keys().cloned().collect())
                        .unwrap_or_default(),
                })
                .collect(),
            error: None,
            kind: None,
        },
        Err(e) => ValidationResult {
            valid: false,
            group: None,
            stages: Vec::new(),
            kind: e.downcast_ref::<PipelineError>().map(error_kind),
            error: Some(format!("{e:#}")),
        },
    }
}

fn error_kind(error: &PipelineError) -> &'static str {
    match error {
        PipelineError::MalformedSpec { .. } => "malformed_spec",
        PipelineError::ModuleNotFound { .. } => "module_not_found",
        PipelineError::InvalidParamType { .. } => "invalid_param_type",
        PipelineError::UnsupportedFieldType { .. } => "unsupported_field_type",
        PipelineError::ModuleInitFailed { .. } => "module_init_failed",
        PipelineError::BindError { .. } => "bind_error",
        PipelineError::RunError { .. } => "run_error",
        PipelineError::ConfigParse { .. } => "config_parse",
        PipelineError::ConfigValidation { .. } => "config_validation",
        PipelineError::Io(_) => "io",
    }
}

fn print_validation_result(result: &ValidationResult) {
    if result.valid {
        println!(
            "✓ Pipeline is valid ({})",
            result.group.as_deref().unwrap_or_default()
        );
        for stage in &result.stages {
            println!(
                "  - {:<10} {:<10} [{}]",
                stage.stage,
                stage.module,
                stage.params.join(", ")
            );
        }
    } else {
        println!("✗ Pipeline is invalid");
        if let Some(ref error) = result.error {
            println!("\n  Error: {}", error);
        }
    }
}
