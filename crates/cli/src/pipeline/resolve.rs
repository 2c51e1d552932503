//! Request resolution - manifest, stage flags and environment combined
//!
//! Precedence, highest first: stage flags, manifest entries, then
//! `BACKPIPE_<STAGE>_<KEY>` variables for parameters the selector lacks.

use anyhow::{Context, Result};
use config_loader::{
    apply_env_params, parse_optional_selector, parse_selector, request_from_selectors,
    ConfigLoader,
};
use contracts::{ModuleGroup, PipelineError, PipelineRequest, RuntimeSettings};
use tracing::{debug, info};

use crate::cli::StageArgs;

/// Request plus the runtime settings it came with
#[derive(Debug, Clone)]
pub struct ResolvedPipeline {
    pub request: PipelineRequest,
    pub runtime: RuntimeSettings,
}

/// Resolve stage arguments into a request
pub fn resolve<I>(args: &StageArgs, env: I) -> Result<ResolvedPipeline>
where
    I: IntoIterator<Item = (String, String)>,
{
    let (mut request, runtime) = match &args.manifest {
        Some(path) => {
            let manifest = ConfigLoader::load_from_path(path)
                .with_context(|| format!("Failed to load manifest {}", path.display()))?;
            let mut request = ConfigLoader::request_from_manifest(&manifest)?;
            apply_overrides(&mut request, args)?;
            info!(manifest = %path.display(), group = %request.group, "Manifest loaded");
            (request, manifest.runtime)
        }
        None => {
            let source = args
                .source
                .as_deref()
                .context("--source is required when no --manifest is given")?;
            let sink = args
                .sink
                .as_deref()
                .context("--sink is required when no --manifest is given")?;
            let request = request_from_selectors(
                ModuleGroup::default(),
                source,
                args.compress.as_deref(),
                args.encrypt.as_deref(),
                sink,
            )?;
            (request, RuntimeSettings::default())
        }
    };

    if let Some(group) = args.group {
        request.group = group.into();
    }
    apply_env_params(&mut request, env);
    debug!(
        group = %request.group,
        stages = request.ordered_stages().len(),
        "Request resolved"
    );

    Ok(ResolvedPipeline { request, runtime })
}

/// Replace manifest stages with the ones given as flags
///
/// An empty optional flag removes the stage.
fn apply_overrides(request: &mut PipelineRequest, args: &StageArgs) -> Result<(), PipelineError> {
    if let Some(source) = &args.source {
        request.source = parse_selector(source)?;
    }
    if let Some(compress) = &args.compress {
        request.compress = parse_optional_selector(Some(compress))?;
    }
    if let Some(encrypt) = &args.encrypt {
        request.encrypt = parse_optional_selector(Some(encrypt))?;
    }
    if let Some(sink) = &args.sink {
        request.sink = parse_selector(sink)?;
    }
    Ok(())
}
