//! PipelineBuilder - resolves a request into configured stages
//!
//! Per stage: registry lookup, zero-valued config, parameter loading,
//! module validation. Nothing is opened or spawned here, so a failure needs
//! no cleanup beyond dropping the instances already built.

use config_loader::{load_params, request_from_selectors};
use contracts::{ModuleGroup, PipelineError, PipelineRequest, PipelineStage, Selector, StageType};
use tracing::{debug, info, instrument, warn};

use crate::registry::ModuleRegistry;

/// Pipeline Builder
pub struct PipelineBuilder<'a> {
    registry: &'a ModuleRegistry,
}

impl<'a> PipelineBuilder<'a> {
    pub fn new(registry: &'a ModuleRegistry) -> Self {
        Self { registry }
    }

    /// Build the ordered, configured stage list for `request`
    ///
    /// Absent optional stages are omitted, so the result holds 2 to 4 stages
    /// in execution order for the request's group.
    ///
    /// # Errors
    /// - [`PipelineError::ModuleNotFound`] when a selector names no registered module
    /// - [`PipelineError::InvalidParamType`] / [`PipelineError::UnsupportedFieldType`]
    ///   when a parameter cannot be loaded
    /// - [`PipelineError::ModuleInitFailed`] when a module rejects its configuration
    #[instrument(
        name = "pipeline_builder_build",
        skip(self, request),
        fields(group = %request.group)
    )]
    pub fn build(&self, request: &PipelineRequest) -> Result<Vec<PipelineStage>, PipelineError> {
        let mut stages = Vec::with_capacity(4);

        for (stage, selector) in request.ordered_stages() {
            match self.build_stage(request.group, stage, selector) {
                Ok(built) => stages.push(built),
                Err(e) => {
                    warn!(stage = %stage, module = %selector.name, error = %e, "Stage build failed");
                    return Err(e);
                }
            }
        }

        info!(
            stages = stages.len(),
            pipeline = %stages.iter().map(PipelineStage::label).collect::<Vec<_>>().join(" -> "),
            "Pipeline built"
        );
        Ok(stages)
    }

    /// Parse raw selectors and build them
    ///
    /// Every selector is parsed before the first lookup.
    pub fn build_from_selectors(
        &self,
        group: ModuleGroup,
        source: &str,
        compress: Option<&str>,
        encrypt: Option<&str>,
        sink: &str,
    ) -> Result<Vec<PipelineStage>, PipelineError> {
        let request = request_from_selectors(group, source, compress, encrypt, sink)?;
        self.build(&request)
    }

    #[instrument(
        name = "pipeline_builder_stage",
        skip(self, selector),
        fields(module = %selector.name)
    )]
    fn build_stage(
        &self,
        group: ModuleGroup,
        stage: StageType,
        selector: &Selector,
    ) -> Result<PipelineStage, PipelineError> {
        let mut module = self
            .registry
            .lookup(group, stage, &selector.name)
            .ok_or_else(|| PipelineError::ModuleNotFound {
                group,
                stage,
                name: selector.name.clone(),
            })?;

        let mut config = module.default_config();
        load_params(config.as_mut(), &selector.params)?;
        debug!(config = ?config, "Configuration loaded");

        module
            .apply_config(config)
            .map_err(|source| PipelineError::ModuleInitFailed {
                stage,
                name: selector.name.clone(),
                source,
            })?;

        Ok(PipelineStage::new(module))
    }
}
