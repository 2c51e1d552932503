//! Pipeline orchestrator - builds, wires and runs one pipeline.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use contracts::{PipelineRequest, PipelineStage};
use module_registry::{ModuleRegistry, PipelineBuilder};
use stage_runtime::{wire, Coordinator, CoordinatorConfig, RunReport};
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Registry with every built-in source, transform and sink
pub fn builtin_registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    sources::register(&mut registry);
    transforms::register(&mut registry);
    sinks::register(&mut registry);
    registry
}

/// Pipeline configuration
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Stages to run
    pub request: PipelineRequest,

    /// Bytes buffered per pipe
    pub pipe_capacity: usize,

    /// Pipeline timeout (None = no timeout)
    pub timeout: Option<Duration>,

    /// Time granted to remaining stages after the first failure
    pub failure_grace: Duration,

    /// Metrics server port (None = disabled)
    pub metrics_port: Option<u16>,
}

/// Main pipeline orchestrator
pub struct Pipeline {
    config: PipelineConfig,
    registry: Arc<ModuleRegistry>,
    coordinator: Coordinator,
}

impl Pipeline {
    pub fn new(config: PipelineConfig, registry: Arc<ModuleRegistry>) -> Self {
        let coordinator = Coordinator::new(CoordinatorConfig {
            deadline: config.timeout,
            failure_grace: config.failure_grace,
        });
        Self {
            config,
            registry,
            coordinator,
        }
    }

    /// Token that stops the run when cancelled
    pub fn shutdown_handle(&self) -> CancellationToken {
        self.coordinator.cancellation_token()
    }

    /// Resolve and configure every stage without binding any stream
    pub fn build(&self) -> Result<Vec<PipelineStage>> {
        PipelineBuilder::new(&self.registry)
            .build(&self.config.request)
            .context("Failed to build pipeline")
    }

    /// Run the pipeline to completion
    ///
    /// Build and bind failures are errors; stage failures are reported in
    /// the returned [`RunReport`].
    pub async fn run(self) -> Result<RunReport> {
        if let Some(port) = self.config.metrics_port {
            observability::init_metrics_only(port)?;
            info!("Metrics endpoint available on port {}", port);
        }

        let stages = self.build()?;
        let wired = wire(stages, self.config.pipe_capacity).context("Failed to wire pipeline")?;

        info!(
            group = %self.config.request.group,
            stages = wired.stages.len(),
            pipe_capacity = self.config.pipe_capacity,
            timeout_secs = ?self.config.timeout.map(|t| t.as_secs()),
            "Starting pipeline"
        );

        let report = self.coordinator.run(wired).await;
        info!(
            success = report.is_success(),
            duration_ms = report.duration.as_millis() as u64,
            "Pipeline finished"
        );
        Ok(report)
    }
}
