use std::time::Duration;

use config_loader::request_from_selectors;
use contracts::{ModuleGroup, PipelineError, PipelineRequest, PipelineStage};
use module_registry::{ModuleRegistry, PipelineBuilder};
use stage_runtime::{wire, Coordinator, CoordinatorConfig, RunReport};

/// Upper bound for any single pipeline run in these tests
pub const RUN_LIMIT: Duration = Duration::from_secs(20);

/// Registry with every built-in module
pub fn builtin_registry() -> ModuleRegistry {
    let mut registry = ModuleRegistry::new();
    sources::register(&mut registry);
    transforms::register(&mut registry);
    sinks::register(&mut registry);
    registry
}

pub fn request(
    group: ModuleGroup,
    source: &str,
    compress: Option<&str>,
    encrypt: Option<&str>,
    sink: &str,
) -> PipelineRequest {
    request_from_selectors(group, source, compress, encrypt, sink).unwrap()
}

/// Build, wire and run a request
pub async fn run_request(
    registry: &ModuleRegistry,
    request: &PipelineRequest,
    config: CoordinatorConfig,
) -> Result<RunReport, PipelineError> {
    let stages = PipelineBuilder::new(registry).build(request)?;
    run_stages(stages, 16 * 1024, config).await
}

/// Wire and run already-configured stages, bounded by [`RUN_LIMIT`]
pub async fn run_stages(
    stages: Vec<PipelineStage>,
    capacity: usize,
    config: CoordinatorConfig,
) -> Result<RunReport, PipelineError> {
    let wired = wire(stages, capacity)?;
    let report = tokio::time::timeout(RUN_LIMIT, Coordinator::new(config).run(wired))
        .await
        .expect("pipeline did not terminate in time");
    Ok(report)
}

/// Deterministic, partly compressible payload
pub fn payload(len: usize) -> Vec<u8> {
    const LINE: &[u8] = b"INSERT INTO orders VALUES (42, 'pending');\n";
    let mut state = 0x2545_f491_u32;
    (0..len)
        .map(|i| {
            if (i / 4096) % 2 == 0 {
                LINE[i % LINE.len()]
            } else {
                state ^= state << 13;
                state ^= state >> 17;
                state ^= state << 5;
                state as u8
            }
        })
        .collect()
}
