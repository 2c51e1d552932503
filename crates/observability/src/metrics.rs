//! Pipeline metrics
//!
//! Thin wrappers over the `metrics` facade. Without an installed recorder
//! every call is a no-op.

use contracts::StageType;
use metrics::{counter, histogram};

/// Terminal status label of a stage
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageStatusLabel {
    Completed,
    /// Root-cause failure
    Failed,
    /// Failure caused by another stage closing its endpoint or by cancellation
    Cascaded,
}

impl StageStatusLabel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cascaded => "cascaded",
        }
    }
}

/// Record one terminal stage outcome
pub fn record_stage_outcome(
    stage: StageType,
    module: &str,
    status: StageStatusLabel,
    elapsed_ms: f64,
) {
    counter!(
        "backpipe_stage_runs_total",
        "stage" => stage.as_str(),
        "module" => module.to_string(),
        "status" => status.as_str()
    )
    .increment(1);

    histogram!(
        "backpipe_stage_duration_ms",
        "stage" => stage.as_str(),
        "module" => module.to_string()
    )
    .record(elapsed_ms);
}

/// Record bytes that crossed one pipe, labelled `upstream->downstream`
pub fn record_stream_bytes(stream: &str, bytes: u64) {
    counter!("backpipe_stream_bytes_total", "stream" => stream.to_string()).increment(bytes);
}

/// Record a finished pipeline run
pub fn record_pipeline_run(success: bool) {
    let status = if success { "success" } else { "failure" };
    counter!("backpipe_pipeline_runs_total", "status" => status).increment(1);
}
