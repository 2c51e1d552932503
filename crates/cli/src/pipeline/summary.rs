//! Human-readable pipeline plan and run summary.
//!
//! Printed to stderr: a `stdout` sink owns standard output.

use contracts::{PipelineRequest, PipelineStage};
use stage_runtime::{RunReport, StageStatus};

/// Print the configured stages of a dry run
pub fn print_plan(request: &PipelineRequest, stages: &[PipelineStage]) {
    eprintln!("\n=== Pipeline Plan ({}) ===\n", request.group);
    for (idx, stage) in stages.iter().enumerate() {
        let params = request
            .selector(stage.stage)
            .map(|selector| selector.params.keys().cloned().collect::<Vec<_>>().join(", "))
            .unwrap_or_default();
        eprintln!("  {}. {:<10} {:<10} {}", idx + 1, stage.stage, stage.name, params);
    }
    eprintln!();
}

/// Print per-stage outcomes and per-pipe byte counts
pub fn print_summary(report: &RunReport) {
    let verdict = if report.is_success() { "completed" } else { "FAILED" };
    eprintln!(
        "\n=== Pipeline {} in {:.2}s ===\n",
        verdict,
        report.duration.as_secs_f64()
    );

    eprintln!("Stages");
    for outcome in &report.outcomes {
        let status = match &outcome.status {
            StageStatus::Completed => "ok".to_string(),
            StageStatus::Failed {
                error,
                root_cause: true,
            } => format!("FAILED: {error}"),
            StageStatus::Failed { error, .. } => format!("stopped ({error})"),
        };
        eprintln!(
            "   ├─ {:<20} {:>8} ms  {}",
            outcome.label(),
            outcome.elapsed.as_millis(),
            status
        );
    }

    if !report.streams.is_empty() {
        eprintln!("\nStreams");
        for stream in &report.streams {
            eprintln!(
                "   ├─ {:<40} {:>12} bytes",
                stream.label, stream.bytes_read
            );
        }
    }
    eprintln!();
}
