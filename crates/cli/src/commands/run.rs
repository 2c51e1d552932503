//! `run` command implementation.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tracing::{info, warn};

use crate::cli::RunArgs;
use crate::pipeline::{
    builtin_registry, print_plan, print_summary, resolve, Pipeline, PipelineConfig,
};

/// Execute the `run` command
pub async fn run_pipeline(args: &RunArgs) -> Result<()> {
    let resolved = resolve(&args.stages, std::env::vars())?;
    let runtime = resolved.runtime;

    let pipe_capacity = args.pipe_capacity.unwrap_or(runtime.pipe_capacity);
    if pipe_capacity == 0 {
        anyhow::bail!("--pipe-capacity must be greater than 0");
    }
    let timeout = match args.timeout {
        Some(0) => None,
        Some(secs) => Some(Duration::from_secs(secs)),
        None => runtime.timeout(),
    };
    let failure_grace = args
        .failure_grace
        .map(Duration::from_secs)
        .unwrap_or_else(|| runtime.failure_grace());

    let pipeline = Pipeline::new(
        PipelineConfig {
            request: resolved.request.clone(),
            pipe_capacity,
            timeout,
            failure_grace,
            metrics_port: args.metrics_port,
        },
        Arc::new(builtin_registry()),
    );

    // Dry run - configure every stage and exit
    if args.dry_run {
        let stages = pipeline.build()?;
        info!("Dry run mode - pipeline is valid, exiting");
        print_plan(&resolved.request, &stages);
        return Ok(());
    }

    // Setup graceful shutdown handler
    let shutdown = pipeline.shutdown_handle();
    let signal_task = tokio::spawn(async move {
        shutdown_signal().await;
        warn!("Received shutdown signal, stopping pipeline...");
        shutdown.cancel();
    });

    let result = pipeline.run().await;
    signal_task.abort();

    let report = result?;
    print_summary(&report);
    report.into_result().context("Pipeline execution failed")?;

    info!("backpipe finished");
    Ok(())
}

/// Wait for Ctrl+C or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
