//! Coordinator - runs every bound stage concurrently
//!
//! One task per stage. A task owns its module and therefore its endpoints,
//! so whichever way the task ends (return, error, cancellation, panic) the
//! endpoints are dropped and the neighbours unblock: the downstream stage
//! reads EOF, the upstream stage gets `BrokenPipe` on its next write.
//!
//! Failure classification:
//! - the first stage to fail with its own error (or a panic) claims the root
//!   cause, before its endpoints are released
//! - broken pipes and cancellations never claim it, they are cascades
//! - if no stage claimed it, the earliest failure to finish is the root cause
//!
//! Cancellation fires on the overall deadline, once the failure grace period
//! after the first failure expires, or when the external token is cancelled.

use std::any::Any;
use std::collections::HashMap;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::{Arc, OnceLock};
use std::task::Poll;
use std::time::{Duration, Instant};

use contracts::{ModuleError, PipelineStage, StageType};
use observability::{
    record_pipeline_run, record_stage_outcome, record_stream_bytes, StageStatusLabel,
};
use tokio::task::{Id, JoinError, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::report::{RunReport, StageOutcome, StageStatus, StreamReport};
use crate::wiring::WiredPipeline;

/// Default time granted to the remaining stages after the first failure
pub const DEFAULT_FAILURE_GRACE: Duration = Duration::from_secs(30);

#[derive(Debug, Clone)]
pub struct CoordinatorConfig {
    /// Overall deadline for the run (None = unbounded)
    pub deadline: Option<Duration>,
    pub failure_grace: Duration,
}

impl Default for CoordinatorConfig {
    fn default() -> Self {
        Self {
            deadline: None,
            failure_grace: DEFAULT_FAILURE_GRACE,
        }
    }
}

/// Concurrency coordinator
pub struct Coordinator {
    config: CoordinatorConfig,
    shutdown: CancellationToken,
}

/// What a stage task hands back
struct StageRun {
    elapsed: Duration,
    result: Result<(), ModuleError>,
}

impl Coordinator {
    pub fn new(config: CoordinatorConfig) -> Self {
        Self {
            config,
            shutdown: CancellationToken::new(),
        }
    }

    /// Token that cancels every stage of the current and future runs
    pub fn cancellation_token(&self) -> CancellationToken {
        self.shutdown.clone()
    }

    /// Run every stage to a terminal state
    ///
    /// Never returns before all stage tasks have ended.
    pub async fn run(&self, pipeline: WiredPipeline) -> RunReport {
        let started = Instant::now();
        let WiredPipeline { stages, streams } = pipeline;

        let cancel = self.shutdown.child_token();
        let root = Arc::new(OnceLock::new());
        let identities: Vec<(StageType, String)> = stages
            .iter()
            .map(|s| (s.stage, s.name.clone()))
            .collect();

        let mut tasks = JoinSet::new();
        let mut slots: HashMap<Id, usize> = HashMap::with_capacity(stages.len());
        for (idx, stage) in stages.into_iter().enumerate() {
            let handle = tasks.spawn(run_stage(idx, stage, cancel.clone(), Arc::clone(&root)));
            slots.insert(handle.id(), idx);
        }
        info!(stages = identities.len(), "Pipeline started");

        let mut results: Vec<Option<StageRun>> = identities.iter().map(|_| None).collect();
        let mut finish_order = Vec::with_capacity(identities.len());
        let overall_deadline = self.config.deadline.map(|d| started + d);
        let mut grace_deadline: Option<Instant> = None;

        loop {
            let next_deadline = match (overall_deadline, grace_deadline) {
                (Some(a), Some(b)) => Some(a.min(b)),
                (a, b) => a.or(b),
            };
            let timer = async move {
                match next_deadline {
                    Some(at) => tokio::time::sleep_until(at.into()).await,
                    None => std::future::pending().await,
                }
            };

            tokio::select! {
                joined = tasks.join_next_with_id() => {
                    let Some(joined) = joined else { break };
                    let (id, run) = match joined {
                        Ok((id, run)) => (id, run),
                        Err(e) => (e.id(), failed_task(e, started.elapsed())),
                    };
                    let Some(&idx) = slots.get(&id) else { continue };

                    if run.result.is_err() && grace_deadline.is_none() {
                        grace_deadline = Some(Instant::now() + self.config.failure_grace);
                    }
                    debug!(
                        stage = %identities[idx].0,
                        module = %identities[idx].1,
                        ok = run.result.is_ok(),
                        "Stage finished"
                    );
                    finish_order.push(idx);
                    results[idx] = Some(run);
                }
                _ = timer, if !cancel.is_cancelled() => {
                    let reason = if grace_deadline.is_some_and(|g| Instant::now() >= g) {
                        "failure grace period expired"
                    } else {
                        "deadline exceeded"
                    };
                    warn!(reason, remaining = tasks.len(), "Cancelling remaining stages");
                    cancel.cancel();
                }
            }
        }

        let root_idx = root.get().copied().or_else(|| {
            finish_order
                .iter()
                .copied()
                .find(|&idx| matches!(&results[idx], Some(run) if run.result.is_err()))
        });

        let outcomes = identities
            .into_iter()
            .zip(results)
            .enumerate()
            .map(|(idx, ((stage, name), run))| {
                let run = run.unwrap_or(StageRun {
                    elapsed: started.elapsed(),
                    result: Err(ModuleError::Other("stage task lost".into())),
                });
                let status = match run.result {
                    Ok(()) => StageStatus::Completed,
                    Err(error) => StageStatus::Failed {
                        error,
                        root_cause: root_idx == Some(idx),
                    },
                };
                let outcome = StageOutcome {
                    stage,
                    name,
                    elapsed: run.elapsed,
                    status,
                };
                log_outcome(&outcome);
                outcome
            })
            .collect::<Vec<_>>();

        let streams = streams
            .into_iter()
            .map(|link| {
                let report = StreamReport {
                    bytes_written: link.stats.bytes_written(),
                    bytes_read: link.stats.bytes_read(),
                    label: link.label,
                };
                record_stream_bytes(&report.label, report.bytes_read);
                report
            })
            .collect();

        let report = RunReport {
            outcomes,
            streams,
            duration: started.elapsed(),
        };
        record_pipeline_run(report.is_success());

        if report.is_success() {
            info!(elapsed_ms = report.duration.as_millis() as u64, "Pipeline completed");
        } else if let Some(root) = report.root_cause() {
            error!(
                stage = %root.stage,
                module = %root.name,
                elapsed_ms = report.duration.as_millis() as u64,
                "Pipeline failed"
            );
        }
        report
    }
}

/// Task body for one stage
async fn run_stage(
    idx: usize,
    mut stage: PipelineStage,
    cancel: CancellationToken,
    root: Arc<OnceLock<usize>>,
) -> StageRun {
    let started = Instant::now();

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(ModuleError::Cancelled),
        result = catch_panic(stage.module.run()) => result,
    };

    if let Err(e) = &result {
        if !is_cascade(e) {
            let _ = root.set(idx);
        }
    }

    // endpoints close here, after the claim
    drop(stage);

    StageRun {
        elapsed: started.elapsed(),
        result,
    }
}

/// Turn a panic inside `run` into [`ModuleError::Panicked`]
///
/// The stage stays owned by its task, so its endpoints still close in order.
async fn catch_panic<F>(mut run: F) -> Result<(), ModuleError>
where
    F: Future<Output = Result<(), ModuleError>> + Unpin,
{
    std::future::poll_fn(move |cx| {
        match panic::catch_unwind(AssertUnwindSafe(|| Pin::new(&mut run).poll(cx))) {
            Ok(poll) => poll,
            Err(payload) => Poll::Ready(Err(ModuleError::Panicked(panic_message(payload)))),
        }
    })
    .await
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "non-string panic payload".to_string())
}

/// Failures that are consequences of another stage ending
fn is_cascade(error: &ModuleError) -> bool {
    matches!(error, ModuleError::Cancelled) || error.is_broken_pipe() || error.is_upstream_abort()
}

fn failed_task(error: JoinError, elapsed: Duration) -> StageRun {
    let error = if error.is_panic() {
        ModuleError::Panicked(panic_message(error.into_panic()))
    } else {
        ModuleError::Cancelled
    };
    StageRun {
        elapsed,
        result: Err(error),
    }
}

fn log_outcome(outcome: &StageOutcome) {
    let elapsed_ms = outcome.elapsed.as_secs_f64() * 1000.0;
    match &outcome.status {
        StageStatus::Completed => {
            info!(
                stage = %outcome.stage,
                module = %outcome.name,
                elapsed_ms = elapsed_ms as u64,
                "Stage completed"
            );
            record_stage_outcome(
                outcome.stage,
                &outcome.name,
                StageStatusLabel::Completed,
                elapsed_ms,
            );
        }
        StageStatus::Failed {
            error,
            root_cause: true,
        } => {
            error!(
                stage = %outcome.stage,
                module = %outcome.name,
                error = %error,
                elapsed_ms = elapsed_ms as u64,
                "Stage failed"
            );
            record_stage_outcome(
                outcome.stage,
                &outcome.name,
                StageStatusLabel::Failed,
                elapsed_ms,
            );
        }
        StageStatus::Failed { error, .. } => {
            warn!(
                stage = %outcome.stage,
                module = %outcome.name,
                error = %error,
                cascade = true,
                elapsed_ms = elapsed_ms as u64,
                "Stage stopped after upstream/downstream failure"
            );
            record_stage_outcome(
                outcome.stage,
                &outcome.name,
                StageStatusLabel::Cascaded,
                elapsed_ms,
            );
        }
    }
}
