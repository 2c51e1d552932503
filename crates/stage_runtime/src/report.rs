//! RunReport - outcome of one coordinated pipeline run

use std::time::Duration;

use contracts::{ModuleError, PipelineError, StageType};

/// Terminal state of one stage
#[derive(Debug)]
pub enum StageStatus {
    Completed,
    Failed {
        error: ModuleError,
        /// `false` for failures caused by another stage's failure
        root_cause: bool,
    },
}

#[derive(Debug)]
pub struct StageOutcome {
    pub stage: StageType,
    pub name: String,
    pub elapsed: Duration,
    pub status: StageStatus,
}

impl StageOutcome {
    pub fn label(&self) -> String {
        format!("{}/{}", self.stage, self.name)
    }

    pub fn is_completed(&self) -> bool {
        matches!(self.status, StageStatus::Completed)
    }

    pub fn is_root_cause(&self) -> bool {
        matches!(
            self.status,
            StageStatus::Failed {
                root_cause: true,
                ..
            }
        )
    }

    pub fn error(&self) -> Option<&ModuleError> {
        match &self.status {
            StageStatus::Completed => None,
            StageStatus::Failed { error, .. } => Some(error),
        }
    }
}

/// Bytes that crossed one pipe
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamReport {
    pub label: String,
    pub bytes_written: u64,
    pub bytes_read: u64,
}

/// Outcome of every stage, in pipeline order
#[derive(Debug)]
pub struct RunReport {
    pub outcomes: Vec<StageOutcome>,
    pub streams: Vec<StreamReport>,
    pub duration: Duration,
}

impl RunReport {
    /// Success only when every stage completed
    pub fn is_success(&self) -> bool {
        self.outcomes.iter().all(StageOutcome::is_completed)
    }

    /// The authoritative failure, if any
    pub fn root_cause(&self) -> Option<&StageOutcome> {
        self.outcomes.iter().find(|o| o.is_root_cause())
    }

    pub fn failures(&self) -> impl Iterator<Item = &StageOutcome> {
        self.outcomes.iter().filter(|o| !o.is_completed())
    }

    /// Convert into `Err(RunError)` naming the root-cause stage on failure
    pub fn into_result(mut self) -> Result<Self, PipelineError> {
        let Some(idx) = self.outcomes.iter().position(StageOutcome::is_root_cause) else {
            return Ok(self);
        };

        let outcome = self.outcomes.swap_remove(idx);
        match outcome.status {
            StageStatus::Failed { error, .. } => Err(PipelineError::RunError {
                stage: outcome.stage,
                name: outcome.name,
                source: error,
            }),
            StageStatus::Completed => Ok(self),
        }
    }
}
