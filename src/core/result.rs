//! Run result models

use crate::core::{
    error::DeployError,
    state::{RunStatus, StepStatus},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Record of one executed step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// Step name
    pub name: String,

    /// How the step ended
    pub status: StepStatus,

    /// When the command was started
    pub started_at: DateTime<Utc>,

    /// Wall-clock duration in milliseconds
    pub duration_ms: u64,

    /// Last lines the command printed
    pub output_tail: Vec<String>,
}

/// Outcome of running a pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunResult {
    /// Unique run identifier
    pub run_id: Uuid,

    /// Name of the pipeline that ran
    pub pipeline_name: String,

    /// Steps the pipeline moved past, in order
    ///
    /// Includes steps that failed with `continue_on_failure` set.
    pub completed_steps: Vec<String>,

    /// The step that halted the run
    pub failed_step: Option<String>,

    /// 0 on success, otherwise the failing command's exit code
    pub exit_code: i32,

    /// One record per executed step
    pub steps: Vec<StepRecord>,

    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    pub fn is_success(&self) -> bool {
        self.failed_step.is_none()
    }

    pub fn status(&self) -> RunStatus {
        if self.is_success() {
            RunStatus::Succeeded
        } else {
            RunStatus::Failed
        }
    }

    /// Steps that failed but let the pipeline continue
    pub fn continued_failures(&self) -> Vec<&StepRecord> {
        self.steps
            .iter()
            .filter(|r| matches!(r.status, StepStatus::FailedContinued { .. }))
            .collect()
    }

    /// Record for a step, if it ran
    pub fn record(&self, name: &str) -> Option<&StepRecord> {
        self.steps.iter().find(|r| r.name == name)
    }

    pub fn duration_ms(&self) -> u64 {
        self.finished_at
            .signed_duration_since(self.started_at)
            .num_milliseconds()
            .max(0) as u64
    }

    /// Convert a failed run into its error
    pub fn into_result(self) -> Result<RunResult, DeployError> {
        match &self.failed_step {
            Some(step) => Err(DeployError::StepFailed {
                step: step.clone(),
                exit_code: self.exit_code,
            }),
            None => Ok(self),
        }
    }
}
