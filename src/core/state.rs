//! Execution state models

use serde::{Deserialize, Serialize};

/// Overall outcome of a pipeline run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunStatus {
    /// Every step succeeded or was allowed to fail
    Succeeded,
    /// Halted at a failing step
    Failed,
    /// Interrupted by the operator
    Cancelled,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunStatus::Succeeded => "Succeeded",
            RunStatus::Failed => "Failed",
            RunStatus::Cancelled => "Cancelled",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "Succeeded" => Some(RunStatus::Succeeded),
            "Failed" => Some(RunStatus::Failed),
            "Cancelled" => Some(RunStatus::Cancelled),
            _ => None,
        }
    }
}

/// Outcome of a single executed step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum StepStatus {
    /// Command exited with 0
    Succeeded,
    /// Command failed but the step allows the pipeline to continue
    FailedContinued { exit_code: i32 },
    /// Command failed and halted the pipeline
    Failed { exit_code: i32 },
}

impl StepStatus {
    /// Exit code of the step's command
    pub fn exit_code(&self) -> i32 {
        match self {
            StepStatus::Succeeded => 0,
            StepStatus::FailedContinued { exit_code } | StepStatus::Failed { exit_code } => {
                *exit_code
            }
        }
    }

    /// Whether the pipeline moved past this step
    pub fn is_passed(&self) -> bool {
        !matches!(self, StepStatus::Failed { .. })
    }
}
