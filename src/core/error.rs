//! Runner error taxonomy

use thiserror::Error;

/// The only way a pipeline run fails
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DeployError {
    #[error("step '{step}' failed with exit code {exit_code}")]
    StepFailed { step: String, exit_code: i32 },
}

impl DeployError {
    /// Process exit code to report for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            DeployError::StepFailed { exit_code, .. } => *exit_code,
        }
    }

    /// Name of the step that failed
    pub fn step(&self) -> &str {
        match self {
            DeployError::StepFailed { step, .. } => step,
        }
    }
}
