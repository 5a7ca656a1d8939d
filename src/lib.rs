//! deployer - run deployment pipelines step by step, halting on the first failure

pub mod cli;
pub mod core;
pub mod execution;
pub mod persistence;

// Re-export commonly used types
pub use core::config::DeployConfig;
pub use core::{DeployError, Pipeline, RunContext, RunResult, RunStatus, Step, StepCommand, StepStatus};
pub use execution::{CommandExecutor, DryRunExecutor, ProcessExecutor, RunEvent, Runner};
pub use persistence::{HistoryBackend, RunSummary};
