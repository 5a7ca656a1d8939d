//! Pipeline execution

pub mod executor;
pub mod runner;

pub use executor::{
    CommandExecutor, CommandOutcome, DryRunExecutor, ExecutorError, OutputSink, OutputStream,
    ProcessExecutor, DEFAULT_TAIL_LINES, EXIT_SPAWN_FAILED, EXIT_TIMED_OUT,
};
pub use runner::{EventHandler, RunEvent, Runner};
