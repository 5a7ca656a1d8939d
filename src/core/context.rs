//! Run context - settings shared by every step of a run

use crate::core::step::{Step, StepCommand};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Explicit settings applied to every step, in place of ambient shell state
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunContext {
    /// Project directory; None means the runner's current directory
    pub working_dir: Option<PathBuf>,

    /// Environment added on top of the inherited one
    pub env: BTreeMap<String, String>,

    /// Timeout for steps that don't set their own
    pub default_timeout: Option<Duration>,
}

/// A fully resolved command, ready to spawn
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invocation {
    pub step_name: String,
    pub command: StepCommand,
    pub working_dir: Option<PathBuf>,
    pub env: BTreeMap<String, String>,
    pub timeout: Option<Duration>,
}

impl RunContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_working_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = Some(timeout);
        self
    }

    /// Combine a step with this context
    ///
    /// Step env wins over context env; a relative step directory is joined
    /// onto the project directory.
    pub fn invocation_for(&self, step: &Step) -> Invocation {
        let mut env = self.env.clone();
        env.extend(step.env.iter().map(|(k, v)| (k.clone(), v.clone())));

        Invocation {
            step_name: step.name.clone(),
            command: step.command.clone(),
            working_dir: self.resolve_dir(step.working_dir.as_deref()),
            env,
            timeout: step.timeout.or(self.default_timeout),
        }
    }

    fn resolve_dir(&self, step_dir: Option<&Path>) -> Option<PathBuf> {
        match (step_dir, &self.working_dir) {
            (Some(dir), _) if dir.is_absolute() => Some(dir.to_path_buf()),
            (Some(dir), Some(base)) => Some(base.join(dir)),
            (Some(dir), None) => Some(dir.to_path_buf()),
            (None, base) => base.clone(),
        }
    }
}
