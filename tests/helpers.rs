//! Test utilities for deployer scenarios
#![allow(dead_code)]

use async_trait::async_trait;
use deployer::core::config::DeployConfig;
use deployer::core::{Invocation, Pipeline, RunContext, RunResult, StepStatus};
use deployer::execution::{CommandExecutor, CommandOutcome, ExecutorError, OutputSink, Runner};
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};

/// Executor that returns scripted exit codes by step name and records what it was asked to run
#[derive(Clone, Default)]
pub struct ScriptedExecutor {
    codes: HashMap<String, i32>,
    invocations: Arc<Mutex<Vec<Invocation>>>,
}

impl ScriptedExecutor {
    /// Steps not listed exit with 0
    pub fn new(codes: &[(&str, i32)]) -> Self {
        Self {
            codes: codes.iter().map(|(name, code)| (name.to_string(), *code)).collect(),
            invocations: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn invocations(&self) -> Vec<Invocation> {
        self.invocations.lock().unwrap().clone()
    }

    pub fn executed(&self) -> Vec<String> {
        self.invocations().into_iter().map(|i| i.step_name).collect()
    }
}

#[async_trait]
impl CommandExecutor for ScriptedExecutor {
    async fn execute(
        &self,
        invocation: &Invocation,
        _sink: Option<&dyn OutputSink>,
    ) -> Result<CommandOutcome, ExecutorError> {
        self.invocations.lock().unwrap().push(invocation.clone());
        let code = self.codes.get(&invocation.step_name).copied().unwrap_or(0);
        Ok(CommandOutcome::with_code(code))
    }
}

/// Run `pipeline` with scripted exit codes
pub async fn run_with_codes(pipeline: &Pipeline, codes: &[(&str, i32)]) -> (RunResult, ScriptedExecutor) {
    let executor = ScriptedExecutor::new(codes);
    let runner = Runner::new(executor.clone(), RunContext::new());
    (runner.run(pipeline).await, executor)
}

/// Parse a config and build one of its pipelines without overrides
pub fn pipeline_from_yaml(yaml: &str, name: &str) -> Pipeline {
    DeployConfig::from_yaml(yaml)
        .unwrap()
        .build_pipeline(name, &BTreeMap::new())
        .unwrap()
}

pub fn assert_succeeded(result: &RunResult, completed: &[&str]) {
    assert!(
        result.is_success(),
        "Expected success, pipeline failed at {:?} with {}",
        result.failed_step,
        result.exit_code
    );
    assert_eq!(result.exit_code, 0);
    assert_eq!(result.completed_steps, completed);
}

pub fn assert_halted_at(result: &RunResult, step: &str, exit_code: i32, completed: &[&str]) {
    assert_eq!(result.failed_step.as_deref(), Some(step), "Wrong failed step");
    assert_eq!(result.exit_code, exit_code, "Wrong exit code");
    assert_eq!(result.completed_steps, completed, "Wrong completed steps");
    assert_eq!(
        result.record(step).map(|r| r.status),
        Some(StepStatus::Failed { exit_code })
    );
}
