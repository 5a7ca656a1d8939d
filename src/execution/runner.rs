//! Deployment runner - executes a pipeline's steps in order

use crate::{
    core::{Pipeline, RunContext, RunResult, StepRecord, StepStatus},
    execution::{CommandExecutor, OutputSink},
};
use chrono::Utc;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info, warn};
use uuid::Uuid;

/// Events that can occur during a run
#[derive(Debug, Clone, PartialEq)]
pub enum RunEvent {
    PipelineStarted {
        run_id: Uuid,
        pipeline_name: String,
        total_steps: usize,
    },
    StepStarted {
        /// 1-based position in the pipeline
        index: usize,
        total: usize,
        step_name: String,
        command: String,
    },
    StepSucceeded {
        step_name: String,
        duration: Duration,
    },
    StepFailed {
        step_name: String,
        exit_code: i32,
        error: Option<String>,
        /// The pipeline keeps going because the step allows failure
        continued: bool,
        duration: Duration,
    },
    PipelineFinished {
        run_id: Uuid,
        pipeline_name: String,
        exit_code: i32,
        failed_step: Option<String>,
    },
}

/// Type for event handlers
pub type EventHandler = Box<dyn Fn(&RunEvent) + Send + Sync>;

/// Runs pipelines one step at a time, halting on the first failure
pub struct Runner<E> {
    executor: E,
    context: RunContext,
    event_handlers: Vec<EventHandler>,
    sink: Option<Arc<dyn OutputSink>>,
}

impl<E: CommandExecutor> Runner<E> {
    pub fn new(executor: E, context: RunContext) -> Self {
        Self {
            executor,
            context,
            event_handlers: Vec::new(),
            sink: None,
        }
    }

    /// Forward command output to `sink`
    pub fn with_output_sink(mut self, sink: Arc<dyn OutputSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Add an event handler
    pub fn add_event_handler<F>(&mut self, handler: F)
    where
        F: Fn(&RunEvent) + Send + Sync + 'static,
    {
        self.event_handlers.push(Box::new(handler));
    }

    pub fn context(&self) -> &RunContext {
        &self.context
    }

    fn emit(&self, event: RunEvent) {
        for handler in &self.event_handlers {
            handler(&event);
        }
    }

    /// Execute the pipeline
    pub async fn run(&self, pipeline: &Pipeline) -> RunResult {
        let run_id = Uuid::new_v4();
        let started_at = Utc::now();
        let total = pipeline.len();

        info!(pipeline = %pipeline.name, %run_id, steps = total, "Starting pipeline");
        self.emit(RunEvent::PipelineStarted {
            run_id,
            pipeline_name: pipeline.name.clone(),
            total_steps: total,
        });

        let mut completed_steps = Vec::new();
        let mut records = Vec::new();
        let mut failure: Option<(String, i32)> = None;

        for (position, step) in pipeline.steps.iter().enumerate() {
            let invocation = self.context.invocation_for(step);

            info!(step = %step.name, command = %step.command, "Running step");
            self.emit(RunEvent::StepStarted {
                index: position + 1,
                total,
                step_name: step.name.clone(),
                command: step.command.to_string(),
            });

            let step_started_at = Utc::now();
            let clock = Instant::now();
            let (exit_code, output_tail, error) =
                match self.executor.execute(&invocation, self.sink.as_deref()).await {
                    Ok(outcome) => (outcome.exit_code, outcome.output_tail, None),
                    Err(e) => {
                        error!(step = %step.name, "Step could not run: {}", e);
                        (e.exit_code(), vec![e.to_string()], Some(e.to_string()))
                    }
                };
            let duration = clock.elapsed();

            let status = if exit_code == 0 {
                info!(step = %step.name, elapsed_ms = duration.as_millis() as u64, "Step succeeded");
                self.emit(RunEvent::StepSucceeded {
                    step_name: step.name.clone(),
                    duration,
                });
                StepStatus::Succeeded
            } else if step.continue_on_failure {
                warn!(step = %step.name, exit_code, "Step failed, continuing");
                self.emit(RunEvent::StepFailed {
                    step_name: step.name.clone(),
                    exit_code,
                    error,
                    continued: true,
                    duration,
                });
                StepStatus::FailedContinued { exit_code }
            } else {
                error!(step = %step.name, exit_code, "Step failed, halting pipeline");
                self.emit(RunEvent::StepFailed {
                    step_name: step.name.clone(),
                    exit_code,
                    error,
                    continued: false,
                    duration,
                });
                StepStatus::Failed { exit_code }
            };

            records.push(StepRecord {
                name: step.name.clone(),
                status,
                started_at: step_started_at,
                duration_ms: duration.as_millis() as u64,
                output_tail,
            });

            if status.is_passed() {
                completed_steps.push(step.name.clone());
            } else {
                failure = Some((step.name.clone(), exit_code));
                break;
            }
        }

        let (failed_step, exit_code) = match failure {
            Some((name, code)) => (Some(name), code),
            None => (None, 0),
        };

        info!(
            pipeline = %pipeline.name,
            %run_id,
            exit_code,
            completed = completed_steps.len(),
            "Pipeline finished"
        );
        self.emit(RunEvent::PipelineFinished {
            run_id,
            pipeline_name: pipeline.name.clone(),
            exit_code,
            failed_step: failed_step.clone(),
        });

        RunResult {
            run_id,
            pipeline_name: pipeline.name.clone(),
            completed_steps,
            failed_step,
            exit_code,
            steps: records,
            started_at,
            finished_at: Utc::now(),
        }
    }
}
