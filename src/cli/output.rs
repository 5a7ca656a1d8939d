//! CLI output formatting

use crate::{
    core::{RunResult, RunStatus},
    execution::{OutputSink, OutputStream, RunEvent},
    persistence::RunSummary,
};
use chrono::Utc;
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::sync::Mutex;
use std::time::Duration;
use uuid::Uuid;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "! ");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a spinner for a running step
pub fn create_step_spinner(message: String) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    if let Ok(template) = ProgressStyle::default_spinner().template("{spinner:.green} [{elapsed}] {msg}") {
        spinner.set_style(template);
    }
    spinner.set_message(message);
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

/// Format a run status for display
pub fn format_status(status: RunStatus) -> String {
    match status {
        RunStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        RunStatus::Failed => style("FAILED").red().to_string(),
        RunStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

pub fn format_duration(duration: Duration) -> String {
    let secs = duration.as_secs();
    if secs == 0 {
        format!("{}ms", duration.as_millis())
    } else if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}

fn short_id(id: &Uuid) -> String {
    id.to_string()[..8].to_string()
}

/// Horizontal rule spanning the terminal width
pub fn separator() -> String {
    let width = term_size::dimensions_stdout()
        .map(|(w, _)| w)
        .unwrap_or(80);
    "─".repeat(width.min(120))
}

/// One-line summary of a stored run
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        RunStatus::Succeeded => CHECK,
        RunStatus::Failed => CROSS,
        RunStatus::Cancelled => WARN,
    };

    let mut line = format!(
        "{} {} - {} - {} - {} (exit {})",
        status_icon,
        style(short_id(&summary.run_id)).dim(),
        style(summary.started_at.format("%Y-%m-%d %H:%M:%S")).dim(),
        style(&summary.pipeline_name).bold(),
        format_status(summary.status),
        summary.exit_code
    );
    if let Some(step) = &summary.failed_step {
        line.push_str(&format!(" at {}", style(step).red()));
    }
    line
}

/// Final report printed after a run
pub fn format_run_result(result: &RunResult) -> String {
    let mut out = format!("{}\n", style(separator()).dim());

    for record in &result.steps {
        let icon = match record.status {
            crate::core::StepStatus::Succeeded => CHECK,
            crate::core::StepStatus::FailedContinued { .. } => WARN,
            crate::core::StepStatus::Failed { .. } => CROSS,
        };
        out.push_str(&format!(
            "{} {} {}\n",
            icon,
            record.name,
            style(format_duration(Duration::from_millis(record.duration_ms))).dim()
        ));
    }

    match &result.failed_step {
        None => out.push_str(&format!(
            "\n{} {} completed {} in {}",
            CHECK,
            style(&result.pipeline_name).bold(),
            style("successfully").green(),
            format_duration(Duration::from_millis(result.duration_ms()))
        )),
        Some(step) => out.push_str(&format!(
            "\n{} {} {} at step {} (exit code {})",
            CROSS,
            style(&result.pipeline_name).bold(),
            style("failed").red(),
            style(step).red().bold(),
            result.exit_code
        )),
    }

    let continued = result.continued_failures();
    if !continued.is_empty() {
        let names: Vec<_> = continued.iter().map(|r| r.name.as_str()).collect();
        out.push_str(&format!(
            "\n{} failed but continued: {}",
            WARN,
            style(names.join(", ")).yellow()
        ));
    }

    out
}

/// Format a run event for display
pub fn format_run_event(event: &RunEvent) -> Option<String> {
    match event {
        RunEvent::PipelineStarted {
            run_id,
            pipeline_name,
            total_steps,
        } => Some(format!(
            "{} Starting pipeline {} ({} steps, run {})",
            ROCKET,
            style(pipeline_name).bold(),
            total_steps,
            style(short_id(run_id)).dim()
        )),
        RunEvent::StepStarted {
            index,
            total,
            step_name,
            command,
        } => Some(format!(
            "{} [{}/{}] {} {}",
            SPINNER,
            style(index).cyan(),
            style(total).dim(),
            style(step_name).bold(),
            style(format!("$ {}", command)).dim()
        )),
        RunEvent::StepSucceeded { step_name, duration } => Some(format!(
            "{} {} {}",
            CHECK,
            style(step_name).green(),
            style(format_duration(*duration)).dim()
        )),
        RunEvent::StepFailed {
            step_name,
            exit_code,
            error,
            continued,
            ..
        } => {
            let detail = error
                .as_ref()
                .map(|e| format!(" ({})", e))
                .unwrap_or_default();
            Some(if *continued {
                format!(
                    "{} {} exited with {}{}, continuing",
                    WARN,
                    style(step_name).yellow(),
                    exit_code,
                    detail
                )
            } else {
                format!(
                    "{} {} exited with {}{}",
                    CROSS,
                    style(step_name).red(),
                    exit_code,
                    style(detail).dim()
                )
            })
        }
        RunEvent::PipelineFinished { .. } => None,
    }
}

#[derive(Default)]
struct Progress {
    run_id: Option<Uuid>,
    current_step: Option<String>,
    completed: Vec<String>,
    continued: Vec<String>,
    spinner: Option<ProgressBar>,
}

/// Prints run events and command output to the terminal
///
/// Also tracks progress so an interrupted run can still be summarised.
pub struct TerminalReporter {
    show_output: bool,
    started_at: chrono::DateTime<Utc>,
    progress: Mutex<Progress>,
}

impl TerminalReporter {
    pub fn new(show_output: bool) -> Self {
        Self {
            show_output,
            started_at: Utc::now(),
            progress: Mutex::new(Progress::default()),
        }
    }

    fn print(&self, progress: &Progress, line: &str) {
        match &progress.spinner {
            Some(spinner) if !spinner.is_hidden() => spinner.println(line),
            _ => println!("{}", line),
        }
    }

    /// Handle a run event
    pub fn handle(&self, event: &RunEvent) {
        let Ok(mut progress) = self.progress.lock() else {
            return;
        };

        if let Some(spinner) = progress.spinner.take() {
            spinner.finish_and_clear();
        }
        if let Some(line) = format_run_event(event) {
            self.print(&progress, &line);
        }

        match event {
            RunEvent::PipelineStarted { run_id, .. } => {
                progress.run_id = Some(*run_id);
            }
            RunEvent::StepStarted { step_name, .. } => {
                progress.current_step = Some(step_name.clone());
                progress.spinner = Some(create_step_spinner(step_name.clone()));
            }
            RunEvent::StepSucceeded { step_name, .. } => {
                progress.current_step = None;
                progress.completed.push(step_name.clone());
            }
            RunEvent::StepFailed {
                step_name,
                continued,
                ..
            } => {
                if *continued {
                    progress.current_step = None;
                    progress.completed.push(step_name.clone());
                    progress.continued.push(step_name.clone());
                }
            }
            RunEvent::PipelineFinished { .. } => {}
        }
    }

    /// Summary of a run interrupted before it finished
    pub fn cancelled_summary(&self, pipeline_name: &str) -> RunSummary {
        let progress = match self.progress.lock() {
            Ok(mut progress) => {
                if let Some(spinner) = progress.spinner.take() {
                    spinner.abandon();
                }
                std::mem::take(&mut *progress)
            }
            Err(_) => Progress::default(),
        };

        RunSummary {
            run_id: progress.run_id.unwrap_or_else(Uuid::new_v4),
            pipeline_name: pipeline_name.to_string(),
            status: RunStatus::Cancelled,
            started_at: self.started_at,
            finished_at: Some(Utc::now()),
            exit_code: 130,
            completed_steps: progress.completed,
            failed_step: progress.current_step,
            continued_failures: progress.continued,
        }
    }
}

impl OutputSink for TerminalReporter {
    fn on_line(&self, _step: &str, stream: OutputStream, line: &str) {
        if !self.show_output {
            return;
        }
        let line = match stream {
            OutputStream::Stdout => format!("    {}", line),
            OutputStream::Stderr => format!("    {}", style(line).yellow()),
        };
        if let Ok(progress) = self.progress.lock() {
            self.print(&progress, &line);
        }
    }
}
