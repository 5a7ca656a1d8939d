//! Test: Process Execution - real child processes through the runner

#![cfg(unix)]

use deployer::core::{Pipeline, RunContext, Step, StepCommand, StepStatus};
use deployer::execution::{ProcessExecutor, Runner, EXIT_SPAWN_FAILED, EXIT_TIMED_OUT};
use std::time::Duration;

fn marker_step(name: &str, line: &str) -> Step {
    Step::new(name, StepCommand::shell(line))
}

#[tokio::test]
async fn test_halting_prevents_later_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new("deploy")
        .with_step(marker_step("first", "touch first.done"))
        .with_step(marker_step("broken", "echo boom >&2; exit 7"))
        .with_step(marker_step("last", "touch last.done"));

    let runner = Runner::new(
        ProcessExecutor::new(),
        RunContext::new().with_working_dir(dir.path()),
    );
    let result = runner.run(&pipeline).await;

    assert_eq!(result.failed_step.as_deref(), Some("broken"));
    assert_eq!(result.exit_code, 7);
    assert_eq!(result.completed_steps, vec!["first"]);
    assert!(dir.path().join("first.done").exists());
    assert!(!dir.path().join("last.done").exists());

    let broken = result.record("broken").unwrap();
    assert_eq!(broken.output_tail, vec!["boom"]);
}

#[tokio::test]
async fn test_context_env_reaches_commands() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new("env")
        .with_step(marker_step("write", "printf '%s' \"$STAGE\" > stage.txt"));

    let runner = Runner::new(
        ProcessExecutor::new(),
        RunContext::new()
            .with_working_dir(dir.path())
            .with_env("STAGE", "production"),
    );
    let result = runner.run(&pipeline).await;

    assert!(result.is_success());
    let written = std::fs::read_to_string(dir.path().join("stage.txt")).unwrap();
    assert_eq!(written, "production");
}

#[tokio::test]
async fn test_missing_program_and_timeout_codes() {
    let pipeline = Pipeline::new("odd")
        .with_step(
            Step::new("missing", StepCommand::exec("definitely-not-a-real-binary-xyz", Vec::<String>::new()))
                .continue_on_failure(true),
        )
        .with_step(
            Step::new("slow", StepCommand::exec("sleep", ["5"]))
                .with_timeout(Duration::from_millis(200)),
        );

    let result = Runner::new(ProcessExecutor::new(), RunContext::new())
        .run(&pipeline)
        .await;

    assert_eq!(
        result.record("missing").map(|r| r.status),
        Some(StepStatus::FailedContinued { exit_code: EXIT_SPAWN_FAILED })
    );
    assert_eq!(result.failed_step.as_deref(), Some("slow"));
    assert_eq!(result.exit_code, EXIT_TIMED_OUT);
}

#[tokio::test]
async fn test_step_leaving_background_process_completes_on_exit() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = Pipeline::new("restart")
        .with_step(marker_step("start app", "sleep 3 & exit 0").with_timeout(Duration::from_secs(1)))
        .with_step(marker_step("start worker", "sleep 3 &"))
        .with_step(marker_step("announce", "touch announced"));

    let runner = Runner::new(
        ProcessExecutor::new(),
        RunContext::new().with_working_dir(dir.path()),
    );
    let started = std::time::Instant::now();
    let result = runner.run(&pipeline).await;

    assert!(result.is_success(), "failed at {:?} with {}", result.failed_step, result.exit_code);
    assert_eq!(result.completed_steps, vec!["start app", "start worker", "announce"]);
    assert!(started.elapsed() < Duration::from_secs(2));
    assert!(dir.path().join("announced").exists());
}
