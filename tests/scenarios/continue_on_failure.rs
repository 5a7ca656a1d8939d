//! Test: Continue On Failure - tolerated failures are recorded but do not halt

use crate::helpers::*;
use deployer::core::{Pipeline, Step, StepCommand, StepStatus};

fn with_optional_cleanup() -> Pipeline {
    Pipeline::new("rebuild")
        .with_step(
            Step::new("stop containers", StepCommand::exec("docker", ["compose", "down"]))
                .continue_on_failure(true),
        )
        .with_step(Step::new("build images", StepCommand::exec("docker", ["compose", "build"])))
        .with_step(Step::new("start containers", StepCommand::exec("docker", ["compose", "up", "-d"])))
}

#[tokio::test]
async fn test_tolerated_failure_keeps_going() {
    let pipeline = with_optional_cleanup();
    let (result, executor) = run_with_codes(&pipeline, &[("stop containers", 1)]).await;

    assert_succeeded(&result, &["stop containers", "build images", "start containers"]);
    assert_eq!(executor.executed().len(), 3);
    assert_eq!(
        result.record("stop containers").map(|r| r.status),
        Some(StepStatus::FailedContinued { exit_code: 1 })
    );

    let continued: Vec<_> = result
        .continued_failures()
        .into_iter()
        .map(|r| r.name.as_str())
        .collect();
    assert_eq!(continued, vec!["stop containers"]);
}

#[tokio::test]
async fn test_later_failure_still_halts() {
    let pipeline = with_optional_cleanup();
    let (result, executor) =
        run_with_codes(&pipeline, &[("stop containers", 1), ("build images", 17)]).await;

    assert_halted_at(&result, "build images", 17, &["stop containers"]);
    assert_eq!(executor.executed(), vec!["stop containers", "build images"]);
}

#[tokio::test]
async fn test_tolerated_step_that_succeeds_is_plain_success() {
    let (result, _) = run_with_codes(&with_optional_cleanup(), &[]).await;

    assert_succeeded(&result, &["stop containers", "build images", "start containers"]);
    assert!(result.continued_failures().is_empty());
}
