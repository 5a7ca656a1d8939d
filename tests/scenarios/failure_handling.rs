//! Test: Failure Handling - the first failing step halts the pipeline

use crate::helpers::*;
use deployer::core::{DeployError, Pipeline, Step, StepCommand};

fn deploy_like() -> Pipeline {
    Pipeline::new("deploy")
        .with_step(Step::new("pull code", StepCommand::exec("git", ["pull"])))
        .with_step(Step::new("migrate database", StepCommand::shell("python3 manage.py migrate")))
        .with_step(Step::new("restart app service", StepCommand::exec("systemctl", ["restart", "app"])))
}

#[tokio::test]
async fn test_failure_halts_remaining_steps() {
    let pipeline = deploy_like();
    let (result, executor) = run_with_codes(&pipeline, &[("migrate database", 3)]).await;

    assert_halted_at(&result, "migrate database", 3, &["pull code"]);
    assert_eq!(executor.executed(), vec!["pull code", "migrate database"]);
    assert!(result.record("restart app service").is_none());
}

#[tokio::test]
async fn test_first_step_failure() {
    let pipeline = deploy_like();
    let (result, executor) = run_with_codes(&pipeline, &[("pull code", 128)]).await;

    assert_halted_at(&result, "pull code", 128, &[]);
    assert_eq!(executor.executed(), vec!["pull code"]);
}

#[tokio::test]
async fn test_failure_converts_to_step_failed_error() {
    let pipeline = deploy_like();
    let (result, _) = run_with_codes(&pipeline, &[("restart app service", 5)]).await;

    match result.into_result() {
        Err(DeployError::StepFailed { step, exit_code }) => {
            assert_eq!(step, "restart app service");
            assert_eq!(exit_code, 5);
        }
        other => panic!("Expected StepFailed, got {:?}", other),
    }
}

#[tokio::test]
async fn test_exit_code_is_propagated_unchanged() {
    for code in [1, 2, 42, 255] {
        let (result, _) = run_with_codes(&deploy_like(), &[("pull code", code)]).await;
        assert_eq!(result.exit_code, code);
    }
}
