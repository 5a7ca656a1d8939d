//! Test: Success Chain - every step runs once, in order

use crate::helpers::*;
use deployer::core::{Pipeline, Step, StepCommand, StepStatus};
use deployer::core::config::DeployConfig;
use std::collections::BTreeMap;

fn three_steps() -> Pipeline {
    Pipeline::new("release")
        .with_step(Step::new("build", StepCommand::exec("make", ["build"])))
        .with_step(Step::new("test", StepCommand::exec("make", ["test"])))
        .with_step(Step::new("ship", StepCommand::shell("./ship.sh")))
}

#[tokio::test]
async fn test_all_steps_run_in_order() {
    let pipeline = three_steps();
    let (result, executor) = run_with_codes(&pipeline, &[]).await;

    assert_succeeded(&result, &["build", "test", "ship"]);
    assert_eq!(executor.executed(), vec!["build", "test", "ship"]);
    assert!(result.failed_step.is_none());
    assert!(result
        .steps
        .iter()
        .all(|record| record.status == StepStatus::Succeeded));
    assert!(result.into_result().is_ok());
}

#[tokio::test]
async fn test_empty_pipeline_is_a_success() {
    let (result, executor) = run_with_codes(&Pipeline::new("nothing"), &[]).await;

    assert_succeeded(&result, &[]);
    assert!(executor.executed().is_empty());
}

#[tokio::test]
async fn test_builtin_deploy_runs_every_stage() {
    let pipeline = DeployConfig::default()
        .build_pipeline("deploy", &BTreeMap::new())
        .unwrap();
    let (result, executor) = run_with_codes(&pipeline, &[]).await;

    let expected = [
        "pull code",
        "install dependencies",
        "migrate database",
        "collect static assets",
        "restart app service",
        "restart proxy",
    ];
    assert_succeeded(&result, &expected);

    let invocations = executor.invocations();
    assert_eq!(
        invocations[0].command,
        StepCommand::exec("git", ["pull", "origin", "main"])
    );
    assert_eq!(
        invocations[5].command,
        StepCommand::exec("sudo", ["systemctl", "restart", "nginx"])
    );
}

#[tokio::test]
async fn test_each_run_gets_its_own_id() {
    let pipeline = three_steps();
    let (first, _) = run_with_codes(&pipeline, &[]).await;
    let (second, _) = run_with_codes(&pipeline, &[]).await;

    assert_ne!(first.run_id, second.run_id);
    assert!(first.finished_at >= first.started_at);
}
