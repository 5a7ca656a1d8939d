//! Test: Config Pipelines - YAML pipelines, variables and per-run settings

use crate::helpers::*;
use deployer::core::config::DeployConfig;
use deployer::core::StepCommand;
use deployer::execution::Runner;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

const CONFIG: &str = r#"
project:
  dir: /srv/shop
  app_service: shop
  use_sudo: false

env:
  DJANGO_SETTINGS_MODULE: shop.settings.{{ stage }}

variables:
  stage: production

default_timeout_secs: 600

pipelines:
  - name: hotfix
    description: Ship a single branch without touching the database
    variables:
      branch: hotfix
    steps:
      - name: fetch
        command: [git, fetch, "{{ remote }}", "{{ branch }}"]
      - name: warm cache
        run: ./bin/warm-cache --stage {{ stage }}
        continue_on_failure: true
        timeout_secs: 30
        working_dir: tools
        env:
          CACHE_URL: redis://localhost/{{ stage }}
      - name: reload
        command: [systemctl, reload, "{{ app_service }}"]
"#;

#[tokio::test]
async fn test_user_pipeline_renders_and_runs() {
    let config = DeployConfig::from_yaml(CONFIG).unwrap();
    let pipeline = config.build_pipeline("hotfix", &BTreeMap::new()).unwrap();
    let context = config.run_context(&BTreeMap::new()).unwrap();

    let executor = ScriptedExecutor::new(&[("warm cache", 4)]);
    let runner = Runner::new(executor.clone(), context);
    let result = runner.run(&pipeline).await;

    assert_succeeded(&result, &["fetch", "warm cache", "reload"]);

    let invocations = executor.invocations();
    assert_eq!(
        invocations[0].command,
        StepCommand::exec("git", ["fetch", "origin", "hotfix"])
    );
    assert_eq!(invocations[0].working_dir, Some(PathBuf::from("/srv/shop")));
    assert_eq!(invocations[0].timeout, Some(Duration::from_secs(600)));
    assert_eq!(
        invocations[0].env.get("DJANGO_SETTINGS_MODULE").map(String::as_str),
        Some("shop.settings.production")
    );

    let warm = &invocations[1];
    assert_eq!(warm.command, StepCommand::shell("./bin/warm-cache --stage production"));
    assert_eq!(warm.working_dir, Some(PathBuf::from("/srv/shop/tools")));
    assert_eq!(warm.timeout, Some(Duration::from_secs(30)));
    assert_eq!(
        warm.env.get("CACHE_URL").map(String::as_str),
        Some("redis://localhost/production")
    );

    assert_eq!(
        invocations[2].command,
        StepCommand::exec("systemctl", ["reload", "shop"])
    );
}

#[tokio::test]
async fn test_overrides_win_over_config_variables() {
    let config = DeployConfig::from_yaml(CONFIG).unwrap();
    let overrides: BTreeMap<_, _> = [
        ("branch".to_string(), "hotfix-2".to_string()),
        ("stage".to_string(), "staging".to_string()),
    ]
    .into_iter()
    .collect();

    let pipeline = config.build_pipeline("hotfix", &overrides).unwrap();
    let context = config.run_context(&overrides).unwrap();

    let executor = ScriptedExecutor::default();
    Runner::new(executor.clone(), context).run(&pipeline).await;

    let invocations = executor.invocations();
    assert_eq!(
        invocations[0].command,
        StepCommand::exec("git", ["fetch", "origin", "hotfix-2"])
    );
    assert_eq!(
        invocations[0].env.get("DJANGO_SETTINGS_MODULE").map(String::as_str),
        Some("shop.settings.staging")
    );
}

#[tokio::test]
async fn test_builtins_stay_available_next_to_user_pipelines() {
    let pipeline = pipeline_from_yaml(CONFIG, "restart");
    let (result, executor) = run_with_codes(&pipeline, &[("restart app service", 1)]).await;

    assert_halted_at(&result, "restart app service", 1, &[]);
    assert_eq!(
        executor.invocations()[0].command,
        StepCommand::exec("systemctl", ["restart", "shop"])
    );
}

#[test]
fn test_unknown_pipeline_is_an_error() {
    let config = DeployConfig::from_yaml(CONFIG).unwrap();
    let err = config
        .build_pipeline("rollback", &BTreeMap::new())
        .unwrap_err()
        .to_string();

    assert!(err.contains("Unknown pipeline 'rollback'"));
    assert!(err.contains("hotfix"));
}
