//! Built-in pipelines for the usual Django-behind-a-proxy host
//!
//! - `deploy`: pull code, install dependencies, migrate, collect static
//!   assets, restart the app and proxy services
//! - `restart`: restart the app service, then the proxy
//! - `rebuild`: tear down, rebuild and start the compose stack

use crate::core::config::{PipelineConfig, ProjectSettings, StepConfig};
use std::collections::BTreeMap;

pub const DEPLOY: &str = "deploy";
pub const RESTART: &str = "restart";
pub const REBUILD: &str = "rebuild";

/// Built-in pipeline definitions, still templated with `{{ placeholders }}`
pub fn builtin_pipelines(settings: &ProjectSettings) -> Vec<PipelineConfig> {
    vec![deploy(settings), restart(settings), rebuild()]
}

fn deploy(settings: &ProjectSettings) -> PipelineConfig {
    let mut steps = vec![
        argv_step("pull code", &["git", "pull", "{{ remote }}", "{{ branch }}"]),
        argv_step(
            "install dependencies",
            &["{{ python }}", "-m", "pip", "install", "-r", "{{ requirements }}"],
        ),
        argv_step(
            "migrate database",
            &["{{ python }}", "manage.py", "migrate", "--noinput"],
        ),
        argv_step(
            "collect static assets",
            &["{{ python }}", "manage.py", "collectstatic", "--noinput"],
        ),
    ];
    steps.extend(service_restarts(settings));

    PipelineConfig {
        name: DEPLOY.to_string(),
        description: Some("Pull, install, migrate and restart services".to_string()),
        variables: BTreeMap::new(),
        steps,
    }
}

fn restart(settings: &ProjectSettings) -> PipelineConfig {
    PipelineConfig {
        name: RESTART.to_string(),
        description: Some("Restart the application and reverse proxy".to_string()),
        variables: BTreeMap::new(),
        steps: service_restarts(settings),
    }
}

fn rebuild() -> PipelineConfig {
    let compose = |name: &str, action: &[&str]| {
        let mut argv = vec!["docker", "compose", "-f", "{{ compose_file }}"];
        argv.extend_from_slice(action);
        argv_step(name, &argv)
    };

    PipelineConfig {
        name: REBUILD.to_string(),
        description: Some("Stop, rebuild and start the container stack".to_string()),
        variables: BTreeMap::new(),
        steps: vec![
            compose("stop containers", &["down"]),
            compose("build images", &["build"]),
            compose("start containers", &["up", "-d"]),
        ],
    }
}

fn service_restarts(settings: &ProjectSettings) -> Vec<StepConfig> {
    let restart = |name: &str, service: &str| {
        let mut argv = Vec::new();
        if settings.use_sudo {
            argv.push("sudo");
        }
        argv.extend_from_slice(&["systemctl", "restart", service]);
        argv_step(name, &argv)
    };

    vec![
        restart("restart app service", "{{ app_service }}"),
        restart("restart proxy", "{{ proxy_service }}"),
    ]
}

fn argv_step(name: &str, argv: &[&str]) -> StepConfig {
    StepConfig {
        name: name.to_string(),
        command: Some(argv.iter().map(|s| s.to_string()).collect()),
        ..StepConfig::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn names(pipeline: &PipelineConfig) -> Vec<&str> {
        pipeline.steps.iter().map(|s| s.name.as_str()).collect()
    }

    #[test]
    fn test_builtin_names() {
        let pipelines = builtin_pipelines(&ProjectSettings::default());
        let names: Vec<_> = pipelines.iter().map(|p| p.name.as_str()).collect();
        assert_eq!(names, vec![DEPLOY, RESTART, REBUILD]);
    }

    #[test]
    fn test_deploy_step_order() {
        let deploy = deploy(&ProjectSettings::default());
        assert_eq!(
            names(&deploy),
            vec![
                "pull code",
                "install dependencies",
                "migrate database",
                "collect static assets",
                "restart app service",
                "restart proxy",
            ]
        );
    }

    #[test]
    fn test_restarts_respect_sudo_setting() {
        let with_sudo = restart(&ProjectSettings::default());
        assert_eq!(
            with_sudo.steps[0].command.as_deref().map(|c| c[0].as_str()),
            Some("sudo")
        );

        let settings = ProjectSettings {
            use_sudo: false,
            ..ProjectSettings::default()
        };
        let without_sudo = restart(&settings);
        assert_eq!(
            without_sudo.steps[0].command.clone(),
            Some(vec![
                "systemctl".to_string(),
                "restart".to_string(),
                "{{ app_service }}".to_string()
            ])
        );
    }

    #[test]
    fn test_rebuild_uses_compose_file() {
        let rebuild = rebuild();
        assert_eq!(
            rebuild.steps[2].command.clone().unwrap().join(" "),
            "docker compose -f {{ compose_file }} up -d"
        );
    }
}
