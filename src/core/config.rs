//! Deployment configuration from YAML

use crate::core::{
    context::RunContext,
    presets,
    step::{Step, StepCommand},
    template, Pipeline,
};
use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Config file looked up in the current directory when none is given
pub const DEFAULT_CONFIG_FILE: &str = "deploy.yaml";

/// Top-level deployment configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Project settings exposed to pipelines as variables
    #[serde(default)]
    pub project: ProjectSettings,

    /// Environment added to every step
    #[serde(default)]
    pub env: BTreeMap<String, String>,

    /// Global variables available to all pipelines
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    /// Default timeout for steps (in seconds)
    #[serde(default)]
    pub default_timeout_secs: Option<u64>,

    /// Pipeline run when none is named
    #[serde(default = "default_pipeline_name")]
    pub default_pipeline: String,

    /// Whether the built-in pipelines are available
    #[serde(default = "default_true")]
    pub include_builtin: bool,

    /// User-defined pipelines; same-named built-ins are replaced
    #[serde(default)]
    pub pipelines: Vec<PipelineConfig>,
}

/// Where the project lives and which services it runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectSettings {
    /// Project directory; every step runs here unless it says otherwise
    #[serde(default)]
    pub dir: Option<PathBuf>,

    #[serde(default = "default_python")]
    pub python: String,

    #[serde(default = "default_app_service")]
    pub app_service: String,

    #[serde(default = "default_proxy_service")]
    pub proxy_service: String,

    #[serde(default = "default_compose_file")]
    pub compose_file: String,

    #[serde(default = "default_remote")]
    pub remote: String,

    #[serde(default = "default_branch")]
    pub branch: String,

    #[serde(default = "default_requirements")]
    pub requirements: String,

    /// Prefix service-manager commands with sudo
    #[serde(default = "default_true")]
    pub use_sudo: bool,
}

/// Pipeline definition as written in YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub name: String,

    #[serde(default)]
    pub description: Option<String>,

    /// Variables local to this pipeline
    #[serde(default)]
    pub variables: BTreeMap<String, String>,

    pub steps: Vec<StepConfig>,
}

/// Step definition as written in YAML
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct StepConfig {
    pub name: String,

    /// Shell command line, run with `sh -c`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub run: Option<String>,

    /// Program and arguments, run without a shell
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,

    #[serde(default)]
    pub continue_on_failure: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout_secs: Option<u64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub working_dir: Option<String>,

    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub env: BTreeMap<String, String>,
}

fn default_pipeline_name() -> String {
    presets::DEPLOY.to_string()
}

fn default_true() -> bool {
    true
}

fn default_python() -> String {
    "python3".to_string()
}

fn default_app_service() -> String {
    "gunicorn".to_string()
}

fn default_proxy_service() -> String {
    "nginx".to_string()
}

fn default_compose_file() -> String {
    "docker-compose.yml".to_string()
}

fn default_remote() -> String {
    "origin".to_string()
}

fn default_branch() -> String {
    "main".to_string()
}

fn default_requirements() -> String {
    "requirements.txt".to_string()
}

impl Default for ProjectSettings {
    fn default() -> Self {
        Self {
            dir: None,
            python: default_python(),
            app_service: default_app_service(),
            proxy_service: default_proxy_service(),
            compose_file: default_compose_file(),
            remote: default_remote(),
            branch: default_branch(),
            requirements: default_requirements(),
            use_sudo: true,
        }
    }
}

impl ProjectSettings {
    /// Settings exposed as template variables
    pub fn variables(&self) -> BTreeMap<String, String> {
        let mut vars = BTreeMap::new();
        if let Some(dir) = &self.dir {
            vars.insert("project_dir".to_string(), dir.display().to_string());
        }
        vars.insert("python".to_string(), self.python.clone());
        vars.insert("app_service".to_string(), self.app_service.clone());
        vars.insert("proxy_service".to_string(), self.proxy_service.clone());
        vars.insert("compose_file".to_string(), self.compose_file.clone());
        vars.insert("remote".to_string(), self.remote.clone());
        vars.insert("branch".to_string(), self.branch.clone());
        vars.insert("requirements".to_string(), self.requirements.clone());
        vars
    }
}

impl Default for DeployConfig {
    fn default() -> Self {
        Self {
            project: ProjectSettings::default(),
            env: BTreeMap::new(),
            variables: BTreeMap::new(),
            default_timeout_secs: None,
            default_pipeline: default_pipeline_name(),
            include_builtin: true,
            pipelines: Vec::new(),
        }
    }
}

impl StepConfig {
    /// Placeholder names used anywhere in this step
    pub fn placeholders(&self) -> Vec<String> {
        self.run
            .iter()
            .chain(self.command.iter().flatten())
            .chain(self.working_dir.iter())
            .chain(self.env.values())
            .flat_map(|text| template::placeholders(text))
            .collect()
    }

    /// Build the domain step, rendering placeholders with `variables`
    pub fn to_step(&self, variables: &BTreeMap<String, String>) -> Result<Step> {
        let command = match (&self.run, &self.command) {
            (Some(line), None) => StepCommand::shell(line.clone()),
            (None, Some(argv)) => match argv.split_first() {
                Some((program, args)) => StepCommand::exec(program.clone(), args.iter().cloned()),
                None => bail!("Step '{}' has an empty command", self.name),
            },
            (Some(_), Some(_)) => bail!("Step '{}' sets both 'run' and 'command'", self.name),
            (None, None) => bail!("Step '{}' needs either 'run' or 'command'", self.name),
        };

        let mut step = Step::new(self.name.clone(), command.render(variables)?)
            .continue_on_failure(self.continue_on_failure);

        if let Some(secs) = self.timeout_secs {
            step = step.with_timeout(Duration::from_secs(secs));
        }
        if let Some(dir) = &self.working_dir {
            step = step.in_dir(template::render(dir, variables)?);
        }
        for (key, value) in &self.env {
            step = step.with_env(key.clone(), template::render(value, variables)?);
        }

        Ok(step)
    }
}

impl DeployConfig {
    /// Load deployment configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        Self::from_yaml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    /// Parse deployment configuration from YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: DeployConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Load `path` if given, else `./deploy.yaml` if present, else the defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::from_file(path),
            None if Path::new(DEFAULT_CONFIG_FILE).exists() => Self::from_file(DEFAULT_CONFIG_FILE),
            None => Ok(Self::default()),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let mut seen_pipelines = HashSet::new();
        for pipeline in &self.pipelines {
            if !seen_pipelines.insert(&pipeline.name) {
                bail!("Duplicate pipeline name: {}", pipeline.name);
            }
        }

        for pipeline in self.pipelines() {
            if pipeline.steps.is_empty() {
                bail!("Pipeline '{}' has no steps", pipeline.name);
            }

            let mut seen_steps = HashSet::new();
            for step in &pipeline.steps {
                if !seen_steps.insert(&step.name) {
                    bail!(
                        "Pipeline '{}' has duplicate step name '{}'",
                        pipeline.name,
                        step.name
                    );
                }
            }

            // Placeholders left for `--var` get stand-ins; the rest must resolve
            let stand_ins: BTreeMap<_, _> = self
                .required_variables(&pipeline)
                .into_iter()
                .map(|name| (name, String::new()))
                .collect();
            self.build(&pipeline, &stand_ins)?;
            self.run_context(&stand_ins)?;
        }

        if self.pipeline_config(&self.default_pipeline).is_none() {
            bail!(
                "Default pipeline '{}' is not defined",
                self.default_pipeline
            );
        }

        Ok(())
    }

    /// Effective pipeline list: built-ins first, user pipelines replace or extend them
    pub fn pipelines(&self) -> Vec<PipelineConfig> {
        let mut pipelines = if self.include_builtin {
            presets::builtin_pipelines(&self.project)
        } else {
            Vec::new()
        };

        for user in &self.pipelines {
            match pipelines.iter_mut().find(|p| p.name == user.name) {
                Some(existing) => *existing = user.clone(),
                None => pipelines.push(user.clone()),
            }
        }

        pipelines
    }

    /// Look up a pipeline definition by name
    pub fn pipeline_config(&self, name: &str) -> Option<PipelineConfig> {
        self.pipelines().into_iter().find(|p| p.name == name)
    }

    /// Variables for a pipeline: project < global < pipeline < overrides
    pub fn variables_for(
        &self,
        pipeline: &PipelineConfig,
        overrides: &BTreeMap<String, String>,
    ) -> BTreeMap<String, String> {
        let mut vars = self.project.variables();
        vars.extend(self.variables.clone());
        vars.extend(pipeline.variables.clone());
        vars.extend(overrides.clone());
        vars
    }

    /// Placeholders a pipeline uses that no config layer defines
    ///
    /// These have to be supplied as overrides when the pipeline is built.
    pub fn required_variables(&self, pipeline: &PipelineConfig) -> Vec<String> {
        let step_vars = self.variables_for(pipeline, &BTreeMap::new());
        let context_vars = self.context_variables(&BTreeMap::new());

        let from_steps = pipeline
            .steps
            .iter()
            .flat_map(StepConfig::placeholders)
            .filter(|name| !step_vars.contains_key(name));
        let from_env = self
            .env
            .values()
            .flat_map(|value| template::placeholders(value))
            .filter(|name| !context_vars.contains_key(name));

        let mut names = Vec::new();
        for name in from_steps.chain(from_env) {
            if !names.contains(&name) {
                names.push(name);
            }
        }
        names
    }

    /// Build a runnable pipeline by name
    pub fn build_pipeline(
        &self,
        name: &str,
        overrides: &BTreeMap<String, String>,
    ) -> Result<Pipeline> {
        let config = self.pipeline_config(name).with_context(|| {
            let known: Vec<_> = self.pipelines().into_iter().map(|p| p.name).collect();
            format!("Unknown pipeline '{}' (available: {})", name, known.join(", "))
        })?;

        let missing: Vec<_> = self
            .required_variables(&config)
            .into_iter()
            .filter(|name| !overrides.contains_key(name))
            .collect();
        if !missing.is_empty() {
            bail!(
                "Pipeline '{}' needs values for: {} (set them with --var name=value)",
                config.name,
                missing.join(", ")
            );
        }

        self.build(&config, overrides)
    }

    fn build(
        &self,
        config: &PipelineConfig,
        overrides: &BTreeMap<String, String>,
    ) -> Result<Pipeline> {
        let vars = self.variables_for(config, overrides);

        let mut pipeline = Pipeline::new(config.name.clone());
        if let Some(description) = &config.description {
            pipeline = pipeline.with_description(description.clone());
        }
        for step in &config.steps {
            let step = step
                .to_step(&vars)
                .with_context(|| format!("In pipeline '{}'", config.name))?;
            pipeline = pipeline.with_step(step);
        }

        Ok(pipeline)
    }

    /// Settings applied to every step of a run
    pub fn run_context(&self, overrides: &BTreeMap<String, String>) -> Result<RunContext> {
        let vars = self.context_variables(overrides);

        let mut context = RunContext::new();
        if let Some(dir) = &self.project.dir {
            context = context.with_working_dir(dir.clone());
        }
        for (key, value) in &self.env {
            let value = template::render(value, &vars)
                .with_context(|| format!("In env variable '{}'", key))?;
            context = context.with_env(key.clone(), value);
        }
        if let Some(secs) = self.default_timeout_secs {
            context = context.with_default_timeout(Duration::from_secs(secs));
        }

        Ok(context)
    }

    /// Variables for run-wide settings: project < global < overrides
    fn context_variables(&self, overrides: &BTreeMap<String, String>) -> BTreeMap<String, String> {
        let mut vars = self.project.variables();
        vars.extend(self.variables.clone());
        vars.extend(overrides.clone());
        vars
    }
}
