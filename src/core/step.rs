//! Step domain model

use crate::core::template::{self, TemplateError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

/// How a step's command is invoked
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepCommand {
    /// Program and arguments, spawned directly without a shell
    Exec { program: String, args: Vec<String> },
    /// Command line handed to `sh -c`
    Shell(String),
}

impl StepCommand {
    pub fn exec<I, S>(program: impl Into<String>, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        StepCommand::Exec {
            program: program.into(),
            args: args.into_iter().map(Into::into).collect(),
        }
    }

    pub fn shell(line: impl Into<String>) -> Self {
        StepCommand::Shell(line.into())
    }

    /// The program and argument vector that is actually spawned
    pub fn argv(&self) -> (&str, Vec<&str>) {
        match self {
            StepCommand::Exec { program, args } => {
                (program.as_str(), args.iter().map(String::as_str).collect())
            }
            StepCommand::Shell(line) => ("sh", vec!["-c", line.as_str()]),
        }
    }

    /// Render `{{ name }}` placeholders in the program and every argument
    pub fn render(&self, variables: &BTreeMap<String, String>) -> Result<Self, TemplateError> {
        Ok(match self {
            StepCommand::Exec { program, args } => StepCommand::Exec {
                program: template::render(program, variables)?,
                args: args
                    .iter()
                    .map(|arg| template::render(arg, variables))
                    .collect::<Result<_, _>>()?,
            },
            StepCommand::Shell(line) => StepCommand::Shell(template::render(line, variables)?),
        })
    }
}

impl fmt::Display for StepCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepCommand::Exec { program, args } => {
                write!(f, "{}", program)?;
                for arg in args {
                    if arg.is_empty() || arg.contains(char::is_whitespace) {
                        write!(f, " {:?}", arg)?;
                    } else {
                        write!(f, " {}", arg)?;
                    }
                }
                Ok(())
            }
            StepCommand::Shell(line) => write!(f, "{}", line),
        }
    }
}

/// A single step in a pipeline
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Step {
    /// Step name, unique within its pipeline
    pub name: String,

    /// The external command this step runs
    pub command: StepCommand,

    /// Keep going when this step exits non-zero
    pub continue_on_failure: bool,

    /// Kill the command after this long (None = wait indefinitely)
    pub timeout: Option<Duration>,

    /// Working directory, relative paths resolve against the project directory
    pub working_dir: Option<PathBuf>,

    /// Extra environment for this step only
    pub env: BTreeMap<String, String>,
}

impl Step {
    pub fn new(name: impl Into<String>, command: StepCommand) -> Self {
        Self {
            name: name.into(),
            command,
            continue_on_failure: false,
            timeout: None,
            working_dir: None,
            env: BTreeMap::new(),
        }
    }

    pub fn continue_on_failure(mut self, continue_on_failure: bool) -> Self {
        self.continue_on_failure = continue_on_failure;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn in_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.working_dir = Some(dir.into());
        self
    }

    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }
}
