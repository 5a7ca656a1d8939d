//! Command-line interface

pub mod commands;
pub mod output;

use clap::{Parser, Subcommand};
use commands::{HistoryCommand, ListCommand, RunCommand, ValidateCommand};
use std::ffi::OsString;
use std::path::PathBuf;

/// Sequential deployment pipeline runner
#[derive(Debug, Parser, Clone)]
#[command(name = "deployer")]
#[command(author = "Deployer Contributors")]
#[command(version)]
#[command(about = "Run deployment pipelines step by step, halting on the first failure", long_about = None)]
pub struct Cli {
    /// Command to run; without one the default pipeline runs
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Path to deployment configuration file (default: ./deploy.yaml if present)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Hide command output, show only step progress
    #[arg(short, long, global = true)]
    pub quiet: bool,
}

/// Available commands
#[derive(Debug, Subcommand, Clone)]
pub enum Command {
    /// Run a pipeline
    Run(RunCommand),

    /// Validate the deployment configuration
    Validate(ValidateCommand),

    /// List available pipelines
    List(ListCommand),

    /// Show run history
    History(HistoryCommand),
}

impl Cli {
    /// Parse CLI arguments from environment
    pub fn from_args() -> Self {
        Self::parse()
    }

    /// Parse CLI arguments from a slice
    pub fn try_parse_from<I, T>(itr: I) -> Result<Self, clap::Error>
    where
        I: IntoIterator<Item = T>,
        T: Into<OsString> + Clone,
    {
        <Self as Parser>::try_parse_from(itr)
    }

    /// The command to execute; a bare invocation runs the default pipeline
    pub fn command_or_default(&self) -> Command {
        self.command
            .clone()
            .unwrap_or_else(|| Command::Run(RunCommand::default()))
    }
}
