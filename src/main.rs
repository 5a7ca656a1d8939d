use anyhow::{Context, Result};
use deployer::cli::commands::{HistoryCommand, ListCommand, RunCommand, ValidateCommand};
use deployer::cli::output::*;
use deployer::cli::{Cli, Command};
use deployer::core::config::DeployConfig;
use deployer::core::{Pipeline, RunContext};
use deployer::execution::{CommandExecutor, DryRunExecutor, OutputSink, ProcessExecutor, Runner};
use deployer::persistence::{create_summary, open_default_history, RunSummary};
use std::sync::Arc;
use tracing::{debug, error};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging; RUST_LOG wins over -v
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(if cli.verbose { "debug" } else { "warn" }));
    let subscriber = FmtSubscriber::builder()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    match cli.command_or_default() {
        Command::Run(cmd) => run_pipeline(&cmd, &cli).await?,
        Command::Validate(cmd) => validate_config(&cmd, &cli)?,
        Command::List(cmd) => list_pipelines(&cmd, &cli)?,
        Command::History(cmd) => show_history(&cmd).await?,
    }

    Ok(())
}

async fn run_pipeline(cmd: &RunCommand, cli: &Cli) -> Result<()> {
    let config = DeployConfig::load(cli.config.as_deref())
        .context("Failed to load deployment config")?;

    let overrides = cmd.overrides();
    for (key, value) in &overrides {
        debug!(%key, %value, "Variable override");
    }

    let name = cmd.pipeline.as_deref().unwrap_or(&config.default_pipeline);
    let pipeline = config.build_pipeline(name, &overrides)?;
    let context = config.run_context(&overrides)?;

    let reporter = Arc::new(TerminalReporter::new(!cli.quiet));
    let outcome = if cmd.dry_run {
        println!("{} Dry run, nothing will be executed", INFO);
        execute(DryRunExecutor, context, &pipeline, reporter.clone()).await
    } else {
        execute(ProcessExecutor::new(), context, &pipeline, reporter.clone()).await
    };

    let summary = match outcome {
        Some(result) => {
            println!("\n{}", format_run_result(&result));
            create_summary(&result)
        }
        None => {
            let summary = reporter.cancelled_summary(&pipeline.name);
            println!(
                "\n{} {} {}",
                WARN,
                style(&pipeline.name).bold(),
                style("cancelled").yellow()
            );
            summary
        }
    };

    if !cmd.no_history && !cmd.dry_run {
        save_history(&summary).await;
    }

    if summary.exit_code != 0 {
        std::process::exit(summary.exit_code);
    }

    Ok(())
}

/// Run `pipeline` to completion, or `None` if interrupted with Ctrl-C
async fn execute<E: CommandExecutor>(
    executor: E,
    context: RunContext,
    pipeline: &Pipeline,
    reporter: Arc<TerminalReporter>,
) -> Option<deployer::core::RunResult> {
    let sink: Arc<dyn OutputSink> = reporter.clone();
    let mut runner = Runner::new(executor, context).with_output_sink(sink);
    runner.add_event_handler(move |event| reporter.handle(event));

    // Dropping the run future kills the running child
    tokio::select! {
        result = runner.run(pipeline) => Some(result),
        _ = tokio::signal::ctrl_c() => None,
    }
}

async fn save_history(summary: &RunSummary) {
    let saved = async {
        let store = open_default_history().await?;
        store.save_run(summary).await
    }
    .await;

    match saved {
        Ok(()) => println!(
            "{} Run saved to history (ID: {})",
            INFO,
            style(&summary.run_id.to_string()[..8]).dim()
        ),
        Err(e) => error!("Failed to save run history: {:#}", e),
    }
}

fn validate_config(cmd: &ValidateCommand, cli: &Cli) -> Result<()> {
    match DeployConfig::load(cli.config.as_deref()) {
        Ok(config) => {
            let pipelines = config.pipelines();
            if cmd.json {
                let data = serde_json::json!({
                    "valid": true,
                    "default_pipeline": config.default_pipeline,
                    "pipelines": pipelines,
                    "config": config,
                });
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                println!("{} Deployment configuration is valid!", CHECK);
                println!("  Default pipeline: {}", style(&config.default_pipeline).bold());
                for pipeline in &pipelines {
                    println!(
                        "  {} ({} steps)",
                        style(&pipeline.name).bold(),
                        style(pipeline.steps.len()).cyan()
                    );
                }
            }
            Ok(())
        }
        Err(e) => {
            if cmd.json {
                let data = serde_json::json!({ "valid": false, "error": format!("{:#}", e) });
                println!("{}", serde_json::to_string_pretty(&data)?);
            } else {
                println!("{} Validation failed:", CROSS);
                println!("  {}", style(format!("{:#}", e)).red());
            }
            std::process::exit(1);
        }
    }
}

fn list_pipelines(cmd: &ListCommand, cli: &Cli) -> Result<()> {
    let config = DeployConfig::load(cli.config.as_deref())
        .context("Failed to load deployment config")?;
    let pipelines = config.pipelines();

    if cmd.json {
        let data: Vec<_> = pipelines
            .iter()
            .map(|p| {
                serde_json::json!({
                    "name": p.name,
                    "description": p.description,
                    "steps": p.steps.iter().map(|s| &s.name).collect::<Vec<_>>(),
                    "requires": config.required_variables(p),
                    "default": p.name == config.default_pipeline,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&serde_json::json!({ "pipelines": data }))?);
        return Ok(());
    }

    println!("{} Available pipelines:", INFO);
    for pipeline in &pipelines {
        let marker = if pipeline.name == config.default_pipeline {
            style(" (default)").green().to_string()
        } else {
            String::new()
        };
        println!(
            "  {}{} - {} steps",
            style(&pipeline.name).bold(),
            marker,
            style(pipeline.steps.len()).cyan()
        );
        if let Some(description) = &pipeline.description {
            println!("    {}", style(description).dim());
        }
        let required = config.required_variables(pipeline);
        if !required.is_empty() {
            println!("    requires --var: {}", style(required.join(", ")).yellow());
        }
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = open_default_history().await?;

    if let Some(run_id) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id).context("Invalid run ID format")?;
        match store.load_run(run_id).await? {
            Some(summary) if cmd.json => println!("{}", serde_json::to_string_pretty(&summary)?),
            Some(summary) => print_run_details(&summary),
            None => println!("{} Run not found", WARN),
        }
        return Ok(());
    }

    let mut runs = match &cmd.pipeline {
        Some(pipeline_name) => store.list_runs(pipeline_name).await?,
        None => store.recent_runs(cmd.limit).await?,
    };
    runs.truncate(cmd.limit);

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
        return Ok(());
    }

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, cmd.limit);
    for summary in &runs {
        println!("  {}", format_run_summary(summary));
    }

    Ok(())
}

fn print_run_details(summary: &RunSummary) {
    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    println!("  Status: {}", format_status(summary.status));
    println!("  Exit code: {}", summary.exit_code);
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(finished) = summary.finished_at {
        println!("  Finished: {}", style(finished.to_rfc3339()).dim());
        if let Ok(duration) = finished.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!("  Completed steps:");
    for step in &summary.completed_steps {
        let icon = if summary.continued_failures.contains(step) { WARN } else { CHECK };
        println!("    {} {}", icon, step);
    }
    if let Some(step) = &summary.failed_step {
        println!("    {} {}", CROSS, style(step).red());
    }
}
