use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use lockprobe_runner::{resolve_template_home, run_all, StopSignal, TaskOutcome};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

mod assertions;
mod config;
mod harness;
mod render;
mod scenarios;

use config::HarnessConfig;
use harness::{HarnessSettings, ScenarioTask};
use render::{format_skipped_line, resolve_output_style, ScenarioProgress, Summary};

#[derive(Parser, Debug)]
#[command(name = "lockprobe")]
#[command(
    about = "Checks how package identities evolve across recipe and configuration changes",
    long_about = None
)]
struct Cli {
    /// Configuration file (default: lockprobe.toml when present).
    #[arg(long)]
    config: Option<PathBuf>,
    /// Package-manager profile used for builds and lock files.
    #[arg(long)]
    profile: Option<String>,
    /// Keep each scenario directory after the run.
    #[arg(long)]
    keep_artifacts: bool,
    /// Run scenarios one after another on the main thread.
    #[arg(long, conflicts_with = "jobs")]
    sequential: bool,
    /// Number of scenarios running at the same time.
    #[arg(long)]
    jobs: Option<usize>,
    /// Start no further scenario after the first failure.
    #[arg(long)]
    fail_fast: bool,
    /// Log filter directives, e.g. `info` or `lockprobe_runner=debug`.
    #[arg(long, default_value = "warn")]
    log_level: String,
    /// Print the scenario names and exit.
    #[arg(long)]
    list: bool,
    /// Scenarios to run (default: all).
    scenarios: Vec<String>,
}

fn main() -> Result<ExitCode> {
    let cli = Cli::parse();

    let filter = EnvFilter::try_new(&cli.log_level).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();

    let selected = scenarios::select(scenarios::catalog(), &cli.scenarios)?;
    if cli.list {
        for scenario in &selected {
            println!("{}\t{}", scenario.name, scenario.mode);
        }
        return Ok(ExitCode::SUCCESS);
    }

    let config = apply_overrides(HarnessConfig::discover(cli.config.as_deref())?, &cli);
    let jobs = config.effective_jobs(selected.len());
    let settings = resolve_settings(config, cli.fail_fast)?;
    tracing::info!(
        scenarios = selected.len(),
        jobs,
        work_root = %settings.config.work_root.display(),
        "starting run"
    );

    let style = resolve_output_style(std::io::stdout().is_terminal());
    let tasks: Vec<ScenarioTask<'_>> = selected
        .iter()
        .map(|scenario| ScenarioTask::new(*scenario, &settings))
        .collect();
    let stop = StopSignal::new();
    let progress = ScenarioProgress::start(style, tasks.len() as u64);
    let outcomes = run_all(&tasks, jobs, &stop, |_, report| progress.finished(report));
    progress.finish();

    for (scenario, outcome) in selected.iter().zip(&outcomes) {
        if let TaskOutcome::Skipped = outcome {
            println!("{}", format_skipped_line(scenario.name, style));
        }
    }
    let summary = Summary::from_outcomes(&outcomes);
    println!("{}", summary.render(style));

    Ok(if summary.succeeded() {
        ExitCode::SUCCESS
    } else {
        ExitCode::FAILURE
    })
}

fn apply_overrides(mut config: HarnessConfig, cli: &Cli) -> HarnessConfig {
    if let Some(profile) = &cli.profile {
        config.profile = profile.clone();
    }
    if cli.keep_artifacts {
        config.keep_artifacts = true;
    }
    if cli.sequential {
        config.jobs = Some(1);
    } else if let Some(jobs) = cli.jobs {
        config.jobs = Some(jobs);
    }
    config
}

/// Anchors relative paths at the working directory, since every command runs
/// inside its scenario directory.
fn resolve_settings(mut config: HarnessConfig, fail_fast: bool) -> Result<HarnessSettings> {
    let cwd = std::env::current_dir().context("failed to resolve working directory")?;
    config.recipes_dir = absolute(&cwd, &config.recipes_dir);
    config.work_root = absolute(&cwd, &config.work_root);
    let template_home = absolute(&cwd, &resolve_template_home(config.template_home.as_deref())?);
    Ok(HarnessSettings {
        config,
        template_home,
        fail_fast,
    })
}

fn absolute(base: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests;
