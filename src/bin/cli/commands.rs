//! Command execution for the codesim CLI.

use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context};
use indicatif::{ProgressBar, ProgressStyle};
use owo_colors::OwoColorize;
use tracing::{info, warn};

use codesim_rs::core::config::CodesimConfig;
use codesim_rs::CodesimEngine;

use super::args::{CompareArgs, SummaryArgs, ValidateConfigArgs};
use super::output::{
    display_config_summary, display_consistency, display_experiment_summary, display_run_summary,
};

/// Load configuration from `path`, or defaults when none is given.
pub fn load_configuration(path: Option<&Path>) -> anyhow::Result<CodesimConfig> {
    match path {
        Some(path) => CodesimConfig::from_yaml_file(path)
            .with_context(|| format!("Failed to load configuration from {}", path.display())),
        None => Ok(CodesimConfig::default()),
    }
}

fn require_input_dir(path: &Path) -> anyhow::Result<()> {
    if !path.is_dir() {
        bail!(
            "Input directory does not exist or is not a directory: {}",
            path.display()
        );
    }
    Ok(())
}

/// Run every ordered comparison of an experiment directory.
pub async fn compare_command(args: CompareArgs) -> anyhow::Result<()> {
    require_input_dir(&args.input_dir)?;

    let mut config = load_configuration(args.config.as_deref())?;
    if let Some(workers) = args.workers {
        config.batch.workers = workers;
    }
    if let Some(timeout_secs) = args.timeout_secs {
        config.batch.pair_timeout_secs = timeout_secs;
    }
    if let Some(command) = args.delegate_command {
        config.delegate.command = Some(command);
    }

    let engine = CodesimEngine::new(config).context("Invalid configuration")?;
    if !args.quiet {
        display_config_summary(engine.config());
    }

    // Ctrl-C stops scheduling new pairs; in-flight pairs finish or are dropped.
    let token = engine.cancellation_token();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling remaining comparisons");
            token.cancel();
        }
    });

    let spinner = ProgressBar::new_spinner();
    spinner.set_style(ProgressStyle::with_template("{spinner} {msg} {elapsed_precise}")?);
    spinner.set_message(format!("Comparing artifacts under {}", args.input_dir.display()));
    spinner.enable_steady_tick(Duration::from_millis(120));

    let result = engine.run(&args.input_dir, args.force_recompute).await;
    spinner.finish_and_clear();
    let summary = result.context("Similarity run failed")?;

    if !args.quiet {
        display_run_summary(&summary);
    }

    if args.export_visualization {
        let (path, export) = engine.export_summary(&args.input_dir, None)?;
        info!(
            "Visualization summary covers {} comparisons",
            export.summary.total_comparisons
        );
        println!(
            "{} {}",
            "Summary exported to".bright_green().bold(),
            path.display().to_string().cyan()
        );
    }

    Ok(())
}

/// Print aggregates over the cached comparisons of an experiment directory.
pub async fn summary_command(args: SummaryArgs) -> anyhow::Result<()> {
    require_input_dir(&args.input_dir)?;

    let config = load_configuration(args.config.as_deref())?;
    let engine = CodesimEngine::new(config).context("Invalid configuration")?;
    let input_dir = args.input_dir.clone();
    let report = tokio::task::spawn_blocking(move || engine.report(&input_dir)).await??;

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        display_experiment_summary(&report.summary);
        display_consistency(&report.buckets, &report.temperature_comparisons);
    }
    Ok(())
}

/// Print default configuration in YAML format
pub fn print_default_config() -> anyhow::Result<()> {
    println!("# Default codesim configuration");
    println!("# Save this to a file and customize as needed");
    println!("# Usage: codesim compare --config your-config.yml <input_dir>");
    println!();

    let yaml_output = serde_yaml::to_string(&CodesimConfig::default())?;
    println!("{}", yaml_output);
    Ok(())
}

/// Validate a configuration file
pub fn validate_config(args: ValidateConfigArgs) -> anyhow::Result<()> {
    let config = load_configuration(Some(&args.config))?;
    config
        .validate()
        .with_context(|| format!("Configuration {} is invalid", args.config.display()))?;

    println!(
        "{} {}",
        "Configuration file is valid:".bright_green().bold(),
        args.config.display().to_string().cyan()
    );
    display_config_summary(&config);
    Ok(())
}
