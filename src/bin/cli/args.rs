//! CLI Argument Structures
//!
//! All argument definitions and command structures used by the codesim binary.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Similarity analysis for generated code experiments
#[derive(Parser)]
#[command(name = "codesim")]
#[command(version = VERSION)]
#[command(about = "Codesim - similarity analysis for generated code experiments")]
#[command(long_about = "
Compare every ordered pair of artifacts within each experiment bucket
(model, challenge, prompt strategy, temperature) and cache the results.

Common Usage:

  # Compare all pairs, reusing cached comparisons
  codesim compare ./experiment

  # Recompute everything and export a summary for plotting
  codesim compare ./experiment --force-recompute --export-visualization

  # Print aggregates over cached comparisons
  codesim summary ./experiment --json
")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Enable verbose logging for debugging
    #[arg(short, long, global = true)]
    pub verbose: bool,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Compare every ordered pair of an experiment directory
    Compare(CompareArgs),

    /// Summarize the cached comparisons of an experiment directory
    Summary(SummaryArgs),

    /// Print default configuration in YAML format
    #[command(name = "print-default-config")]
    PrintDefaultConfig,

    /// Validate a codesim configuration file
    #[command(name = "validate-config")]
    ValidateConfig(ValidateConfigArgs),
}

/// Arguments of `codesim compare`
#[derive(Args)]
pub struct CompareArgs {
    /// Experiment root containing the generated code tree
    pub input_dir: PathBuf,

    /// Ignore cached comparisons and overwrite them
    #[arg(long)]
    pub force_recompute: bool,

    /// Write a JSON summary for the visualization layer after the run
    #[arg(long)]
    pub export_visualization: bool,

    /// Configuration file (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Number of pairs compared concurrently
    #[arg(long)]
    pub workers: Option<usize>,

    /// Per-pair time budget in seconds
    #[arg(long)]
    pub timeout_secs: Option<u64>,

    /// External delegate command, e.g. `--delegate-command python3 codebleu_wrapper.py`
    #[arg(long, num_args = 1.., value_name = "PROGRAM")]
    pub delegate_command: Option<Vec<String>>,

    /// Suppress the summary table
    #[arg(short, long)]
    pub quiet: bool,
}

/// Arguments of `codesim summary`
#[derive(Args)]
pub struct SummaryArgs {
    /// Experiment root whose cache is read
    pub input_dir: PathBuf,

    /// Configuration file (YAML)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Print the summary as JSON
    #[arg(long)]
    pub json: bool,
}

/// Arguments of `codesim validate-config`
#[derive(Args)]
pub struct ValidateConfigArgs {
    /// Configuration file to validate
    pub config: PathBuf,
}
