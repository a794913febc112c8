//! Terminal output: configuration, run and experiment summaries.

use owo_colors::OwoColorize;
use tabled::{settings::Style as TableStyle, Table, Tabled};

use codesim_rs::core::config::CodesimConfig;
use codesim_rs::core::pipeline::RunSummary;
use codesim_rs::io::reports::{
    BucketSummary, ConsistencyGrade, ExperimentSummary, TemperatureComparison,
};

/// Failures listed before the rest are elided
const MAX_LISTED_FAILURES: usize = 10;

#[derive(Tabled)]
struct SettingRow {
    #[tabled(rename = "Setting")]
    setting: String,
    #[tabled(rename = "Value")]
    value: String,
}

#[derive(Tabled)]
struct CountRow {
    #[tabled(rename = "Pairs")]
    label: &'static str,
    #[tabled(rename = "Count")]
    count: usize,
}

#[derive(Tabled)]
struct MetricRow {
    #[tabled(rename = "Metric")]
    metric: String,
    #[tabled(rename = "N")]
    count: usize,
    #[tabled(rename = "Mean")]
    mean: String,
    #[tabled(rename = "Min")]
    min: String,
    #[tabled(rename = "Max")]
    max: String,
    #[tabled(rename = "Std")]
    std_dev: String,
}

#[derive(Tabled)]
struct ConsistencyRow {
    #[tabled(rename = "Bucket")]
    bucket: String,
    #[tabled(rename = "Pairs")]
    comparisons: usize,
    #[tabled(rename = "Overall")]
    overall: String,
    #[tabled(rename = "Structural")]
    structural: String,
    #[tabled(rename = "Semantic")]
    semantic: String,
    #[tabled(rename = "Grade")]
    grade: String,
}

fn colored_grade(grade: ConsistencyGrade) -> String {
    match grade {
        ConsistencyGrade::A | ConsistencyGrade::B => grade.to_string().green().to_string(),
        ConsistencyGrade::C => grade.to_string().yellow().to_string(),
        ConsistencyGrade::D | ConsistencyGrade::F => grade.to_string().red().to_string(),
    }
}

/// Print the settings a run will use.
pub fn display_config_summary(config: &CodesimConfig) {
    let delegate = config
        .delegate
        .command
        .as_ref()
        .map(|argv| argv.join(" "))
        .unwrap_or_else(|| "not configured".to_string());

    let rows = vec![
        SettingRow {
            setting: "BLEU max order".to_string(),
            value: config.bleu.max_order.to_string(),
        },
        SettingRow {
            setting: "Composite weights (bleu/structural/delegate)".to_string(),
            value: format!(
                "{:.2} / {:.2} / {:.2}",
                config.composite.bleu, config.composite.structural, config.composite.delegate
            ),
        },
        SettingRow {
            setting: "Workers".to_string(),
            value: config.batch.workers.to_string(),
        },
        SettingRow {
            setting: "Pair timeout".to_string(),
            value: format!("{}s", config.batch.pair_timeout_secs),
        },
        SettingRow {
            setting: "Metric set".to_string(),
            value: config.cache.metric_set_version.clone(),
        },
        SettingRow {
            setting: "Delegate".to_string(),
            value: delegate,
        },
    ];

    println!("{}", "Configuration".bright_blue().bold());
    let mut table = Table::new(rows);
    table.with(TableStyle::rounded());
    println!("{}", table);
    println!();
}

/// Print outcome counts and the failed pairs of a run.
pub fn display_run_summary(summary: &RunSummary) {
    let rows = vec![
        CountRow {
            label: "attempted",
            count: summary.attempted,
        },
        CountRow {
            label: "cache hits",
            count: summary.cache_hits,
        },
        CountRow {
            label: "computed",
            count: summary.computed,
        },
        CountRow {
            label: "errors",
            count: summary.errors,
        },
        CountRow {
            label: "cancelled",
            count: summary.cancelled,
        },
    ];

    println!("{}", "Run Summary".bright_blue().bold());
    let mut table = Table::new(rows);
    table.with(TableStyle::rounded());
    println!("{}", table);

    if summary.failures.is_empty() {
        return;
    }

    println!();
    println!("{}", "Failed pairs".red().bold());
    for failure in summary.failures.iter().take(MAX_LISTED_FAILURES) {
        let message = failure
            .record
            .error
            .as_ref()
            .map(|e| format!("{}: {}", e.kind, e.message))
            .unwrap_or_default();
        println!(
            "  {} -> {}  {}",
            failure.reference,
            failure.candidate,
            message.dimmed()
        );
    }
    if summary.failures.len() > MAX_LISTED_FAILURES {
        println!(
            "  ... and {} more",
            summary.failures.len() - MAX_LISTED_FAILURES
        );
    }
}

/// Print experiment dimensions and per-metric statistics.
pub fn display_experiment_summary(summary: &ExperimentSummary) {
    println!("{}", "Experiment Summary".bright_blue().bold());
    println!("  Comparisons:  {}", summary.total_comparisons);
    println!("  With errors:  {}", summary.error_records);
    println!("  Models:       {}", summary.models.join(", "));
    println!("  Challenges:   {}", summary.challenges.join(", "));
    println!("  Temperatures: {}", summary.temperatures.join(", "));
    println!();

    if summary.per_metric_stats.is_empty() {
        println!("{}", "No cached comparisons found".yellow());
        return;
    }

    let rows: Vec<MetricRow> = summary
        .per_metric_stats
        .iter()
        .map(|(metric, stats)| MetricRow {
            metric: metric.clone(),
            count: stats.count,
            mean: format!("{:.4}", stats.mean),
            min: format!("{:.4}", stats.min),
            max: format!("{:.4}", stats.max),
            std_dev: format!("{:.4}", stats.std_dev),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(TableStyle::rounded());
    println!("{}", table);
}

/// Print per-bucket consistency and the effect of temperature on it.
pub fn display_consistency(buckets: &[BucketSummary], comparisons: &[TemperatureComparison]) {
    if buckets.is_empty() {
        return;
    }

    let rows: Vec<ConsistencyRow> = buckets
        .iter()
        .map(|bucket| ConsistencyRow {
            bucket: bucket.key.to_string(),
            comparisons: bucket.comparisons,
            overall: format!("{:.3}", bucket.consistency.overall),
            structural: format!("{:.3}", bucket.consistency.structural),
            semantic: format!("{:.3}", bucket.consistency.semantic),
            grade: colored_grade(bucket.consistency.grade),
        })
        .collect();

    println!();
    println!("{}", "Iteration Consistency".bright_blue().bold());
    let mut table = Table::new(rows);
    table.with(TableStyle::rounded());
    println!("{}", table);

    if comparisons.is_empty() {
        return;
    }
    println!();
    println!("{}", "Temperature Effect".bright_blue().bold());
    for comparison in comparisons {
        println!(
            "  {}/{}/{}: best {}, worst {}",
            comparison.model,
            comparison.challenge,
            comparison.prompt,
            comparison.best.green(),
            comparison.worst.red()
        );
        match &comparison.effect {
            Some(effect) => println!(
                "    r = {:.3}  {}",
                effect.correlation,
                effect.interpretation().dimmed()
            ),
            None => println!("    {}", "not enough parseable temperatures".dimmed()),
        }
    }
}
