//! Read API over the cached comparisons of one experiment.
//!
//! Aggregates are computed from whatever the store currently holds; nothing
//! here triggers a comparison.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use statrs::statistics::Statistics;
use tracing::info;

use crate::api::results::SimilarityRecord;
use crate::core::artifact::{BucketKey, TemperatureParams};
use crate::core::config::CodesimConfig;
use crate::core::errors::{CodesimError, Result};
use crate::io::cache::{ComparisonStore, JsonComparisonStore, StoredComparison};

/// Descriptive statistics of one metric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetricStats {
    /// Number of observations
    pub count: usize,
    /// Arithmetic mean
    pub mean: f64,
    /// Smallest observation
    pub min: f64,
    /// Largest observation
    pub max: f64,
    /// Sample standard deviation; 0 below two observations
    pub std_dev: f64,
}

impl MetricStats {
    /// Statistics of `values`, or `None` when empty.
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let std_dev = if values.len() > 1 {
            values.std_dev()
        } else {
            0.0
        };
        Some(Self {
            count: values.len(),
            mean: values.mean(),
            min: Statistics::min(values),
            max: Statistics::max(values),
            std_dev,
        })
    }
}

/// Experiment-wide aggregate view.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExperimentSummary {
    /// Number of stored comparisons
    pub total_comparisons: usize,
    /// Stored comparisons whose record carries an error annotation
    pub error_records: usize,
    /// Distinct models, sorted
    pub models: Vec<String>,
    /// Distinct challenges, sorted
    pub challenges: Vec<String>,
    /// Distinct temperature labels, sorted
    pub temperatures: Vec<String>,
    /// Mean of every metric over the compared records that carry it
    pub per_metric_means: BTreeMap<String, f64>,
    /// Full statistics of every metric
    pub per_metric_stats: BTreeMap<String, MetricStats>,
}

/// Letter grade of an average consistency score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConsistencyGrade {
    /// 0.8 and above
    A,
    /// 0.6 and above
    B,
    /// 0.4 and above
    C,
    /// 0.2 and above
    D,
    /// Below 0.2
    F,
}

impl ConsistencyGrade {
    /// Grade of an average consistency score.
    pub fn from_score(score: f64) -> Self {
        if score >= 0.8 {
            Self::A
        } else if score >= 0.6 {
            Self::B
        } else if score >= 0.4 {
            Self::C
        } else if score >= 0.2 {
            Self::D
        } else {
            Self::F
        }
    }
}

impl fmt::Display for ConsistencyGrade {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let grade = match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::F => "F",
        };
        f.write_str(grade)
    }
}

/// `mean * (1 - min(std_dev, 1))`: high when iterations agree closely and
/// uniformly. 0 without observations.
pub fn consistency_score(values: &[f64]) -> f64 {
    MetricStats::from_values(values)
        .map_or(0.0, |stats| stats.mean * (1.0 - stats.std_dev.min(1.0)))
}

/// How consistently one bucket's iterations resemble each other.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsistencyScores {
    /// Consistency of the composite score
    pub overall: f64,
    /// Consistency of the structural similarity
    pub structural: f64,
    /// Consistency of the semantic similarity
    pub semantic: f64,
    /// Mean of the three
    pub average: f64,
    /// Grade of `average`
    pub grade: ConsistencyGrade,
}

impl ConsistencyScores {
    /// Scores over the records that were actually compared.
    pub fn from_records<'a>(records: impl IntoIterator<Item = &'a SimilarityRecord>) -> Self {
        let mut overall = Vec::new();
        let mut structural = Vec::new();
        let mut semantic = Vec::new();
        for record in records.into_iter().filter(|r| r.was_compared()) {
            overall.push(record.composite);
            structural.extend(record.structural_similarity());
            semantic.push(record.semantic_similarity());
        }

        let overall = consistency_score(&overall);
        let structural = consistency_score(&structural);
        let semantic = consistency_score(&semantic);
        let average = (overall + structural + semantic) / 3.0;
        Self {
            overall,
            structural,
            semantic,
            average,
            grade: ConsistencyGrade::from_score(average),
        }
    }
}

/// Metric means of one experiment bucket.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BucketSummary {
    /// Bucket identity
    #[serde(flatten)]
    pub key: BucketKey,
    /// Number of stored comparisons in the bucket
    pub comparisons: usize,
    /// Mean of every metric within the bucket
    pub per_metric_means: BTreeMap<String, f64>,
    /// Iteration consistency of the bucket
    pub consistency: ConsistencyScores,
}

/// Direction of the temperature/consistency relationship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TemperatureTrend {
    /// Correlation below -0.3
    Negative,
    /// Correlation within [-0.3, 0.3]
    Neutral,
    /// Correlation above 0.3
    Positive,
}

/// Pearson correlation between sampling temperature and average consistency.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureEffect {
    /// Pearson correlation coefficient
    pub correlation: f64,
    /// Trend label of `correlation`
    pub trend: TemperatureTrend,
}

impl TemperatureEffect {
    /// Effect over `(temperature, consistency)` points; needs at least two.
    pub fn from_points(temperatures: &[f64], consistency: &[f64]) -> Option<Self> {
        if temperatures.len() < 2 || temperatures.len() != consistency.len() {
            return None;
        }
        let correlation = pearson_correlation(temperatures, consistency);
        let trend = if correlation < -0.3 {
            TemperatureTrend::Negative
        } else if correlation > 0.3 {
            TemperatureTrend::Positive
        } else {
            TemperatureTrend::Neutral
        };
        Some(Self { correlation, trend })
    }

    /// One-line reading of the correlation.
    pub fn interpretation(&self) -> &'static str {
        match self.correlation {
            c if c < -0.5 => "Higher temperature significantly reduces consistency",
            c if c < -0.3 => "Higher temperature moderately reduces consistency",
            c if c > 0.5 => "Higher temperature significantly increases consistency",
            c if c > 0.3 => "Higher temperature moderately increases consistency",
            _ => "Temperature has minimal effect on consistency",
        }
    }
}

/// Pearson correlation coefficient; 0 when either side has no spread.
pub fn pearson_correlation(x: &[f64], y: &[f64]) -> f64 {
    if x.len() != y.len() || x.len() < 2 {
        return 0.0;
    }
    let denominator = x.std_dev() * y.std_dev();
    if denominator == 0.0 || !denominator.is_finite() {
        return 0.0;
    }
    (x.covariance(y) / denominator).clamp(-1.0, 1.0)
}

/// Consistency of one temperature setting within a comparison group.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureConsistency {
    /// Temperature folder label
    pub label: String,
    /// Sampling parameters parsed from the label
    pub params: TemperatureParams,
    /// Consistency of the bucket at this temperature
    pub consistency: ConsistencyScores,
}

/// Consistency across the temperatures of one model, challenge and prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TemperatureComparison {
    /// Model name
    pub model: String,
    /// Challenge name
    pub challenge: String,
    /// Prompt strategy name
    pub prompt: String,
    /// Every temperature setting, ordered by label
    pub temperatures: Vec<TemperatureConsistency>,
    /// Label with the highest average consistency
    pub best: String,
    /// Label with the lowest average consistency
    pub worst: String,
    /// Temperature effect; absent below two parseable temperatures
    pub effect: Option<TemperatureEffect>,
}

impl TemperatureComparison {
    /// Comparison over `buckets`, which must share model, challenge and
    /// prompt. `None` below two temperatures.
    pub fn from_buckets(buckets: &[&BucketSummary]) -> Option<Self> {
        let first = buckets.first()?;
        if buckets.len() < 2 {
            return None;
        }

        let temperatures: Vec<TemperatureConsistency> = buckets
            .iter()
            .map(|bucket| TemperatureConsistency {
                label: bucket.key.temperature.clone(),
                params: TemperatureParams::parse(&bucket.key.temperature),
                consistency: bucket.consistency.clone(),
            })
            .collect();

        let mut best = &temperatures[0];
        let mut worst = &temperatures[0];
        for entry in &temperatures[1..] {
            if entry.consistency.average > best.consistency.average {
                best = entry;
            }
            if entry.consistency.average < worst.consistency.average {
                worst = entry;
            }
        }

        let (points, scores): (Vec<f64>, Vec<f64>) = temperatures
            .iter()
            .filter_map(|t| t.params.temperature.map(|temp| (temp, t.consistency.average)))
            .unzip();

        Some(Self {
            model: first.key.model.clone(),
            challenge: first.key.challenge.clone(),
            prompt: first.key.prompt.clone(),
            best: best.label.clone(),
            worst: worst.label.clone(),
            effect: TemperatureEffect::from_points(&points, &scores),
            temperatures,
        })
    }
}

/// Document written by [`ExperimentReader::export_summary`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SummaryExport {
    /// When the export was produced
    pub generated_at: DateTime<Utc>,
    /// Metric-set version the records belong to
    pub metric_set_version: String,
    /// Experiment-wide aggregates
    pub summary: ExperimentSummary,
    /// Per-bucket means and consistency, ordered by bucket key
    pub buckets: Vec<BucketSummary>,
    /// Cross-temperature consistency per model, challenge and prompt
    #[serde(default)]
    pub temperature_comparisons: Vec<TemperatureComparison>,
}

#[derive(Default)]
struct MetricAccumulator {
    values: BTreeMap<&'static str, Vec<f64>>,
}

impl MetricAccumulator {
    fn add(&mut self, document: &StoredComparison) {
        if !document.record.was_compared() {
            return;
        }
        for (name, value) in document.record.metric_values() {
            self.values.entry(name).or_default().push(value);
        }
    }

    fn stats(&self) -> BTreeMap<String, MetricStats> {
        self.values
            .iter()
            .filter_map(|(name, values)| {
                MetricStats::from_values(values).map(|stats| (name.to_string(), stats))
            })
            .collect()
    }

    fn means(&self) -> BTreeMap<String, f64> {
        self.stats()
            .into_iter()
            .map(|(name, stats)| (name, stats.mean))
            .collect()
    }
}

/// Reads the comparisons cached for one experiment root.
#[derive(Debug, Clone)]
pub struct ExperimentReader {
    store: JsonComparisonStore,
}

impl ExperimentReader {
    /// Reader over the cache `config` places under `experiment_root`.
    pub fn new(experiment_root: &Path, config: &CodesimConfig) -> Self {
        Self::from_store(JsonComparisonStore::new(
            config.cache_dir_for(experiment_root),
            config.cache.metric_set_version.clone(),
        ))
    }

    /// Reader over an existing store.
    pub fn from_store(store: JsonComparisonStore) -> Self {
        Self { store }
    }

    /// Cache directory being read.
    pub fn cache_root(&self) -> &Path {
        self.store.root()
    }

    /// Every stored comparison, in cache path order.
    pub fn records(&self) -> Result<Vec<StoredComparison>> {
        self.store.stored_comparisons()
    }

    /// Experiment-wide aggregates.
    pub fn summary(&self) -> Result<ExperimentSummary> {
        Ok(summarize(&self.records()?))
    }

    /// Metric means and consistency per bucket, ordered by bucket key.
    pub fn bucket_summaries(&self) -> Result<Vec<BucketSummary>> {
        Ok(summarize_buckets(&self.records()?))
    }

    /// Cross-temperature consistency of every model, challenge and prompt
    /// cached under at least two temperatures.
    pub fn temperature_comparisons(&self) -> Result<Vec<TemperatureComparison>> {
        Ok(compare_temperatures(&self.bucket_summaries()?))
    }

    /// Summary, buckets and temperature comparisons in one pass over the cache.
    pub fn report(&self) -> Result<SummaryExport> {
        let documents = self.records()?;
        let buckets = summarize_buckets(&documents);
        Ok(SummaryExport {
            generated_at: Utc::now(),
            metric_set_version: self.store.metric_set_version().to_string(),
            summary: summarize(&documents),
            temperature_comparisons: compare_temperatures(&buckets),
            buckets,
        })
    }

    /// Write [`Self::report`] to `path` as pretty JSON.
    pub fn export_summary(&self, path: &Path) -> Result<SummaryExport> {
        let export = self.report()?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| {
                CodesimError::io(format!("Failed to create {}", parent.display()), e)
            })?;
        }
        let content = serde_json::to_string_pretty(&export)?;
        fs::write(path, content)
            .map_err(|e| CodesimError::io(format!("Failed to write {}", path.display()), e))?;

        info!(
            "Exported summary of {} comparisons to {}",
            export.summary.total_comparisons,
            path.display()
        );
        Ok(export)
    }

    /// Default export location inside the cache directory.
    pub fn default_export_path(&self) -> PathBuf {
        self.store.root().join("summary.json")
    }
}

fn summarize(documents: &[StoredComparison]) -> ExperimentSummary {
    let mut models = BTreeSet::new();
    let mut challenges = BTreeSet::new();
    let mut temperatures = BTreeSet::new();
    let mut metrics = MetricAccumulator::default();
    let mut error_records = 0;

    for document in documents {
        let id = &document.reference;
        models.insert(id.model.clone());
        challenges.insert(id.challenge.clone());
        temperatures.insert(id.temperature.clone());
        if document.record.has_error() {
            error_records += 1;
        }
        metrics.add(document);
    }

    let per_metric_stats = metrics.stats();
    ExperimentSummary {
        total_comparisons: documents.len(),
        error_records,
        models: models.into_iter().collect(),
        challenges: challenges.into_iter().collect(),
        temperatures: temperatures.into_iter().collect(),
        per_metric_means: per_metric_stats
            .iter()
            .map(|(name, stats)| (name.clone(), stats.mean))
            .collect(),
        per_metric_stats,
    }
}

fn summarize_buckets(documents: &[StoredComparison]) -> Vec<BucketSummary> {
    let mut grouped: BTreeMap<BucketKey, Vec<&StoredComparison>> = BTreeMap::new();
    for document in documents {
        grouped
            .entry(document.reference.bucket_key())
            .or_default()
            .push(document);
    }

    grouped
        .into_iter()
        .map(|(key, members)| {
            let mut metrics = MetricAccumulator::default();
            for document in &members {
                metrics.add(document);
            }
            BucketSummary {
                key,
                comparisons: members.len(),
                per_metric_means: metrics.means(),
                consistency: ConsistencyScores::from_records(members.iter().map(|d| &d.record)),
            }
        })
        .collect()
}

fn compare_temperatures(buckets: &[BucketSummary]) -> Vec<TemperatureComparison> {
    let mut grouped: BTreeMap<(&str, &str, &str), Vec<&BucketSummary>> = BTreeMap::new();
    for bucket in buckets {
        let key = &bucket.key;
        grouped
            .entry((key.model.as_str(), key.challenge.as_str(), key.prompt.as_str()))
            .or_default()
            .push(bucket);
    }

    grouped
        .values()
        .filter_map(|group| TemperatureComparison::from_buckets(group))
        .collect()
}
