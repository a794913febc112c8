//! Configuration types and management for codesim-rs.
//!
//! A single YAML document drives the similarity engine: BLEU order, composite
//! weights, structural limits, batch scheduling, cache location, and the
//! optional external delegate.

pub mod validation;

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::core::errors::{CodesimError, Result};

pub use validation::{
    validate_non_negative, validate_positive_u64, validate_positive_usize,
    validate_weights_not_all_zero,
};

/// Main configuration for the similarity engine
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CodesimConfig {
    /// Lexical (BLEU) settings
    #[serde(default)]
    pub bleu: BleuConfig,

    /// Weights used to merge sub-scores into the composite score
    #[serde(default)]
    pub composite: CompositeWeights,

    /// Structural comparison limits
    #[serde(default)]
    pub structure: StructureConfig,

    /// Batch scheduling settings
    #[serde(default)]
    pub batch: BatchConfig,

    /// Comparison cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// External similarity delegate settings
    #[serde(default)]
    pub delegate: DelegateConfig,
}

/// Configuration construction and I/O methods for [`CodesimConfig`].
impl CodesimConfig {
    /// Load configuration from a YAML file
    pub fn from_yaml_file(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| {
            CodesimError::io(format!("Failed to read config file: {}", path.display()), e)
        })?;

        serde_yaml::from_str(&content).map_err(Into::into)
    }

    /// Save configuration to a YAML file
    pub fn to_yaml_file(&self, path: impl Into<PathBuf>) -> Result<()> {
        let path = path.into();
        let content = serde_yaml::to_string(self)?;
        std::fs::write(&path, content).map_err(|e| {
            CodesimError::io(
                format!("Failed to write config file: {}", path.display()),
                e,
            )
        })
    }

    /// Validate configuration settings
    pub fn validate(&self) -> Result<()> {
        self.bleu.validate()?;
        self.composite.validate()?;
        self.structure.validate()?;
        self.batch.validate()?;
        self.cache.validate()?;
        self.delegate.validate()?;
        Ok(())
    }

    /// Resolve the cache directory for an experiment root.
    pub fn cache_dir_for(&self, experiment_root: &Path) -> PathBuf {
        match &self.cache.directory {
            Some(dir) if dir.is_absolute() => dir.clone(),
            Some(dir) => experiment_root.join(dir),
            None => experiment_root.join(CacheConfig::DEFAULT_SUBDIR),
        }
    }
}

/// BLEU scorer configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BleuConfig {
    /// Highest n-gram order used by the scorer
    #[serde(default = "BleuConfig::default_max_order")]
    pub max_order: usize,
}

impl Default for BleuConfig {
    fn default() -> Self {
        Self {
            max_order: Self::default_max_order(),
        }
    }
}

impl BleuConfig {
    const fn default_max_order() -> usize {
        4
    }

    /// Validate BLEU settings
    pub fn validate(&self) -> Result<()> {
        validate_positive_usize(self.max_order, "bleu.max_order")?;
        if self.max_order > 8 {
            return Err(CodesimError::config_field(
                "max_order above 8 makes the unsmoothed score collapse to zero",
                "bleu.max_order",
            ));
        }
        Ok(())
    }
}

/// Weights for merging sub-scores into the composite score.
///
/// Components that are unavailable for a pair are dropped and the remaining
/// weights renormalized, so the weights need not sum to one.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompositeWeights {
    /// Weight of the BLEU score
    #[serde(default = "CompositeWeights::default_bleu")]
    pub bleu: f64,
    /// Weight of the structural similarity score
    #[serde(default = "CompositeWeights::default_structural")]
    pub structural: f64,
    /// Weight of the delegate mean score
    #[serde(default = "CompositeWeights::default_delegate")]
    pub delegate: f64,
}

impl Default for CompositeWeights {
    fn default() -> Self {
        Self {
            bleu: Self::default_bleu(),
            structural: Self::default_structural(),
            delegate: Self::default_delegate(),
        }
    }
}

impl CompositeWeights {
    const fn default_bleu() -> f64 {
        0.3
    }

    const fn default_structural() -> f64 {
        0.3
    }

    const fn default_delegate() -> f64 {
        0.4
    }

    /// Validate composite weights
    pub fn validate(&self) -> Result<()> {
        validate_non_negative(self.bleu, "composite.bleu")?;
        validate_non_negative(self.structural, "composite.structural")?;
        validate_non_negative(self.delegate, "composite.delegate")?;
        validate_weights_not_all_zero(
            &[self.bleu, self.structural, self.delegate],
            "composite",
        )
    }
}

/// Structural comparison configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructureConfig {
    /// Trees larger than this skip tree edit distance (0 disables it)
    #[serde(default = "StructureConfig::default_ted_max_nodes")]
    pub ted_max_nodes: usize,
}

impl Default for StructureConfig {
    fn default() -> Self {
        Self {
            ted_max_nodes: Self::default_ted_max_nodes(),
        }
    }
}

impl StructureConfig {
    const fn default_ted_max_nodes() -> usize {
        1500
    }

    /// Validate structure settings
    pub fn validate(&self) -> Result<()> {
        Ok(())
    }
}

/// Batch runner configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchConfig {
    /// Number of pairs processed concurrently
    #[serde(default = "BatchConfig::default_workers")]
    pub workers: usize,

    /// Per-pair time budget in seconds
    #[serde(default = "BatchConfig::default_pair_timeout_secs")]
    pub pair_timeout_secs: u64,

    /// Extension of artifact source files (without the dot)
    #[serde(default = "BatchConfig::default_source_extension")]
    pub source_extension: String,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            workers: Self::default_workers(),
            pair_timeout_secs: Self::default_pair_timeout_secs(),
            source_extension: Self::default_source_extension(),
        }
    }
}

impl BatchConfig {
    fn default_workers() -> usize {
        std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(4)
    }

    const fn default_pair_timeout_secs() -> u64 {
        60
    }

    fn default_source_extension() -> String {
        "py".to_string()
    }

    /// Per-pair timeout as a [`Duration`].
    pub fn pair_timeout(&self) -> Duration {
        Duration::from_secs(self.pair_timeout_secs)
    }

    /// Validate batch settings
    pub fn validate(&self) -> Result<()> {
        validate_positive_usize(self.workers, "batch.workers")?;
        validate_positive_u64(self.pair_timeout_secs, "batch.pair_timeout_secs")?;
        if self.source_extension.is_empty() || self.source_extension.starts_with('.') {
            return Err(CodesimError::config_field(
                "source_extension must be non-empty and given without a leading dot",
                "batch.source_extension",
            ));
        }
        Ok(())
    }
}

/// Comparison cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Cache directory; relative paths resolve against the experiment root
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub directory: Option<PathBuf>,

    /// Version tag of the metric set; bumping it isolates old entries
    #[serde(default = "CacheConfig::default_metric_set_version")]
    pub metric_set_version: String,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            directory: None,
            metric_set_version: Self::default_metric_set_version(),
        }
    }
}

impl CacheConfig {
    /// Cache location relative to the experiment root when none is configured
    pub const DEFAULT_SUBDIR: &'static str = "similarity_analysis";

    fn default_metric_set_version() -> String {
        "v1".to_string()
    }

    /// Validate cache settings
    pub fn validate(&self) -> Result<()> {
        let version = &self.metric_set_version;
        let well_formed = !version.is_empty()
            && version
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_'));
        if !well_formed {
            return Err(CodesimError::config_field(
                "metric_set_version must be a non-empty path-safe tag",
                "cache.metric_set_version",
            ));
        }
        Ok(())
    }
}

/// External delegate configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DelegateConfig {
    /// Program and arguments of a command-line delegate; unset disables it
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub command: Option<Vec<String>>,

    /// Language tag passed to the delegate
    #[serde(default = "DelegateConfig::default_language")]
    pub language: String,
}

impl Default for DelegateConfig {
    fn default() -> Self {
        Self {
            command: None,
            language: Self::default_language(),
        }
    }
}

impl DelegateConfig {
    fn default_language() -> String {
        "python".to_string()
    }

    /// Validate delegate settings
    pub fn validate(&self) -> Result<()> {
        if let Some(command) = &self.command {
            if command.first().map_or(true, |program| program.trim().is_empty()) {
                return Err(CodesimError::config_field(
                    "command must name a program",
                    "delegate.command",
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests;
