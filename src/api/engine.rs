//! Main similarity engine facade.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::api::results::SimilarityRecord;
use crate::core::artifact::CodeArtifact;
use crate::core::config::CodesimConfig;
use crate::core::errors::{CodesimError, Result};
use crate::core::pipeline::{BatchRunner, RunSummary};
use crate::core::similarity::SimilarityCalculator;
use crate::detectors::delegate::DelegateCapability;
use crate::io::reports::{ExperimentReader, ExperimentSummary, SummaryExport};

/// Entry point tying the calculator, batch runner and read API together.
pub struct CodesimEngine {
    config: Arc<CodesimConfig>,
    runner: BatchRunner,
}

impl CodesimEngine {
    /// Create an engine whose delegate is built from `config.delegate`.
    pub fn new(config: CodesimConfig) -> Result<Self> {
        let delegate =
            DelegateCapability::from_config(&config.delegate, config.batch.pair_timeout());
        Self::with_delegate(config, delegate)
    }

    /// Create an engine with an explicitly injected delegate capability.
    pub fn with_delegate(config: CodesimConfig, delegate: DelegateCapability) -> Result<Self> {
        info!("Initializing codesim engine");
        config.validate()?;

        let calculator = Arc::new(SimilarityCalculator::new(&config, delegate));
        let runner = BatchRunner::new(config.clone(), calculator);

        info!(
            "Engine ready (delegate {}, metric set {})",
            if runner.calculator().delegate_available() {
                "available"
            } else {
                "not available"
            },
            config.cache.metric_set_version
        );
        Ok(Self {
            config: Arc::new(config),
            runner,
        })
    }

    /// Get the current configuration
    pub fn config(&self) -> &CodesimConfig {
        &self.config
    }

    /// Compare two in-memory sources without touching the cache.
    pub fn compare_sources(&self, reference: &str, candidate: &str) -> SimilarityRecord {
        self.runner.calculator().compare_sources(reference, candidate)
    }

    /// Compare two artifacts without touching the cache.
    pub fn compare_artifacts(
        &self,
        reference: &CodeArtifact,
        candidate: &CodeArtifact,
    ) -> SimilarityRecord {
        self.runner.calculator().compare(reference, candidate)
    }

    /// Compare every ordered pair of an experiment directory.
    pub async fn run<P: AsRef<Path>>(
        &self,
        experiment_root: P,
        force_recompute: bool,
    ) -> Result<RunSummary> {
        let root = experiment_root.as_ref();
        if !root.is_dir() {
            return Err(CodesimError::input(
                root.display().to_string(),
                "experiment root does not exist or is not a directory",
            ));
        }
        info!("Starting similarity run over {}", root.display());
        self.runner.run(root, force_recompute).await
    }

    /// Token cancelling any run in progress.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.runner.cancellation_token()
    }

    /// Read API over the cache of `experiment_root`.
    pub fn reader<P: AsRef<Path>>(&self, experiment_root: P) -> ExperimentReader {
        ExperimentReader::new(experiment_root.as_ref(), &self.config)
    }

    /// Aggregates over every cached comparison of `experiment_root`.
    pub fn summary<P: AsRef<Path>>(&self, experiment_root: P) -> Result<ExperimentSummary> {
        self.reader(experiment_root).summary()
    }

    /// Summary, per-bucket consistency and temperature comparisons.
    pub fn report<P: AsRef<Path>>(&self, experiment_root: P) -> Result<SummaryExport> {
        self.reader(experiment_root).report()
    }

    /// Export the summary for the visualization layer, returning where it went.
    pub fn export_summary<P: AsRef<Path>>(
        &self,
        experiment_root: P,
        output: Option<&Path>,
    ) -> Result<(PathBuf, SummaryExport)> {
        let reader = self.reader(experiment_root);
        let path = output
            .map(Path::to_path_buf)
            .unwrap_or_else(|| reader.default_export_path());
        let export = reader.export_summary(&path)?;
        Ok((path, export))
    }
}
