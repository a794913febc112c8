//! Batch runner: enumerates ordered pairs per bucket and drives them through
//! the cache and calculator on a bounded worker pool.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::{self, StreamExt};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::api::results::SimilarityRecord;
use crate::core::artifact::{ArtifactId, ArtifactLocation, CodeArtifact, ExperimentBucket};
use crate::core::config::CodesimConfig;
use crate::core::errors::{CodesimError, Result};
use crate::core::similarity::SimilarityCalculator;
use crate::detectors::delegate::DelegateCapability;
use crate::io::cache::{
    ComparisonKey, ComparisonStore, JsonComparisonStore, UNREADABLE_FINGERPRINT,
};

use super::discovery::{discover_artifacts, group_into_buckets};

/// Why a pair ended in the error state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PairErrorKind {
    /// An artifact of the pair could not be read
    Input,
    /// The comparison exceeded its time budget
    Timeout,
    /// The worker failed unexpectedly
    Internal,
}

/// A pair that ended in the error state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairFailure {
    /// Reference artifact
    pub reference: ArtifactId,
    /// Candidate artifact
    pub candidate: ArtifactId,
    /// Failure class
    pub kind: PairErrorKind,
    /// Zero-valued record carrying the error
    pub record: SimilarityRecord,
}

/// Outcome counts of one batch run.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RunSummary {
    /// Ordered pairs formed
    pub attempted: usize,
    /// Pairs served from the cache, stored error records included
    pub cache_hits: usize,
    /// Pairs computed and cached
    pub computed: usize,
    /// Pairs that ended in error during this run
    pub errors: usize,
    /// Pairs never started or dropped because the run was cancelled
    pub cancelled: usize,
    /// Details of every errored pair
    pub failures: Vec<PairFailure>,
}

enum PairOutcome {
    CacheHit,
    Computed,
    Failed(PairFailure),
    Cancelled,
    Fatal(CodesimError),
}

type LoadedArtifact = std::result::Result<Arc<CodeArtifact>, Arc<CodesimError>>;
type LoadedBucket = (ExperimentBucket, Vec<LoadedArtifact>);

struct PairJob {
    reference_id: ArtifactId,
    candidate_id: ArtifactId,
    reference: LoadedArtifact,
    candidate: LoadedArtifact,
}

impl PairJob {
    fn key(&self, metric_set_version: &str) -> Result<ComparisonKey> {
        ComparisonKey::from_parts(
            &self.reference_id,
            fingerprint_of(&self.reference),
            &self.candidate_id,
            fingerprint_of(&self.candidate),
            metric_set_version,
        )
    }
}

fn fingerprint_of(loaded: &LoadedArtifact) -> &str {
    match loaded {
        Ok(artifact) => artifact.fingerprint(),
        Err(_) => UNREADABLE_FINGERPRINT,
    }
}

/// Whichever of the worker and the deadline claims a pair first owns its
/// cache entry.
#[derive(Clone, Default)]
struct Settlement(Arc<AtomicBool>);

impl Settlement {
    fn claim(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }
}

/// Runs every ordered pair of an experiment through the comparison cache.
pub struct BatchRunner {
    config: Arc<CodesimConfig>,
    calculator: Arc<SimilarityCalculator>,
    store: Option<Arc<dyn ComparisonStore>>,
    cancel: CancellationToken,
}

impl BatchRunner {
    /// Create a runner around an existing calculator.
    pub fn new(config: CodesimConfig, calculator: Arc<SimilarityCalculator>) -> Self {
        Self {
            config: Arc::new(config),
            calculator,
            store: None,
            cancel: CancellationToken::new(),
        }
    }

    /// Validate `config` and build the calculator and delegate it describes.
    pub fn from_config(config: CodesimConfig) -> Result<Self> {
        config.validate()?;
        let delegate =
            DelegateCapability::from_config(&config.delegate, config.batch.pair_timeout());
        let calculator = Arc::new(SimilarityCalculator::new(&config, delegate));
        Ok(Self::new(config, calculator))
    }

    /// Use `store` instead of the per-root JSON store.
    pub fn with_store(mut self, store: Arc<dyn ComparisonStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Token that cancels every run of this runner.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// The shared calculator.
    pub fn calculator(&self) -> &Arc<SimilarityCalculator> {
        &self.calculator
    }

    /// Runner configuration.
    pub fn config(&self) -> &CodesimConfig {
        &self.config
    }

    /// Discover and compare every ordered pair under `experiment_root`.
    pub async fn run(&self, experiment_root: &Path, force_recompute: bool) -> Result<RunSummary> {
        let locations = discover_artifacts(experiment_root, &self.config.batch.source_extension)?;
        self.run_artifacts(experiment_root, locations, force_recompute)
            .await
    }

    /// Compare every ordered pair within the buckets of an explicit list,
    /// caching under `experiment_root` unless a store was injected.
    pub async fn run_artifacts(
        &self,
        experiment_root: &Path,
        locations: Vec<ArtifactLocation>,
        force_recompute: bool,
    ) -> Result<RunSummary> {
        let store = self.store_for(experiment_root);
        let result = self.run_with_store(locations, store, force_recompute).await;
        self.calculator.clear_analyses();
        result
    }

    fn store_for(&self, experiment_root: &Path) -> Arc<dyn ComparisonStore> {
        match &self.store {
            Some(store) => Arc::clone(store),
            None => Arc::new(JsonComparisonStore::new(
                self.config.cache_dir_for(experiment_root),
                self.config.cache.metric_set_version.clone(),
            )),
        }
    }

    async fn run_with_store(
        &self,
        locations: Vec<ArtifactLocation>,
        store: Arc<dyn ComparisonStore>,
        force_recompute: bool,
    ) -> Result<RunSummary> {
        let started = Instant::now();
        let buckets = group_into_buckets(locations);
        let bucket_count = buckets.len();

        let loaded = tokio::task::spawn_blocking(move || load_buckets(buckets))
            .await
            .map_err(|e| CodesimError::internal(format!("artifact loading failed: {e}")))?;

        let jobs = form_pairs(loaded);
        info!(
            "Comparing {} ordered pairs across {} buckets with {} workers",
            jobs.len(),
            bucket_count,
            self.config.batch.workers
        );

        let run_token = self.cancel.child_token();
        let mut summary = RunSummary {
            attempted: jobs.len(),
            ..RunSummary::default()
        };
        let mut fatal: Option<CodesimError> = None;

        let mut outcomes = stream::iter(jobs)
            .map(|job| {
                self.process_pair(job, Arc::clone(&store), run_token.clone(), force_recompute)
            })
            .buffer_unordered(self.config.batch.workers.max(1));

        while let Some(outcome) = outcomes.next().await {
            match outcome {
                PairOutcome::CacheHit => summary.cache_hits += 1,
                PairOutcome::Computed => summary.computed += 1,
                PairOutcome::Cancelled => summary.cancelled += 1,
                PairOutcome::Failed(failure) => {
                    summary.errors += 1;
                    summary.failures.push(failure);
                }
                PairOutcome::Fatal(err) => {
                    summary.cancelled += 1;
                    if fatal.is_none() {
                        warn!("Aborting run: {}", err);
                        run_token.cancel();
                        fatal = Some(err);
                    }
                }
            }
        }

        if let Some(err) = fatal {
            return Err(err);
        }

        summary
            .failures
            .sort_by(|a, b| (&a.reference, &a.candidate).cmp(&(&b.reference, &b.candidate)));
        info!(
            "Run finished in {:.2?}: {} attempted, {} cache hits, {} computed, {} errors, {} cancelled",
            started.elapsed(),
            summary.attempted,
            summary.cache_hits,
            summary.computed,
            summary.errors,
            summary.cancelled
        );
        Ok(summary)
    }

    async fn process_pair(
        &self,
        job: PairJob,
        store: Arc<dyn ComparisonStore>,
        run_cancel: CancellationToken,
        force_recompute: bool,
    ) -> PairOutcome {
        if run_cancel.is_cancelled() {
            return PairOutcome::Cancelled;
        }

        let key = match job.key(store.metric_set_version()) {
            Ok(key) => key,
            Err(err) => {
                warn!(
                    "Pair {} -> {} cannot be keyed: {}",
                    job.reference_id, job.candidate_id, err
                );
                return PairOutcome::Failed(PairFailure {
                    record: SimilarityRecord::failed(&err),
                    reference: job.reference_id,
                    candidate: job.candidate_id,
                    kind: PairErrorKind::Internal,
                });
            }
        };

        let pair_cancel = run_cancel.child_token();
        let settlement = Settlement::default();
        let mut handle = {
            let calculator = Arc::clone(&self.calculator);
            let store = Arc::clone(&store);
            let key = key.clone();
            let cancel = pair_cancel.clone();
            let settlement = settlement.clone();
            tokio::task::spawn_blocking(move || {
                compare_pair(
                    &calculator,
                    store.as_ref(),
                    &job,
                    &key,
                    &cancel,
                    &settlement,
                    force_recompute,
                )
            })
        };

        let timeout = self.config.batch.pair_timeout();
        let joined = match tokio::time::timeout(timeout, &mut handle).await {
            Ok(joined) => joined,
            Err(_) => {
                pair_cancel.cancel();
                if settlement.claim() {
                    let err = CodesimError::timeout(
                        format!("comparison {} -> {}", key.reference, key.candidate),
                        timeout.as_secs(),
                    );
                    warn!("{}", err);
                    return record_failure(store, key, PairErrorKind::Timeout, &err).await;
                }
                // The worker was already writing its entry when the deadline hit
                handle.await
            }
        };

        match joined {
            Ok(Ok(outcome)) => outcome,
            Ok(Err(err)) if err.is_fatal() => PairOutcome::Fatal(err),
            Ok(Err(err)) => {
                warn!("Pair {} -> {} failed: {}", key.reference, key.candidate, err);
                record_failure(store, key, PairErrorKind::Internal, &err).await
            }
            Err(join_err) => {
                let err = CodesimError::internal(format!("comparison worker failed: {join_err}"));
                warn!("Pair {} -> {} failed: {}", key.reference, key.candidate, err);
                record_failure(store, key, PairErrorKind::Internal, &err).await
            }
        }
    }
}

/// Lookup-or-compute for one pair. Unreadable pairs store their error record.
/// The result is dropped instead of written once the pair is cancelled or the
/// deadline has claimed it.
fn compare_pair(
    calculator: &SimilarityCalculator,
    store: &dyn ComparisonStore,
    job: &PairJob,
    key: &ComparisonKey,
    cancel: &CancellationToken,
    settlement: &Settlement,
    force_recompute: bool,
) -> Result<PairOutcome> {
    if !force_recompute && store.get(key)?.is_some() {
        debug!("Cache hit {} -> {}", key.reference, key.candidate);
        settlement.claim();
        return Ok(PairOutcome::CacheHit);
    }

    let (record, failed) = match (&job.reference, &job.candidate) {
        (Ok(reference), Ok(candidate)) => (calculator.compare(reference, candidate), None),
        (Err(err), _) | (_, Err(err)) => {
            debug!("Pair {} -> {} not compared: {}", key.reference, key.candidate, err);
            (SimilarityRecord::failed(err), Some(PairErrorKind::Input))
        }
    };

    if cancel.is_cancelled() || !settlement.claim() {
        return Ok(PairOutcome::Cancelled);
    }
    store.put(key, &record)?;

    Ok(match failed {
        None => PairOutcome::Computed,
        Some(kind) => PairOutcome::Failed(PairFailure {
            reference: key.reference.clone(),
            candidate: key.candidate.clone(),
            kind,
            record,
        }),
    })
}

/// Store the zero-valued error record of a pair that did not complete.
async fn record_failure(
    store: Arc<dyn ComparisonStore>,
    key: ComparisonKey,
    kind: PairErrorKind,
    err: &CodesimError,
) -> PairOutcome {
    let record = SimilarityRecord::failed(err);
    let failure = PairFailure {
        reference: key.reference.clone(),
        candidate: key.candidate.clone(),
        kind,
        record: record.clone(),
    };

    match tokio::task::spawn_blocking(move || store.put(&key, &record)).await {
        Ok(Ok(())) => PairOutcome::Failed(failure),
        Ok(Err(err)) if err.is_fatal() => PairOutcome::Fatal(err),
        Ok(Err(err)) => {
            warn!("Error record not stored: {}", err);
            PairOutcome::Failed(failure)
        }
        Err(join_err) => PairOutcome::Fatal(CodesimError::internal(format!(
            "error record writer failed: {join_err}"
        ))),
    }
}

/// Read every bucket member in parallel.
fn load_buckets(buckets: Vec<ExperimentBucket>) -> Vec<LoadedBucket> {
    buckets
        .into_par_iter()
        .map(|bucket| {
            let artifacts = bucket
                .members
                .par_iter()
                .map(|location| {
                    location.load().map(Arc::new).map_err(|err| {
                        warn!("Unreadable artifact {}: {}", location.path.display(), err);
                        Arc::new(err)
                    })
                })
                .collect();
            (bucket, artifacts)
        })
        .collect()
}

/// Every ordered pair across distinct iterations of each bucket.
fn form_pairs(loaded: Vec<LoadedBucket>) -> Vec<PairJob> {
    let mut jobs = Vec::new();
    for (bucket, artifacts) in loaded {
        for (r, c) in bucket.ordered_pairs() {
            jobs.push(PairJob {
                reference_id: bucket.members[r].id.clone(),
                candidate_id: bucket.members[c].id.clone(),
                reference: artifacts[r].clone(),
                candidate: artifacts[c].clone(),
            });
        }
    }
    jobs
}

#[cfg(test)]
#[path = "batch_runner_tests.rs"]
mod tests;
