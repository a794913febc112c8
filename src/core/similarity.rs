//! Composite similarity calculator.
//!
//! Runs the validity guard, lexical metrics, structural comparison and the
//! optional delegate for one ordered pair and merges them into a
//! [`SimilarityRecord`]. No metric failure escapes this module: parse and
//! delegate problems are recorded on the record itself.

use std::sync::Arc;

use chrono::Utc;
use dashmap::DashMap;
use tracing::{debug, warn};

use crate::api::results::{DelegateStatus, PairValidity, RecordError, SimilarityRecord};
use crate::core::artifact::CodeArtifact;
use crate::core::config::{CodesimConfig, CompositeWeights};
use crate::core::errors::CodesimError;
use crate::core::file_utils::content_fingerprint;
use crate::detectors::delegate::{DelegateCapability, DelegateScores};
use crate::detectors::lexical::{bleu_with_order, JaccardProfile, JaccardScores};
use crate::detectors::structure::{
    compare_structures, StructureProfile, StructureTree, Validity, ValidityGuard,
};
use crate::lang::python::LANGUAGE_NAME;

/// Per-artifact analysis reused across every pair the artifact takes part in.
#[derive(Debug)]
pub struct ArtifactAnalysis {
    /// Parse validity
    pub validity: Validity,
    /// Structural profile, present only for valid sources
    pub structure: Option<StructureProfile>,
    /// Token sets for Jaccard scoring
    pub jaccard: JaccardProfile,
}

impl ArtifactAnalysis {
    /// Parse once and derive everything pairwise comparison needs.
    pub fn build(source: &str, ted_max_nodes: usize) -> Self {
        let (validity, tree) = ValidityGuard::check_parsed(source);
        let structure = tree.as_ref().map(|tree| {
            StructureProfile::from_structure(&StructureTree::from_tree(tree, source), ted_max_nodes)
        });
        let jaccard = JaccardProfile::build(source, tree.as_ref());

        Self {
            validity,
            structure,
            jaccard,
        }
    }
}

/// Merges lexical, structural and delegate scores for ordered pairs.
pub struct SimilarityCalculator {
    bleu_max_order: usize,
    weights: CompositeWeights,
    ted_max_nodes: usize,
    language: String,
    delegate: DelegateCapability,
    analyses: DashMap<String, Arc<ArtifactAnalysis>>,
}

impl SimilarityCalculator {
    /// Create a calculator from configuration and an optional delegate.
    pub fn new(config: &CodesimConfig, delegate: DelegateCapability) -> Self {
        Self {
            bleu_max_order: config.bleu.max_order,
            weights: config.composite.clone(),
            ted_max_nodes: config.structure.ted_max_nodes,
            language: config.delegate.language.clone(),
            delegate,
            analyses: DashMap::new(),
        }
    }

    /// Calculator with default settings and no delegate.
    pub fn with_defaults() -> Self {
        Self::new(&CodesimConfig::default(), DelegateCapability::none())
    }

    /// Whether a delegate is configured.
    pub fn delegate_available(&self) -> bool {
        self.delegate.is_available()
    }

    /// Number of memoised per-artifact analyses.
    pub fn cached_analyses(&self) -> usize {
        self.analyses.len()
    }

    /// Drop every memoised analysis.
    pub fn clear_analyses(&self) {
        self.analyses.clear();
    }

    /// Analysis for `source`, memoised by content fingerprint.
    pub fn analysis(&self, fingerprint: &str, source: &str) -> Arc<ArtifactAnalysis> {
        if let Some(entry) = self.analyses.get(fingerprint) {
            return Arc::clone(entry.value());
        }

        let analysis = Arc::new(ArtifactAnalysis::build(source, self.ted_max_nodes));
        let entry = self
            .analyses
            .entry(fingerprint.to_string())
            .or_insert(analysis);
        Arc::clone(entry.value())
    }

    /// Compare `candidate` against `reference`.
    pub fn compare(&self, reference: &CodeArtifact, candidate: &CodeArtifact) -> SimilarityRecord {
        debug!("Comparing {} -> {}", reference.id(), candidate.id());
        self.compare_with_fingerprints(
            reference.source(),
            reference.fingerprint(),
            candidate.source(),
            candidate.fingerprint(),
        )
    }

    /// Compare raw source texts.
    pub fn compare_sources(&self, reference: &str, candidate: &str) -> SimilarityRecord {
        self.compare_with_fingerprints(
            reference,
            &content_fingerprint(reference),
            candidate,
            &content_fingerprint(candidate),
        )
    }

    fn compare_with_fingerprints(
        &self,
        reference: &str,
        reference_fingerprint: &str,
        candidate: &str,
        candidate_fingerprint: &str,
    ) -> SimilarityRecord {
        let reference_analysis = self.analysis(reference_fingerprint, reference);
        let candidate_analysis = self.analysis(candidate_fingerprint, candidate);

        let validity = PairValidity {
            reference: reference_analysis.validity.clone(),
            candidate: candidate_analysis.validity.clone(),
        };

        let bleu = bleu_with_order(reference, candidate, self.bleu_max_order);
        let jaccard = JaccardScores::between(&reference_analysis.jaccard, &candidate_analysis.jaccard);

        let mut error = None;
        let (structural, delegate_scores, delegate_status) = if validity.both_valid() {
            let structural = match (&reference_analysis.structure, &candidate_analysis.structure) {
                (Some(a), Some(b)) => Some(compare_structures(a, b)),
                _ => None,
            };

            let (scores, status) = match self.delegate.get() {
                None => (None, DelegateStatus::NotAvailable),
                Some(delegate) => match delegate.score(reference, candidate, &self.language) {
                    Ok(scores) => (Some(scores), DelegateStatus::Computed),
                    Err(err) => {
                        let err = err.into_error(delegate.name());
                        warn!("Delegate failed, excluding it from the composite: {}", err);
                        error = Some(RecordError::from(&err));
                        (Some(DelegateScores::ZERO), DelegateStatus::Failed)
                    }
                },
            };
            (structural, scores, status)
        } else {
            let err = invalid_input_error(&validity);
            debug!("Structural and delegate metrics skipped: {}", err);
            error = Some(RecordError::from(&err));
            (None, None, DelegateStatus::SkippedInvalidInput)
        };

        let delegate_mean = match (delegate_status, &delegate_scores) {
            (DelegateStatus::Computed, Some(scores)) => Some(scores.mean()),
            _ => None,
        };
        let composite = composite_score(
            &self.weights,
            bleu,
            structural.as_ref().map(|s| s.similarity()),
            delegate_mean,
        );

        SimilarityRecord {
            bleu,
            structural,
            delegate_scores,
            delegate_status,
            jaccard,
            validity: Some(validity),
            composite,
            error,
            computed_at: Utc::now(),
        }
    }
}

fn invalid_input_error(validity: &PairValidity) -> CodesimError {
    let mut reasons = Vec::new();
    if let Some(reason) = validity.reference.reason() {
        reasons.push(format!("reference: {reason}"));
    }
    if let Some(reason) = validity.candidate.reason() {
        reasons.push(format!("candidate: {reason}"));
    }
    CodesimError::parse(LANGUAGE_NAME, reasons.join("; "))
}

/// Weighted mean over the components that are present, renormalizing the
/// weights of the rest.
pub fn composite_score(
    weights: &CompositeWeights,
    bleu: f64,
    structural: Option<f64>,
    delegate: Option<f64>,
) -> f64 {
    let mut weighted = weights.bleu * bleu;
    let mut total_weight = weights.bleu;

    if let Some(structural) = structural {
        weighted += weights.structural * structural;
        total_weight += weights.structural;
    }
    if let Some(delegate) = delegate {
        weighted += weights.delegate * delegate;
        total_weight += weights.delegate;
    }

    if total_weight <= 0.0 {
        return 0.0;
    }
    (weighted / total_weight).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::delegate::{DelegateError, SimilarityDelegate};
    use approx::assert_relative_eq;

    struct Constant(f64);

    impl SimilarityDelegate for Constant {
        fn name(&self) -> &str {
            "constant"
        }

        fn score(&self, _: &str, _: &str, _: &str) -> Result<DelegateScores, DelegateError> {
            Ok(DelegateScores {
                weighted_ngram: self.0,
                syntax_match: self.0,
                dataflow_match: self.0,
            })
        }
    }

    struct Broken;

    impl SimilarityDelegate for Broken {
        fn name(&self) -> &str {
            "broken"
        }

        fn score(&self, _: &str, _: &str, _: &str) -> Result<DelegateScores, DelegateError> {
            Err(DelegateError::Failed("codebleu not installed".into()))
        }
    }

    fn calculator_with(delegate: DelegateCapability) -> SimilarityCalculator {
        SimilarityCalculator::new(&CodesimConfig::default(), delegate)
    }

    const ADD: &str = "def add(a, b):\n    return a + b\n";

    #[test]
    fn identical_snippets_without_delegate() {
        let calc = SimilarityCalculator::with_defaults();
        let record = calc.compare_sources(ADD, ADD);

        assert_eq!(record.bleu, 1.0);
        let structural = record.structural.as_ref().expect("structural present");
        assert_eq!(structural.node_count_delta, 0.0);
        assert_eq!(structural.depth_delta, 0.0);
        assert_relative_eq!(structural.histogram_similarity, 1.0, epsilon = 1e-12);
        assert_eq!(record.delegate_scores, None);
        assert_eq!(record.delegate_status, DelegateStatus::NotAvailable);
        assert!(record.error.is_none());
        assert_relative_eq!(record.composite, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn delegate_scores_enter_the_composite() {
        let calc = calculator_with(DelegateCapability::new(Arc::new(Constant(0.5))));
        let record = calc.compare_sources(ADD, ADD);

        assert_eq!(record.delegate_status, DelegateStatus::Computed);
        // 0.3 * 1 + 0.3 * 1 + 0.4 * 0.5
        assert_relative_eq!(record.composite, 0.8, epsilon = 1e-9);
    }

    #[test]
    fn failed_delegate_is_zeroed_and_excluded() {
        let calc = calculator_with(DelegateCapability::new(Arc::new(Broken)));
        let record = calc.compare_sources(ADD, ADD);

        assert_eq!(record.delegate_status, DelegateStatus::Failed);
        assert_eq!(record.delegate_scores, Some(DelegateScores::ZERO));
        assert_eq!(record.bleu, 1.0);
        assert!(record.structural.is_some());
        let error = record.error.as_ref().expect("annotated");
        assert_eq!(error.kind, "DelegateError");
        assert!(error.message.contains("codebleu not installed"));
        assert_relative_eq!(record.composite, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn invalid_candidate_skips_structure_and_delegate() {
        let calc = calculator_with(DelegateCapability::new(Arc::new(Constant(1.0))));
        let record = calc.compare_sources(ADD, "def add(a, b:\n    return a + b\n");

        assert!(record.structural.is_none());
        assert!(record.delegate_scores.is_none());
        assert_eq!(record.delegate_status, DelegateStatus::SkippedInvalidInput);
        let validity = record.validity.as_ref().unwrap();
        assert!(validity.reference.is_valid());
        assert!(!validity.candidate.is_valid());
        let error = record.error.as_ref().unwrap();
        assert_eq!(error.kind, "ParseError");
        assert!(error.message.contains("candidate"));
        assert!(record.bleu > 0.0);
        assert_relative_eq!(record.composite, record.bleu, epsilon = 1e-12);
    }

    #[test]
    fn results_are_deterministic_and_memoised() {
        let calc = SimilarityCalculator::with_defaults();
        let other = "def add(x, y):\n    return x + y\n";
        let first = calc.compare_sources(ADD, other);
        let second = calc.compare_sources(ADD, other);
        assert!(first.same_scores(&second));
        assert_eq!(calc.cached_analyses(), 2);

        calc.clear_analyses();
        assert_eq!(calc.cached_analyses(), 0);
        assert!(calc.compare_sources(ADD, other).same_scores(&first));
    }

    #[test]
    fn direction_matters_for_bleu() {
        let calc = SimilarityCalculator::with_defaults();
        let short = "x = a + b\n";
        let long = "x = a + b\ny = x * 2\nprint(y)\n";
        let forward = calc.compare_sources(long, short);
        let backward = calc.compare_sources(short, long);
        assert!(forward.bleu < backward.bleu);
    }

    #[test]
    fn composite_renormalizes_missing_components() {
        let weights = CompositeWeights::default();
        assert_relative_eq!(composite_score(&weights, 0.4, None, None), 0.4, epsilon = 1e-12);
        assert_relative_eq!(
            composite_score(&weights, 0.4, Some(0.8), None),
            0.6,
            epsilon = 1e-12
        );
        let zero_bleu = CompositeWeights {
            bleu: 0.0,
            ..CompositeWeights::default()
        };
        assert_eq!(composite_score(&zero_bleu, 0.9, None, None), 0.0);
    }
}
