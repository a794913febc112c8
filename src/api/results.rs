//! Similarity records and their components.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::core::errors::CodesimError;
use crate::detectors::delegate::DelegateScores;
use crate::detectors::lexical::JaccardScores;
use crate::detectors::structure::{StructuralComparison, Validity};

/// Outcome of the external delegate for one comparison.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DelegateStatus {
    /// Delegate ran and returned valid scores
    Computed,
    /// No delegate configured
    NotAvailable,
    /// At least one side failed to parse
    SkippedInvalidInput,
    /// Delegate ran and failed; scores are zero
    Failed,
    /// The pair was never compared
    NotRun,
}

/// Validity of both sides of a comparison.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PairValidity {
    /// Reference artifact
    pub reference: Validity,
    /// Candidate artifact
    pub candidate: Validity,
}

impl PairValidity {
    /// Whether both sides parse cleanly.
    pub fn both_valid(&self) -> bool {
        self.reference.is_valid() && self.candidate.is_valid()
    }
}

/// Error annotation carried by a record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordError {
    /// Error class, e.g. `InputError` or `ParseError`
    pub kind: String,
    /// Human-readable description
    pub message: String,
}

impl From<&CodesimError> for RecordError {
    fn from(err: &CodesimError) -> Self {
        Self {
            kind: err.kind_label().to_string(),
            message: err.to_string(),
        }
    }
}

/// Result of comparing a candidate artifact against a reference artifact.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityRecord {
    /// Unsmoothed BLEU
    pub bleu: f64,
    /// Structural sub-scores; absent when either side is invalid
    pub structural: Option<StructuralComparison>,
    /// Delegate sub-scores; absent when no delegate ran
    pub delegate_scores: Option<DelegateScores>,
    /// What happened with the delegate
    pub delegate_status: DelegateStatus,
    /// Token-set Jaccard scores
    pub jaccard: JaccardScores,
    /// Parse validity of both sides; absent when the pair never ran
    pub validity: Option<PairValidity>,
    /// Weighted mean of the available components
    pub composite: f64,
    /// Error annotation
    pub error: Option<RecordError>,
    /// When the record was computed
    pub computed_at: DateTime<Utc>,
}

impl SimilarityRecord {
    /// Zero-valued record for a pair that could not be compared at all.
    pub fn failed(error: &CodesimError) -> Self {
        Self {
            bleu: 0.0,
            structural: None,
            delegate_scores: None,
            delegate_status: DelegateStatus::NotRun,
            jaccard: JaccardScores::ZERO,
            validity: None,
            composite: 0.0,
            error: Some(RecordError::from(error)),
            computed_at: Utc::now(),
        }
    }

    /// Whether the record carries an error annotation.
    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Whether the metrics were actually computed. Records of pairs that
    /// never ran carry zeros only.
    pub fn was_compared(&self) -> bool {
        self.validity.is_some()
    }

    /// Structural side of the composite; absent when structure was skipped.
    pub fn structural_similarity(&self) -> Option<f64> {
        self.structural.as_ref().map(StructuralComparison::similarity)
    }

    /// Semantic side of the composite: identifier overlap, averaged with the
    /// delegate mean when the delegate computed scores.
    pub fn semantic_similarity(&self) -> f64 {
        match (&self.delegate_scores, self.delegate_status) {
            (Some(scores), DelegateStatus::Computed) => {
                (scores.mean() + self.jaccard.identifiers) / 2.0
            }
            _ => self.jaccard.identifiers,
        }
    }

    /// Whether the scores of two records are identical, ignoring `computed_at`.
    pub fn same_scores(&self, other: &Self) -> bool {
        self.bleu.to_bits() == other.bleu.to_bits()
            && self.composite.to_bits() == other.composite.to_bits()
            && self.structural == other.structural
            && self.delegate_scores == other.delegate_scores
            && self.delegate_status == other.delegate_status
            && self.jaccard == other.jaccard
            && self.validity == other.validity
            && self.error == other.error
    }

    /// Named metrics of this record, for aggregation.
    pub fn metric_values(&self) -> Vec<(&'static str, f64)> {
        let mut values = vec![
            ("bleu", self.bleu),
            ("composite", self.composite),
            ("jaccard_tokens", self.jaccard.tokens),
            ("jaccard_words", self.jaccard.words),
            ("jaccard_identifiers", self.jaccard.identifiers),
            ("jaccard_keywords", self.jaccard.keywords),
            ("jaccard_ast_names", self.jaccard.ast_names),
            ("semantic_similarity", self.semantic_similarity()),
        ];
        if let Some(structural) = &self.structural {
            values.push(("node_count_delta", structural.node_count_delta));
            values.push(("depth_delta", structural.depth_delta));
            values.push(("histogram_similarity", structural.histogram_similarity));
            values.push(("histogram_distance", structural.histogram_distance));
            values.push(("subtree_overlap", structural.subtree_overlap));
            values.push(("structural_similarity", structural.similarity()));
            if let Some(edit) = structural.edit_similarity {
                values.push(("edit_similarity", edit));
            }
            if let Some(weighted) = structural.weighted_edit_similarity {
                values.push(("weighted_edit_similarity", weighted));
            }
        }
        if let (Some(scores), DelegateStatus::Computed) = (&self.delegate_scores, self.delegate_status) {
            values.push(("delegate_weighted_ngram", scores.weighted_ngram));
            values.push(("delegate_syntax_match", scores.syntax_match));
            values.push(("delegate_dataflow_match", scores.dataflow_match));
            values.push(("delegate_mean", scores.mean()));
        }
        values
    }
}
