//! External code-similarity delegate (CodeBLEU-style sub-scores).
//!
//! The delegate is an optional capability injected into the calculator. When
//! absent, records carry no delegate scores and the composite is computed from
//! the remaining components.

pub mod command;

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::core::config::DelegateConfig;
use crate::core::errors::CodesimError;

pub use command::CommandDelegate;

/// Failure of an external delegate call.
#[derive(Error, Debug)]
pub enum DelegateError {
    /// The delegate process could not be started or talked to
    #[error("failed to run delegate: {0}")]
    Spawn(#[source] std::io::Error),

    /// The delegate exited unsuccessfully
    #[error("delegate exited with {status}: {stderr}")]
    Exit {
        /// Exit status description
        status: String,
        /// Captured standard error, trimmed
        stderr: String,
    },

    /// The delegate answered with something other than the expected JSON
    #[error("malformed delegate response: {0}")]
    Protocol(String),

    /// A returned score was outside [0, 1] or not finite
    #[error("delegate score {field} out of range: {value}")]
    OutOfRange {
        /// Score name
        field: &'static str,
        /// Offending value
        value: f64,
    },

    /// The delegate did not answer in time
    #[error("delegate timed out after {0:?}")]
    Timeout(Duration),

    /// Any other delegate-reported failure
    #[error("{0}")]
    Failed(String),
}

impl DelegateError {
    /// Convert into the crate error, tagged with the delegate name.
    pub fn into_error(self, delegate: &str) -> CodesimError {
        CodesimError::delegate(delegate, self.to_string())
    }
}

/// Sub-scores reported by the delegate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DelegateScores {
    /// Keyword-weighted n-gram match
    #[serde(alias = "weighted_ngram_match_score")]
    pub weighted_ngram: f64,
    /// AST sub-tree match
    #[serde(alias = "syntax_match_score")]
    pub syntax_match: f64,
    /// Data-flow match
    #[serde(alias = "dataflow_match_score")]
    pub dataflow_match: f64,
}

impl DelegateScores {
    /// Scores recorded when the delegate failed.
    pub const ZERO: Self = Self {
        weighted_ngram: 0.0,
        syntax_match: 0.0,
        dataflow_match: 0.0,
    };

    /// Arithmetic mean of the three sub-scores.
    pub fn mean(&self) -> f64 {
        (self.weighted_ngram + self.syntax_match + self.dataflow_match) / 3.0
    }

    /// Reject non-finite or out-of-range values.
    pub fn validate(self) -> Result<Self, DelegateError> {
        for (field, value) in [
            ("weighted_ngram", self.weighted_ngram),
            ("syntax_match", self.syntax_match),
            ("dataflow_match", self.dataflow_match),
        ] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(DelegateError::OutOfRange { field, value });
            }
        }
        Ok(self)
    }
}

/// A code-similarity scorer living outside this crate.
pub trait SimilarityDelegate: Send + Sync {
    /// Short name used in logs and error records.
    fn name(&self) -> &str;

    /// Score `candidate` against `reference`.
    fn score(
        &self,
        reference: &str,
        candidate: &str,
        language: &str,
    ) -> Result<DelegateScores, DelegateError>;
}

/// Optional delegate handed to the calculator.
#[derive(Clone, Default)]
pub struct DelegateCapability(Option<Arc<dyn SimilarityDelegate>>);

impl DelegateCapability {
    /// No delegate available.
    pub fn none() -> Self {
        Self(None)
    }

    /// Wrap a delegate.
    pub fn new(delegate: Arc<dyn SimilarityDelegate>) -> Self {
        Self(Some(delegate))
    }

    /// Build from configuration: a command delegate when one is configured.
    pub fn from_config(config: &DelegateConfig, timeout: Duration) -> Self {
        match &config.command {
            Some(command) => Self::new(Arc::new(CommandDelegate::new(command.clone(), timeout))),
            None => Self::none(),
        }
    }

    /// Whether a delegate is present.
    pub fn is_available(&self) -> bool {
        self.0.is_some()
    }

    /// The delegate, if present.
    pub fn get(&self) -> Option<&dyn SimilarityDelegate> {
        self.0.as_deref()
    }
}

impl fmt::Debug for DelegateCapability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.0 {
            Some(delegate) => write!(f, "DelegateCapability({})", delegate.name()),
            None => write!(f, "DelegateCapability(none)"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Fixed(DelegateScores);

    impl SimilarityDelegate for Fixed {
        fn name(&self) -> &str {
            "fixed"
        }

        fn score(&self, _: &str, _: &str, _: &str) -> Result<DelegateScores, DelegateError> {
            Ok(self.0)
        }
    }

    #[test]
    fn capability_defaults_to_absent() {
        let capability = DelegateCapability::default();
        assert!(!capability.is_available());
        assert!(capability.get().is_none());
        assert_eq!(format!("{capability:?}"), "DelegateCapability(none)");
    }

    #[test]
    fn capability_exposes_injected_delegate() {
        let scores = DelegateScores {
            weighted_ngram: 0.5,
            syntax_match: 0.25,
            dataflow_match: 0.75,
        };
        let capability = DelegateCapability::new(Arc::new(Fixed(scores)));
        let delegate = capability.get().expect("present");
        assert_eq!(delegate.name(), "fixed");
        assert_eq!(delegate.score("a", "b", "python").unwrap().mean(), 0.5);
    }

    #[test]
    fn from_config_without_command_is_absent() {
        let capability =
            DelegateCapability::from_config(&DelegateConfig::default(), Duration::from_secs(1));
        assert!(!capability.is_available());
    }

    #[test]
    fn out_of_range_scores_are_rejected() {
        let scores = DelegateScores {
            weighted_ngram: 1.2,
            syntax_match: 0.5,
            dataflow_match: 0.5,
        };
        assert!(matches!(
            scores.validate(),
            Err(DelegateError::OutOfRange { field: "weighted_ngram", .. })
        ));

        let scores = DelegateScores {
            dataflow_match: f64::NAN,
            ..DelegateScores::ZERO
        };
        assert!(scores.validate().is_err());
    }

    #[test]
    fn codebleu_field_names_are_accepted() {
        let json = r#"{"weighted_ngram_match_score":0.4,"syntax_match_score":0.6,"dataflow_match_score":0.8}"#;
        let scores: DelegateScores = serde_json::from_str(json).unwrap();
        assert_eq!(scores.syntax_match, 0.6);
    }

    #[test]
    fn delegate_error_maps_to_crate_error() {
        let err = DelegateError::Failed("boom".into()).into_error("codebleu");
        assert_eq!(err.kind_label(), "DelegateError");
        assert!(err.to_string().contains("codebleu"));
    }
}
