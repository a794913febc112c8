//! Syntactic validity guard for structure-dependent metrics.

use serde::{Deserialize, Serialize};
use tree_sitter::Tree;

use crate::lang::python::PythonAdapter;

/// Whether source text parses cleanly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum Validity {
    /// No error or missing nodes
    Valid,
    /// Parse failed or produced error nodes
    Invalid {
        /// Location and nature of the first problem
        reason: String,
    },
}

impl Validity {
    /// Whether this is [`Validity::Valid`].
    pub fn is_valid(&self) -> bool {
        matches!(self, Self::Valid)
    }

    /// Reason for invalidity, if any.
    pub fn reason(&self) -> Option<&str> {
        match self {
            Self::Valid => None,
            Self::Invalid { reason } => Some(reason),
        }
    }
}

/// Gate deciding whether structural and delegate metrics may run.
pub struct ValidityGuard;

impl ValidityGuard {
    /// Parse `code` and report its validity.
    pub fn check(code: &str) -> Validity {
        Self::check_parsed(code).0
    }

    /// Parse `code`, returning its validity and the tree when valid.
    pub fn check_parsed(code: &str) -> (Validity, Option<Tree>) {
        let parsed = PythonAdapter::new().and_then(|mut adapter| adapter.parse(code));
        match parsed {
            Ok(tree) => {
                let validity = Self::check_tree(&tree);
                if validity.is_valid() {
                    (validity, Some(tree))
                } else {
                    (validity, None)
                }
            }
            Err(err) => (
                Validity::Invalid {
                    reason: err.to_string(),
                },
                None,
            ),
        }
    }

    /// Validity of an already parsed tree.
    pub fn check_tree(tree: &Tree) -> Validity {
        match PythonAdapter::first_error(tree) {
            None => Validity::Valid,
            Some(location) => Validity::Invalid {
                reason: location.describe(),
            },
        }
    }
}
