//! Structural similarity over tree-sitter parse trees.
//!
//! The [`analyzer`] flattens a parse into named, non-comment nodes and derives
//! per-artifact metrics; [`validity`] gates which artifacts are eligible;
//! [`comparison`] turns two analyzed artifacts into normalized sub-scores.

pub mod analyzer;
pub mod comparison;
pub mod validity;

pub use analyzer::{analyze, analyze_file, AnalysisErrorKind, StructuralFingerprint, StructureTree};
pub use comparison::{compare_structures, StructuralComparison, StructureProfile};
pub use validity::{Validity, ValidityGuard};
