//! Experiment pipeline: artifact discovery and the batch runner that drives
//! every ordered pair through the comparison cache.

pub mod batch_runner;
pub mod discovery;

pub use batch_runner::{BatchRunner, PairErrorKind, PairFailure, RunSummary};
pub use discovery::{code_root, discover_artifacts, group_into_buckets};
