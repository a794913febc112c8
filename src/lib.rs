//! # Codesim-RS: Similarity Analysis for Generated Code
//!
//! Measures how alike the code artifacts produced by different models,
//! prompt strategies and sampling temperatures are. The library provides:
//!
//! - **Lexical Similarity**: unsmoothed BLEU-4 and Jaccard token-set overlaps
//! - **Structural Similarity**: tree-sitter fingerprints, type histograms,
//!   subtree overlap and tree edit distance
//! - **Validity Guard**: syntactic checks gating the structural and delegate metrics
//! - **External Delegate**: optional CodeBLEU-style scorer behind a capability object
//! - **Comparison Cache**: one atomic JSON document per ordered pair
//! - **Batch Runner**: bounded async worker pool with per-pair error isolation
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                        API Layer                            │
//! ├─────────────────────────────────────────────────────────────┤
//! │  Core Engine  │  Detectors  │  Language  │  I/O & Storage  │
//! │              │             │  Adapters  │                 │
//! │ • Similarity │ • Lexical   │ • Python   │ • Cache         │
//! │ • Pipeline   │ • Structure │            │ • Reports       │
//! │ • Config     │ • Delegate  │            │                 │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use codesim_rs::{CodesimConfig, CodesimEngine};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = CodesimEngine::new(CodesimConfig::default())?;
//!     let summary = engine.run("./experiment", false).await?;
//!
//!     println!(
//!         "{} pairs: {} cached, {} computed, {} errors",
//!         summary.attempted, summary.cache_hits, summary.computed, summary.errors
//!     );
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(unsafe_code)]
#![allow(clippy::module_name_repetitions)]
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(feature = "mimalloc")]
#[global_allocator]
static ALLOC: mimalloc::MiMalloc = mimalloc::MiMalloc;

// Core similarity engine modules
pub mod core {
    //! Core data model, configuration and the similarity pipeline.

    pub mod artifact;
    pub mod config;
    pub mod errors;
    pub mod file_utils;
    pub mod pipeline;
    pub mod similarity;
}

// Metric implementations
pub mod detectors {
    //! Lexical, structural and delegated similarity metrics.

    pub mod delegate;
    pub mod lexical;
    pub mod structure;
}

// Language-specific AST adapters
pub mod lang {
    //! Language-specific parsing.

    pub mod python;
}

// Comparison cache and read API
pub mod io {
    //! Comparison persistence and aggregate reporting.

    pub mod cache;
    pub mod reports;
}

// Public API and engine interface
pub mod api {
    //! High-level API and engine interface.

    pub mod engine;
    pub mod results;
}

// Re-export primary types for convenience
pub use api::engine::CodesimEngine;
pub use api::results::{DelegateStatus, SimilarityRecord};
pub use core::config::CodesimConfig;
pub use core::errors::{CodesimError, Result};

/// Library version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
