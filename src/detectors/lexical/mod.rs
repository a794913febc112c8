//! Lexical similarity: tokenization, n-grams, BLEU and token-set Jaccard.
//!
//! These metrics work on raw text and stay available for artifacts that fail
//! to parse. Only the Jaccard AST-name set uses a parse tree, falling back to
//! the word set without one.

pub mod bleu;
pub mod jaccard;
pub mod ngram;
pub mod tokenizer;

pub use bleu::{
    bleu, bleu_tokens, bleu_with_order, brevity_penalty, modified_precision, DEFAULT_MAX_ORDER,
};
pub use jaccard::{jaccard_scores, JaccardProfile, JaccardScores};
pub use ngram::ngrams;
pub use tokenizer::tokenize;
