//! Unsmoothed sentence-level BLEU over code tokens.

use super::ngram::{ngrams, total_count};
use super::tokenizer::tokenize;

/// Default highest n-gram order.
pub const DEFAULT_MAX_ORDER: usize = 4;

/// BLEU score of `candidate` against `reference` with n-grams up to order 4.
pub fn bleu(reference: &str, candidate: &str) -> f64 {
    bleu_with_order(reference, candidate, DEFAULT_MAX_ORDER)
}

/// BLEU score with an explicit maximum n-gram order.
///
/// Orders for which neither side has any n-gram are left out of the
/// geometric mean. Any order where the candidate has n-grams but none match
/// drives the score to zero; no smoothing is applied.
pub fn bleu_with_order(reference: &str, candidate: &str, max_order: usize) -> f64 {
    let reference_tokens = tokenize(reference);
    let candidate_tokens = tokenize(candidate);
    bleu_tokens(&reference_tokens, &candidate_tokens, max_order)
}

/// BLEU over pre-tokenized sequences.
pub fn bleu_tokens(reference: &[&str], candidate: &[&str], max_order: usize) -> f64 {
    if reference.is_empty() || candidate.is_empty() {
        return 0.0;
    }

    let order = max_order.min(reference.len().max(candidate.len()));
    if order == 0 {
        return 0.0;
    }

    let mut log_sum = 0.0;
    for n in 1..=order {
        let precision = modified_precision(reference, candidate, n);
        if precision == 0.0 {
            return 0.0;
        }
        log_sum += precision.ln();
    }

    let geo_mean = (log_sum / order as f64).exp();
    let score = brevity_penalty(reference.len(), candidate.len()) * geo_mean;
    score.clamp(0.0, 1.0)
}

/// Clipped n-gram precision of `candidate` against `reference`.
///
/// Returns 0.0 when the candidate has no n-grams of this order.
pub fn modified_precision(reference: &[&str], candidate: &[&str], n: usize) -> f64 {
    let candidate_counts = ngrams(candidate, n);
    let total = total_count(&candidate_counts);
    if total == 0 {
        return 0.0;
    }

    let reference_counts = ngrams(reference, n);
    let clipped: usize = candidate_counts
        .iter()
        .map(|(gram, &count)| count.min(reference_counts.get(gram).copied().unwrap_or(0)))
        .sum();

    clipped as f64 / total as f64
}

/// Brevity penalty for reference length `r` and candidate length `c`.
pub fn brevity_penalty(reference_len: usize, candidate_len: usize) -> f64 {
    if candidate_len > reference_len {
        1.0
    } else if candidate_len == 0 {
        0.0
    } else {
        (1.0 - reference_len as f64 / candidate_len as f64).exp()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;
    use proptest::prelude::*;

    #[test]
    fn identical_snippets_score_one() {
        let code = "def add(a, b):\n    return a + b\n";
        assert_eq!(bleu(code, code), 1.0);
    }

    #[test]
    fn short_identical_snippets_score_one() {
        assert_eq!(bleu("x = 1", "x = 1"), 1.0);
        assert_eq!(bleu("pass", "pass"), 1.0);
    }

    #[test]
    fn empty_sides_score_zero() {
        assert_eq!(bleu("", "x = 1"), 0.0);
        assert_eq!(bleu("x = 1", ""), 0.0);
        assert_eq!(bleu("   \n", "\t"), 0.0);
    }

    #[test]
    fn missing_higher_order_match_is_zero() {
        // Candidate has 4-grams, none of which occur in the reference.
        assert_eq!(bleu("a b c d e", "e d c b a"), 0.0);
    }

    #[test]
    fn candidate_too_short_for_reference_order_is_zero() {
        assert_eq!(bleu("a b c d e", "a b"), 0.0);
    }

    #[test]
    fn brevity_penalty_examples() {
        assert_eq!(brevity_penalty(10, 12), 1.0);
        assert_relative_eq!(brevity_penalty(10, 5), (-1.0f64).exp(), epsilon = 1e-12);
        assert_relative_eq!(brevity_penalty(10, 5), 0.3679, epsilon = 1e-4);
        assert_eq!(brevity_penalty(10, 0), 0.0);
        assert_eq!(brevity_penalty(10, 10), 1.0);
    }

    #[test]
    fn modified_precision_clips_repeats() {
        let reference = ["the", "cat"];
        let candidate = ["the", "the", "the"];
        assert_relative_eq!(
            modified_precision(&reference, &candidate, 1),
            1.0 / 3.0,
            epsilon = 1e-12
        );
        assert_eq!(modified_precision(&reference, &["the"], 2), 0.0);
    }

    #[test]
    fn renamed_identifiers_in_longer_snippet_score_high_but_below_one() {
        let reference = "def add(a, b):\n    return a + b\n\nresult = add(1, 2)\nprint(result)\n";
        let candidate = "def add(x, y):\n    return x + y\n\nresult = add(1, 2)\nprint(result)\n";
        let score = bleu(reference, candidate);
        assert!(score > 0.5 && score < 0.7, "score = {score}");
    }

    #[test]
    fn lower_order_limits_harshness() {
        let reference = "total = price * qty";
        let candidate = "total = price * count";
        assert!(bleu_with_order(reference, candidate, 1) > bleu_with_order(reference, candidate, 4));
        assert_relative_eq!(bleu_with_order(reference, candidate, 1), 0.8, epsilon = 1e-12);
    }

    proptest! {
        #[test]
        fn prop_bleu_within_unit_interval(
            reference in "[a-c(),=+ \n]{0,40}",
            candidate in "[a-c(),=+ \n]{0,40}",
        ) {
            let score = bleu(&reference, &candidate);
            prop_assert!((0.0..=1.0).contains(&score), "score = {}", score);
        }

        #[test]
        fn prop_bleu_self_is_one(code in "[a-z_]{1,8}( [a-z(),=+]{1,4}){0,12}") {
            prop_assert_eq!(bleu(&code, &code), 1.0);
        }
    }
}
