//! Contiguous n-gram multisets.

use std::collections::HashMap;

/// Count every contiguous `n`-length window of `tokens`.
///
/// Returns an empty map when `n == 0` or the sequence is shorter than `n`.
pub fn ngrams<'a>(tokens: &[&'a str], n: usize) -> HashMap<Vec<&'a str>, usize> {
    let mut counts = HashMap::new();
    if n == 0 || tokens.len() < n {
        return counts;
    }

    for window in tokens.windows(n) {
        *counts.entry(window.to_vec()).or_insert(0) += 1;
    }
    counts
}

/// Total number of n-grams in a multiset.
pub fn total_count<K>(counts: &HashMap<K, usize>) -> usize {
    counts.values().sum()
}
