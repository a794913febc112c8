//! Set-based Jaccard similarity over several tokenizations of Python code.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tree_sitter::{Node, Tree};

use super::tokenizer::tokenize;
use crate::lang::python::PythonAdapter;

/// Python reserved words.
pub const PYTHON_KEYWORDS: &[&str] = &[
    "false", "none", "true", "and", "as", "assert", "async", "await", "break", "class",
    "continue", "def", "del", "elif", "else", "except", "finally", "for", "from", "global", "if",
    "import", "in", "is", "lambda", "nonlocal", "not", "or", "pass", "raise", "return", "try",
    "while", "with", "yield",
];

/// Builtins excluded from the identifier set.
pub const COMMON_BUILTINS: &[&str] = &[
    "int", "str", "list", "dict", "set", "tuple", "bool", "float", "len", "range", "print",
    "input", "open", "file", "type", "object",
];

/// Jaccard similarities for one comparison.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct JaccardScores {
    /// All tokens, lower-cased
    pub tokens: f64,
    /// Words (identifier-shaped tokens)
    pub words: f64,
    /// Words minus keywords and common builtins
    pub identifiers: f64,
    /// Python keywords only
    pub keywords: f64,
    /// Identifiers from the parse tree
    pub ast_names: f64,
}

impl JaccardScores {
    /// All-zero scores, used for records of pairs that never ran.
    pub const ZERO: Self = Self {
        tokens: 0.0,
        words: 0.0,
        identifiers: 0.0,
        keywords: 0.0,
        ast_names: 0.0,
    };

    /// Compare two precomputed profiles.
    pub fn between(reference: &JaccardProfile, candidate: &JaccardProfile) -> Self {
        Self {
            tokens: jaccard(&reference.tokens, &candidate.tokens),
            words: jaccard(&reference.words, &candidate.words),
            identifiers: jaccard(&reference.identifiers, &candidate.identifiers),
            keywords: jaccard(&reference.keywords, &candidate.keywords),
            ast_names: jaccard(&reference.ast_names, &candidate.ast_names),
        }
    }
}

/// Token sets of one artifact, computed once and reused across pairs.
#[derive(Debug, Clone, Default)]
pub struct JaccardProfile {
    tokens: HashSet<String>,
    words: HashSet<String>,
    identifiers: HashSet<String>,
    keywords: HashSet<String>,
    ast_names: HashSet<String>,
}

impl JaccardProfile {
    /// Build a profile. `tree` must be an error-free parse of `source` when
    /// given; without it, AST names fall back to the word set.
    pub fn build(source: &str, tree: Option<&Tree>) -> Self {
        let stripped = match tree {
            Some(tree) => strip_comment_nodes(source, tree),
            None => strip_line_comments(source),
        };

        let tokens: HashSet<String> = tokenize(&stripped)
            .into_iter()
            .map(str::to_lowercase)
            .collect();

        let words: HashSet<String> = tokenize(&stripped)
            .into_iter()
            .filter(|token| {
                token
                    .chars()
                    .next()
                    .is_some_and(|c| c.is_alphabetic() || c == '_')
            })
            .map(str::to_lowercase)
            .collect();

        let keywords: HashSet<String> = words
            .iter()
            .filter(|w| PYTHON_KEYWORDS.contains(&w.as_str()))
            .cloned()
            .collect();

        let identifiers: HashSet<String> = words
            .iter()
            .filter(|w| {
                !PYTHON_KEYWORDS.contains(&w.as_str()) && !COMMON_BUILTINS.contains(&w.as_str())
            })
            .cloned()
            .collect();

        let ast_names = match tree {
            Some(tree) => PythonAdapter::identifiers(tree, source)
                .into_iter()
                .map(|name| name.to_lowercase())
                .collect(),
            None => words.clone(),
        };

        Self {
            tokens,
            words,
            identifiers,
            keywords,
            ast_names,
        }
    }
}

/// Jaccard scores for two sources, parsing each to find AST names.
pub fn jaccard_scores(reference: &str, candidate: &str) -> JaccardScores {
    let reference = profile_for(reference);
    let candidate = profile_for(candidate);
    JaccardScores::between(&reference, &candidate)
}

fn profile_for(source: &str) -> JaccardProfile {
    let tree = PythonAdapter::new()
        .and_then(|mut adapter| adapter.parse_strict(source))
        .ok();
    JaccardProfile::build(source, tree.as_ref())
}

/// Jaccard coefficient; two empty sets are identical.
pub fn jaccard(a: &HashSet<String>, b: &HashSet<String>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    if union == 0 {
        0.0
    } else {
        intersection as f64 / union as f64
    }
}

fn strip_line_comments(source: &str) -> String {
    source
        .lines()
        .map(|line| match line.find('#') {
            Some(pos) => &line[..pos],
            None => line,
        })
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn strip_comment_nodes(source: &str, tree: &Tree) -> String {
    let mut ranges = Vec::new();
    let mut stack: Vec<Node<'_>> = vec![tree.root_node()];
    while let Some(node) = stack.pop() {
        if node.kind() == "comment" {
            ranges.push(node.byte_range());
            continue;
        }
        let mut cursor = node.walk();
        stack.extend(node.children(&mut cursor));
    }
    if ranges.is_empty() {
        return source.to_string();
    }

    ranges.sort_by_key(|range| range.start);
    let mut out = String::with_capacity(source.len());
    let mut last = 0;
    for range in ranges {
        if range.start >= last {
            out.push_str(&source[last..range.start]);
            last = range.end;
        }
    }
    out.push_str(&source[last..]);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn identical_sources_score_one_everywhere() {
        let code = "def add(a, b):\n    return a + b\n";
        let scores = jaccard_scores(code, code);
        assert_eq!(scores.tokens, 1.0);
        assert_eq!(scores.words, 1.0);
        assert_eq!(scores.identifiers, 1.0);
        assert_eq!(scores.keywords, 1.0);
        assert_eq!(scores.ast_names, 1.0);
    }

    #[test]
    fn empty_sets_count_as_identical() {
        let scores = jaccard_scores("", "");
        assert_eq!(scores.tokens, 1.0);
        assert_eq!(scores.keywords, 1.0);
    }

    #[test]
    fn comments_are_ignored() {
        let a = "x = 1  # first\n";
        let b = "x = 1  # something else entirely\n";
        assert_eq!(jaccard_scores(a, b).tokens, 1.0);
    }

    #[test]
    fn renamed_identifiers_keep_keywords() {
        let a = "def add(a, b):\n    return a + b\n";
        let b = "def add(x, y):\n    return x + y\n";
        let scores = jaccard_scores(a, b);
        assert_eq!(scores.keywords, 1.0);
        // {add, a, b} vs {add, x, y}
        assert_relative_eq!(scores.identifiers, 1.0 / 5.0, epsilon = 1e-12);
        assert_relative_eq!(scores.ast_names, 1.0 / 5.0, epsilon = 1e-12);
    }

    #[test]
    fn builtins_are_not_identifiers() {
        let a = "print(len(items))\n";
        let b = "print(len(values))\n";
        assert_eq!(jaccard_scores(a, b).identifiers, 0.0);
        assert!(jaccard_scores(a, b).words > 0.0);
    }

    #[test]
    fn invalid_source_falls_back_to_words() {
        let profile = JaccardProfile::build("def f(:\n    return value", None);
        assert!(profile.ast_names.contains("value"));
        assert_eq!(profile.ast_names, profile.words);
    }
}
