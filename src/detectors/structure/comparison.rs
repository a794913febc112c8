//! Pairwise structural comparison of analyzed trees.

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tree_edit_distance::{diff, Node as TedNode, Tree as TedTree};
use xxhash_rust::xxh3::{xxh3_64, Xxh3};

use super::analyzer::{StructuralFingerprint, StructureTree};

/// Structural sub-scores of one comparison. Every value is in [0, 1] except
/// the raw edit distance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralComparison {
    /// `|a - b| / max(a, b)` of node counts
    pub node_count_delta: f64,
    /// `|a - b| / max(a, b)` of maximum depths
    pub depth_delta: f64,
    /// Cosine similarity of node-kind histograms
    pub histogram_similarity: f64,
    /// Manhattan histogram distance normalized by the per-kind maxima
    pub histogram_distance: f64,
    /// Jaccard overlap of subtree hashes
    pub subtree_overlap: f64,
    /// Unit-cost tree edit distance, when both trees are within the size limit
    pub edit_distance: Option<u64>,
    /// `1 - edit_distance / (n_a + n_b)`
    pub edit_similarity: Option<f64>,
    /// Tree edit distance with definitions and control flow weighted heavier
    #[serde(default)]
    pub weighted_edit_distance: Option<u64>,
    /// `1 - weighted_edit_distance / (w_a + w_b)` over total node weights
    #[serde(default)]
    pub weighted_edit_similarity: Option<f64>,
}

impl StructuralComparison {
    /// Combined structural similarity used by the composite score.
    pub fn similarity(&self) -> f64 {
        let sum = (1.0 - self.node_count_delta) + (1.0 - self.depth_delta) + self.histogram_similarity;
        (sum / 3.0).clamp(0.0, 1.0)
    }
}

/// Insertion and deletion cost of a node kind in the weighted edit distance.
pub fn node_kind_weight(kind: &str) -> u64 {
    match kind {
        "function_definition" | "class_definition" => 3,
        "if_statement" | "for_statement" | "while_statement" | "try_statement" => 2,
        _ => 1,
    }
}

/// Tree node fed to the edit distance algorithm.
#[derive(Debug, Clone)]
pub struct EditNode {
    kind_hash: u64,
    weight: u64,
    children: Vec<EditNode>,
}

/// Edit tree of one artifact with its total node weight.
#[derive(Debug)]
struct EditTree {
    root: EditNode,
    total_weight: u64,
}

impl TedNode for EditNode {
    type Kind = u64;

    fn kind(&self) -> Self::Kind {
        self.kind_hash
    }

    type Weight = u64;

    fn weight(&self) -> Self::Weight {
        self.weight
    }
}

impl TedTree for EditNode {
    type Children<'c>
        = std::slice::Iter<'c, EditNode>
    where
        Self: 'c;

    fn children(&self) -> Self::Children<'_> {
        self.children.iter()
    }
}

/// Everything about one artifact's tree that pairwise comparison needs.
#[derive(Debug, Clone)]
pub struct StructureProfile {
    /// Summary metrics
    pub fingerprint: StructuralFingerprint,
    subtree_hashes: HashSet<u64>,
    edit_tree: Option<Arc<EditTree>>,
    weighted_edit_tree: Option<Arc<EditTree>>,
}

impl StructureProfile {
    /// Build a profile; trees above `ted_max_nodes` (or any tree when it is
    /// 0) get no edit tree.
    pub fn from_structure(tree: &StructureTree, ted_max_nodes: usize) -> Self {
        let within_limit = ted_max_nodes > 0 && tree.len() <= ted_max_nodes;
        let edit_tree = within_limit
            .then(|| build_edit_tree(tree, |_| 1))
            .flatten()
            .map(Arc::new);
        let weighted_edit_tree = within_limit
            .then(|| build_edit_tree(tree, node_kind_weight))
            .flatten()
            .map(Arc::new);

        Self {
            fingerprint: tree.fingerprint(),
            subtree_hashes: subtree_hashes(tree),
            edit_tree,
            weighted_edit_tree,
        }
    }

    /// Node count of the underlying tree.
    pub fn node_count(&self) -> usize {
        self.fingerprint.node_count
    }

    /// Whether tree edit distance is available for this profile.
    pub fn has_edit_tree(&self) -> bool {
        self.edit_tree.is_some()
    }
}

/// Compare two profiles.
pub fn compare_structures(reference: &StructureProfile, candidate: &StructureProfile) -> StructuralComparison {
    let a = &reference.fingerprint;
    let b = &candidate.fingerprint;

    let (edit_distance, edit_similarity) =
        edit_distance_between(&reference.edit_tree, &candidate.edit_tree);
    let (weighted_edit_distance, weighted_edit_similarity) =
        edit_distance_between(&reference.weighted_edit_tree, &candidate.weighted_edit_tree);

    StructuralComparison {
        node_count_delta: normalized_delta(a.node_count, b.node_count),
        depth_delta: normalized_delta(a.max_depth, b.max_depth),
        histogram_similarity: histogram_cosine(&a.node_type_histogram, &b.node_type_histogram),
        histogram_distance: histogram_manhattan(&a.node_type_histogram, &b.node_type_histogram),
        subtree_overlap: subtree_overlap(&reference.subtree_hashes, &candidate.subtree_hashes),
        edit_distance,
        edit_similarity,
        weighted_edit_distance,
        weighted_edit_similarity,
    }
}

/// Edit distance and its similarity normalized by the summed tree weights.
fn edit_distance_between(
    a: &Option<Arc<EditTree>>,
    b: &Option<Arc<EditTree>>,
) -> (Option<u64>, Option<f64>) {
    match (a, b) {
        (Some(a), Some(b)) => {
            let (_, cost) = diff(&a.root, &b.root);
            let total = (a.total_weight + b.total_weight).max(1) as f64;
            let similarity = (1.0 - cost as f64 / total).clamp(0.0, 1.0);
            (Some(cost), Some(similarity))
        }
        _ => (None, None),
    }
}

/// `|a - b| / max(a, b)`, 0 when both are 0.
pub fn normalized_delta(a: usize, b: usize) -> f64 {
    let max = a.max(b);
    if max == 0 {
        return 0.0;
    }
    (a.abs_diff(b) as f64 / max as f64).clamp(0.0, 1.0)
}

/// Cosine similarity of two histograms; two empty histograms are identical.
pub fn histogram_cosine(a: &BTreeMap<String, usize>, b: &BTreeMap<String, usize>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }

    let dot: f64 = a
        .iter()
        .filter_map(|(kind, &count)| b.get(kind).map(|&other| count as f64 * other as f64))
        .sum();
    let norm_a = a.values().map(|&c| (c as f64).powi(2)).sum::<f64>().sqrt();
    let norm_b = b.values().map(|&c| (c as f64).powi(2)).sum::<f64>().sqrt();
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a * norm_b)).clamp(0.0, 1.0)
}

/// Manhattan distance over node kinds divided by the sum of per-kind maxima.
pub fn histogram_manhattan(a: &BTreeMap<String, usize>, b: &BTreeMap<String, usize>) -> f64 {
    let mut distance = 0usize;
    let mut total = 0usize;

    for (kind, &count_a) in a {
        let count_b = b.get(kind).copied().unwrap_or(0);
        distance += count_a.abs_diff(count_b);
        total += count_a.max(count_b);
    }
    for (kind, &count_b) in b {
        if !a.contains_key(kind) {
            distance += count_b;
            total += count_b;
        }
    }

    if total == 0 {
        0.0
    } else {
        (distance as f64 / total as f64).clamp(0.0, 1.0)
    }
}

/// Jaccard overlap of two subtree hash sets.
pub fn subtree_overlap(a: &HashSet<u64>, b: &HashSet<u64>) -> f64 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let intersection = a.intersection(b).count();
    let union = a.len() + b.len() - intersection;
    intersection as f64 / union as f64
}

/// Hash of every subtree, keyed on kind, leaf text and the sorted hashes of
/// its children.
fn subtree_hashes(tree: &StructureTree) -> HashSet<u64> {
    let mut hashes = vec![0u64; tree.nodes.len()];

    for index in (0..tree.nodes.len()).rev() {
        let node = &tree.nodes[index];
        let mut child_hashes: Vec<u64> = node.children.iter().map(|&c| hashes[c]).collect();
        child_hashes.sort_unstable();

        let mut hasher = Xxh3::new();
        hasher.update(node.kind.as_bytes());
        hasher.update(b":");
        if let Some(value) = &node.value {
            hasher.update(value.as_bytes());
        }
        hasher.update(b":");
        for child in child_hashes {
            hasher.update(&child.to_le_bytes());
        }
        hashes[index] = hasher.digest();
    }

    hashes.into_iter().collect()
}

/// Assemble an owned edit tree bottom-up without recursion.
fn build_edit_tree(tree: &StructureTree, weigh: fn(&str) -> u64) -> Option<EditTree> {
    let mut built: Vec<Option<EditNode>> = vec![None; tree.nodes.len()];
    let mut total_weight = 0;

    for index in (0..tree.nodes.len()).rev() {
        let node = &tree.nodes[index];
        let children = node
            .children
            .iter()
            .filter_map(|&child| built[child].take())
            .collect();
        let weight = weigh(&node.kind);
        total_weight += weight;
        built[index] = Some(EditNode {
            kind_hash: xxh3_64(node.kind.as_bytes()),
            weight,
            children,
        });
    }

    built
        .into_iter()
        .next()
        .flatten()
        .map(|root| EditTree { root, total_weight })
}
