//! AST structural analysis: node counts, depth and node-kind histograms.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;
use tree_sitter::{Node, Tree};

use crate::core::file_utils::FileReader;
use crate::lang::python::PythonAdapter;

/// Why a structural analysis produced no metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnalysisErrorKind {
    /// Source text has syntax errors
    Syntax,
    /// The parser itself failed
    Parser,
    /// The source file could not be read
    Input,
}

/// Structural metrics of one piece of source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StructuralFingerprint {
    /// Named, non-comment nodes in the tree
    pub node_count: usize,
    /// Depth of the deepest node; the root is at depth 1
    pub max_depth: usize,
    /// Node count per node-kind label
    pub node_type_histogram: BTreeMap<String, usize>,
    /// Number of distinct node kinds
    pub unique_type_count: usize,
    /// Failure description, set when the metrics are zeroed
    pub error: Option<String>,
    /// Failure class
    pub error_kind: Option<AnalysisErrorKind>,
    /// Whether the analyzed file exists; `None` for in-memory analysis
    pub file_exists: Option<bool>,
}

impl StructuralFingerprint {
    /// Zeroed metrics carrying an error.
    pub fn failed(kind: AnalysisErrorKind, error: impl Into<String>) -> Self {
        Self {
            node_count: 0,
            max_depth: 0,
            node_type_histogram: BTreeMap::new(),
            unique_type_count: 0,
            error: Some(error.into()),
            error_kind: Some(kind),
            file_exists: None,
        }
    }

    /// Whether metrics were computed.
    pub fn is_ok(&self) -> bool {
        self.error.is_none()
    }
}

/// Named, non-comment node of a flattened tree.
#[derive(Debug, Clone)]
pub(crate) struct FlatNode {
    pub kind: &'static str,
    /// Source text of leaf nodes (identifiers, literals)
    pub value: Option<String>,
    pub depth: usize,
    pub children: Vec<usize>,
}

/// Preorder arena of the named, non-comment nodes of a parse tree.
///
/// Parents always precede their children, so reverse index order is a valid
/// bottom-up order.
#[derive(Debug, Clone, Default)]
pub struct StructureTree {
    pub(crate) nodes: Vec<FlatNode>,
}

impl StructureTree {
    /// Flatten a parse tree with an explicit stack.
    pub fn from_tree(tree: &Tree, source: &str) -> Self {
        let mut nodes: Vec<FlatNode> = Vec::new();
        let mut stack: Vec<(Node<'_>, usize, Option<usize>)> = vec![(tree.root_node(), 1, None)];

        while let Some((node, depth, parent)) = stack.pop() {
            let index = nodes.len();
            let named_children: Vec<Node<'_>> = {
                let mut cursor = node.walk();
                node.named_children(&mut cursor)
                    .filter(|child| !is_comment(child))
                    .collect()
            };
            let value = if named_children.is_empty() {
                node.utf8_text(source.as_bytes()).ok().map(str::to_string)
            } else {
                None
            };

            nodes.push(FlatNode {
                kind: node.kind(),
                value,
                depth,
                children: Vec::with_capacity(named_children.len()),
            });
            if let Some(parent) = parent {
                nodes[parent].children.push(index);
            }

            for child in named_children.into_iter().rev() {
                stack.push((child, depth + 1, Some(index)));
            }
        }

        Self { nodes }
    }

    /// Number of nodes
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Whether the tree has no nodes
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Structural metrics of this tree.
    pub fn fingerprint(&self) -> StructuralFingerprint {
        let mut histogram: BTreeMap<String, usize> = BTreeMap::new();
        let mut max_depth = 0;
        for node in &self.nodes {
            *histogram.entry(node.kind.to_string()).or_insert(0) += 1;
            max_depth = max_depth.max(node.depth);
        }

        StructuralFingerprint {
            node_count: self.nodes.len(),
            max_depth,
            unique_type_count: histogram.len(),
            node_type_histogram: histogram,
            error: None,
            error_kind: None,
            file_exists: None,
        }
    }
}

fn is_comment(node: &Node<'_>) -> bool {
    node.kind() == "comment"
}

/// Analyze in-memory source. Never fails; errors are reported in the result.
pub fn analyze(code: &str) -> StructuralFingerprint {
    let mut adapter = match PythonAdapter::new() {
        Ok(adapter) => adapter,
        Err(err) => return StructuralFingerprint::failed(AnalysisErrorKind::Parser, err.to_string()),
    };

    let tree = match adapter.parse(code) {
        Ok(tree) => tree,
        Err(err) => return StructuralFingerprint::failed(AnalysisErrorKind::Parser, err.to_string()),
    };

    if let Some(location) = PythonAdapter::first_error(&tree) {
        debug!("Structural analysis skipped: {}", location.describe());
        return StructuralFingerprint::failed(AnalysisErrorKind::Syntax, location.describe());
    }

    StructureTree::from_tree(&tree, code).fingerprint()
}

/// Analyze a source file, recording whether it exists.
pub fn analyze_file(path: &Path) -> StructuralFingerprint {
    let exists = path.is_file();
    let mut fingerprint = match FileReader::read_to_string(path) {
        Ok(source) => analyze(&source),
        Err(err) => StructuralFingerprint::failed(AnalysisErrorKind::Input, err.to_string()),
    };
    fingerprint.file_exists = Some(exists);
    fingerprint
}
