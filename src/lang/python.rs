//! Python language adapter with tree-sitter integration.

use tree_sitter::{Language, Node, Parser, Point, Tree};

use crate::core::errors::{CodesimError, Result};

/// Language tag used in parse errors and delegate requests.
pub const LANGUAGE_NAME: &str = "python";

/// Position of the first syntax problem in a parse tree.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyntaxErrorLocation {
    /// 1-based line
    pub line: usize,
    /// 1-based column
    pub column: usize,
    /// True when the parser inserted a missing token rather than an error node
    pub missing: bool,
    /// Kind label of the offending node
    pub kind: String,
}

impl SyntaxErrorLocation {
    fn from_node(node: Node<'_>) -> Self {
        let Point { row, column } = node.start_position();
        Self {
            line: row + 1,
            column: column + 1,
            missing: node.is_missing(),
            kind: node.kind().to_string(),
        }
    }

    /// Human-readable reason, e.g. `syntax error at line 1, column 7`.
    pub fn describe(&self) -> String {
        if self.missing {
            format!(
                "missing {} at line {}, column {}",
                self.kind, self.line, self.column
            )
        } else {
            format!("syntax error at line {}, column {}", self.line, self.column)
        }
    }

    /// Convert into a [`CodesimError::Parse`].
    pub fn into_error(self) -> CodesimError {
        CodesimError::parse_at(LANGUAGE_NAME, self.describe(), self.line, self.column)
    }
}

/// Python-specific parsing
pub struct PythonAdapter {
    /// Tree-sitter parser for Python
    parser: Parser,
}

impl PythonAdapter {
    /// Create a new Python adapter
    pub fn new() -> Result<Self> {
        let language: Language = tree_sitter_python::LANGUAGE.into();
        let mut parser = Parser::new();
        parser.set_language(&language).map_err(|e| {
            CodesimError::parse(
                LANGUAGE_NAME,
                format!("Failed to set Python language: {:?}", e),
            )
        })?;

        Ok(Self { parser })
    }

    /// Parse source text into a tree, tolerating syntax errors.
    ///
    /// Only a parser that produces no tree at all is an error here; callers
    /// inspect [`Self::first_error`] to decide whether the tree is usable.
    pub fn parse(&mut self, source: &str) -> Result<Tree> {
        self.parser
            .parse(source, None)
            .ok_or_else(|| CodesimError::parse(LANGUAGE_NAME, "parser produced no tree"))
    }

    /// Parse and reject trees containing error or missing nodes.
    pub fn parse_strict(&mut self, source: &str) -> Result<Tree> {
        let tree = self.parse(source)?;
        match Self::first_error(&tree) {
            Some(location) => Err(location.into_error()),
            None => Ok(tree),
        }
    }

    /// Locate the first error or missing node in document order.
    pub fn first_error(tree: &Tree) -> Option<SyntaxErrorLocation> {
        let root = tree.root_node();
        if !root.has_error() {
            return None;
        }

        let mut stack = vec![root];
        while let Some(node) = stack.pop() {
            if node.is_error() || node.is_missing() {
                return Some(SyntaxErrorLocation::from_node(node));
            }
            if !node.has_error() {
                continue;
            }
            let mut cursor = node.walk();
            let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }

        // has_error() was set without a locatable node
        Some(SyntaxErrorLocation::from_node(root))
    }

    /// Identifier texts in document order, duplicates included.
    pub fn identifiers(tree: &Tree, source: &str) -> Vec<String> {
        let mut identifiers = Vec::new();
        let mut stack = vec![tree.root_node()];

        while let Some(node) = stack.pop() {
            if node.kind() == "identifier" {
                if let Ok(text) = node.utf8_text(source.as_bytes()) {
                    identifiers.push(text.to_string());
                }
                continue;
            }
            let mut cursor = node.walk();
            let children: Vec<Node<'_>> = node.children(&mut cursor).collect();
            stack.extend(children.into_iter().rev());
        }

        identifiers
    }
}
