//! Syntax-tree provider interface
//!
//! The engine never depends on a grammar library. A caller that has a parsed
//! tree for the document (tree-sitter or anything else) adapts it to
//! [`SyntaxTree`]; nodes are referred to by opaque [`NodeHandle`]s the
//! provider hands out.
//!
//! Positions are 0-based lines and byte columns. End positions are exclusive,
//! the tree-sitter convention: a node whose last character ends a line may
//! report its end as column 0 of the following line. [`NodeBounds::last_line`]
//! undoes that.

use crate::guard::error::ProviderError;

/// Opaque reference to a node, meaningful only to the provider that made it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeHandle(pub usize);

/// Start and (exclusive) end position of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NodeBounds {
    pub start_line: usize,
    pub start_column: usize,
    pub end_line: usize,
    pub end_column: usize,
}

impl NodeBounds {
    pub fn new(start_line: usize, start_column: usize, end_line: usize, end_column: usize) -> Self {
        Self {
            start_line,
            start_column,
            end_line,
            end_column,
        }
    }

    /// The last line that holds any of the node's text.
    ///
    /// An end at column 0 of a later line means the node stopped at the end of
    /// the previous line.
    pub fn last_line(&self) -> usize {
        if self.end_column == 0 && self.end_line > self.start_line {
            self.end_line - 1
        } else {
            self.end_line
        }
    }

    pub fn contains(&self, line: usize, column: usize) -> bool {
        let after_start = (line, column) >= (self.start_line, self.start_column);
        let before_end = (line, column) < (self.end_line, self.end_column);
        after_start && before_end
    }
}

/// The "syntax tree query" capability the scope resolver consumes.
///
/// Only `node_at` may fail: it is the call that may reach into a lazily
/// loaded grammar. Any error is treated by the resolver as "no match".
pub trait SyntaxTree {
    /// The smallest node spanning the position.
    fn node_at(&self, line: usize, column: usize) -> Result<Option<NodeHandle>, ProviderError>;

    fn parent(&self, node: NodeHandle) -> Option<NodeHandle>;

    /// The grammar's node type name, e.g. `function_definition`.
    fn kind(&self, node: NodeHandle) -> &str;

    fn bounds(&self, node: NodeHandle) -> NodeBounds;

    /// Kind names from `node` up to the root, `node` first.
    fn parent_chain(&self, node: NodeHandle) -> Vec<&str> {
        let mut chain = Vec::new();
        let mut current = Some(node);
        while let Some(handle) = current {
            chain.push(self.kind(handle));
            current = self.parent(handle);
        }
        chain
    }
}

/// Iterator over a node and its ancestors, innermost first.
pub struct Ancestors<'t> {
    tree: &'t dyn SyntaxTree,
    next: Option<NodeHandle>,
}

impl Iterator for Ancestors<'_> {
    type Item = NodeHandle;

    fn next(&mut self) -> Option<NodeHandle> {
        let current = self.next?;
        self.next = self.tree.parent(current);
        Some(current)
    }
}

pub fn ancestors(tree: &dyn SyntaxTree, node: NodeHandle) -> Ancestors<'_> {
    Ancestors {
        tree,
        next: Some(node),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn end_at_column_zero_belongs_to_previous_line() {
        assert_eq!(NodeBounds::new(2, 0, 6, 0).last_line(), 5);
        assert_eq!(NodeBounds::new(2, 0, 6, 1).last_line(), 6);
        assert_eq!(NodeBounds::new(2, 0, 2, 0).last_line(), 2);
    }

    #[test]
    fn contains_uses_exclusive_end() {
        let bounds = NodeBounds::new(1, 4, 3, 1);
        assert!(bounds.contains(1, 4));
        assert!(bounds.contains(3, 0));
        assert!(!bounds.contains(3, 1));
        assert!(!bounds.contains(1, 3));
    }
}
