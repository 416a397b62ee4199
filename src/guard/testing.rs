//! Test support
//!
//! [`MemoryTree`] is a hand-built syntax tree: enough to exercise the
//! tree-backed scope strategy without a grammar library. Nodes are added under
//! a parent with explicit bounds; `node_at` answers with the deepest node
//! containing the position, the way a real parser does.
//!
//! [`permission_letters`] renders one target's column of a permission map as a
//! string (`"wwrrn"`), which keeps line-by-line assertions readable.

use super::error::ProviderError;
use super::permissions::PermissionMap;
use super::scoping::{NodeBounds, NodeHandle, SyntaxTree};
use super::tag::{Permission, Target};

#[derive(Debug, Clone)]
struct MemoryNode {
    kind: String,
    bounds: NodeBounds,
    parent: Option<NodeHandle>,
    children: Vec<NodeHandle>,
}

/// An in-memory [`SyntaxTree`].
#[derive(Debug, Clone)]
pub struct MemoryTree {
    nodes: Vec<MemoryNode>,
    failure: Option<ProviderError>,
}

impl MemoryTree {
    /// A tree holding only its root node.
    pub fn new(
        root_kind: &str,
        start_line: usize,
        start_column: usize,
        end_line: usize,
        end_column: usize,
    ) -> Self {
        Self {
            nodes: vec![MemoryNode {
                kind: root_kind.to_string(),
                bounds: NodeBounds::new(start_line, start_column, end_line, end_column),
                parent: None,
                children: Vec::new(),
            }],
            failure: None,
        }
    }

    /// Makes every `node_at` call fail with `error`.
    pub fn failing(mut self, error: ProviderError) -> Self {
        self.failure = Some(error);
        self
    }

    pub fn root(&self) -> NodeHandle {
        NodeHandle(0)
    }

    /// Adds a child of `parent`. Children should be added in source order.
    pub fn add(
        &mut self,
        parent: NodeHandle,
        kind: &str,
        start_line: usize,
        start_column: usize,
        end_line: usize,
        end_column: usize,
    ) -> NodeHandle {
        let handle = NodeHandle(self.nodes.len());
        self.nodes.push(MemoryNode {
            kind: kind.to_string(),
            bounds: NodeBounds::new(start_line, start_column, end_line, end_column),
            parent: Some(parent),
            children: Vec::new(),
        });
        self.nodes[parent.0].children.push(handle);
        handle
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

impl SyntaxTree for MemoryTree {
    fn node_at(&self, line: usize, column: usize) -> Result<Option<NodeHandle>, ProviderError> {
        if let Some(error) = &self.failure {
            return Err(error.clone());
        }
        let root = self.root();
        if !self.bounds(root).contains(line, column) {
            return Ok(None);
        }
        let mut current = root;
        while let Some(&child) = self.nodes[current.0]
            .children
            .iter()
            .find(|child| self.bounds(**child).contains(line, column))
        {
            current = child;
        }
        Ok(Some(current))
    }

    fn parent(&self, node: NodeHandle) -> Option<NodeHandle> {
        self.nodes.get(node.0).and_then(|n| n.parent)
    }

    fn kind(&self, node: NodeHandle) -> &str {
        self.nodes.get(node.0).map(|n| n.kind.as_str()).unwrap_or("")
    }

    fn bounds(&self, node: NodeHandle) -> NodeBounds {
        self.nodes
            .get(node.0)
            .map(|n| n.bounds)
            .unwrap_or(NodeBounds::new(0, 0, 0, 0))
    }
}

/// One letter per line for `target`: `r`, `w`, `n`, or `c` for context.
pub fn permission_letters(map: &PermissionMap, target: Target) -> String {
    map.iter()
        .map(|line| match line.permission_for(target) {
            _ if line.is_context_for(target) => 'c',
            Permission::Read => 'r',
            Permission::Write => 'w',
            Permission::None => 'n',
            Permission::Context => 'c',
        })
        .collect()
}
