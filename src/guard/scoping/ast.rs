//! Syntax-tree backed scope strategy
//!
//! Walks forward from the search start, asking the provider for the smallest
//! node at each line's first non-whitespace column and climbing its ancestry
//! until a node of an accepted kind turns up. Ancestors that start before the
//! tag line are never taken: the construct has to follow the tag.
//!
//! `sig` and `body` need two nodes, the declaration and its body. The body is
//! found by probing the declaration's lines (first and last non-whitespace
//! column of each) and keeping the outermost body-kind node below the
//! declaration.

use super::syntax_tree::{ancestors, NodeBounds, NodeHandle, SyntaxTree};
use super::{KindSet, LineSpan, ScopeQuery, ScopeSource, ScopeStrategy};
use crate::guard::document::Document;
use crate::guard::error::ProviderError;
use crate::guard::tag::ScopeKind;

pub struct AstScopeStrategy<'t> {
    tree: &'t dyn SyntaxTree,
}

impl<'t> AstScopeStrategy<'t> {
    pub fn new(tree: &'t dyn SyntaxTree) -> Self {
        Self { tree }
    }

    /// First node of an accepted kind at or after the tag line.
    fn find_node(
        &self,
        query: &ScopeQuery<'_>,
        kinds: &KindSet,
    ) -> Result<Option<NodeHandle>, ProviderError> {
        if kinds.is_empty() {
            return Ok(None);
        }
        let document = query.document;
        for line in query.search_lines() {
            let Some(column) = document.first_non_whitespace(line) else {
                continue;
            };
            let Some(node) = self.tree.node_at(line, column)? else {
                continue;
            };
            for ancestor in ancestors(self.tree, node) {
                if self.tree.bounds(ancestor).start_line < query.tag.line {
                    break;
                }
                if kinds.contains(self.tree.kind(ancestor)) {
                    return Ok(Some(ancestor));
                }
            }
        }
        Ok(None)
    }

    /// Outermost node of a body kind strictly inside `declaration`.
    fn find_body(
        &self,
        document: &Document,
        declaration: NodeHandle,
        body_kinds: &KindSet,
    ) -> Result<Option<NodeHandle>, ProviderError> {
        if body_kinds.is_empty() {
            return Ok(None);
        }
        let bounds = self.tree.bounds(declaration);
        for line in bounds.start_line..=bounds.last_line() {
            let mut columns = Vec::with_capacity(2);
            columns.extend(document.first_non_whitespace(line));
            columns.extend(document.last_non_whitespace(line));
            columns.dedup();

            for column in columns {
                let Some(node) = self.tree.node_at(line, column)? else {
                    continue;
                };
                let mut body = None;
                for ancestor in ancestors(self.tree, node) {
                    if ancestor == declaration {
                        if body.is_some() {
                            return Ok(body);
                        }
                        break;
                    }
                    if body_kinds.contains(self.tree.kind(ancestor)) {
                        body = Some(ancestor);
                    }
                }
            }
        }
        Ok(None)
    }

    /// True when the body opens after other text on its first line, like the
    /// `{` closing a brace-language signature.
    fn opens_mid_line(document: &Document, body: &NodeBounds) -> bool {
        document
            .first_non_whitespace(body.start_line)
            .is_some_and(|column| column < body.start_column)
    }

    fn signature(
        &self,
        query: &ScopeQuery<'_>,
    ) -> Result<Option<LineSpan>, ProviderError> {
        let Some(declaration) = self.find_node(query, &query.kinds)? else {
            return Ok(None);
        };
        let decl = self.tree.bounds(declaration);
        let end = match self.find_body(query.document, declaration, &query.companion_kinds)? {
            Some(body) => {
                let body = self.tree.bounds(body);
                if Self::opens_mid_line(query.document, &body) {
                    body.start_line
                } else {
                    body.start_line.saturating_sub(1).max(decl.start_line)
                }
            }
            None => decl.start_line,
        };
        Ok(Some(LineSpan::new(decl.start_line, end)))
    }

    fn body(&self, query: &ScopeQuery<'_>) -> Result<Option<LineSpan>, ProviderError> {
        if let Some(declaration) = self.find_node(query, &query.companion_kinds)? {
            if let Some(body) = self.find_body(query.document, declaration, &query.kinds)? {
                let body = self.tree.bounds(body);
                let last = body.last_line();
                let mid_line = Self::opens_mid_line(query.document, &body);
                let start = if mid_line && last > body.start_line {
                    body.start_line + 1
                } else {
                    body.start_line
                };
                return Ok(Some(LineSpan::new(start, last)));
            }
        }
        // A tag right above a bare block.
        Ok(self
            .find_node(query, &query.kinds)?
            .map(|node| self.span(node)))
    }

    fn span(&self, node: NodeHandle) -> LineSpan {
        let bounds = self.tree.bounds(node);
        LineSpan::new(bounds.start_line, bounds.last_line())
    }
}

impl ScopeStrategy for AstScopeStrategy<'_> {
    fn name(&self) -> &'static str {
        "syntax-tree"
    }

    fn source(&self) -> ScopeSource {
        ScopeSource::SyntaxTree
    }

    fn locate(&self, query: &ScopeQuery<'_>) -> Result<Option<LineSpan>, ProviderError> {
        match query.kind {
            ScopeKind::Sig => self.signature(query),
            ScopeKind::Body => self.body(query),
            _ => Ok(self
                .find_node(query, &query.kinds)?
                .map(|node| self.span(node))),
        }
    }
}
