//! Scope Resolver
//!
//!     Given a tag and its declaration line, computes the lines the tag
//!     governs.
//!
//!         LineCount(n)   [tag line, tag line + n], clamped to the document.
//!                        The tag line is always included; `n` counts the
//!                        lines after it.
//!         Semantic       The construct following the tag, found by a chain of
//!                        [ScopeStrategy]s: the syntax tree when one is
//!                        available, then the regex/bracket heuristic.
//!         Unbounded      Left open. The stack builder ends it at the next tag
//!                        for the same target, or end of file.
//!
//! Semantic Search
//!
//!     The search starts on the line after the tag (on the tag line itself for
//!     an inline tag trailing code) and looks at most `scan_window` lines
//!     ahead. A region runs from the tag line to the last line of the
//!     construct, except `body`, which starts where the body starts so the tag
//!     and the signature keep their previous permission. An inline `sig` tag
//!     governs only its own line.
//!
//!     Strategy failures never escape: a provider error is logged and treated
//!     as "no match", and a tag no strategy can place resolves unbounded.

mod ast;
mod heuristic;
pub mod kinds;
pub mod syntax_tree;

pub use ast::AstScopeStrategy;
pub use heuristic::HeuristicScopeStrategy;
pub use kinds::{KindSet, LanguageScopeTable, LanguageScopes};
pub use syntax_tree::{NodeBounds, NodeHandle, SyntaxTree};

use serde::Serialize;

use super::document::Document;
use super::error::ProviderError;
use super::tag::{GuardTag, ScopeKind, ScopeSpec};

/// Default number of lines a semantic search looks ahead.
pub const DEFAULT_SCAN_WINDOW: usize = 10;

/// An inclusive line range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LineSpan {
    pub start: usize,
    pub end: usize,
}

impl LineSpan {
    pub fn new(start: usize, end: usize) -> Self {
        Self {
            start,
            end: end.max(start),
        }
    }
}

/// Everything a strategy needs to place one semantic tag.
pub struct ScopeQuery<'q> {
    pub document: &'q Document<'q>,
    pub tag: &'q GuardTag,
    pub kind: ScopeKind,
    /// Node kinds that satisfy the scope. For `sig` these are declarations,
    /// for `body` the body nodes.
    pub kinds: KindSet,
    /// The other half of a `sig`/`body` pair: body nodes for `sig`,
    /// declarations for `body`. Empty for other scopes.
    pub companion_kinds: KindSet,
    /// First line searched.
    pub search_start: usize,
    pub scan_window: usize,
    pub inline: bool,
}

impl ScopeQuery<'_> {
    /// Lines the search may look at, in order.
    pub fn search_lines(&self) -> std::ops::RangeInclusive<usize> {
        let last = self.document.last_line().unwrap_or(0);
        let end = self.search_start.saturating_add(self.scan_window).min(last);
        self.search_start..=end
    }
}

/// One way of locating a semantic construct.
///
/// Returns the construct's own line span. `Ok(None)` means "not found here,
/// try the next strategy"; `Err` is reported and treated the same way.
pub trait ScopeStrategy {
    fn name(&self) -> &'static str;

    /// Recorded on scopes this strategy places.
    fn source(&self) -> ScopeSource;

    fn locate(&self, query: &ScopeQuery<'_>) -> Result<Option<LineSpan>, ProviderError>;
}

/// How a tag's bounds were obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeSource {
    LineCount,
    SyntaxTree,
    Heuristic,
    InlineSignature,
    /// No scope suffix.
    Unbounded,
    /// A semantic scope no strategy could place; treated as unbounded.
    Unresolved,
}

/// Bounds of one tag. `end_line == None` means "until the next tag for the
/// same target, or end of file".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedScope {
    pub tag_line: usize,
    pub start_line: usize,
    pub end_line: Option<usize>,
    pub source: ScopeSource,
}

impl ResolvedScope {
    fn bounded(tag_line: usize, span: LineSpan, source: ScopeSource) -> Self {
        Self {
            tag_line,
            start_line: span.start,
            end_line: Some(span.end),
            source,
        }
    }

    fn open(tag_line: usize, source: ScopeSource) -> Self {
        Self {
            tag_line,
            start_line: tag_line,
            end_line: None,
            source,
        }
    }

    pub fn is_bounded(&self) -> bool {
        self.end_line.is_some()
    }
}

/// Resolves tags against one document.
pub struct ScopeResolver<'r> {
    table: &'r LanguageScopeTable,
    ast: Option<AstScopeStrategy<'r>>,
    heuristic: Option<HeuristicScopeStrategy>,
    scan_window: usize,
}

impl<'r> ScopeResolver<'r> {
    pub fn new(table: &'r LanguageScopeTable) -> Self {
        Self {
            table,
            ast: None,
            heuristic: Some(HeuristicScopeStrategy),
            scan_window: DEFAULT_SCAN_WINDOW,
        }
    }

    /// Use a syntax tree for semantic scopes, ahead of the heuristic.
    pub fn with_tree(mut self, tree: &'r dyn SyntaxTree) -> Self {
        self.ast = Some(AstScopeStrategy::new(tree));
        self
    }

    pub fn with_scan_window(mut self, scan_window: usize) -> Self {
        self.scan_window = scan_window;
        self
    }

    pub fn with_heuristic_fallback(mut self, enabled: bool) -> Self {
        self.heuristic = enabled.then_some(HeuristicScopeStrategy);
        self
    }

    /// Strategies in the order they are tried.
    fn strategies(&self) -> Vec<&dyn ScopeStrategy> {
        let mut strategies: Vec<&dyn ScopeStrategy> = Vec::with_capacity(2);
        if let Some(ast) = &self.ast {
            strategies.push(ast);
        }
        if let Some(heuristic) = &self.heuristic {
            strategies.push(heuristic);
        }
        strategies
    }

    /// Bounds of `tag` in `document`.
    pub fn resolve(&self, document: &Document, tag: &GuardTag) -> ResolvedScope {
        match &tag.scope {
            ScopeSpec::LineCount(count) => {
                let last = document.last_line().unwrap_or(tag.line);
                let end = tag.line.saturating_add(*count).min(last.max(tag.line));
                ResolvedScope::bounded(
                    tag.line,
                    LineSpan::new(tag.line, end),
                    ScopeSource::LineCount,
                )
            }
            ScopeSpec::Unbounded => ResolvedScope::open(tag.line, ScopeSource::Unbounded),
            ScopeSpec::Semantic {
                kind,
                add_kinds,
                remove_kinds,
            } => self.resolve_semantic(document, tag, *kind, add_kinds, remove_kinds),
        }
    }

    /// Resolves every tag, in the order given.
    pub fn resolve_all(&self, document: &Document, tags: &[GuardTag]) -> Vec<ResolvedScope> {
        tags.iter().map(|tag| self.resolve(document, tag)).collect()
    }

    fn resolve_semantic(
        &self,
        document: &Document,
        tag: &GuardTag,
        kind: ScopeKind,
        add: &[String],
        remove: &[String],
    ) -> ResolvedScope {
        let inline = document.has_code_before(tag.line, tag.column);
        if inline && kind == ScopeKind::Sig {
            return ResolvedScope::bounded(
                tag.line,
                LineSpan::new(tag.line, tag.line),
                ScopeSource::InlineSignature,
            );
        }

        let query = self.query(document, tag, kind, add, remove, inline);
        for strategy in self.strategies() {
            match strategy.locate(&query) {
                Ok(Some(span)) => {
                    let start = if kind == ScopeKind::Body {
                        span.start
                    } else {
                        tag.line.min(span.start)
                    };
                    return ResolvedScope::bounded(
                        tag.line,
                        LineSpan::new(start, span.end),
                        strategy.source(),
                    );
                }
                Ok(None) => {
                    tracing::debug!(
                        line = tag.line,
                        scope = %kind,
                        strategy = strategy.name(),
                        "no semantic match, trying next strategy"
                    );
                }
                Err(error) => {
                    tracing::warn!(
                        line = tag.line,
                        scope = %kind,
                        strategy = strategy.name(),
                        %error,
                        "syntax tree query failed, treating as no match"
                    );
                }
            }
        }

        tracing::debug!(
            line = tag.line,
            scope = %kind,
            "semantic scope unresolved, extending to next tag"
        );
        ResolvedScope::open(tag.line, ScopeSource::Unresolved)
    }

    fn query<'q>(
        &self,
        document: &'q Document<'q>,
        tag: &'q GuardTag,
        kind: ScopeKind,
        add: &[String],
        remove: &[String],
        inline: bool,
    ) -> ScopeQuery<'q> {
        let language = document.language();
        let kinds = self.table.kind_set(language, kind, add, remove);
        let companion_kinds = match kind {
            ScopeKind::Sig => self.table.kind_set(language, ScopeKind::Body, &[], &[]),
            ScopeKind::Body => self
                .table
                .kind_set(language, ScopeKind::Sig, &[], &[])
                .union(self.table.kind_set(language, ScopeKind::Func, &[], &[]))
                .union(self.table.kind_set(language, ScopeKind::Class, &[], &[])),
            _ => KindSet::default(),
        };
        ScopeQuery {
            document,
            tag,
            kind,
            kinds,
            companion_kinds,
            search_start: if inline { tag.line } else { tag.line + 1 },
            scan_window: self.scan_window,
            inline,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::tagging::parse_tag;
    use crate::guard::testing::MemoryTree;

    fn resolve(source: &str, line: usize) -> ResolvedScope {
        let doc = Document::new(source);
        let tag = parse_tag(doc.line(line).unwrap(), line).expect("tag");
        ScopeResolver::new(LanguageScopeTable::builtin()).resolve(&doc, &tag)
    }

    #[test]
    fn line_count_includes_tag_line() {
        let scope = resolve("// @guard:ai:r.2\na\nb\nc", 0);
        assert_eq!((scope.start_line, scope.end_line), (0, Some(2)));
        assert_eq!(scope.source, ScopeSource::LineCount);
    }

    #[test]
    fn line_count_clamps_to_document() {
        let scope = resolve("a\n// @guard:ai:r.50\nb", 1);
        assert_eq!(scope.end_line, Some(2));
    }

    #[test]
    fn unbounded_stays_open() {
        let scope = resolve("// @guard:ai:n\ncode", 0);
        assert_eq!(scope.end_line, None);
        assert_eq!(scope.source, ScopeSource::Unbounded);
    }

    #[test]
    fn inline_signature_governs_its_own_line() {
        let scope = resolve("def f(a): # @guard:ai:r.sig\n    return a", 0);
        assert_eq!((scope.start_line, scope.end_line), (0, Some(0)));
        assert_eq!(scope.source, ScopeSource::InlineSignature);
    }

    #[test]
    fn falls_back_to_heuristic_without_tree() {
        let scope = resolve("# @guard:ai:r.func\ndef f():\n    return 1\n\nx = 2", 0);
        assert_eq!((scope.start_line, scope.end_line), (0, Some(2)));
        assert_eq!(scope.source, ScopeSource::Heuristic);
    }

    #[test]
    fn unresolvable_semantic_scope_stays_open() {
        let doc = Document::new("# @guard:ai:r.class\nx = 1\ny = 2");
        let tag = parse_tag(doc.line(0).unwrap(), 0).unwrap();
        let scope = ScopeResolver::new(LanguageScopeTable::builtin()).resolve(&doc, &tag);
        assert_eq!(scope.end_line, None);
        assert_eq!(scope.source, ScopeSource::Unresolved);
    }

    #[test]
    fn heuristic_can_be_disabled() {
        let doc = Document::new("# @guard:ai:r.func\ndef f():\n    return 1");
        let tag = parse_tag(doc.line(0).unwrap(), 0).unwrap();
        let scope = ScopeResolver::new(LanguageScopeTable::builtin())
            .with_heuristic_fallback(false)
            .resolve(&doc, &tag);
        assert_eq!(scope.source, ScopeSource::Unresolved);
    }

    #[test]
    fn syntax_tree_wins_over_heuristic() {
        let source = "# @guard:ai:r.func\ndef f():\n    return 1\n\nx = 2\n";
        let doc = Document::new(source).with_language("python");
        let mut tree = MemoryTree::new("module", 0, 0, 5, 0);
        let root = tree.root();
        let func = tree.add(root, "function_definition", 1, 0, 3, 0);
        tree.add(func, "block", 2, 4, 3, 0);
        let tag = parse_tag(doc.line(0).unwrap(), 0).unwrap();

        let scope = ScopeResolver::new(LanguageScopeTable::builtin())
            .with_tree(&tree)
            .resolve(&doc, &tag);
        assert_eq!((scope.start_line, scope.end_line), (0, Some(2)));
        assert_eq!(scope.source, ScopeSource::SyntaxTree);
    }

    #[test]
    fn failing_provider_falls_back() {
        let source = "# @guard:ai:r.func\ndef f():\n    return 1\n";
        let doc = Document::new(source).with_language("python");
        let tree = MemoryTree::new("module", 0, 0, 3, 0).failing(ProviderError::Timeout);
        let tag = parse_tag(doc.line(0).unwrap(), 0).unwrap();

        let scope = ScopeResolver::new(LanguageScopeTable::builtin())
            .with_tree(&tree)
            .resolve(&doc, &tag);
        assert_eq!(scope.source, ScopeSource::Heuristic);
        assert_eq!(scope.end_line, Some(2));
    }
}
