//! Region Builder
//!
//!     Turns tags and their resolved scopes into gap-free regions, one run of
//!     lines per permission change, for each target.
//!
//! The Guard Stack
//!
//!     Each target has its own [`GuardStack`] of active frames, owned by one
//!     [`build_regions`] call. The document is walked line by line; at each
//!     line expired frames are popped first, then tags whose scope starts on
//!     that line are pushed. The frame on top governs the line; with an empty
//!     stack the configured default does.
//!
//!         push     A context frame on top is dropped first and never comes
//!                  back. An unbounded frame replaces the whole stack: it lasts
//!                  until the next unbounded tag for the target.
//!         expire   Every frame on top whose last line is behind the walk is
//!                  popped, so expiry cascades through whatever it exposes.
//!
//!     Blank lines take part in the walk like any other line, so they inherit
//!     the frame on top rather than the default.
//!
//! Context Frames
//!
//!     A context frame covers the tag line and the documentation block right
//!     after it: comment and docstring lines, stopping at a blank line outside
//!     a block, at code, or at the next tag line. An explicit scope can only
//!     shorten that.

use std::collections::BTreeSet;

use super::document::Document;
use super::scoping::ResolvedScope;
use super::tag::{GuardTag, Permission, PermissionDefaults, Region, Target};

/// One active entry on a guard stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame {
    pub tag_line: usize,
    pub permission: Permission,
    pub is_context: bool,
    /// Last governed line; `None` for unbounded frames.
    pub bound: Option<usize>,
}

/// Active frames for one target, innermost last.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuardStack {
    frames: Vec<Frame>,
}

impl GuardStack {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, frame: Frame) {
        if self.frames.last().is_some_and(|top| top.is_context) {
            if let Some(interrupted) = self.frames.pop() {
                tracing::trace!(
                    tag_line = interrupted.tag_line,
                    by = frame.tag_line,
                    "context interrupted"
                );
            }
        }
        if frame.bound.is_none() {
            self.frames.clear();
        }
        tracing::trace!(
            tag_line = frame.tag_line,
            permission = %frame.permission,
            bound = ?frame.bound,
            depth = self.frames.len() + 1,
            "push"
        );
        self.frames.push(frame);
    }

    /// Pops every frame on top whose bound is before `line`. Returns how many
    /// were popped.
    pub fn expire(&mut self, line: usize) -> usize {
        let mut popped = 0;
        while let Some(top) = self.frames.last() {
            match top.bound {
                Some(bound) if bound < line => {
                    tracing::trace!(tag_line = top.tag_line, bound, line, "expire");
                    self.frames.pop();
                    popped += 1;
                }
                _ => break,
            }
        }
        popped
    }

    /// Removes the top frame. Popping an empty stack does nothing.
    pub fn pop(&mut self) -> Option<Frame> {
        self.frames.pop()
    }

    pub fn top(&self) -> Option<&Frame> {
        self.frames.last()
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }
}

/// A tag ready to be pushed: where it starts and the frame it becomes.
#[derive(Debug, Clone, Copy)]
struct Activation {
    start_line: usize,
    frame: Frame,
}

/// Builds the regions for both targets.
///
/// `tags` and `scopes` are parallel: `scopes[i]` is the resolved scope of
/// `tags[i]`. The result covers every line of the document exactly once per
/// target and is ordered by start line, then target.
pub fn build_regions(
    document: &Document,
    tags: &[GuardTag],
    scopes: &[ResolvedScope],
    defaults: PermissionDefaults,
) -> Vec<Region> {
    debug_assert_eq!(tags.len(), scopes.len());
    let tag_lines: BTreeSet<usize> = tags.iter().map(|tag| tag.line).collect();

    let mut regions = Vec::new();
    for target in Target::ALL {
        let mut activations: Vec<Activation> = tags
            .iter()
            .zip(scopes)
            .filter(|(tag, _)| tag.target == target)
            .map(|(tag, scope)| activation(document, tag, scope, &tag_lines))
            .collect();
        activations.sort_by_key(|a| (a.start_line, a.frame.tag_line));
        regions.extend(walk(document, target, &activations, defaults));
    }
    regions.sort_by_key(|region| (region.start_line, region.target));
    regions
}

fn activation(
    document: &Document,
    tag: &GuardTag,
    scope: &ResolvedScope,
    tag_lines: &BTreeSet<usize>,
) -> Activation {
    let is_context = tag.permission.is_context();
    let bound = if is_context {
        Some(context_end(document, scope, tag_lines))
    } else {
        scope.end_line
    };
    Activation {
        start_line: scope.start_line,
        frame: Frame {
            tag_line: tag.line,
            permission: tag.permission,
            is_context,
            bound,
        },
    }
}

/// Last line of the documentation block a context tag covers.
fn context_end(document: &Document, scope: &ResolvedScope, tag_lines: &BTreeSet<usize>) -> usize {
    let start = scope.start_line;
    let limit = match (scope.end_line, document.last_line()) {
        (Some(end), Some(last)) => end.min(last),
        (None, Some(last)) => last,
        (_, None) => start,
    };
    (start + 1..=limit)
        .take_while(|line| !tag_lines.contains(line) && document.is_documentation(*line))
        .last()
        .unwrap_or(start)
}

fn walk(
    document: &Document,
    target: Target,
    activations: &[Activation],
    defaults: PermissionDefaults,
) -> Vec<Region> {
    let mut stack = GuardStack::new();
    let mut pending = activations.iter().peekable();
    let mut runs: Vec<Region> = Vec::new();

    for line in 0..document.line_count() {
        stack.expire(line);
        while let Some(activation) = pending.next_if(|a| a.start_line <= line) {
            stack.push(activation.frame);
        }

        let (permission, is_context, source) = match stack.top() {
            Some(frame) => (frame.permission, frame.is_context, Some(frame.tag_line)),
            None => (defaults.for_target(target), false, None),
        };
        match runs.last_mut() {
            Some(run)
                if run.source_tag_line == source
                    && run.permission == permission
                    && run.is_context == is_context =>
            {
                run.end_line = line;
            }
            _ => runs.push(Region {
                start_line: line,
                end_line: line,
                target,
                permission,
                source_tag_line: source,
                is_context,
            }),
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::scoping::{LanguageScopeTable, ScopeResolver};
    use crate::guard::tagging::parse_tags;

    fn regions_for(source: &str, target: Target) -> Vec<(usize, usize, Permission, Option<usize>)> {
        let doc = Document::new(source);
        let tags = parse_tags(&doc);
        let scopes = ScopeResolver::new(LanguageScopeTable::builtin()).resolve_all(&doc, &tags);
        build_regions(&doc, &tags, &scopes, PermissionDefaults::default())
            .into_iter()
            .filter(|region| region.target == target)
            .map(|r| (r.start_line, r.end_line, r.permission, r.source_tag_line))
            .collect()
    }

    fn frame(tag_line: usize, permission: Permission, bound: Option<usize>) -> Frame {
        Frame {
            tag_line,
            permission,
            is_context: permission.is_context(),
            bound,
        }
    }

    #[test]
    fn bounded_region_reverts_to_enclosing_tag() {
        let source = "// @guard:ai:w\na();\n// @guard:ai:r.1\nb();\nc();";
        assert_eq!(
            regions_for(source, Target::Ai),
            vec![
                (0, 1, Permission::Write, Some(0)),
                (2, 3, Permission::Read, Some(2)),
                (4, 4, Permission::Write, Some(0)),
            ]
        );
        assert_eq!(
            regions_for(source, Target::Human),
            vec![(0, 4, Permission::Write, None)]
        );
    }

    #[test]
    fn context_is_trimmed_to_its_documentation_block() {
        let source = "# @guard:ai:context\n# doc1\n# doc2\n\n# @guard:ai:r\ncode";
        assert_eq!(
            regions_for(source, Target::Ai),
            vec![
                (0, 2, Permission::Context, Some(0)),
                (3, 3, Permission::Read, None),
                (4, 5, Permission::Read, Some(4)),
            ]
        );
    }

    #[test]
    fn context_does_not_resume_after_unbounded_tag() {
        let source = "// @guard:ai:context\n// doc\n// @guard:ai:n\ncode\n// trailing comment";
        assert_eq!(
            regions_for(source, Target::Ai),
            vec![
                (0, 1, Permission::Context, Some(0)),
                (2, 4, Permission::None, Some(2)),
            ]
        );
    }

    #[test]
    fn context_does_not_resume_after_bounded_tag() {
        let source = "// @guard:ai:context\n// doc\n// @guard:ai:n.2\nx();\ny();\n// trailing";
        assert_eq!(
            regions_for(source, Target::Ai),
            vec![
                (0, 1, Permission::Context, Some(0)),
                (2, 4, Permission::None, Some(2)),
                (5, 5, Permission::Read, None),
            ]
        );
    }

    #[test]
    fn context_block_spans_docstring_blank_lines() {
        let source = "# @guard:ai:context\n\"\"\"\nAbout this.\n\nMore.\n\"\"\"\nx = 1";
        assert_eq!(
            regions_for(source, Target::Ai),
            vec![
                (0, 5, Permission::Context, Some(0)),
                (6, 6, Permission::Read, None),
            ]
        );
    }

    #[test]
    fn blank_lines_inherit_the_active_tag() {
        let source = "// @guard:ai:n\nx();\n\n   \ny();";
        assert_eq!(
            regions_for(source, Target::Ai),
            vec![(0, 4, Permission::None, Some(0))]
        );
    }

    #[test]
    fn body_scope_leaves_signature_alone() {
        let source = "# @guard:ai:w.body\ndef f(a):\n    return a\nx = 1";
        assert_eq!(
            regions_for(source, Target::Ai),
            vec![
                (0, 1, Permission::Read, None),
                (2, 2, Permission::Write, Some(0)),
                (3, 3, Permission::Read, None),
            ]
        );
    }

    #[test]
    fn nested_bounded_regions_unwind_in_order() {
        let source = "# @guard:ai:w.6\na\n# @guard:ai:n.1\nb\nc\nd\ne\nf";
        assert_eq!(
            regions_for(source, Target::Ai),
            vec![
                (0, 1, Permission::Write, Some(0)),
                (2, 3, Permission::None, Some(2)),
                (4, 6, Permission::Write, Some(0)),
                (7, 7, Permission::Read, None),
            ]
        );
    }

    #[test]
    fn targets_are_independent() {
        let source = "// @guard:human:n\n// @guard:ai:w.1\nx\ny";
        assert_eq!(
            regions_for(source, Target::Human),
            vec![(0, 3, Permission::None, Some(0))]
        );
        assert_eq!(
            regions_for(source, Target::Ai),
            vec![
                (0, 0, Permission::Read, None),
                (1, 2, Permission::Write, Some(1)),
                (3, 3, Permission::Read, None),
            ]
        );
    }

    #[test]
    fn empty_document_has_no_regions() {
        assert!(regions_for("", Target::Ai).is_empty());
    }

    #[test]
    fn push_interrupts_context_on_top() {
        let mut stack = GuardStack::new();
        stack.push(frame(0, Permission::Write, None));
        stack.push(frame(1, Permission::Context, Some(3)));
        stack.push(frame(2, Permission::None, Some(2)));
        assert_eq!(stack.depth(), 2);
        assert_eq!(stack.expire(3), 1);
        assert_eq!(stack.top().map(|f| f.permission), Some(Permission::Write));
    }

    #[test]
    fn expiry_cascades_through_exposed_frames() {
        let mut stack = GuardStack::new();
        stack.push(frame(0, Permission::Write, Some(1)));
        stack.push(frame(1, Permission::None, Some(5)));
        assert_eq!(stack.expire(3), 0);
        assert_eq!(stack.expire(6), 2);
        assert!(stack.is_empty());
        assert_eq!(stack.pop(), None);
    }

    #[test]
    fn unbounded_push_replaces_the_stack() {
        let mut stack = GuardStack::new();
        stack.push(frame(0, Permission::Write, Some(9)));
        stack.push(frame(1, Permission::None, Some(9)));
        stack.push(frame(2, Permission::Read, None));
        assert_eq!(stack.depth(), 1);
    }
}
