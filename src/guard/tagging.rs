//! Tag Parser
//!
//!     Turns one line of text into zero or one [GuardTag]. Scanning is
//!     fail-soft: a malformed tag (unknown permission letter, unknown scope
//!     keyword) means "no tag" and the line is ordinary content. Nothing a
//!     comment says can abort the scan of a file.
//!
//!     A line carries at most one tag. The first match that decodes cleanly
//!     wins; anything after the matched text is ignored, so `@guard:ai:w:`
//!     grants write and `@guard:ai:rw` grants read.
//!
//! See [grammar](grammar) for the exact wire format.

mod grammar;

use super::document::Document;
use super::tag::GuardTag;

/// Parses the tag on one line, if any. `line_number` is stored on the tag.
pub fn parse_tag(line: &str, line_number: usize) -> Option<GuardTag> {
    grammar::raw_matches(line).find_map(|raw| {
        let target = grammar::parse_target(raw.target)?;
        let permission = grammar::parse_permission(raw.permission)?;
        let scope = grammar::parse_scope(raw.scope, raw.adds, raw.removes)?;
        let identifier = raw
            .identifier
            .map(str::trim)
            .filter(|identifier| !identifier.is_empty())
            .map(str::to_string);
        Some(GuardTag {
            line: line_number,
            column: raw.column,
            target,
            identifier,
            permission,
            scope,
        })
    })
}

/// Parses every line of a document, returning tags in line order.
pub fn parse_tags(document: &Document) -> Vec<GuardTag> {
    document
        .lines()
        .iter()
        .enumerate()
        .filter_map(|(line_number, line)| parse_tag(line, line_number))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::tag::{Permission, ScopeKind, ScopeSpec, Target};
    use rstest::rstest;

    #[rstest]
    #[case("// @guard:ai:r", Target::Ai, Permission::Read)]
    #[case("# @guard:human:w", Target::Human, Permission::Write)]
    #[case("-- @guard:ai:n", Target::Ai, Permission::None)]
    #[case("/* @guard:human:context */", Target::Human, Permission::Context)]
    #[case("<!-- @guard:ai:w -->", Target::Ai, Permission::Write)]
    #[case("//@guard:AI:R", Target::Ai, Permission::Read)]
    #[case("    # @GUARD:Human:CONTEXT", Target::Human, Permission::Context)]
    fn parses_each_comment_style(
        #[case] line: &str,
        #[case] target: Target,
        #[case] permission: Permission,
    ) {
        let tag = parse_tag(line, 4).expect("tag to parse");
        assert_eq!(tag.line, 4);
        assert_eq!(tag.target, target);
        assert_eq!(tag.permission, permission);
        assert_eq!(tag.scope, ScopeSpec::Unbounded);
    }

    #[rstest]
    #[case("// @guard:ai:x")]
    #[case("// @guard:robot:r")]
    #[case("// @guard:ai:r.method")]
    #[case("@guard:ai:r")]
    #[case("let s = \"@guard:ai:r\";")]
    #[case("// guard:ai:r")]
    #[case("// @guard:ai[]:r")]
    fn rejects_malformed_tags(#[case] line: &str) {
        assert_eq!(parse_tag(line, 0), None);
    }

    #[rstest]
    #[case("// @guard:ai:r.5", ScopeSpec::LineCount(5))]
    #[case("// @guard:ai:r.0", ScopeSpec::LineCount(0))]
    #[case("# @guard:ai:n.func", ScopeSpec::semantic(ScopeKind::Func))]
    #[case("# @guard:ai:n.CLASS", ScopeSpec::semantic(ScopeKind::Class))]
    #[case("# @guard:ai:w.body", ScopeSpec::semantic(ScopeKind::Body))]
    #[case("# @guard:ai:r.sig", ScopeSpec::semantic(ScopeKind::Sig))]
    #[case("# @guard:ai:r.stmt", ScopeSpec::semantic(ScopeKind::Stmt))]
    #[case("# @guard:ai:r.expr", ScopeSpec::semantic(ScopeKind::Expr))]
    fn parses_scopes(#[case] line: &str, #[case] scope: ScopeSpec) {
        assert_eq!(parse_tag(line, 0).expect("tag").scope, scope);
    }

    #[test]
    fn parses_modifiers() {
        let tag = parse_tag("// @guard:ai:n.block+class+Impl-if", 0).expect("tag");
        assert_eq!(
            tag.scope,
            ScopeSpec::Semantic {
                kind: ScopeKind::Block,
                add_kinds: vec!["class".into(), "impl".into()],
                remove_kinds: vec!["if".into()],
            }
        );
    }

    #[test]
    fn parses_identifiers() {
        let tag = parse_tag("// @guard:ai[gpt-4, claude]:w", 0).expect("tag");
        assert_eq!(tag.identifier.as_deref(), Some("gpt-4, claude"));
        assert_eq!(tag.identifiers(), vec!["gpt-4", "claude"]);

        let tag = parse_tag("# @guard:human[team-a]:n", 0).expect("tag");
        assert_eq!(tag.target, Target::Human);
        assert_eq!(tag.identifier.as_deref(), Some("team-a"));
    }

    #[rstest]
    #[case("// @guard:ai:w: refactor freely", Permission::Write, ScopeSpec::Unbounded)]
    #[case("// @guard:ai:rw", Permission::Read, ScopeSpec::Unbounded)]
    #[case("// @guard:ai:read", Permission::Read, ScopeSpec::Unbounded)]
    #[case("# @guard:ai:r_note", Permission::Read, ScopeSpec::Unbounded)]
    #[case("// @guard:ai:r.", Permission::Read, ScopeSpec::Unbounded)]
    #[case(
        "// @guard:ai:n.func2",
        Permission::None,
        ScopeSpec::semantic(ScopeKind::Func)
    )]
    #[case("// @guard:ai:r.12abc", Permission::Read, ScopeSpec::LineCount(12))]
    fn trailing_characters_do_not_extend_the_tag(
        #[case] line: &str,
        #[case] permission: Permission,
        #[case] scope: ScopeSpec,
    ) {
        let tag = parse_tag(line, 0).expect("tag");
        assert_eq!(tag.target, Target::Ai);
        assert_eq!(tag.permission, permission);
        assert_eq!(tag.scope, scope);
    }

    #[test]
    fn trailing_prose_is_not_grammar() {
        let tag = parse_tag("// @guard:ai:r.3 keep these three lines stable", 0).expect("tag");
        assert_eq!(tag.scope, ScopeSpec::LineCount(3));

        let tag = parse_tag("// @guard:ai:w. Anything goes below.", 0).expect("tag");
        assert_eq!(tag.scope, ScopeSpec::Unbounded);
    }

    #[test]
    fn first_valid_match_wins() {
        let tag = parse_tag("// @guard:ai:r // @guard:human:n", 0).expect("tag");
        assert_eq!(tag.target, Target::Ai);

        let tag = parse_tag("// @guard:ai:bad # @guard:human:n", 0).expect("tag");
        assert_eq!(tag.target, Target::Human);
    }

    #[test]
    fn inline_tags_record_their_column() {
        let line = "def inline_guard(a, b): # @guard:ai:r.sig";
        let tag = parse_tag(line, 9).expect("tag");
        assert_eq!(tag.column, line.find('#').unwrap());
        assert_eq!(tag.scope, ScopeSpec::semantic(ScopeKind::Sig));
    }

    #[test]
    fn parse_tags_scans_a_document_in_order() {
        let doc = Document::new("// @guard:ai:w\na();\n// @guard:human:r.1\nb();");
        let tags = parse_tags(&doc);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].line, 0);
        assert_eq!(tags[1].line, 2);
        assert_eq!(tags[1].target, Target::Human);
    }
}
