//! Guard tag grammar
//!
//! The wire format, matched case-insensitively:
//!
//!     <prefix>@guard:(ai|human)([ident])?:(r|w|n|context)(.(word|digits))?(+word)*(-word)*
//!
//! where `<prefix>` is one of `//`, `#`, `--`, `/*`, `<!--`. Whatever follows
//! the longest match (a closing `*/`, `-->`, prose, stray letters) is not part
//! of the grammar: `@guard:ai:rw` reads as `ai:r` and `@guard:ai:n.func2` as
//! `ai:n.func`.

use once_cell::sync::Lazy;
use regex::{Captures, Regex};

use crate::guard::tag::{Permission, ScopeKind, ScopeSpec, Target};

pub(super) static GUARD_TAG_REGEX: Lazy<Regex> = Lazy::new(|| {
    Regex::new(concat!(
        r"(?i)(?P<prefix>//|#|--|/\*|<!--)\s*",
        r"@guard:(?P<target>ai|human)",
        r"(?:\[(?P<identifier>[^\]]+)\])?",
        r":(?P<permission>r|w|n|context)",
        r"(?:\.(?P<scope>[a-zA-Z]+|\d+))?",
        r"(?P<adds>(?:\+[a-zA-Z]+)*)",
        r"(?P<removes>(?:-[a-zA-Z]+)*)",
    ))
    .expect("guard tag grammar is a valid regex")
});

/// The pieces of one syntactic match, before semantic checks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(super) struct RawTag<'t> {
    pub column: usize,
    pub target: &'t str,
    pub identifier: Option<&'t str>,
    pub permission: &'t str,
    pub scope: Option<&'t str>,
    pub adds: &'t str,
    pub removes: &'t str,
}

/// All syntactic matches on a line, left to right.
pub(super) fn raw_matches(line: &str) -> impl Iterator<Item = RawTag<'_>> {
    GUARD_TAG_REGEX
        .captures_iter(line)
        .filter_map(|caps| raw_tag(&caps))
}

fn raw_tag<'t>(caps: &Captures<'t>) -> Option<RawTag<'t>> {
    Some(RawTag {
        column: caps.name("prefix")?.start(),
        target: caps.name("target")?.as_str(),
        identifier: caps.name("identifier").map(|m| m.as_str()),
        permission: caps.name("permission")?.as_str(),
        scope: caps.name("scope").map(|m| m.as_str()),
        adds: caps.name("adds").map(|m| m.as_str()).unwrap_or(""),
        removes: caps.name("removes").map(|m| m.as_str()).unwrap_or(""),
    })
}

pub(super) fn parse_target(raw: &str) -> Option<Target> {
    raw.parse().ok()
}

pub(super) fn parse_permission(raw: &str) -> Option<Permission> {
    raw.parse().ok()
}

/// Builds the scope from its suffix. Digits give a line count, a keyword a
/// semantic scope; an unknown keyword or an overflowing count invalidates the
/// tag. Modifiers without a semantic keyword are ignored.
pub(super) fn parse_scope(scope: Option<&str>, adds: &str, removes: &str) -> Option<ScopeSpec> {
    let Some(scope) = scope else {
        return Some(ScopeSpec::Unbounded);
    };
    if scope.chars().all(|ch| ch.is_ascii_digit()) {
        return scope.parse().ok().map(ScopeSpec::LineCount);
    }
    let kind = ScopeKind::from_keyword(scope)?;
    Some(ScopeSpec::Semantic {
        kind,
        add_kinds: split_modifiers(adds, '+'),
        remove_kinds: split_modifiers(removes, '-'),
    })
}

fn split_modifiers(raw: &str, separator: char) -> Vec<String> {
    raw.split(separator)
        .filter(|part| !part.is_empty())
        .map(str::to_ascii_lowercase)
        .collect()
}
