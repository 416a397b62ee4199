//! Guard data model
//!
//! Everything the pipeline passes between stages lives here: the parsed
//! [`GuardTag`], the [`Region`]s built from tags, and the final
//! [`LinePermission`] for each line. All line numbers are 0-based.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::error::GuardError;

/// The actor class a guard tag applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Ai,
    Human,
}

impl Target {
    pub const ALL: [Target; 2] = [Target::Ai, Target::Human];

    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Ai => "ai",
            Target::Human => "human",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "ai" => Ok(Target::Ai),
            "human" => Ok(Target::Human),
            other => Err(GuardError::InvalidTarget(other.to_string())),
        }
    }
}

/// Access level granted to a target.
///
/// `Context` is not a visibility level: it marks documentation the target
/// should read as background. Context regions get special stack treatment
/// (they are interrupted by any later tag for the same target and never
/// resume).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Permission {
    #[serde(rename = "r")]
    Read,
    #[serde(rename = "w")]
    Write,
    #[serde(rename = "n")]
    None,
    #[serde(rename = "context")]
    Context,
}

impl Permission {
    /// The spelling used in guard tags.
    pub fn as_tag_str(&self) -> &'static str {
        match self {
            Permission::Read => "r",
            Permission::Write => "w",
            Permission::None => "n",
            Permission::Context => "context",
        }
    }

    pub fn is_context(&self) -> bool {
        matches!(self, Permission::Context)
    }
}

impl fmt::Display for Permission {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_tag_str())
    }
}

impl FromStr for Permission {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "r" => Ok(Permission::Read),
            "w" => Ok(Permission::Write),
            "n" => Ok(Permission::None),
            "context" => Ok(Permission::Context),
            other => Err(GuardError::InvalidPermission(other.to_string())),
        }
    }
}

/// Semantic constructs a scope can name.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScopeKind {
    Func,
    Class,
    Block,
    Sig,
    Body,
    Stmt,
    Expr,
}

impl ScopeKind {
    pub const ALL: [ScopeKind; 7] = [
        ScopeKind::Func,
        ScopeKind::Class,
        ScopeKind::Block,
        ScopeKind::Sig,
        ScopeKind::Body,
        ScopeKind::Stmt,
        ScopeKind::Expr,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            ScopeKind::Func => "func",
            ScopeKind::Class => "class",
            ScopeKind::Block => "block",
            ScopeKind::Sig => "sig",
            ScopeKind::Body => "body",
            ScopeKind::Stmt => "stmt",
            ScopeKind::Expr => "expr",
        }
    }

    /// Case-insensitive keyword lookup.
    pub fn from_keyword(keyword: &str) -> Option<Self> {
        let lowered = keyword.to_ascii_lowercase();
        ScopeKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == lowered)
    }
}

impl fmt::Display for ScopeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How far a tag reaches.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeSpec {
    /// The tag line plus the next `n` lines.
    LineCount(usize),
    /// A syntactic construct following the tag, with node-kind modifiers
    /// from `+name` / `-name` suffixes (lowercased, in source order).
    Semantic {
        kind: ScopeKind,
        add_kinds: Vec<String>,
        remove_kinds: Vec<String>,
    },
    /// No scope suffix: until the next tag for the same target, or end of file.
    Unbounded,
}

impl ScopeSpec {
    pub fn semantic(kind: ScopeKind) -> Self {
        ScopeSpec::Semantic {
            kind,
            add_kinds: Vec::new(),
            remove_kinds: Vec::new(),
        }
    }

    pub fn is_unbounded(&self) -> bool {
        matches!(self, ScopeSpec::Unbounded)
    }
}

impl fmt::Display for ScopeSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ScopeSpec::LineCount(n) => write!(f, "{}", n),
            ScopeSpec::Semantic {
                kind,
                add_kinds,
                remove_kinds,
            } => {
                write!(f, "{}", kind)?;
                for add in add_kinds {
                    write!(f, "+{}", add)?;
                }
                for remove in remove_kinds {
                    write!(f, "-{}", remove)?;
                }
                Ok(())
            }
            ScopeSpec::Unbounded => f.write_str("none"),
        }
    }
}

/// One parsed guard tag. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardTag {
    /// Line the tag is declared on.
    pub line: usize,
    /// Byte column of the comment prefix that introduces the tag.
    pub column: usize,
    pub target: Target,
    /// Raw text between the brackets in `ai[...]`, trimmed. Display only.
    pub identifier: Option<String>,
    pub permission: Permission,
    pub scope: ScopeSpec,
}

impl GuardTag {
    pub fn new(line: usize, target: Target, permission: Permission, scope: ScopeSpec) -> Self {
        Self {
            line,
            column: 0,
            target,
            identifier: None,
            permission,
            scope,
        }
    }

    pub fn with_identifier(mut self, identifier: impl Into<String>) -> Self {
        self.identifier = Some(identifier.into());
        self
    }

    pub fn with_column(mut self, column: usize) -> Self {
        self.column = column;
        self
    }

    /// The comma-separated parts of the identifier, trimmed, empties dropped.
    pub fn identifiers(&self) -> Vec<&str> {
        self.identifier
            .as_deref()
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|part| !part.is_empty())
                    .collect()
            })
            .unwrap_or_default()
    }

    /// The tag spelled back out, without its comment prefix.
    pub fn to_tag_string(&self) -> String {
        let mut out = format!("@guard:{}", self.target);
        if let Some(identifier) = &self.identifier {
            out.push_str(&format!("[{}]", identifier));
        }
        out.push_str(&format!(":{}", self.permission));
        if !self.scope.is_unbounded() {
            out.push_str(&format!(".{}", self.scope));
        }
        out
    }
}

/// A run of lines governed by one permission for one target.
///
/// `source_tag_line` is `None` for the synthetic default region covering lines
/// no tag reaches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Region {
    pub start_line: usize,
    /// Inclusive.
    pub end_line: usize,
    pub target: Target,
    pub permission: Permission,
    pub source_tag_line: Option<usize>,
    pub is_context: bool,
}

impl Region {
    pub fn new(
        start_line: usize,
        end_line: usize,
        target: Target,
        permission: Permission,
        source_tag_line: Option<usize>,
    ) -> Self {
        Self {
            start_line,
            end_line,
            target,
            permission,
            source_tag_line,
            is_context: permission.is_context(),
        }
    }

    pub fn contains(&self, line: usize) -> bool {
        self.start_line <= line && line <= self.end_line
    }

    pub fn overlaps(&self, other: &Region) -> bool {
        self.start_line <= other.end_line && other.start_line <= self.end_line
    }

    pub fn line_count(&self) -> usize {
        self.end_line + 1 - self.start_line
    }

    pub fn is_default(&self) -> bool {
        self.source_tag_line.is_none()
    }
}

impl fmt::Display for Region {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}:{} [{}-{}]",
            self.target, self.permission, self.start_line, self.end_line
        )?;
        match self.source_tag_line {
            Some(line) => write!(f, " from line {}", line),
            None => write!(f, " (default)"),
        }
    }
}

/// Final permissions for one line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LinePermission {
    pub line: usize,
    pub ai: Permission,
    pub human: Permission,
    pub is_context_ai: bool,
    pub is_context_human: bool,
}

impl LinePermission {
    pub fn permission_for(&self, target: Target) -> Permission {
        match target {
            Target::Ai => self.ai,
            Target::Human => self.human,
        }
    }

    pub fn is_context_for(&self, target: Target) -> bool {
        match target {
            Target::Ai => self.is_context_ai,
            Target::Human => self.is_context_human,
        }
    }
}

/// Permissions applied to lines no tag governs.
///
/// The baseline posture is "AI read-only, human full access".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionDefaults {
    pub ai: Permission,
    pub human: Permission,
}

impl PermissionDefaults {
    pub fn for_target(&self, target: Target) -> Permission {
        match target {
            Target::Ai => self.ai,
            Target::Human => self.human,
        }
    }
}

impl Default for PermissionDefaults {
    fn default() -> Self {
        Self {
            ai: Permission::Read,
            human: Permission::Write,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_round_trips_through_tag_spelling() {
        for permission in [
            Permission::Read,
            Permission::Write,
            Permission::None,
            Permission::Context,
        ] {
            assert_eq!(permission.as_tag_str().parse::<Permission>().unwrap(), permission);
        }
        assert!("x".parse::<Permission>().is_err());
        assert_eq!("CONTEXT".parse::<Permission>().unwrap(), Permission::Context);
    }

    #[test]
    fn scope_keywords_are_case_insensitive() {
        assert_eq!(ScopeKind::from_keyword("FUNC"), Some(ScopeKind::Func));
        assert_eq!(ScopeKind::from_keyword("Body"), Some(ScopeKind::Body));
        assert_eq!(ScopeKind::from_keyword("method"), None);
    }

    #[test]
    fn identifiers_split_on_commas() {
        let tag = GuardTag::new(0, Target::Ai, Permission::Read, ScopeSpec::Unbounded)
            .with_identifier("gpt-4, claude ,");
        assert_eq!(tag.identifiers(), vec!["gpt-4", "claude"]);
    }

    #[test]
    fn tag_string_spells_scope_modifiers() {
        let tag = GuardTag::new(
            3,
            Target::Human,
            Permission::None,
            ScopeSpec::Semantic {
                kind: ScopeKind::Block,
                add_kinds: vec!["class".into()],
                remove_kinds: vec!["if".into()],
            },
        )
        .with_identifier("team-a");
        assert_eq!(tag.to_tag_string(), "@guard:human[team-a]:n.block+class-if");
    }

    #[test]
    fn region_overlap_is_inclusive() {
        let a = Region::new(0, 3, Target::Ai, Permission::Read, Some(0));
        let b = Region::new(3, 5, Target::Ai, Permission::Write, Some(3));
        let c = Region::new(4, 5, Target::Ai, Permission::Write, Some(4));
        assert!(a.overlaps(&b));
        assert!(!a.overlaps(&c));
        assert_eq!(a.line_count(), 4);
    }

    #[test]
    fn context_regions_are_flagged() {
        let region = Region::new(0, 2, Target::Ai, Permission::Context, Some(0));
        assert!(region.is_context);
        assert!(!region.is_default());
    }
}
