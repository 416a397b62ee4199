//! Language scope-kind table
//!
//! Which syntax node types count as a `func`, a `class`, a `block`... is data,
//! not code. The table maps each language id to node-kind lists per scope
//! keyword; adding a language means adding JSON, never touching the resolver.
//!
//! A language may `extend` another: its `scopes` lists are appended to the
//! parent's, its `overrides` lists replace them. Inheritance is resolved once,
//! when the table is loaded. A cycle or an unknown parent is logged and cut;
//! the table still loads.
//!
//! The built-in table is embedded from `language-scopes.json`.

use once_cell::sync::Lazy;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use crate::guard::error::{GuardError, GuardResult};
use crate::guard::tag::ScopeKind;

const BUILTIN_JSON: &str = include_str!("language-scopes.json");

static BUILTIN: Lazy<LanguageScopeTable> = Lazy::new(|| {
    LanguageScopeTable::from_json(BUILTIN_JSON).expect("built-in language scope table is valid")
});

#[derive(Debug, Deserialize)]
struct RawTable {
    version: String,
    languages: BTreeMap<String, RawLanguage>,
}

#[derive(Debug, Default, Deserialize)]
struct RawLanguage {
    #[serde(default)]
    extends: Option<String>,
    #[serde(default)]
    extensions: Vec<String>,
    #[serde(default)]
    scopes: BTreeMap<String, Vec<String>>,
    #[serde(default)]
    overrides: BTreeMap<String, Vec<String>>,
}

/// Resolved scope lists for one language, inheritance already applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageScopes {
    pub id: String,
    pub extensions: Vec<String>,
    scopes: BTreeMap<String, Vec<String>>,
}

impl LanguageScopes {
    /// Node kinds listed for a scope name (a scope keyword or a custom name).
    pub fn kinds(&self, scope: &str) -> &[String] {
        self.scopes.get(scope).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn has_scope(&self, scope: &str) -> bool {
        self.scopes.contains_key(scope)
    }

    pub fn scope_names(&self) -> impl Iterator<Item = &str> {
        self.scopes.keys().map(String::as_str)
    }
}

/// The set of node kinds a semantic scope accepts.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KindSet {
    kinds: BTreeSet<String>,
}

impl KindSet {
    pub fn contains(&self, kind: &str) -> bool {
        self.kinds.contains(kind)
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.kinds.iter().map(String::as_str)
    }

    pub fn union(mut self, other: KindSet) -> KindSet {
        self.kinds.extend(other.kinds);
        self
    }
}

impl<S: Into<String>> FromIterator<S> for KindSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            kinds: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Per-language node-kind lists, keyed by language id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LanguageScopeTable {
    version: String,
    languages: BTreeMap<String, LanguageScopes>,
}

impl LanguageScopeTable {
    /// The table shipped with the engine.
    pub fn builtin() -> &'static LanguageScopeTable {
        &BUILTIN
    }

    pub fn from_json(json: &str) -> GuardResult<Self> {
        let raw: RawTable = serde_json::from_str(json)?;
        if raw.languages.is_empty() {
            return Err(GuardError::ScopeTable("no languages defined".to_string()));
        }
        let languages = raw
            .languages
            .keys()
            .map(|id| {
                let mut visited = BTreeSet::new();
                let scopes = resolve_language(&raw.languages, id, &mut visited);
                let extensions = raw.languages[id]
                    .extensions
                    .iter()
                    .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                    .collect();
                (
                    id.clone(),
                    LanguageScopes {
                        id: id.clone(),
                        extensions,
                        scopes,
                    },
                )
            })
            .collect();
        Ok(Self {
            version: raw.version,
            languages,
        })
    }

    pub fn from_path(path: impl AsRef<Path>) -> GuardResult<Self> {
        let json = std::fs::read_to_string(path)?;
        Self::from_json(&json)
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn language(&self, id: &str) -> Option<&LanguageScopes> {
        self.languages.get(id)
    }

    pub fn languages(&self) -> impl Iterator<Item = &LanguageScopes> {
        self.languages.values()
    }

    /// Language id for a file, from its extension (case-insensitive).
    pub fn detect_language(&self, path: &Path) -> Option<&str> {
        let extension = path.extension()?.to_str()?.to_ascii_lowercase();
        self.languages
            .values()
            .find(|language| language.extensions.iter().any(|ext| *ext == extension))
            .map(|language| language.id.as_str())
    }

    /// Node kinds for `kind` in `language`, plus `add` and minus `remove`.
    ///
    /// A modifier naming a scope known to the language (`+class`) stands for
    /// all of that scope's kinds; any other name is a raw node kind. An
    /// unknown or absent language yields an empty set before modifiers.
    pub fn kind_set(
        &self,
        language: Option<&str>,
        kind: ScopeKind,
        add: &[String],
        remove: &[String],
    ) -> KindSet {
        let language = language.and_then(|id| self.language(id));
        let expand = |name: &str| -> Vec<String> {
            match language {
                Some(scopes) if scopes.has_scope(name) => scopes.kinds(name).to_vec(),
                _ => vec![name.to_string()],
            }
        };

        let mut kinds: BTreeSet<String> = language
            .map(|scopes| scopes.kinds(kind.as_str()).iter().cloned().collect())
            .unwrap_or_default();
        for name in add {
            kinds.extend(expand(name));
        }
        for name in remove {
            for removed in expand(name) {
                kinds.remove(&removed);
            }
        }
        KindSet { kinds }
    }
}

fn resolve_language(
    languages: &BTreeMap<String, RawLanguage>,
    id: &str,
    visited: &mut BTreeSet<String>,
) -> BTreeMap<String, Vec<String>> {
    if !visited.insert(id.to_string()) {
        tracing::warn!(language = id, "circular 'extends' in language scope table");
        return BTreeMap::new();
    }
    let Some(language) = languages.get(id) else {
        tracing::warn!(language = id, "language scope table extends an unknown language");
        return BTreeMap::new();
    };

    let mut scopes = match &language.extends {
        Some(parent) => resolve_language(languages, parent, visited),
        None => BTreeMap::new(),
    };
    for (scope, kinds) in &language.scopes {
        let entry = scopes.entry(scope.clone()).or_insert_with(Vec::new);
        for kind in kinds {
            if !entry.contains(kind) {
                entry.push(kind.clone());
            }
        }
    }
    for (scope, kinds) in &language.overrides {
        scopes.insert(scope.clone(), kinds.clone());
    }
    scopes
}
