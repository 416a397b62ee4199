//! Engine
//!
//! [`GuardEngine`] runs the whole pipeline on one document and returns every
//! intermediate result as a [`GuardAnalysis`]. It owns its options and its
//! language scope table and keeps no state between calls; one engine can
//! serve any number of documents, from any number of threads.

use serde::Serialize;
use std::path::Path;

use guardtag_config::GuardConfig;

use super::document::Document;
use super::error::{GuardError, GuardResult};
use super::permissions::{compute_line_permissions, PermissionMap};
use super::scoping::{
    LanguageScopeTable, ResolvedScope, ScopeResolver, SyntaxTree, DEFAULT_SCAN_WINDOW,
};
use super::stacking::build_regions;
use super::tag::{GuardTag, Permission, PermissionDefaults, Region, Target};
use super::tagging::parse_tags;
use super::validation::schema::ValidationRequest;
use super::validation::{ValidationReport, Validator};

/// Tunables for one engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EngineOptions {
    pub defaults: PermissionDefaults,
    /// Lines a semantic search looks ahead of the tag.
    pub scan_window: usize,
    /// Fall back to the regex/bracket heuristic when no tree matches.
    pub heuristic_fallback: bool,
    /// Line delta tolerated by the validator before reporting a boundary.
    pub boundary_tolerance: usize,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            defaults: PermissionDefaults::default(),
            scan_window: DEFAULT_SCAN_WINDOW,
            heuristic_fallback: true,
            boundary_tolerance: 0,
        }
    }
}

impl EngineOptions {
    /// Reads options from loaded configuration. Default permissions must be
    /// `r`, `w` or `n`.
    pub fn from_config(config: &GuardConfig) -> GuardResult<Self> {
        Ok(Self {
            defaults: PermissionDefaults {
                ai: default_permission(&config.defaults.ai)?,
                human: default_permission(&config.defaults.human)?,
            },
            scan_window: config.scopes.scan_window,
            heuristic_fallback: config.scopes.heuristic_fallback,
            boundary_tolerance: config.validation.boundary_tolerance,
        })
    }
}

fn default_permission(value: &str) -> GuardResult<Permission> {
    match value.parse::<Permission>()? {
        Permission::Context => Err(GuardError::InvalidPermission(value.to_string())),
        permission => Ok(permission),
    }
}

/// Everything the pipeline produced for one document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct GuardAnalysis {
    pub line_count: usize,
    pub tags: Vec<GuardTag>,
    /// `scopes[i]` belongs to `tags[i]`.
    pub scopes: Vec<ResolvedScope>,
    pub regions: Vec<Region>,
    pub permissions: PermissionMap,
}

impl GuardAnalysis {
    pub fn regions_for(&self, target: Target) -> impl Iterator<Item = &Region> {
        self.regions.iter().filter(move |region| region.target == target)
    }

    /// The tagged regions as a validation request document.
    pub fn validation_request(&self, file_path: impl Into<String>) -> ValidationRequest {
        ValidationRequest::new(file_path, self.line_count, &self.tags, &self.regions)
    }
}

/// The guard tag pipeline.
#[derive(Debug, Clone)]
pub struct GuardEngine {
    options: EngineOptions,
    table: LanguageScopeTable,
}

impl Default for GuardEngine {
    fn default() -> Self {
        Self::new(EngineOptions::default())
    }
}

impl GuardEngine {
    /// An engine using the built-in language scope table.
    pub fn new(options: EngineOptions) -> Self {
        Self {
            options,
            table: LanguageScopeTable::builtin().clone(),
        }
    }

    /// An engine configured from `config`, loading a custom language scope
    /// table when one is named.
    pub fn from_config(config: &GuardConfig) -> GuardResult<Self> {
        let engine = Self::new(EngineOptions::from_config(config)?);
        match config.scopes.language_table_path() {
            Some(path) => Ok(engine.with_scope_table(LanguageScopeTable::from_path(path)?)),
            None => Ok(engine),
        }
    }

    pub fn with_scope_table(mut self, table: LanguageScopeTable) -> Self {
        self.table = table;
        self
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    pub fn scope_table(&self) -> &LanguageScopeTable {
        &self.table
    }

    /// Language id for a path, from the scope table's extension lists.
    pub fn detect_language(&self, path: &Path) -> Option<&str> {
        self.table.detect_language(path)
    }

    pub fn analyze(&self, document: &Document) -> GuardResult<GuardAnalysis> {
        self.analyze_with_tree(document, None)
    }

    /// Runs the pipeline, resolving semantic scopes against `tree` first when
    /// one is given.
    pub fn analyze_with_tree(
        &self,
        document: &Document,
        tree: Option<&dyn SyntaxTree>,
    ) -> GuardResult<GuardAnalysis> {
        let span = tracing::debug_span!("analyze", language = document.language().unwrap_or("-"));
        let _entered = span.enter();

        let tags = parse_tags(document);
        let mut resolver = ScopeResolver::new(&self.table)
            .with_scan_window(self.options.scan_window)
            .with_heuristic_fallback(self.options.heuristic_fallback);
        if let Some(tree) = tree {
            resolver = resolver.with_tree(tree);
        }
        let scopes = resolver.resolve_all(document, &tags);
        let regions = build_regions(document, &tags, &scopes, self.options.defaults);
        let permissions = compute_line_permissions(document, &regions, self.options.defaults)?;

        tracing::debug!(
            lines = document.line_count(),
            tags = tags.len(),
            regions = regions.len(),
            "analysis complete"
        );
        Ok(GuardAnalysis {
            line_count: document.line_count(),
            tags,
            scopes,
            regions,
            permissions,
        })
    }

    /// Compares an analysis with the regions another parser reported.
    pub fn validate(
        &self,
        analysis: &GuardAnalysis,
        external: &ValidationRequest,
    ) -> ValidationReport {
        Validator::new()
            .with_boundary_tolerance(self.options.boundary_tolerance)
            .validate(&analysis.regions, &external.regions())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::testing::{permission_letters, MemoryTree};

    #[test]
    fn analyzes_a_document_end_to_end() {
        let doc = Document::new("// @guard:ai:w\na();\n// @guard:ai:r.1\nb();\nc();");
        let analysis = GuardEngine::default().analyze(&doc).unwrap();
        assert_eq!(analysis.tags.len(), 2);
        assert_eq!(analysis.scopes.len(), 2);
        assert_eq!(permission_letters(&analysis.permissions, Target::Ai), "wwrrw");
        assert_eq!(permission_letters(&analysis.permissions, Target::Human), "wwwww");
        assert_eq!(analysis.regions_for(Target::Ai).count(), 3);
    }

    #[test]
    fn custom_defaults_fill_untagged_lines() {
        let options = EngineOptions {
            defaults: PermissionDefaults {
                ai: Permission::None,
                human: Permission::Read,
            },
            ..EngineOptions::default()
        };
        let doc = Document::new("x\n// @guard:human:w.0\ny");
        let analysis = GuardEngine::new(options).analyze(&doc).unwrap();
        assert_eq!(permission_letters(&analysis.permissions, Target::Ai), "nnn");
        assert_eq!(permission_letters(&analysis.permissions, Target::Human), "rwr");
    }

    #[test]
    fn tree_is_used_when_given() {
        let source = "# @guard:ai:n.func\ndef f():\n    pass\nx = 1\n";
        let doc = Document::new(source).with_language("python");
        let mut tree = MemoryTree::new("module", 0, 0, 4, 0);
        let root = tree.root();
        tree.add(root, "function_definition", 1, 0, 2, 8);
        let analysis = GuardEngine::default()
            .analyze_with_tree(&doc, Some(&tree))
            .unwrap();
        assert_eq!(permission_letters(&analysis.permissions, Target::Ai), "nnnr");
    }

    #[test]
    fn options_come_from_config() {
        let config = guardtag_config::Loader::new()
            .set_override("defaults.ai", "n")
            .unwrap()
            .set_override("scopes.scan_window", 3_i64)
            .unwrap()
            .build()
            .unwrap();
        let options = EngineOptions::from_config(&config).unwrap();
        assert_eq!(options.defaults.ai, Permission::None);
        assert_eq!(options.defaults.human, Permission::Write);
        assert_eq!(options.scan_window, 3);
        assert!(options.heuristic_fallback);
    }

    #[test]
    fn context_is_not_a_default() {
        let config = guardtag_config::Loader::new()
            .set_override("defaults.human", "context")
            .unwrap()
            .build()
            .unwrap();
        assert!(matches!(
            EngineOptions::from_config(&config),
            Err(GuardError::InvalidPermission(_))
        ));
        let config = guardtag_config::Loader::new()
            .set_override("defaults.ai", "rw")
            .unwrap()
            .build()
            .unwrap();
        assert!(EngineOptions::from_config(&config).is_err());
    }

    #[test]
    fn validation_round_trip_through_request_is_clean() {
        let doc = Document::new("// @guard:ai:n.2\na\nb\nc\n// @guard:human:r\nd");
        let engine = GuardEngine::default();
        let analysis = engine.analyze(&doc).unwrap();
        let request = analysis.validation_request("sample.js");
        assert_eq!(request.guard_regions.len(), 2);
        let report = engine.validate(&analysis, &request);
        assert!(report.discrepancies.is_empty());
    }
}
