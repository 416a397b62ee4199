//! Shared configuration loader for guardtag.
//!
//! Sources are layered in this order, later ones winning:
//!
//! 1. `defaults/guardtag.default.toml`, compiled into the crate
//! 2. a TOML file named with `--config` ([`Loader::with_file`])
//! 3. `GUARDTAG_<SECTION>__<KEY>` environment variables ([`Loader::with_env`])
//! 4. single-key overrides ([`Loader::set_override`])
//!
//! Values stay as plain strings and numbers here; the engine interprets them
//! (permission letters are parsed by `guardtag::guard::engine::EngineOptions`).

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, Environment, File, FileFormat, ValueKind};
use serde::Deserialize;
use std::path::Path;

const DEFAULT_TOML: &str = include_str!("../defaults/guardtag.default.toml");
const ENV_PREFIX: &str = "GUARDTAG";

/// Top-level configuration consumed by guardtag applications.
#[derive(Debug, Clone, Deserialize)]
pub struct GuardConfig {
    pub defaults: DefaultsConfig,
    pub scopes: ScopesConfig,
    pub validation: ValidationConfig,
}

/// Permissions for lines that no guard tag governs.
#[derive(Debug, Clone, Deserialize)]
pub struct DefaultsConfig {
    pub ai: String,
    pub human: String,
}

/// Knobs for semantic scope resolution.
#[derive(Debug, Clone, Deserialize)]
pub struct ScopesConfig {
    pub scan_window: usize,
    pub heuristic_fallback: bool,
    pub language_table: String,
}

impl ScopesConfig {
    /// Path of a custom language scope-kind table, if one was configured.
    pub fn language_table_path(&self) -> Option<&Path> {
        let trimmed = self.language_table.trim();
        if trimmed.is_empty() {
            None
        } else {
            Some(Path::new(trimmed))
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ValidationConfig {
    pub boundary_tolerance: usize,
}

/// Builds a [`GuardConfig`] from the embedded defaults plus whatever layers the
/// caller adds, in call order.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// A loader holding only `guardtag.default.toml`.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Adds a user TOML file; `build` fails if it does not exist.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Adds a user TOML file that may be absent, such as a per-project
    /// `guardtag.toml`.
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer `GUARDTAG_<SECTION>__<KEY>` environment variables, e.g.
    /// `GUARDTAG_DEFAULTS__AI=n`.
    pub fn with_env(mut self) -> Self {
        let source = Environment::with_prefix(ENV_PREFIX)
            .prefix_separator("_")
            .separator("__")
            .try_parsing(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Sets one dotted key (`defaults.ai`, `scopes.scan_window`) above every
    /// other layer.
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Merges the layers. Unknown permission letters are not caught here; the
    /// engine rejects them when it reads [`DefaultsConfig`].
    pub fn build(self) -> Result<GuardConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// The embedded defaults with nothing layered on top.
pub fn load_defaults() -> Result<GuardConfig, ConfigError> {
    Loader::new().build()
}
