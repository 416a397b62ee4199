//! Guard Tag Engine
//!
//!     A guard tag is a structured comment such as `// @guard:ai:r.func` that
//!     changes who may read or write the lines after it. The engine turns the
//!     text of one document into a permission for every line, for both the
//!     `ai` and the `human` target.
//!
//! The Pipeline
//!
//!     1. Tagging. See [tagging](tagging). Each line yields zero or one
//!        [GuardTag](tag::GuardTag). Malformed tags are plain content.
//!
//!     2. Scoping. See [scoping](scoping). Each tag is resolved to the lines it
//!        governs, by line count, by querying a syntax tree, or by a
//!        regex/bracket heuristic when no tree is available.
//!
//!     3. Stacking. See [stacking](stacking). Tags are replayed in document
//!        order over one stack per target, producing a gap-free list of
//!        [Region](tag::Region)s.
//!
//!     4. Permissions. See [permissions](permissions). Regions are folded into
//!        one [LinePermission](tag::LinePermission) per line.
//!
//!     Nothing is shared between runs: every stage takes its inputs by
//!     reference and returns owned values, so documents can be analyzed in
//!     parallel as long as the syntax-tree provider allows it.

pub mod document;
pub mod engine;
pub mod error;
pub mod formats;
pub mod line_classification;
pub mod permissions;
pub mod scoping;
pub mod stacking;
pub mod tag;
pub mod tagging;
pub mod testing;
pub mod validation;

pub use document::Document;
pub use engine::{EngineOptions, GuardAnalysis, GuardEngine};
pub use error::{GuardError, GuardResult};
pub use tag::{
    GuardTag, LinePermission, Permission, Region, ScopeKind, ScopeSpec, Target,
};
