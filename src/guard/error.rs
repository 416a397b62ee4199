//! Error types for the guard engine
//!
//! Bad input text is never an error: malformed tags are plain content and
//! unresolvable scopes fall back. What remains here are contract violations
//! (an unsorted region slice), bad caller configuration, and I/O around the
//! engine.

use thiserror::Error;

/// Errors surfaced to callers of the engine.
#[derive(Debug, Error)]
pub enum GuardError {
    /// `compute_line_permissions` was handed regions not ordered by start line.
    #[error(
        "regions must be sorted by start line: region {index} starts at {current}, \
         after a region starting at {previous}"
    )]
    UnsortedRegions {
        index: usize,
        previous: usize,
        current: usize,
    },

    #[error("invalid permission '{0}' (expected r, w, n or context)")]
    InvalidPermission(String),

    #[error("invalid target '{0}' (expected ai or human)")]
    InvalidTarget(String),

    #[error("unknown output format '{0}'")]
    UnknownFormat(String),

    #[error("invalid language scope table: {0}")]
    ScopeTable(String),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Result alias used across the engine.
pub type GuardResult<T> = Result<T, GuardError>;

/// Failure reported by a syntax-tree provider.
///
/// Never crosses the scope resolver: it is logged and treated as "no semantic
/// match".
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProviderError {
    #[error("no syntax tree available for language '{0}'")]
    Unavailable(String),

    #[error("syntax tree query timed out")]
    Timeout,

    #[error("syntax tree query failed: {0}")]
    Query(String),
}
