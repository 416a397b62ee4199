//! # guardtag
//!
//! Per-line access permissions for two actor classes, `ai` and `human`, computed
//! from guard tags embedded in source comments.
//!
//! File Layout
//!
//! The engine is a strict sequential pipeline, one stage per module under
//! `src/guard`:
//!
//!     text -> tagging -> scoping -> stacking -> permissions
//!
//! with `validation` sitting beside the pipeline to compare its regions against
//! an independently implemented parser. [`guard::engine::GuardEngine`] wires the
//! stages together; each stage is also usable on its own.
//!
//! For testing helpers (an in-memory syntax tree, permission strings), see the
//! [testing module](guard::testing).

pub mod guard;
