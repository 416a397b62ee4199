//! Differential Validator
//!
//! Compares the engine's tagged regions with regions produced by an
//! independent parser and reports where they disagree. Purely structural: it
//! never feeds back into permission computation.
//!
//! Each engine region is paired with an unmatched external region of the same
//! target that overlaps it, preferring one declared on the same line, then the
//! largest overlap. Then:
//!
//!     no partner                      MissingInExternal   error
//!     external region left unpaired   MissingInEngine     error
//!     different permission            PermissionMismatch  error
//!     start lines differ              BoundaryMismatch    error
//!     only end lines differ           BoundaryMismatch    warning
//!
//! Line differences up to the boundary tolerance are not reported. Default
//! regions (lines no tag reaches) are not compared.

pub mod schema;

use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::fmt;

use super::tag::{Region, Target};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiscrepancyKind {
    MissingInExternal,
    MissingInEngine,
    BoundaryMismatch,
    PermissionMismatch,
}

impl fmt::Display for DiscrepancyKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            DiscrepancyKind::MissingInExternal => "missing_in_external",
            DiscrepancyKind::MissingInEngine => "missing_in_engine",
            DiscrepancyKind::BoundaryMismatch => "boundary_mismatch",
            DiscrepancyKind::PermissionMismatch => "permission_mismatch",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
}

/// One disagreement between the engine and the external parser.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Discrepancy {
    pub kind: DiscrepancyKind,
    pub severity: Severity,
    pub target: Target,
    pub engine: Option<Region>,
    pub external: Option<Region>,
    pub message: String,
}

impl Discrepancy {
    pub fn is_error(&self) -> bool {
        self.severity == Severity::Error
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statistics {
    pub engine_regions: usize,
    pub external_regions: usize,
    pub matched: usize,
    pub errors: usize,
    pub warnings: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ValidationStatus {
    /// No discrepancies.
    Pass,
    /// Only warnings.
    Warn,
    /// At least one error.
    Fail,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    pub discrepancies: Vec<Discrepancy>,
    pub statistics: Statistics,
}

impl ValidationReport {
    pub fn status(&self) -> ValidationStatus {
        if self.statistics.errors > 0 {
            ValidationStatus::Fail
        } else if self.statistics.warnings > 0 {
            ValidationStatus::Warn
        } else {
            ValidationStatus::Pass
        }
    }

    pub fn has_errors(&self) -> bool {
        self.statistics.errors > 0
    }
}

/// Compares region lists.
#[derive(Debug, Clone, Copy, Default)]
pub struct Validator {
    boundary_tolerance: usize,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Line differences up to `tolerance` are not reported.
    pub fn with_boundary_tolerance(mut self, tolerance: usize) -> Self {
        self.boundary_tolerance = tolerance;
        self
    }

    pub fn diff(&self, engine: &[Region], external: &[Region]) -> Vec<Discrepancy> {
        self.validate(engine, external).discrepancies
    }

    pub fn validate(&self, engine: &[Region], external: &[Region]) -> ValidationReport {
        let engine: Vec<&Region> = engine.iter().filter(|r| !r.is_default()).collect();
        let external: Vec<&Region> = external.iter().filter(|r| !r.is_default()).collect();
        let mut paired = vec![false; external.len()];
        let mut discrepancies = Vec::new();
        let mut matched = 0;

        for ours in &engine {
            let partner = external
                .iter()
                .enumerate()
                .filter(|(index, theirs)| {
                    !paired[*index] && theirs.target == ours.target && theirs.overlaps(ours)
                })
                .max_by_key(|(index, theirs)| {
                    (
                        theirs.source_tag_line == ours.source_tag_line,
                        overlap(ours, theirs),
                        Reverse(*index),
                    )
                })
                .map(|(index, theirs)| (index, *theirs));

            let Some((index, theirs)) = partner else {
                discrepancies.push(Discrepancy {
                    kind: DiscrepancyKind::MissingInExternal,
                    severity: Severity::Error,
                    target: ours.target,
                    engine: Some((*ours).clone()),
                    external: None,
                    message: format!(
                        "{} has no counterpart in the external parser",
                        describe(ours)
                    ),
                });
                continue;
            };
            paired[index] = true;
            matched += 1;
            self.compare(ours, theirs, &mut discrepancies);
        }

        for (theirs, _) in external.iter().zip(&paired).filter(|(_, paired)| !**paired) {
            discrepancies.push(Discrepancy {
                kind: DiscrepancyKind::MissingInEngine,
                severity: Severity::Error,
                target: theirs.target,
                engine: None,
                external: Some((*theirs).clone()),
                message: format!(
                    "{} from the external parser has no counterpart in the engine",
                    describe(theirs)
                ),
            });
        }

        let errors = discrepancies.iter().filter(|d| d.is_error()).count();
        let statistics = Statistics {
            engine_regions: engine.len(),
            external_regions: external.len(),
            matched,
            errors,
            warnings: discrepancies.len() - errors,
        };
        if errors > 0 {
            tracing::debug!(
                errors,
                warnings = statistics.warnings,
                "validation found discrepancies"
            );
        }
        ValidationReport {
            discrepancies,
            statistics,
        }
    }

    fn compare(&self, ours: &Region, theirs: &Region, out: &mut Vec<Discrepancy>) {
        let mismatch = |kind, severity, message: String| Discrepancy {
            kind,
            severity,
            target: ours.target,
            engine: Some(ours.clone()),
            external: Some(theirs.clone()),
            message,
        };

        if ours.permission != theirs.permission {
            out.push(mismatch(
                DiscrepancyKind::PermissionMismatch,
                Severity::Error,
                format!(
                    "{} is '{}' in the engine but '{}' in the external parser",
                    describe(ours),
                    ours.permission,
                    theirs.permission
                ),
            ));
        }

        let tolerance = self.boundary_tolerance;
        if ours.start_line.abs_diff(theirs.start_line) > tolerance {
            out.push(mismatch(
                DiscrepancyKind::BoundaryMismatch,
                Severity::Error,
                format!(
                    "{} starts on line {} in the external parser",
                    describe(ours),
                    theirs.start_line + 1
                ),
            ));
        } else if ours.end_line.abs_diff(theirs.end_line) > tolerance {
            out.push(mismatch(
                DiscrepancyKind::BoundaryMismatch,
                Severity::Warning,
                format!(
                    "{} ends on line {} in the external parser",
                    describe(ours),
                    theirs.end_line + 1
                ),
            ));
        }
    }
}

/// Compares with no boundary tolerance.
pub fn diff(engine: &[Region], external: &[Region]) -> Vec<Discrepancy> {
    Validator::new().diff(engine, external)
}

fn overlap(a: &Region, b: &Region) -> usize {
    let start = a.start_line.max(b.start_line);
    let end = a.end_line.min(b.end_line);
    (end + 1).saturating_sub(start)
}

/// Human-facing description, 1-based like the wire format.
fn describe(region: &Region) -> String {
    format!(
        "{}:{} region at lines {}-{}",
        region.target,
        region.permission,
        region.start_line + 1,
        region.end_line + 1
    )
}
