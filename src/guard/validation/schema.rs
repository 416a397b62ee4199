//! Validation wire documents
//!
//! The JSON exchanged with an external verification tool. A request lists the
//! tagged regions one parser found in a file; a response carries the
//! discrepancies found against it and summary statistics. Line numbers on the
//! wire are 1-based; everything in memory is 0-based.
//!
//! Field names are part of the contract and must not change.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::{Discrepancy, DiscrepancyKind, Severity, Statistics, ValidationReport, ValidationStatus};
use crate::guard::error::GuardResult;
use crate::guard::tag::{GuardTag, Permission, Region, Target};

/// Version written into requests produced here.
pub const SCHEMA_VERSION: &str = "1.0";

fn schema_version() -> String {
    SCHEMA_VERSION.to_string()
}

/// The regions one parser found in one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationRequest {
    #[serde(default = "schema_version")]
    pub version: String,
    pub file_path: String,
    pub total_lines: usize,
    pub guard_regions: Vec<GuardRegionEntry>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GuardRegionEntry {
    pub index: usize,
    pub target: Target,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    pub permission: Permission,
    /// The scope as written in the tag (`func`, `3`, `block+class`), or
    /// `none` for an unbounded tag.
    pub scope: String,
    pub declaration_line: usize,
    pub start_line: usize,
    pub end_line: usize,
}

impl ValidationRequest {
    /// Describes the tagged regions of an analysis. Default regions are left
    /// out; a tag whose lines were split by nested tags yields one entry per
    /// run.
    pub fn new(
        file_path: impl Into<String>,
        total_lines: usize,
        tags: &[GuardTag],
        regions: &[Region],
    ) -> Self {
        let by_line: BTreeMap<(usize, Target), &GuardTag> =
            tags.iter().map(|tag| ((tag.line, tag.target), tag)).collect();
        let guard_regions = regions
            .iter()
            .filter_map(|region| {
                let declaration = region.source_tag_line?;
                let tag = by_line.get(&(declaration, region.target));
                Some((region, declaration, tag))
            })
            .enumerate()
            .map(|(index, (region, declaration, tag))| GuardRegionEntry {
                index,
                target: region.target,
                identifier: tag.and_then(|tag| tag.identifier.clone()),
                permission: region.permission,
                scope: tag
                    .map(|tag| tag.scope.to_string())
                    .unwrap_or_else(|| "none".to_string()),
                declaration_line: declaration + 1,
                start_line: region.start_line + 1,
                end_line: region.end_line + 1,
            })
            .collect();
        Self {
            version: schema_version(),
            file_path: file_path.into(),
            total_lines,
            guard_regions,
        }
    }

    pub fn from_json(json: &str) -> GuardResult<Self> {
        Ok(serde_json::from_str(json)?)
    }

    pub fn to_json(&self) -> GuardResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// The listed regions as 0-based [`Region`]s, in request order.
    pub fn regions(&self) -> Vec<Region> {
        self.guard_regions
            .iter()
            .map(|entry| {
                Region::new(
                    entry.start_line.saturating_sub(1),
                    entry.end_line.saturating_sub(1),
                    entry.target,
                    entry.permission,
                    Some(entry.declaration_line.saturating_sub(1)),
                )
            })
            .collect()
    }
}

/// 1-based extent of one side of a discrepancy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineRange {
    pub declaration_line: Option<usize>,
    pub start_line: usize,
    pub end_line: usize,
}

impl From<&Region> for LineRange {
    fn from(region: &Region) -> Self {
        Self {
            declaration_line: region.source_tag_line.map(|line| line + 1),
            start_line: region.start_line + 1,
            end_line: region.end_line + 1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiscrepancyEntry {
    #[serde(rename = "type")]
    pub kind: DiscrepancyKind,
    pub severity: Severity,
    pub target: Target,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub engine: Option<LineRange>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<LineRange>,
}

impl From<&Discrepancy> for DiscrepancyEntry {
    fn from(discrepancy: &Discrepancy) -> Self {
        Self {
            kind: discrepancy.kind,
            severity: discrepancy.severity,
            target: discrepancy.target,
            message: discrepancy.message.clone(),
            engine: discrepancy.engine.as_ref().map(LineRange::from),
            external: discrepancy.external.as_ref().map(LineRange::from),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResponse {
    pub status: ValidationStatus,
    pub discrepancies: Vec<DiscrepancyEntry>,
    pub statistics: Statistics,
}

impl From<&ValidationReport> for ValidationResponse {
    fn from(report: &ValidationReport) -> Self {
        Self {
            status: report.status(),
            discrepancies: report.discrepancies.iter().map(DiscrepancyEntry::from).collect(),
            statistics: report.statistics,
        }
    }
}

impl ValidationResponse {
    pub fn to_json(&self) -> GuardResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}
