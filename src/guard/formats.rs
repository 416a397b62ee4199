//! Output formats
//!
//! Renderers for a finished [`GuardAnalysis`]. The text formats (`table`,
//! `regions`) number lines from 1 like an editor does; the structured formats
//! (`json`, `yaml`) dump the analysis as-is, with 0-based lines.

use std::fmt;
use std::str::FromStr;

use super::document::Document;
use super::engine::GuardAnalysis;
use super::error::{GuardError, GuardResult};
use super::permissions::PermissionMap;
use super::tag::{LinePermission, Target};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    /// One row per line: ai and human permissions next to the source text.
    Table,
    /// One row per region.
    Regions,
    Json,
    Yaml,
}

impl OutputFormat {
    pub const ALL: [OutputFormat; 4] = [
        OutputFormat::Table,
        OutputFormat::Regions,
        OutputFormat::Json,
        OutputFormat::Yaml,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            OutputFormat::Table => "table",
            OutputFormat::Regions => "regions",
            OutputFormat::Json => "json",
            OutputFormat::Yaml => "yaml",
        }
    }

    pub fn names() -> Vec<&'static str> {
        Self::ALL.iter().map(OutputFormat::name).collect()
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for OutputFormat {
    type Err = GuardError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|format| format.name() == s)
            .ok_or_else(|| GuardError::UnknownFormat(s.to_string()))
    }
}

/// Renders `analysis` of `document` in `format`.
pub fn render(
    format: OutputFormat,
    document: &Document,
    analysis: &GuardAnalysis,
) -> GuardResult<String> {
    match format {
        OutputFormat::Table => Ok(render_table(document, &analysis.permissions)),
        OutputFormat::Regions => Ok(render_regions(analysis)),
        OutputFormat::Json => {
            let mut out = serde_json::to_string_pretty(analysis)?;
            out.push('\n');
            Ok(out)
        }
        OutputFormat::Yaml => Ok(serde_yaml::to_string(analysis)?),
    }
}

fn render_table(document: &Document, permissions: &PermissionMap) -> String {
    let mut out = row("line", "ai", "human", "source");
    for permission in permissions.iter() {
        let text = document.line(permission.line).unwrap_or_default();
        out.push_str(&row(
            &(permission.line + 1).to_string(),
            &cell(permissions, permission, Target::Ai),
            &cell(permissions, permission, Target::Human),
            text,
        ));
    }
    out
}

fn row(line: &str, ai: &str, human: &str, text: &str) -> String {
    let mut row = format!("{:>4}  {:<3} {:<6} {}", line, ai, human, text);
    row.truncate(row.trim_end().len());
    row.push('\n');
    row
}

/// Permission letter, `c` for context, with `*` on lines where tagged regions
/// overlap.
fn cell(map: &PermissionMap, permission: &LinePermission, target: Target) -> String {
    let letter = if permission.is_context_for(target) {
        "c"
    } else {
        permission.permission_for(target).as_tag_str()
    };
    let mixed = map
        .mixed()
        .iter()
        .any(|entry| entry.line == permission.line && entry.target == target);
    if mixed {
        format!("{letter}*")
    } else {
        letter.to_string()
    }
}

fn render_regions(analysis: &GuardAnalysis) -> String {
    analysis
        .regions
        .iter()
        .map(|region| {
            let origin = match region.source_tag_line {
                Some(line) => format!("tag on line {}", line + 1),
                None => "default".to_string(),
            };
            format!(
                "{}:{} lines {}-{} ({})\n",
                region.target,
                region.permission,
                region.start_line + 1,
                region.end_line + 1,
                origin
            )
        })
        .collect()
}
