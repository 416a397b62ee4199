//! Permission Resolver
//!
//! Collapses regions into one [`LinePermission`] per line. Each target is
//! resolved on its own: the governing region for a line is the one declared
//! by the latest tag, tagged regions beat the default region, and among
//! equals the region later in the input wins.
//!
//! Regions built by [`build_regions`](super::stacking::build_regions) never
//! overlap within a target. Hand-made or externally produced regions can; the
//! lines where two tagged regions of one target meet are reported as mixed.
//! That report is diagnostic only and never changes the outcome.

use serde::Serialize;

use super::document::Document;
use super::error::{GuardError, GuardResult};
use super::tag::{LinePermission, PermissionDefaults, Region, Target};

/// A line governed by more than one tagged region of the same target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MixedLine {
    pub line: usize,
    pub target: Target,
    /// Declaration lines of the overlapping tags, in input order.
    pub tag_lines: Vec<usize>,
}

/// Per-line permissions for a whole document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PermissionMap {
    lines: Vec<LinePermission>,
    mixed: Vec<MixedLine>,
}

impl PermissionMap {
    pub fn get(&self, line: usize) -> Option<&LinePermission> {
        self.lines.get(line)
    }

    pub fn iter(&self) -> impl Iterator<Item = &LinePermission> {
        self.lines.iter()
    }

    pub fn lines(&self) -> &[LinePermission] {
        &self.lines
    }

    pub fn len(&self) -> usize {
        self.lines.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lines.is_empty()
    }

    pub fn mixed(&self) -> &[MixedLine] {
        &self.mixed
    }

    pub fn has_mixed(&self) -> bool {
        !self.mixed.is_empty()
    }
}

/// Computes the permissions of every line of `document`.
///
/// `regions` must be ordered by start line; anything else is a caller bug and
/// fails with [`GuardError::UnsortedRegions`]. Lines no region reaches get
/// `defaults`.
pub fn compute_line_permissions(
    document: &Document,
    regions: &[Region],
    defaults: PermissionDefaults,
) -> GuardResult<PermissionMap> {
    check_sorted(regions)?;

    let mut lines: Vec<LinePermission> = (0..document.line_count())
        .map(|line| LinePermission {
            line,
            ai: defaults.ai,
            human: defaults.human,
            is_context_ai: false,
            is_context_human: false,
        })
        .collect();
    let mut mixed = Vec::new();

    for target in Target::ALL {
        let mut pending = regions
            .iter()
            .enumerate()
            .filter(|(_, region)| region.target == target)
            .peekable();
        let mut active: Vec<(usize, &Region)> = Vec::new();

        for (line, permission) in lines.iter_mut().enumerate() {
            active.retain(|(_, region)| region.end_line >= line);
            while let Some(entry) = pending.next_if(|(_, region)| region.start_line <= line) {
                if entry.1.end_line >= line {
                    active.push(entry);
                }
            }

            let tag_lines: Vec<usize> = active
                .iter()
                .filter_map(|(_, region)| region.source_tag_line)
                .collect();
            if tag_lines.len() > 1 {
                mixed.push(MixedLine {
                    line,
                    target,
                    tag_lines,
                });
            }

            let Some((_, winner)) = active
                .iter()
                .max_by_key(|(index, region)| (region.source_tag_line, *index))
            else {
                continue;
            };
            match target {
                Target::Ai => {
                    permission.ai = winner.permission;
                    permission.is_context_ai = winner.is_context;
                }
                Target::Human => {
                    permission.human = winner.permission;
                    permission.is_context_human = winner.is_context;
                }
            }
        }
    }

    if !mixed.is_empty() {
        tracing::debug!(lines = mixed.len(), "overlapping regions for one target");
    }
    mixed.sort_by_key(|entry| (entry.line, entry.target));
    Ok(PermissionMap { lines, mixed })
}

fn check_sorted(regions: &[Region]) -> GuardResult<()> {
    match regions
        .windows(2)
        .position(|pair| pair[1].start_line < pair[0].start_line)
    {
        Some(position) => Err(GuardError::UnsortedRegions {
            index: position + 1,
            previous: regions[position].start_line,
            current: regions[position + 1].start_line,
        }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::tag::Permission;
    use crate::guard::testing::permission_letters;

    fn doc(lines: usize) -> String {
        vec!["x"; lines].join("\n")
    }

    #[test]
    fn uncovered_lines_get_defaults() {
        let source = doc(3);
        let map = compute_line_permissions(
            &Document::new(&source),
            &[],
            PermissionDefaults::default(),
        )
        .unwrap();
        assert_eq!(permission_letters(&map, Target::Ai), "rrr");
        assert_eq!(permission_letters(&map, Target::Human), "www");
        assert!(!map.has_mixed());
    }

    #[test]
    fn custom_defaults_apply() {
        let source = doc(2);
        let defaults = PermissionDefaults {
            ai: Permission::None,
            human: Permission::Read,
        };
        let map = compute_line_permissions(&Document::new(&source), &[], defaults).unwrap();
        assert_eq!(permission_letters(&map, Target::Ai), "nn");
        assert_eq!(permission_letters(&map, Target::Human), "rr");
    }

    #[test]
    fn targets_resolve_independently_and_flag_context() {
        let source = doc(4);
        let regions = vec![
            Region::new(0, 1, Target::Ai, Permission::Context, Some(0)),
            Region::new(0, 3, Target::Human, Permission::None, Some(0)),
            Region::new(2, 3, Target::Ai, Permission::Write, Some(2)),
        ];
        let map = compute_line_permissions(
            &Document::new(&source),
            &regions,
            PermissionDefaults::default(),
        )
        .unwrap();
        assert_eq!(permission_letters(&map, Target::Ai), "ccww");
        assert_eq!(permission_letters(&map, Target::Human), "nnnn");
        let first = map.get(0).unwrap();
        assert_eq!(first.ai, Permission::Context);
        assert!(first.is_context_ai);
        assert!(!first.is_context_human);
    }

    #[test]
    fn overlaps_are_mixed_and_latest_declaration_wins() {
        let source = doc(5);
        let regions = vec![
            Region::new(0, 4, Target::Ai, Permission::Write, Some(0)),
            Region::new(2, 3, Target::Ai, Permission::None, Some(2)),
        ];
        let map = compute_line_permissions(
            &Document::new(&source),
            &regions,
            PermissionDefaults::default(),
        )
        .unwrap();
        assert_eq!(permission_letters(&map, Target::Ai), "wwnnw");
        assert_eq!(
            map.mixed(),
            &[
                MixedLine {
                    line: 2,
                    target: Target::Ai,
                    tag_lines: vec![0, 2],
                },
                MixedLine {
                    line: 3,
                    target: Target::Ai,
                    tag_lines: vec![0, 2],
                },
            ]
        );
    }

    #[test]
    fn tagged_region_beats_default_region() {
        let source = doc(2);
        let regions = vec![
            Region::new(0, 1, Target::Ai, Permission::None, Some(0)),
            Region::new(0, 1, Target::Ai, Permission::Read, None),
        ];
        let map = compute_line_permissions(
            &Document::new(&source),
            &regions,
            PermissionDefaults::default(),
        )
        .unwrap();
        assert_eq!(permission_letters(&map, Target::Ai), "nn");
        assert!(!map.has_mixed());
    }

    #[test]
    fn same_declaration_line_later_region_wins() {
        let source = doc(1);
        let regions = vec![
            Region::new(0, 0, Target::Human, Permission::Read, Some(0)),
            Region::new(0, 0, Target::Human, Permission::None, Some(0)),
        ];
        let map = compute_line_permissions(
            &Document::new(&source),
            &regions,
            PermissionDefaults::default(),
        )
        .unwrap();
        assert_eq!(permission_letters(&map, Target::Human), "n");
    }

    #[test]
    fn unsorted_regions_are_rejected() {
        let source = doc(4);
        let regions = vec![
            Region::new(2, 3, Target::Ai, Permission::Write, Some(2)),
            Region::new(0, 1, Target::Ai, Permission::Read, Some(0)),
        ];
        let err = compute_line_permissions(
            &Document::new(&source),
            &regions,
            PermissionDefaults::default(),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            GuardError::UnsortedRegions {
                index: 1,
                previous: 2,
                current: 0
            }
        ));
    }

    #[test]
    fn regions_past_the_end_are_ignored() {
        let source = doc(2);
        let regions = vec![Region::new(1, 9, Target::Ai, Permission::None, Some(1))];
        let map = compute_line_permissions(
            &Document::new(&source),
            &regions,
            PermissionDefaults::default(),
        )
        .unwrap();
        assert_eq!(map.len(), 2);
        assert_eq!(permission_letters(&map, Target::Ai), "rn");
    }
}
