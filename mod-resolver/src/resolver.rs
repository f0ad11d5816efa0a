//! Folder resolution: load order × lexicographic relpath × stable unit keys.
//!
//! Contributions are gathered per unit key across a load-ordered source
//! stack, the folder's policy is applied per key, and conflicts are grouped
//! and scored. Output ordering is fixed (unit keys ascending, losers in
//! contribution order) so the same inputs always serialize identically.

use crate::conflict::{ConflictUnit, build_conflict};
use crate::contribution::{Contribution, SourceRef};
use crate::policy::{self, Residual};
use content_schema::{FolderSchema, MergePolicy, unit_slices};
use script_parser::Ast;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;
use tracing::debug;

/// One parsed file offered to the resolver.
#[derive(Debug, Clone)]
pub struct ResolverFile {
    pub relpath: String,
    pub ast: Arc<Ast>,
    pub has_diagnostics: bool,
}

/// All files of one content version under the folder being resolved.
#[derive(Debug, Clone)]
pub struct SourceFiles {
    pub version_id: i64,
    pub source_name: String,
    pub load_order: usize,
    pub files: Vec<ResolverFile>,
}

/// Policy outcome for one unit key, with provenance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolvedUnit {
    pub unit_key: String,
    pub policy: MergePolicy,
    pub winner: Contribution,
    /// Overridden contributions, in contribution order.
    pub losers: Vec<Contribution>,
    pub residual: Residual,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderResolution {
    pub folder: String,
    pub policy: MergePolicy,
    pub units: Vec<ResolvedUnit>,
    pub conflicts: Vec<ConflictUnit>,
}

/// Resolve one folder across a load-ordered source stack.
///
/// `known_symbols` is the playset-scoped symbol name set used for the
/// unknown-reference hotspot; pass `None` to skip that detection.
pub fn resolve_folder(
    schema: &FolderSchema,
    sources: &[SourceFiles],
    known_symbols: Option<&HashSet<String>>,
) -> FolderResolution {
    let mut contributions = Vec::new();
    for source in sources {
        // Within one version, relpath order is the intra-source load order.
        let mut files: Vec<&ResolverFile> = source.files.iter().collect();
        files.sort_by(|a, b| a.relpath.cmp(&b.relpath));
        for file in files {
            for slice in unit_slices(schema, &file.ast) {
                contributions.push(Contribution {
                    source: SourceRef {
                        version_id: source.version_id,
                        source_name: source.source_name.clone(),
                        load_order: source.load_order,
                        relpath: file.relpath.clone(),
                        line: slice.line,
                    },
                    unit_key: slice.unit_key,
                    payload: slice.entry.clone(),
                    has_diagnostics: file.has_diagnostics,
                });
            }
        }
    }
    resolve_contributions(schema, contributions, known_symbols)
}

/// Resolve a pre-built contribution list (the localization path feeds this
/// directly). Contributions may arrive in any order.
pub fn resolve_contributions(
    schema: &FolderSchema,
    mut contributions: Vec<Contribution>,
    known_symbols: Option<&HashSet<String>>,
) -> FolderResolution {
    contributions.sort_by(|a, b| {
        a.source
            .load_order
            .cmp(&b.source.load_order)
            .then_with(|| a.source.relpath.cmp(&b.source.relpath))
            .then_with(|| a.source.line.cmp(&b.source.line))
    });

    let mut groups: BTreeMap<String, Vec<Contribution>> = BTreeMap::new();
    for c in contributions {
        groups.entry(c.unit_key.clone()).or_default().push(c);
    }

    let mut units = Vec::new();
    let mut conflicts = Vec::new();
    for (unit_key, group) in &groups {
        let Some(outcome) = policy::apply(schema.policy, group) else {
            continue;
        };
        units.push(ResolvedUnit {
            unit_key: unit_key.clone(),
            policy: schema.policy,
            winner: outcome.winner,
            losers: outcome.losers,
            residual: outcome.residual,
        });

        let distinct_sources: HashSet<i64> =
            group.iter().map(|c| c.source.version_id).collect();
        if group.len() > 1 && distinct_sources.len() > 1 {
            conflicts.push(build_conflict(
                schema,
                &schema.folder,
                unit_key,
                group,
                known_symbols,
            ));
        }
    }

    debug!(
        "resolve: folder={} units={} conflicts={}",
        schema.folder,
        units.len(),
        conflicts.len()
    );
    FolderResolution {
        folder: schema.folder.clone(),
        policy: schema.policy,
        units,
        conflicts,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use content_schema::SchemaRegistry;
    use script_parser::parse_source;

    fn source(version_id: i64, name: &str, load_order: usize, files: &[(&str, &str)]) -> SourceFiles {
        SourceFiles {
            version_id,
            source_name: name.to_string(),
            load_order,
            files: files
                .iter()
                .map(|(relpath, src)| {
                    let parsed = parse_source(src, relpath);
                    ResolverFile {
                        relpath: relpath.to_string(),
                        ast: Arc::new(parsed.ast),
                        has_diagnostics: !parsed.diagnostics.is_empty(),
                    }
                })
                .collect(),
        }
    }

    #[test]
    fn trait_override_chain_yields_one_winner_one_loser() {
        let registry = SchemaRegistry::standard();
        let schema = registry.for_folder("common/traits").unwrap();
        let sources = vec![
            source(
                1,
                "base_game",
                0,
                &[("common/traits/traits.txt", "brave = { index = 42 }")],
            ),
            source(
                2,
                "mod_a",
                1,
                &[("common/traits/traits.txt", "brave = { index = 99 }")],
            ),
            source(3, "mod_b", 2, &[]),
        ];
        let res = resolve_folder(schema, &sources, None);
        assert_eq!(res.units.len(), 1);
        let unit = &res.units[0];
        assert_eq!(unit.unit_key, "brave");
        assert_eq!(unit.policy, MergePolicy::Override);
        assert_eq!(unit.winner.source.source_name, "mod_a");
        assert_eq!(unit.losers.len(), 1);
        assert_eq!(unit.losers[0].source.source_name, "base_game");
        assert_eq!(res.conflicts.len(), 1);
    }

    #[test]
    fn intra_source_order_is_lexicographic_by_relpath() {
        let registry = SchemaRegistry::standard();
        let schema = registry.for_folder("common/traits").unwrap();
        // Files supplied out of order; zz must win over aa within one source.
        let sources = vec![source(
            1,
            "base_game",
            0,
            &[
                ("common/traits/zz_last.txt", "brave = { index = 2 }"),
                ("common/traits/aa_first.txt", "brave = { index = 1 }"),
            ],
        )];
        let res = resolve_folder(schema, &sources, None);
        let unit = &res.units[0];
        assert_eq!(unit.winner.source.relpath, "common/traits/zz_last.txt");
        // Single source: overridden, but not a cross-source conflict.
        assert!(res.conflicts.is_empty());
    }

    #[test]
    fn resolution_is_deterministic() {
        let registry = SchemaRegistry::standard();
        let schema = registry.for_folder("common/traits").unwrap();
        let build = || {
            let sources = vec![
                source(
                    1,
                    "base_game",
                    0,
                    &[(
                        "common/traits/traits.txt",
                        "brave = { index = 1 }\ncraven = { index = 2 }\nwise = { index = 3 }",
                    )],
                ),
                source(
                    2,
                    "mod_a",
                    1,
                    &[("common/traits/traits.txt", "wise = { index = 30 }")],
                ),
            ];
            serde_json::to_vec(&resolve_folder(schema, &sources, None)).unwrap()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn fios_gui_conflict_matches_engine_registration() {
        let registry = SchemaRegistry::standard();
        let schema = registry.for_folder("gui").unwrap();
        let gui = |body: &str| format!("type character_window = window {{ {body} }}");
        let sources = vec![
            source(1, "base_game", 0, &[("gui/window.gui", &gui("a = 1"))]),
            source(2, "mod_a", 1, &[("gui/window.gui", &gui("a = 2"))]),
            source(3, "mod_b", 2, &[("gui/window.gui", &gui("a = 3"))]),
        ];
        let res = resolve_folder(schema, &sources, None);
        let unit = res
            .units
            .iter()
            .find(|u| u.unit_key == "gui:type:character_window")
            .unwrap();
        assert_eq!(unit.winner.source.source_name, "base_game");
        assert_eq!(unit.losers.len(), 2);
        let conflict = &res.conflicts[0];
        assert_eq!(
            conflict.uncertainty,
            crate::conflict::Uncertainty::Low
        );
    }
}
