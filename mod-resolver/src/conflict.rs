//! Conflict grouping, risk scoring, and merge-capability classification.
//!
//! The score is advisory and must be reproducible:
//! `clamp(domain_weight + 5·max(0, n−2) + hotspots + policy_penalty, 0, 100)`
//! with hotspots = 20 for effect-block replacement, 10 for a rename pattern,
//! 15 for unknown-reference introduction, and a 10-point penalty when the
//! merge capability is winner-only.

use crate::contribution::{Contribution, SourceRef};
use content_schema::{FolderSchema, MergePolicy, extract_file};
use script_parser::{Ast, BlockForm, Entry};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergeCapability {
    WinnerOnly,
    GuidedMerge,
    AiMerge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Uncertainty {
    None,
    Low,
    Medium,
    High,
}

impl Uncertainty {
    fn raised(self) -> Self {
        match self {
            Uncertainty::None => Uncertainty::Low,
            Uncertainty::Low => Uncertainty::Medium,
            Uncertainty::Medium | Uncertainty::High => Uncertainty::High,
        }
    }
}

/// A unit key where at least one side loses content under the chosen policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConflictUnit {
    pub unit_key: String,
    pub folder: String,
    pub policy: MergePolicy,
    pub contributions: Vec<SourceRef>,
    pub risk_score: u8,
    pub merge_capability: MergeCapability,
    pub uncertainty: Uncertainty,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HotspotFlags {
    pub effect_block_replacement: bool,
    pub rename_pattern: bool,
    pub unknown_refs_introduced: bool,
}

/// Domain weight of a folder's conflicts.
pub fn domain_weight(domain: &str) -> u8 {
    match domain {
        "on_action" => 30,
        "events" | "scripted_effects" | "scripted_triggers" => 25,
        "decisions" => 20,
        "gui" => 10,
        "localization" => 5,
        _ => 15,
    }
}

pub fn risk_score(
    domain: &str,
    contribution_count: usize,
    flags: HotspotFlags,
    capability: MergeCapability,
) -> u8 {
    let mut score = domain_weight(domain) as u32;
    score += 5 * contribution_count.saturating_sub(2) as u32;
    if flags.effect_block_replacement {
        score += 20;
    }
    if flags.rename_pattern {
        score += 10;
    }
    if flags.unknown_refs_introduced {
        score += 15;
    }
    if capability == MergeCapability::WinnerOnly {
        score += 10;
    }
    score.min(100) as u8
}

/// Classify how a conflict can be merged.
pub fn capability_for(policy: MergePolicy, contributions: &[Contribution]) -> MergeCapability {
    match policy {
        MergePolicy::ContainerMerge | MergePolicy::PerKeyOverride => MergeCapability::GuidedMerge,
        MergePolicy::Fios => MergeCapability::WinnerOnly,
        MergePolicy::Override => {
            if contributions.iter().all(is_map_form_payload) {
                MergeCapability::AiMerge
            } else {
                MergeCapability::WinnerOnly
            }
        }
    }
}

pub fn uncertainty_for(policy: MergePolicy, contributions: &[Contribution]) -> Uncertainty {
    let base = match policy {
        MergePolicy::PerKeyOverride => Uncertainty::None,
        MergePolicy::ContainerMerge => Uncertainty::Medium,
        MergePolicy::Fios => Uncertainty::Low,
        MergePolicy::Override => {
            if contributions.iter().all(is_map_form_payload) {
                Uncertainty::Low
            } else {
                Uncertainty::None
            }
        }
    };
    if contributions.iter().any(|c| c.has_diagnostics) {
        base.raised()
    } else {
        base
    }
}

/// Detect hotspot flags across a conflicting contribution set.
pub fn detect_hotspots(
    schema: &FolderSchema,
    contributions: &[Contribution],
    known_symbols: Option<&HashSet<String>>,
) -> HotspotFlags {
    HotspotFlags {
        effect_block_replacement: child_block_replaced(contributions, &["effect", "immediate"]),
        rename_pattern: scalar_child_differs(contributions, &["name", "title"]),
        unknown_refs_introduced: known_symbols
            .map(|known| introduces_unknown_refs(schema, contributions, known))
            .unwrap_or(false),
    }
}

pub fn build_conflict(
    schema: &FolderSchema,
    folder: &str,
    unit_key: &str,
    contributions: &[Contribution],
    known_symbols: Option<&HashSet<String>>,
) -> ConflictUnit {
    let capability = capability_for(schema.policy, contributions);
    let flags = detect_hotspots(schema, contributions, known_symbols);
    ConflictUnit {
        unit_key: unit_key.to_string(),
        folder: folder.to_string(),
        policy: schema.policy,
        contributions: contributions.iter().map(|c| c.source.clone()).collect(),
        risk_score: risk_score(&schema.domain, contributions.len(), flags, capability),
        merge_capability: capability,
        uncertainty: uncertainty_for(schema.policy, contributions),
    }
}

fn is_map_form_payload(c: &Contribution) -> bool {
    match &c.payload {
        Entry::Assignment(a) => a
            .value
            .as_block()
            .map(|b| b.form() == BlockForm::Map)
            .unwrap_or(false),
        _ => false,
    }
}

/// True when at least two contributions define one of the named children as a
/// block with differing serialized bodies.
fn child_block_replaced(contributions: &[Contribution], names: &[&str]) -> bool {
    for name in names {
        let mut bodies: Vec<Vec<u8>> = Vec::new();
        for c in contributions {
            let Entry::Assignment(a) = &c.payload else {
                continue;
            };
            let Some(block) = a.value.as_block() else {
                continue;
            };
            if let Some(child) = block.get(name) {
                if let Ok(bytes) = serde_json::to_vec(child) {
                    bodies.push(bytes);
                }
            }
        }
        if bodies.len() >= 2 && bodies.iter().any(|b| b != &bodies[0]) {
            return true;
        }
    }
    false
}

/// True when at least two contributions carry one of the named scalar
/// children with differing values.
fn scalar_child_differs(contributions: &[Contribution], names: &[&str]) -> bool {
    for name in names {
        let mut values: Vec<&str> = Vec::new();
        for c in contributions {
            let Entry::Assignment(a) = &c.payload else {
                continue;
            };
            let Some(block) = a.value.as_block() else {
                continue;
            };
            if let Some(text) = block.get_scalar_text(name) {
                values.push(text);
            }
        }
        if values.len() >= 2 && values.iter().any(|v| *v != values[0]) {
            return true;
        }
    }
    false
}

/// True when any contribution's payload references a name with no definition
/// in the playset-scoped symbol table.
fn introduces_unknown_refs(
    schema: &FolderSchema,
    contributions: &[Contribution],
    known: &HashSet<String>,
) -> bool {
    for c in contributions {
        let probe = Ast {
            entries: vec![c.payload.clone()],
        };
        let extraction = extract_file(schema, &probe);
        if extraction
            .references
            .iter()
            .any(|r| !known.contains(&r.name))
        {
            return true;
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contribution::SourceRef;
    use content_schema::SchemaRegistry;
    use script_parser::parse_source;

    fn contribution(source_name: &str, load_order: usize, src: &str, key: &str) -> Contribution {
        let parsed = parse_source(src, source_name);
        Contribution {
            source: SourceRef {
                version_id: load_order as i64 + 1,
                source_name: source_name.to_string(),
                load_order,
                relpath: format!("common/on_action/{load_order}.txt"),
                line: 1,
            },
            unit_key: key.to_string(),
            payload: parsed.ast.entries.into_iter().next().unwrap(),
            has_diagnostics: false,
        }
    }

    #[test]
    fn pinned_on_action_score_is_exactly_fifty() {
        // Domain on_action (30), two contributions (+0), effect-block
        // replacement (+20), no unknown references (+0), guided merge (+0).
        let registry = SchemaRegistry::standard();
        let schema = registry.for_folder("common/on_action").unwrap();
        let contribs = vec![
            contribution(
                "base_game",
                0,
                "on_yearly_pulse = { effect = { base_effect = yes } }",
                "on_yearly_pulse",
            ),
            contribution(
                "mod_a",
                1,
                "on_yearly_pulse = { effect = { mod_a_effect = yes } }",
                "on_yearly_pulse",
            ),
        ];
        let known: HashSet<String> = HashSet::new();
        let conflict = build_conflict(schema, "common/on_action", "on_yearly_pulse", &contribs, Some(&known));
        assert_eq!(conflict.risk_score, 50);
        assert_eq!(conflict.merge_capability, MergeCapability::GuidedMerge);
    }

    #[test]
    fn extra_contributions_add_five_each() {
        let flags = HotspotFlags::default();
        let base = risk_score("traits", 2, flags, MergeCapability::AiMerge);
        assert_eq!(base, 15);
        assert_eq!(risk_score("traits", 4, flags, MergeCapability::AiMerge), 25);
    }

    #[test]
    fn winner_only_capability_adds_ten() {
        let flags = HotspotFlags::default();
        assert_eq!(risk_score("gui", 2, flags, MergeCapability::WinnerOnly), 20);
        assert_eq!(risk_score("gui", 2, flags, MergeCapability::GuidedMerge), 10);
    }

    #[test]
    fn score_is_clamped_to_one_hundred() {
        let flags = HotspotFlags {
            effect_block_replacement: true,
            rename_pattern: true,
            unknown_refs_introduced: true,
        };
        assert_eq!(risk_score("on_action", 12, flags, MergeCapability::WinnerOnly), 100);
    }

    #[test]
    fn unknown_reference_introduction_is_detected() {
        let registry = SchemaRegistry::standard();
        let schema = registry.for_folder("common/on_action").unwrap();
        let contribs = vec![
            contribution("base_game", 0, "on_pulse = { events = { known.1 } }", "on_pulse"),
            contribution("mod_a", 1, "on_pulse = { events = { ghost.9 } }", "on_pulse"),
        ];
        let known: HashSet<String> = ["known.1".to_string()].into_iter().collect();
        let flags = detect_hotspots(schema, &contribs, Some(&known));
        assert!(flags.unknown_refs_introduced);
    }

    #[test]
    fn diagnostics_raise_uncertainty_one_level() {
        let mut contribs = vec![
            contribution("base_game", 0, "on_pulse = { effect = { a = yes } }", "on_pulse"),
            contribution("mod_a", 1, "on_pulse = { effect = { b = yes } }", "on_pulse"),
        ];
        assert_eq!(
            uncertainty_for(MergePolicy::ContainerMerge, &contribs),
            Uncertainty::Medium
        );
        contribs[1].has_diagnostics = true;
        assert_eq!(
            uncertainty_for(MergePolicy::ContainerMerge, &contribs),
            Uncertainty::High
        );
    }

    #[test]
    fn fios_conflicts_are_low_uncertainty_winner_only() {
        let contribs = vec![
            contribution("base_game", 0, "w = { a = 1 }", "gui:type:w"),
            contribution("mod_a", 1, "w = { a = 2 }", "gui:type:w"),
        ];
        assert_eq!(
            capability_for(MergePolicy::Fios, &contribs),
            MergeCapability::WinnerOnly
        );
        assert_eq!(
            uncertainty_for(MergePolicy::Fios, &contribs),
            Uncertainty::Low
        );
    }
}
