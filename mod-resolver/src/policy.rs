//! The four merge policies.
//!
//! Policies operate on contribution lists already sorted by
//! `(load_order, relpath, position)`. Output is `(winner, losers, residual)`:
//! the residual equals the winner's payload for `OVERRIDE`/`FIOS`, is a
//! synthesized subtree for `CONTAINER_MERGE`, and a per-key map for
//! `PER_KEY_OVERRIDE`.

use crate::contribution::Contribution;
use content_schema::MergePolicy;
use script_parser::{Assignment, Block, BlockForm, Entry, Value};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Materialized result of a policy application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Residual {
    Entry(Entry),
    /// Per-key map for `PER_KEY_OVERRIDE` when applied across keys.
    Map(BTreeMap<String, Entry>),
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PolicyOutcome {
    pub winner: Contribution,
    /// Overridden contributions, in contribution order.
    pub losers: Vec<Contribution>,
    pub residual: Residual,
}

/// Apply a policy to a sorted contribution list. Returns `None` for an empty
/// list.
pub fn apply(policy: MergePolicy, contributions: &[Contribution]) -> Option<PolicyOutcome> {
    match policy {
        MergePolicy::Override => apply_last_wins(contributions),
        MergePolicy::Fios => apply_first_wins(contributions),
        MergePolicy::PerKeyOverride => apply_per_key(contributions),
        MergePolicy::ContainerMerge => apply_container_merge(contributions),
    }
}

fn apply_last_wins(contributions: &[Contribution]) -> Option<PolicyOutcome> {
    let (winner, losers) = contributions.split_last()?;
    Some(PolicyOutcome {
        winner: winner.clone(),
        losers: losers.to_vec(),
        residual: Residual::Entry(winner.payload.clone()),
    })
}

fn apply_first_wins(contributions: &[Contribution]) -> Option<PolicyOutcome> {
    let (winner, losers) = contributions.split_first()?;
    Some(PolicyOutcome {
        winner: winner.clone(),
        losers: losers.to_vec(),
        residual: Residual::Entry(winner.payload.clone()),
    })
}

fn apply_per_key(contributions: &[Contribution]) -> Option<PolicyOutcome> {
    let winner = contributions.last()?.clone();
    let mut map: BTreeMap<String, Entry> = BTreeMap::new();
    let mut losers = Vec::new();
    for c in contributions {
        map.insert(c.unit_key.clone(), c.payload.clone());
    }
    // A contribution loses when a later one defines the same key.
    for (idx, c) in contributions.iter().enumerate() {
        let superseded = contributions[idx + 1..]
            .iter()
            .any(|later| later.unit_key == c.unit_key);
        if superseded {
            losers.push(c.clone());
        }
    }
    Some(PolicyOutcome {
        winner,
        losers,
        residual: Residual::Map(map),
    })
}

fn apply_container_merge(contributions: &[Contribution]) -> Option<PolicyOutcome> {
    let (winner, losers) = contributions.split_last()?;
    let mut merged = contributions.first()?.payload.clone();
    for c in &contributions[1..] {
        merged = merge_entries(&merged, &c.payload);
    }
    Some(PolicyOutcome {
        winner: winner.clone(),
        losers: losers.to_vec(),
        residual: Residual::Entry(merged),
    })
}

/// Merge two top-level container entries. Anything that is not a pair of
/// block-valued assignments falls back to replacement.
fn merge_entries(acc: &Entry, next: &Entry) -> Entry {
    match (acc, next) {
        (Entry::Assignment(a), Entry::Assignment(b)) => {
            match (a.value.as_block(), b.value.as_block()) {
                (Some(a_block), Some(b_block)) => Entry::Assignment(Assignment {
                    name: a.name.clone(),
                    op: a.op,
                    value: Value::Block(merge_blocks(a_block, b_block)),
                    span: a.span,
                }),
                _ => next.clone(),
            }
        }
        _ => next.clone(),
    }
}

/// Child-by-child container merge, applied recursively at any depth:
/// list-form children append in load order, scalar children last-writer-win,
/// map-form children recurse as containers. Mixed-form children append, the
/// only order-safe reading. Comments from later contributions are dropped.
fn merge_blocks(acc: &Block, next: &Block) -> Block {
    let mut entries = acc.entries.clone();
    for entry in &next.entries {
        match entry {
            Entry::Comment(_) => {}
            Entry::Value(v) => entries.push(Entry::Value(v.clone())),
            Entry::Assignment(incoming) => {
                let existing_pos = entries.iter().position(
                    |e| matches!(e, Entry::Assignment(have) if have.name.text == incoming.name.text),
                );
                match existing_pos {
                    None => entries.push(entry.clone()),
                    Some(pos) => {
                        let Entry::Assignment(existing) = entries[pos].clone() else {
                            continue;
                        };
                        let merged_value = merge_child_value(&existing.value, &incoming.value);
                        entries[pos] = Entry::Assignment(Assignment {
                            name: existing.name,
                            op: existing.op,
                            value: merged_value,
                            span: existing.span,
                        });
                    }
                }
            }
        }
    }
    Block {
        entries,
        span: acc.span,
    }
}

fn merge_child_value(existing: &Value, incoming: &Value) -> Value {
    match (existing.as_block(), incoming.as_block()) {
        (Some(a), Some(b)) => {
            if a.form() == BlockForm::Map && b.form() == BlockForm::Map {
                Value::Block(merge_blocks(a, b))
            } else {
                let mut entries = a.entries.clone();
                entries.extend(
                    b.entries
                        .iter()
                        .filter(|e| !matches!(e, Entry::Comment(_)))
                        .cloned(),
                );
                Value::Block(Block {
                    entries,
                    span: a.span,
                })
            }
        }
        _ => incoming.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contribution::SourceRef;
    use script_parser::parse_source;

    fn contribution(source_name: &str, load_order: usize, src: &str, key: &str) -> Contribution {
        let parsed = parse_source(src, source_name);
        Contribution {
            source: SourceRef {
                version_id: load_order as i64 + 1,
                source_name: source_name.to_string(),
                load_order,
                relpath: format!("common/test/{load_order}.txt"),
                line: 1,
            },
            unit_key: key.to_string(),
            payload: parsed.ast.entries.into_iter().next().unwrap(),
            has_diagnostics: false,
        }
    }

    #[test]
    fn override_residual_is_winner_payload_bit_exact() {
        let contribs = vec![
            contribution("base_game", 0, "brave = { index = 42 }", "brave"),
            contribution("mod_a", 1, "brave = { index = 99 }", "brave"),
        ];
        let out = apply(MergePolicy::Override, &contribs).unwrap();
        assert_eq!(out.winner.source.source_name, "mod_a");
        assert_eq!(out.losers.len(), 1);
        assert_eq!(out.losers[0].source.source_name, "base_game");
        assert_eq!(out.residual, Residual::Entry(contribs[1].payload.clone()));
    }

    #[test]
    fn fios_lowest_load_order_wins() {
        let contribs = vec![
            contribution("base_game", 0, "character_window = { a = 1 }", "gui:type:character_window"),
            contribution("mod_a", 1, "character_window = { a = 2 }", "gui:type:character_window"),
            contribution("mod_b", 2, "character_window = { a = 3 }", "gui:type:character_window"),
        ];
        let out = apply(MergePolicy::Fios, &contribs).unwrap();
        assert_eq!(out.winner.source.load_order, 0);
        assert_eq!(out.losers.len(), 2);
        assert_eq!(out.residual, Residual::Entry(contribs[0].payload.clone()));
    }

    #[test]
    fn per_key_override_keeps_highest_contribution_per_key() {
        let contribs = vec![
            contribution("base_game", 0, "brave = \"Brave\"", "brave"),
            contribution("mod_a", 1, "brave = \"Bold\"", "brave"),
            contribution("mod_a", 1, "craven = \"Craven\"", "craven"),
            contribution("mod_b", 2, "brave = \"Stalwart\"", "brave"),
        ];
        let out = apply(MergePolicy::PerKeyOverride, &contribs).unwrap();
        let Residual::Map(map) = &out.residual else {
            panic!("expected per-key residual");
        };
        assert_eq!(map.len(), 2);
        let brave = map.get("brave").unwrap().as_assignment().unwrap();
        assert_eq!(brave.value.as_scalar().unwrap().text, "Stalwart");
        // base and mod_a lose `brave`; `craven` is unopposed.
        assert_eq!(out.losers.len(), 2);
    }

    #[test]
    fn container_merge_appends_lists_and_recurses_maps() {
        let contribs = vec![
            contribution(
                "base_game",
                0,
                "on_yearly_pulse = { events = { base.1 } effect = { base_effect = yes } }",
                "on_yearly_pulse",
            ),
            contribution(
                "mod_a",
                1,
                "on_yearly_pulse = { events = { mod.1 } effect = { mod_a_effect = yes } }",
                "on_yearly_pulse",
            ),
        ];
        let out = apply(MergePolicy::ContainerMerge, &contribs).unwrap();
        let Residual::Entry(Entry::Assignment(merged)) = &out.residual else {
            panic!("expected merged assignment");
        };
        let block = merged.value.as_block().unwrap();

        // List child appended in load order.
        let events = block.get("events").unwrap().as_block().unwrap();
        let names: Vec<_> = events
            .bare_values()
            .filter_map(Value::as_scalar)
            .map(|s| s.text.clone())
            .collect();
        assert_eq!(names, vec!["base.1", "mod.1"]);

        // Map child recursed: both keys present.
        let effect = block.get("effect").unwrap().as_block().unwrap();
        assert!(effect.get("base_effect").is_some());
        assert!(effect.get("mod_a_effect").is_some());
    }

    #[test]
    fn container_merge_scalar_children_follow_override() {
        let contribs = vec![
            contribution("base_game", 0, "on_pulse = { interval = 12 }", "on_pulse"),
            contribution("mod_a", 1, "on_pulse = { interval = 6 }", "on_pulse"),
        ];
        let out = apply(MergePolicy::ContainerMerge, &contribs).unwrap();
        let Residual::Entry(Entry::Assignment(merged)) = &out.residual else {
            panic!("expected merged assignment");
        };
        assert_eq!(
            merged.value.as_block().unwrap().get_scalar_text("interval"),
            Some("6")
        );
    }

    #[test]
    fn container_merge_recurses_past_depth_two() {
        let contribs = vec![
            contribution(
                "base_game",
                0,
                "on_pulse = { outer = { inner = { deep_list = { a } } } }",
                "on_pulse",
            ),
            contribution(
                "mod_a",
                1,
                "on_pulse = { outer = { inner = { deep_list = { b } } } }",
                "on_pulse",
            ),
        ];
        let out = apply(MergePolicy::ContainerMerge, &contribs).unwrap();
        let Residual::Entry(Entry::Assignment(merged)) = &out.residual else {
            panic!("expected merged assignment");
        };
        let deep = merged
            .value
            .as_block()
            .unwrap()
            .get_path(&["outer", "inner", "deep_list"])
            .unwrap()
            .as_block()
            .unwrap();
        let names: Vec<_> = deep
            .bare_values()
            .filter_map(Value::as_scalar)
            .map(|s| s.text.clone())
            .collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn container_merge_order_matters() {
        let forward = vec![
            contribution("base_game", 0, "x = { list = { a } }", "x"),
            contribution("mod_a", 1, "x = { list = { b } }", "x"),
        ];
        let backward = vec![forward[1].clone(), forward[0].clone()];
        let f = apply(MergePolicy::ContainerMerge, &forward).unwrap();
        let b = apply(MergePolicy::ContainerMerge, &backward).unwrap();
        assert_ne!(f.residual, b.residual);
    }

    #[test]
    fn empty_contribution_set_yields_nothing() {
        assert!(apply(MergePolicy::Override, &[]).is_none());
    }
}
