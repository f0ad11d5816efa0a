//! Symbol/reference extraction and unit-key slicing.
//!
//! One walk per file. Extraction never fails on a parsed tree: a missing
//! field yields zero emissions for that location, not an error.

use crate::types::{FolderSchema, RefPattern, ScopeRule, SymbolType, UnitKeyRule};
use script_parser::{Ast, Block, Entry, Scalar, ScalarKind, Value};

/// A definition emitted by the extractor. Identity is
/// `(symbol_type, scope, name)`; several files producing the same identity
/// is override, not duplication.
#[derive(Debug, Clone, PartialEq)]
pub struct SymbolRecord {
    pub symbol_type: SymbolType,
    pub scope: String,
    pub name: String,
    pub line: u32,
}

/// A use-site of a typed name.
#[derive(Debug, Clone, PartialEq)]
pub struct ReferenceRecord {
    pub ref_type: String,
    pub name: String,
    pub line: u32,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Extraction {
    pub symbols: Vec<SymbolRecord>,
    pub references: Vec<ReferenceRecord>,
}

/// One top-level unit of a file, keyed for the resolver.
#[derive(Debug, Clone, PartialEq)]
pub struct UnitSlice<'a> {
    pub unit_key: String,
    pub entry: &'a Entry,
    pub line: u32,
}

/// Extract definition and reference records from a parsed file.
pub fn extract_file(schema: &FolderSchema, ast: &Ast) -> Extraction {
    let mut out = Extraction::default();
    match schema.unit_key {
        UnitKeyRule::DefinePath => extract_defines(schema, ast, &mut out),
        UnitKeyRule::GuiPrefixed => extract_gui(schema, ast, &mut out),
        // Localization files never reach the AST extractor.
        UnitKeyRule::LocalizationKey => {}
        _ => extract_standard(schema, ast, &mut out),
    }
    out
}

fn extract_standard(schema: &FolderSchema, ast: &Ast, out: &mut Extraction) {
    let mut namespace: Option<String> = None;
    for entry in &ast.entries {
        let Some(a) = entry.as_assignment() else {
            continue;
        };
        if matches!(schema.scope, ScopeRule::EventNamespace) && a.name.text == "namespace" {
            if let Some(s) = a.value.as_scalar() {
                namespace = Some(s.text.clone());
            }
            continue;
        }
        let scope = match &schema.scope {
            ScopeRule::Folder(folder_scope) => folder_scope.clone(),
            ScopeRule::EventNamespace => namespace
                .clone()
                .unwrap_or_else(|| schema.domain.clone()),
        };
        out.symbols.push(SymbolRecord {
            symbol_type: schema.symbol_type,
            scope,
            name: a.name.text.clone(),
            line: a.span.line,
        });
        if let Some(block) = a.value.as_block() {
            for pattern in &schema.references {
                emit_refs(block, pattern, &mut out.references);
            }
        }
    }
}

/// Defines files: top-level namespace blocks, one symbol per inner key.
fn extract_defines(schema: &FolderSchema, ast: &Ast, out: &mut Extraction) {
    for a in ast.assignments() {
        let Some(block) = a.value.as_block() else {
            continue;
        };
        for inner in block.assignments() {
            out.symbols.push(SymbolRecord {
                symbol_type: schema.symbol_type,
                scope: a.name.text.clone(),
                name: inner.name.text.clone(),
                line: inner.span.line,
            });
        }
    }
}

/// GUI files: `type NAME = base { … }` and `template NAME { … }` headers.
fn extract_gui(schema: &FolderSchema, ast: &Ast, out: &mut Extraction) {
    for (symbol_type, name, line) in gui_headers(ast) {
        out.symbols.push(SymbolRecord {
            symbol_type,
            scope: schema.domain.clone(),
            name,
            line,
        });
    }
}

/// Walk one reference pattern. A missing path yields nothing.
fn emit_refs(block: &Block, pattern: &RefPattern, out: &mut Vec<ReferenceRecord>) {
    let path: Vec<&str> = pattern.path.iter().map(String::as_str).collect();
    let Some(value) = block.get_path(&path) else {
        return;
    };
    match value {
        Value::Scalar(s) => push_ref(s, &pattern.ref_type, out),
        Value::Block(b) => {
            for entry in &b.entries {
                match entry {
                    Entry::Value(Value::Scalar(s)) => push_ref(s, &pattern.ref_type, out),
                    // Weighted maps (`100 = ns.some_event`) carry the name on
                    // the right-hand side.
                    Entry::Assignment(a) => {
                        if let Some(s) = a.value.as_scalar() {
                            push_ref(s, &pattern.ref_type, out);
                        }
                    }
                    _ => {}
                }
            }
        }
    }
}

fn push_ref(scalar: &Scalar, ref_type: &str, out: &mut Vec<ReferenceRecord>) {
    if matches!(scalar.kind, ScalarKind::Identifier | ScalarKind::QuotedString)
        && !scalar.text.is_empty()
    {
        out.push(ReferenceRecord {
            ref_type: ref_type.to_string(),
            name: scalar.text.clone(),
            line: scalar.span.line,
        });
    }
}

/// Slice a file into `(unit_key, subtree)` contributions for the resolver.
pub fn unit_slices<'a>(schema: &FolderSchema, ast: &'a Ast) -> Vec<UnitSlice<'a>> {
    let mut out = Vec::new();
    match schema.unit_key {
        UnitKeyRule::TopLevelName => {
            for entry in &ast.entries {
                if let Some(a) = entry.as_assignment() {
                    out.push(UnitSlice {
                        unit_key: a.name.text.clone(),
                        entry,
                        line: a.span.line,
                    });
                }
            }
        }
        UnitKeyRule::TopLevelNameOrInnerId => {
            for entry in &ast.entries {
                if let Some(a) = entry.as_assignment() {
                    let key = a
                        .value
                        .as_block()
                        .and_then(|b| b.get_scalar_text("id"))
                        .unwrap_or(&a.name.text)
                        .to_string();
                    out.push(UnitSlice {
                        unit_key: key,
                        entry,
                        line: a.span.line,
                    });
                }
            }
        }
        UnitKeyRule::EventId => {
            for entry in &ast.entries {
                if let Some(a) = entry.as_assignment() {
                    let key = if a.name.text == "namespace" {
                        let ns = a.value.as_scalar().map(|s| s.text.as_str()).unwrap_or("");
                        format!("namespace:{ns}")
                    } else {
                        format!("event:{}", a.name.text)
                    };
                    out.push(UnitSlice {
                        unit_key: key,
                        entry,
                        line: a.span.line,
                    });
                }
            }
        }
        UnitKeyRule::DefinePath => {
            for entry in &ast.entries {
                let Some(a) = entry.as_assignment() else {
                    continue;
                };
                let Some(block) = a.value.as_block() else {
                    continue;
                };
                for inner in &block.entries {
                    if let Some(inner_a) = inner.as_assignment() {
                        out.push(UnitSlice {
                            unit_key: format!("{}.{}", a.name.text, inner_a.name.text),
                            entry: inner,
                            line: inner_a.span.line,
                        });
                    }
                }
            }
        }
        UnitKeyRule::GuiPrefixed => {
            gui_slices(ast, &mut out);
        }
        // Localization contributions come from the line-format reader.
        UnitKeyRule::LocalizationKey => {}
    }
    out
}

/// GUI headers as `(symbol_type, name, line)` tuples.
fn gui_headers(ast: &Ast) -> Vec<(SymbolType, String, u32)> {
    let mut out = Vec::new();
    let entries = &ast.entries;
    for (i, entry) in entries.iter().enumerate() {
        let Entry::Value(Value::Scalar(s)) = entry else {
            continue;
        };
        match s.text.as_str() {
            "type" => {
                if let Some(Entry::Assignment(a)) = entries.get(i + 1) {
                    out.push((SymbolType::GuiType, a.name.text.clone(), a.span.line));
                }
            }
            "template" => {
                if let Some(Entry::Value(Value::Scalar(name))) = entries.get(i + 1) {
                    out.push((SymbolType::GuiTemplate, name.text.clone(), name.span.line));
                }
            }
            _ => {}
        }
    }
    out
}

fn gui_slices<'a>(ast: &'a Ast, out: &mut Vec<UnitSlice<'a>>) {
    let entries = &ast.entries;
    for (i, entry) in entries.iter().enumerate() {
        let Entry::Value(Value::Scalar(s)) = entry else {
            continue;
        };
        match s.text.as_str() {
            "type" => {
                if let Some(def @ Entry::Assignment(a)) = entries.get(i + 1) {
                    out.push(UnitSlice {
                        unit_key: format!("gui:type:{}", a.name.text),
                        entry: def,
                        line: a.span.line,
                    });
                }
            }
            "template" => {
                if let Some(Entry::Value(Value::Scalar(name))) = entries.get(i + 1) {
                    // The template body, when present, is the defining
                    // payload; fall back to the name entry otherwise.
                    let (def, line) = match entries.get(i + 2) {
                        Some(body @ Entry::Value(Value::Block(_))) => (body, name.span.line),
                        _ => (&entries[i + 1], name.span.line),
                    };
                    out.push(UnitSlice {
                        unit_key: format!("gui:template:{}", name.text),
                        entry: def,
                        line,
                    });
                }
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::SchemaRegistry;
    use script_parser::parse_source;

    fn schema_for(folder: &str) -> FolderSchema {
        SchemaRegistry::standard()
            .for_folder(folder)
            .unwrap()
            .clone()
    }

    #[test]
    fn trait_definitions_extract_with_folder_scope() {
        let schema = schema_for("common/traits");
        let parsed = parse_source(
            "brave = { index = 42 opposites = { craven } }\ncraven = { index = 43 }",
            "traits.txt",
        );
        let ex = extract_file(&schema, &parsed.ast);
        assert_eq!(ex.symbols.len(), 2);
        assert_eq!(ex.symbols[0].name, "brave");
        assert_eq!(ex.symbols[0].scope, "traits");
        assert_eq!(ex.symbols[0].symbol_type, SymbolType::Trait);
        // `opposites` list emits trait references.
        assert_eq!(ex.references.len(), 1);
        assert_eq!(ex.references[0].name, "craven");
        assert_eq!(ex.references[0].ref_type, "trait");
    }

    #[test]
    fn event_namespace_scopes_following_events() {
        let schema = schema_for("events");
        let parsed = parse_source(
            "namespace = war_events\nwar_events.0001 = { type = character_event }\nwar_events.0002 = { }",
            "war.txt",
        );
        let ex = extract_file(&schema, &parsed.ast);
        assert_eq!(ex.symbols.len(), 2);
        assert!(ex.symbols.iter().all(|s| s.scope == "war_events"));

        let slices = unit_slices(&schema, &parsed.ast);
        let keys: Vec<_> = slices.iter().map(|s| s.unit_key.clone()).collect();
        assert_eq!(
            keys,
            vec![
                "namespace:war_events",
                "event:war_events.0001",
                "event:war_events.0002",
            ]
        );
    }

    #[test]
    fn on_action_references_cover_lists_and_weighted_maps() {
        let schema = schema_for("common/on_action");
        let parsed = parse_source(
            "on_yearly_pulse = {\n  events = { war_events.0001 }\n  random_events = { 100 = war_events.0002 }\n  on_actions = { on_spring_cleanup }\n}",
            "on_actions.txt",
        );
        let ex = extract_file(&schema, &parsed.ast);
        let names: Vec<_> = ex.references.iter().map(|r| r.name.clone()).collect();
        assert!(names.contains(&"war_events.0001".to_string()));
        assert!(names.contains(&"war_events.0002".to_string()));
        assert!(names.contains(&"on_spring_cleanup".to_string()));
    }

    #[test]
    fn missing_reference_paths_emit_nothing() {
        let schema = schema_for("common/on_action");
        let parsed = parse_source("on_quiet = { effect = { } }", "on_actions.txt");
        let ex = extract_file(&schema, &parsed.ast);
        assert_eq!(ex.symbols.len(), 1);
        assert!(ex.references.is_empty());
    }

    #[test]
    fn defines_slice_to_namespace_dot_key() {
        let schema = schema_for("common/defines");
        let parsed = parse_source(
            "NGame = {\n  START_DATE = \"867.1.1\"\n  END_DATE = \"1453.1.1\"\n}",
            "defines.txt",
        );
        let ex = extract_file(&schema, &parsed.ast);
        assert_eq!(ex.symbols.len(), 2);
        assert_eq!(ex.symbols[0].scope, "NGame");
        assert_eq!(ex.symbols[0].name, "START_DATE");

        let keys: Vec<_> = unit_slices(&schema, &parsed.ast)
            .iter()
            .map(|s| s.unit_key.clone())
            .collect();
        assert_eq!(keys, vec!["NGame.START_DATE", "NGame.END_DATE"]);
    }

    #[test]
    fn decision_inner_id_overrides_top_level_name() {
        let schema = schema_for("common/decisions");
        let parsed = parse_source(
            "found_kingdom_decision = { id = found_kingdom }\nplain_decision = { ai_check = yes }",
            "decisions.txt",
        );
        let keys: Vec<_> = unit_slices(&schema, &parsed.ast)
            .iter()
            .map(|s| s.unit_key.clone())
            .collect();
        assert_eq!(keys, vec!["found_kingdom", "plain_decision"]);
    }

    #[test]
    fn gui_types_and_templates_slice_with_prefixes() {
        let schema = schema_for("gui");
        let parsed = parse_source(
            "type character_window = window { size = { 10 10 } }\ntemplate portrait_frame { texture = \"frame.dds\" }",
            "window.gui",
        );
        let ex = extract_file(&schema, &parsed.ast);
        let names: Vec<_> = ex.symbols.iter().map(|s| s.name.clone()).collect();
        assert_eq!(names, vec!["character_window", "portrait_frame"]);
        assert_eq!(ex.symbols[0].symbol_type, SymbolType::GuiType);
        assert_eq!(ex.symbols[1].symbol_type, SymbolType::GuiTemplate);

        let keys: Vec<_> = unit_slices(&schema, &parsed.ast)
            .iter()
            .map(|s| s.unit_key.clone())
            .collect();
        assert_eq!(
            keys,
            vec!["gui:type:character_window", "gui:template:portrait_frame"]
        );
    }

    #[test]
    fn tradition_references_cover_cultures_and_traits() {
        let schema = schema_for("common/culture/traditions");
        let parsed = parse_source(
            "tradition_warrior_culture = {\n  culture = norse\n  traits = { brave strong }\n}",
            "traditions.txt",
        );
        let ex = extract_file(&schema, &parsed.ast);
        let pairs: Vec<_> = ex
            .references
            .iter()
            .map(|r| (r.ref_type.clone(), r.name.clone()))
            .collect();
        assert!(pairs.contains(&("culture".to_string(), "norse".to_string())));
        assert!(pairs.contains(&("trait".to_string(), "brave".to_string())));
        assert!(pairs.contains(&("trait".to_string(), "strong".to_string())));
    }
}
