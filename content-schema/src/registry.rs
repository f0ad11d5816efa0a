//! The closed registry of recognized folder patterns.
//!
//! Folder → schema is a total function over the recognized set, matched with
//! a glob set over normalized relpaths. Anything outside the set is opaque
//! content: stored and hashed, never parsed or resolved.

use crate::types::{FolderSchema, MergePolicy, RefPattern, ScopeRule, SymbolType, UnitKeyRule};
use globset::{Glob, GlobSet, GlobSetBuilder};
use tracing::debug;

/// How a relpath participates in the pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContentClass {
    /// Script syntax parsed by the script parser.
    Script,
    /// `localization/**.yml` line format.
    Localization,
    /// Recorded and content-addressed, nothing extracted.
    Opaque,
}

pub struct SchemaRegistry {
    schemas: Vec<FolderSchema>,
    matcher: GlobSet,
}

impl SchemaRegistry {
    /// The standard folder set.
    pub fn standard() -> Self {
        let mut schemas = Vec::new();

        let folder = |folder: &str,
                      domain: &str,
                      symbol_type: SymbolType,
                      policy: MergePolicy,
                      unit_key: UnitKeyRule,
                      references: Vec<RefPattern>| {
            FolderSchema {
                folder: folder.to_string(),
                domain: domain.to_string(),
                symbol_type,
                scope: ScopeRule::Folder(domain.to_string()),
                policy,
                unit_key,
                references,
            }
        };

        schemas.push(folder(
            "common/traits",
            "traits",
            SymbolType::Trait,
            MergePolicy::Override,
            UnitKeyRule::TopLevelName,
            vec![RefPattern::new(&["opposites"], "trait")],
        ));
        schemas.push(folder(
            "common/on_action",
            "on_action",
            SymbolType::OnAction,
            MergePolicy::ContainerMerge,
            UnitKeyRule::TopLevelName,
            vec![
                RefPattern::new(&["events"], "event"),
                RefPattern::new(&["on_actions"], "on_action"),
                RefPattern::new(&["random_events"], "event"),
                RefPattern::new(&["first_valid"], "event"),
            ],
        ));
        schemas.push(folder(
            "common/scripted_effects",
            "scripted_effects",
            SymbolType::ScriptedEffect,
            MergePolicy::Override,
            UnitKeyRule::TopLevelName,
            vec![],
        ));
        schemas.push(folder(
            "common/scripted_triggers",
            "scripted_triggers",
            SymbolType::ScriptedTrigger,
            MergePolicy::Override,
            UnitKeyRule::TopLevelName,
            vec![],
        ));
        schemas.push(folder(
            "common/decisions",
            "decisions",
            SymbolType::Decision,
            MergePolicy::Override,
            UnitKeyRule::TopLevelNameOrInnerId,
            vec![],
        ));
        schemas.push(FolderSchema {
            folder: "events".to_string(),
            domain: "events".to_string(),
            symbol_type: SymbolType::Event,
            scope: ScopeRule::EventNamespace,
            policy: MergePolicy::Override,
            unit_key: UnitKeyRule::EventId,
            references: vec![RefPattern::new(&["option", "trigger_event"], "event")],
        });
        schemas.push(folder(
            "common/culture/traditions",
            "traditions",
            SymbolType::Tradition,
            MergePolicy::Override,
            UnitKeyRule::TopLevelName,
            vec![
                RefPattern::new(&["culture"], "culture"),
                RefPattern::new(&["traits"], "trait"),
            ],
        ));
        schemas.push(folder(
            "common/culture/cultures",
            "cultures",
            SymbolType::Culture,
            MergePolicy::Override,
            UnitKeyRule::TopLevelName,
            vec![RefPattern::new(&["traditions"], "tradition")],
        ));
        schemas.push(folder(
            "common/religion/faiths",
            "faiths",
            SymbolType::Faith,
            MergePolicy::Override,
            UnitKeyRule::TopLevelName,
            vec![],
        ));
        schemas.push(folder(
            "common/buildings",
            "buildings",
            SymbolType::Building,
            MergePolicy::Override,
            UnitKeyRule::TopLevelName,
            vec![],
        ));
        schemas.push(folder(
            "common/governments",
            "governments",
            SymbolType::Government,
            MergePolicy::Override,
            UnitKeyRule::TopLevelName,
            vec![],
        ));
        schemas.push(folder(
            "common/laws",
            "laws",
            SymbolType::Law,
            MergePolicy::Override,
            UnitKeyRule::TopLevelName,
            vec![],
        ));
        schemas.push(folder(
            "common/modifiers",
            "modifiers",
            SymbolType::Modifier,
            MergePolicy::Override,
            UnitKeyRule::TopLevelName,
            vec![],
        ));
        schemas.push(folder(
            "common/character_interactions",
            "interactions",
            SymbolType::Interaction,
            MergePolicy::Override,
            UnitKeyRule::TopLevelName,
            vec![],
        ));
        schemas.push(folder(
            "common/defines",
            "defines",
            SymbolType::Define,
            MergePolicy::PerKeyOverride,
            UnitKeyRule::DefinePath,
            vec![],
        ));
        schemas.push(folder(
            "localization",
            "localization",
            SymbolType::LocalizationKey,
            MergePolicy::PerKeyOverride,
            UnitKeyRule::LocalizationKey,
            vec![],
        ));
        schemas.push(folder(
            "gui",
            "gui",
            SymbolType::GuiType,
            MergePolicy::Fios,
            UnitKeyRule::GuiPrefixed,
            vec![],
        ));

        let mut builder = GlobSetBuilder::new();
        for schema in &schemas {
            // Infallible for our fixed patterns; checked by tests.
            if let Ok(glob) = Glob::new(&format!("{}/**", schema.folder)) {
                builder.add(glob);
            }
        }
        let matcher = builder.build().unwrap_or_else(|_| GlobSet::empty());

        debug!("schema: registry with {} folders", schemas.len());
        Self { schemas, matcher }
    }

    pub fn schemas(&self) -> &[FolderSchema] {
        &self.schemas
    }

    /// Schema responsible for a relpath, if any. When nested folder patterns
    /// both match, the longer (more specific) prefix wins.
    pub fn for_relpath(&self, relpath: &str) -> Option<&FolderSchema> {
        self.matcher
            .matches(relpath)
            .into_iter()
            .map(|idx| &self.schemas[idx])
            .max_by_key(|s| s.folder.len())
    }

    /// Schema for an exact folder prefix (no trailing slash).
    pub fn for_folder(&self, folder: &str) -> Option<&FolderSchema> {
        let trimmed = folder.trim_end_matches('/');
        self.schemas.iter().find(|s| s.folder == trimmed)
    }

    /// Classify a relpath for the ingest pipeline.
    pub fn classify(&self, relpath: &str) -> ContentClass {
        if relpath.starts_with("localization/") {
            return if relpath.ends_with(".yml") {
                ContentClass::Localization
            } else {
                ContentClass::Opaque
            };
        }
        match self.for_relpath(relpath) {
            Some(_) if relpath.ends_with(".txt") || relpath.ends_with(".gui") => {
                ContentClass::Script
            }
            _ => ContentClass::Opaque,
        }
    }
}

impl Default for SchemaRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_registered_folder_matches_its_files() {
        let reg = SchemaRegistry::standard();
        for schema in reg.schemas() {
            let probe = format!("{}/00_probe.txt", schema.folder);
            let found = reg.for_relpath(&probe).unwrap();
            assert_eq!(found.folder, schema.folder, "probe {probe}");
        }
    }

    #[test]
    fn nested_culture_folders_pick_the_specific_schema() {
        let reg = SchemaRegistry::standard();
        let s = reg
            .for_relpath("common/culture/traditions/00_realm.txt")
            .unwrap();
        assert_eq!(s.symbol_type, SymbolType::Tradition);
        let s = reg
            .for_relpath("common/culture/cultures/00_west.txt")
            .unwrap();
        assert_eq!(s.symbol_type, SymbolType::Culture);
    }

    #[test]
    fn unrecognized_paths_are_opaque() {
        let reg = SchemaRegistry::standard();
        assert!(reg.for_relpath("music/songs.txt").is_none());
        assert_eq!(reg.classify("music/songs.txt"), ContentClass::Opaque);
        assert_eq!(reg.classify("gfx/portrait.dds"), ContentClass::Opaque);
    }

    #[test]
    fn classification_splits_script_and_localization() {
        let reg = SchemaRegistry::standard();
        assert_eq!(
            reg.classify("common/traits/00_traits.txt"),
            ContentClass::Script
        );
        assert_eq!(
            reg.classify("localization/english/defs_l_english.yml"),
            ContentClass::Localization
        );
        assert_eq!(reg.classify("gui/window_character.gui"), ContentClass::Script);
    }

    #[test]
    fn policies_follow_the_folder_table() {
        let reg = SchemaRegistry::standard();
        let policy = |f: &str| reg.for_folder(f).unwrap().policy;
        assert_eq!(policy("common/traits"), MergePolicy::Override);
        assert_eq!(policy("common/on_action"), MergePolicy::ContainerMerge);
        assert_eq!(policy("common/defines"), MergePolicy::PerKeyOverride);
        assert_eq!(policy("localization"), MergePolicy::PerKeyOverride);
        assert_eq!(policy("gui"), MergePolicy::Fios);
    }
}
