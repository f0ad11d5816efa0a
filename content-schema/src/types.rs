//! Closed vocabularies of the folder schema.
//!
//! Symbol types, merge policies, scope rules, and unit-key rules are closed
//! sets: new entries are a deliberate schema change, not an extension point.

use serde::{Deserialize, Serialize};
use std::fmt;

/// What a top-level child of a folder's files defines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SymbolType {
    Trait,
    Event,
    Decision,
    OnAction,
    ScriptedEffect,
    ScriptedTrigger,
    Tradition,
    Culture,
    Faith,
    Building,
    Government,
    Law,
    Modifier,
    Interaction,
    LocalizationKey,
    Define,
    GuiType,
    GuiTemplate,
}

impl SymbolType {
    pub fn as_str(&self) -> &'static str {
        match self {
            SymbolType::Trait => "trait",
            SymbolType::Event => "event",
            SymbolType::Decision => "decision",
            SymbolType::OnAction => "on_action",
            SymbolType::ScriptedEffect => "scripted_effect",
            SymbolType::ScriptedTrigger => "scripted_trigger",
            SymbolType::Tradition => "tradition",
            SymbolType::Culture => "culture",
            SymbolType::Faith => "faith",
            SymbolType::Building => "building",
            SymbolType::Government => "government",
            SymbolType::Law => "law",
            SymbolType::Modifier => "modifier",
            SymbolType::Interaction => "interaction",
            SymbolType::LocalizationKey => "localization_key",
            SymbolType::Define => "define",
            SymbolType::GuiType => "gui_type",
            SymbolType::GuiTemplate => "gui_template",
        }
    }
}

impl fmt::Display for SymbolType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The four merge policies. Selected per folder; `Override` is the default
/// for any recognized folder without an explicit entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePolicy {
    /// Whole-unit last-writer-wins.
    Override,
    /// Container children merged: lists append, scalars override, maps
    /// recurse. Only where the engine is known to merge.
    ContainerMerge,
    /// Flat key→value files; every key resolves independently, last wins.
    PerKeyOverride,
    /// First-in-order-seen: the earliest definition wins.
    Fios,
}

impl MergePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MergePolicy::Override => "OVERRIDE",
            MergePolicy::ContainerMerge => "CONTAINER_MERGE",
            MergePolicy::PerKeyOverride => "PER_KEY_OVERRIDE",
            MergePolicy::Fios => "FIOS",
        }
    }
}

impl fmt::Display for MergePolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where a symbol's scope comes from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScopeRule {
    /// Constant, derived from the folder (e.g. `traits`).
    Folder(String),
    /// Dynamic: the `namespace = …` declaration inside the file.
    EventNamespace,
}

/// How a unit key is read off a file's top-level entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitKeyRule {
    /// The top-level name as-is.
    TopLevelName,
    /// The top-level name, unless the block carries an inner `id = …`.
    TopLevelNameOrInnerId,
    /// `event:<id>` for events, `namespace:<value>` for namespace lines.
    EventId,
    /// `<namespace>.<key>` for defines.
    DefinePath,
    /// The literal key of a localization line.
    LocalizationKey,
    /// `gui:type:<name>` / `gui:template:<name>`.
    GuiPrefixed,
}

/// A use-site pattern: a child-key path within a definition block and the
/// reference type emitted for names found there.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefPattern {
    pub path: Vec<String>,
    pub ref_type: String,
}

impl RefPattern {
    pub fn new(path: &[&str], ref_type: &str) -> Self {
        Self {
            path: path.iter().map(|s| s.to_string()).collect(),
            ref_type: ref_type.to_string(),
        }
    }
}

/// Everything the pipeline needs to know about one recognized folder.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FolderSchema {
    /// Canonical folder prefix without trailing slash, e.g. `common/traits`.
    pub folder: String,
    /// Short domain label used by conflict risk weighting.
    pub domain: String,
    pub symbol_type: SymbolType,
    pub scope: ScopeRule,
    pub policy: MergePolicy,
    pub unit_key: UnitKeyRule,
    pub references: Vec<RefPattern>,
}

impl FolderSchema {
    /// The folder prefix with a trailing slash, for path queries.
    pub fn folder_prefix(&self) -> String {
        format!("{}/", self.folder)
    }
}
