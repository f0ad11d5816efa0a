//! In-memory full-text index over a playset's symbols, references, and file
//! content.
//!
//! Built once per playset from the stored rows; all structures are plain
//! maps plus one sorted name vector, so every query mode is deterministic.

use crate::fuzzy::within_distance;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use tracing::debug;

/// One definition as indexed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolEntry {
    pub symbol_type: String,
    pub scope: String,
    pub name: String,
    pub version_id: i64,
    pub relpath: String,
    pub line: u32,
}

pub struct SearchIndex {
    entries: Vec<SymbolEntry>,
    /// name → indices into `entries`.
    by_name: HashMap<String, Vec<usize>>,
    /// Sorted unique symbol names; prefix queries binary-search here.
    names: Vec<String>,
    /// token → indices into `names`.
    tokens: HashMap<String, BTreeSet<usize>>,
    /// Reference names seen in the playset (indexed for token queries too).
    ref_names: BTreeSet<String>,
    /// word → relpaths containing it.
    content_words: BTreeMap<String, BTreeSet<String>>,
}

impl SearchIndex {
    pub fn build(entries: Vec<SymbolEntry>) -> Self {
        let mut by_name: HashMap<String, Vec<usize>> = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            by_name.entry(entry.name.clone()).or_default().push(idx);
        }
        let mut names: Vec<String> = by_name.keys().cloned().collect();
        names.sort();

        let mut tokens: HashMap<String, BTreeSet<usize>> = HashMap::new();
        for (name_idx, name) in names.iter().enumerate() {
            for token in tokenize(name) {
                tokens.entry(token).or_default().insert(name_idx);
            }
        }

        debug!("search: indexed {} entries, {} names", entries.len(), names.len());
        Self {
            entries,
            by_name,
            names,
            tokens,
            ref_names: BTreeSet::new(),
            content_words: BTreeMap::new(),
        }
    }

    /// Add reference names so token queries also surface use-sites.
    pub fn add_reference_names<I: IntoIterator<Item = String>>(&mut self, names: I) {
        self.ref_names.extend(names);
    }

    /// Index a file's text for word containment queries.
    pub fn index_content(&mut self, relpath: &str, text: &str) {
        for word in tokenize(text) {
            self.content_words
                .entry(word)
                .or_default()
                .insert(relpath.to_string());
        }
    }

    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    /// Exact `(symbol_type?, name)` lookup.
    pub fn exact(&self, symbol_type: Option<&str>, name: &str) -> Vec<&SymbolEntry> {
        let Some(indices) = self.by_name.get(name) else {
            return Vec::new();
        };
        indices
            .iter()
            .map(|&i| &self.entries[i])
            .filter(|e| symbol_type.is_none_or(|t| e.symbol_type == t))
            .collect()
    }

    /// Names starting with `prefix`, ascending.
    pub fn prefix(&self, prefix: &str) -> Vec<&str> {
        let start = self.names.partition_point(|n| n.as_str() < prefix);
        self.names[start..]
            .iter()
            .take_while(|n| n.starts_with(prefix))
            .map(String::as_str)
            .collect()
    }

    /// Names containing `token` as a whole token (split on `_ . : -`).
    /// Reference names count as hits too.
    pub fn token(&self, token: &str) -> Vec<&str> {
        let mut out: Vec<&str> = self
            .tokens
            .get(token)
            .map(|indices| indices.iter().map(|&i| self.names[i].as_str()).collect())
            .unwrap_or_default();
        for name in &self.ref_names {
            if tokenize(name).contains(&token.to_string()) && !out.contains(&name.as_str()) {
                out.push(name.as_str());
            }
        }
        out
    }

    /// Names matching a `*`-wildcard pattern.
    pub fn flex(&self, pattern: &str) -> Vec<&str> {
        self.names
            .iter()
            .filter(|n| wildcard_match(pattern, n))
            .map(String::as_str)
            .collect()
    }

    /// Names within edit distance `max` of `name`, ascending by distance
    /// then name.
    pub fn fuzzy(&self, name: &str, max: usize) -> Vec<(&str, usize)> {
        let mut hits: Vec<(&str, usize)> = self
            .names
            .iter()
            .filter_map(|n| within_distance(name, n, max).map(|d| (n.as_str(), d)))
            .collect();
        hits.sort_by(|a, b| a.1.cmp(&b.1).then_with(|| a.0.cmp(b.0)));
        hits
    }

    /// Relpaths whose content contains `word`.
    pub fn files_containing(&self, word: &str) -> Vec<&str> {
        self.content_words
            .get(word)
            .map(|paths| paths.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }
}

/// Split an identifier or text into lowercase word tokens on the
/// non-alphanumeric separators used by script names.
pub fn tokenize(text: &str) -> Vec<String> {
    let mut out = Vec::new();
    for raw in text.split(|c: char| !c.is_alphanumeric()) {
        if raw.is_empty() {
            continue;
        }
        let token = raw.to_ascii_lowercase();
        if !out.contains(&token) {
            out.push(token);
        }
    }
    out
}

/// `*`-only wildcard matcher; anything else matches literally.
pub fn wildcard_match(pattern: &str, text: &str) -> bool {
    let parts: Vec<&str> = pattern.split('*').collect();
    if parts.len() == 1 {
        return pattern == text;
    }
    let mut rest = text;
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            continue;
        }
        if i == 0 {
            let Some(stripped) = rest.strip_prefix(part) else {
                return false;
            };
            rest = stripped;
        } else if i == parts.len() - 1 && !pattern.ends_with('*') {
            return rest.ends_with(part);
        } else {
            let Some(found) = rest.find(part) else {
                return false;
            };
            rest = &rest[found + part.len()..];
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(symbol_type: &str, name: &str) -> SymbolEntry {
        SymbolEntry {
            symbol_type: symbol_type.to_string(),
            scope: "test".to_string(),
            name: name.to_string(),
            version_id: 1,
            relpath: "common/test/a.txt".to_string(),
            line: 1,
        }
    }

    fn index() -> SearchIndex {
        SearchIndex::build(vec![
            entry("trait", "brave"),
            entry("trait", "brave"),
            entry("trait", "craven"),
            entry("trait", "berserker_rage"),
            entry("event", "war_events.0001"),
        ])
    }

    #[test]
    fn exact_filters_by_type() {
        let idx = index();
        assert_eq!(idx.exact(Some("trait"), "brave").len(), 2);
        assert_eq!(idx.exact(Some("event"), "brave").len(), 0);
        assert_eq!(idx.exact(None, "brave").len(), 2);
    }

    #[test]
    fn prefix_scans_sorted_names() {
        let idx = index();
        assert_eq!(idx.prefix("bra"), vec!["brave"]);
        assert_eq!(idx.prefix("b"), vec!["berserker_rage", "brave"]);
        assert!(idx.prefix("zz").is_empty());
    }

    #[test]
    fn token_decomposition_finds_compound_names() {
        let idx = index();
        assert_eq!(idx.token("rage"), vec!["berserker_rage"]);
        assert_eq!(idx.token("0001"), vec!["war_events.0001"]);
    }

    #[test]
    fn flex_wildcards_match_infixes() {
        let idx = index();
        assert_eq!(idx.flex("*rage*"), vec!["berserker_rage"]);
        assert_eq!(idx.flex("war_*"), vec!["war_events.0001"]);
        assert_eq!(idx.flex("brave"), vec!["brave"]);
    }

    #[test]
    fn fuzzy_orders_by_distance_then_name() {
        let idx = index();
        let hits = idx.fuzzy("brav", 2);
        assert_eq!(hits[0], ("brave", 1));
    }

    #[test]
    fn content_words_map_back_to_files() {
        let mut idx = index();
        idx.index_content("common/test/a.txt", "brave = { index = 42 }");
        assert_eq!(idx.files_containing("brave"), vec!["common/test/a.txt"]);
        assert!(idx.files_containing("absent").is_empty());
    }
}
