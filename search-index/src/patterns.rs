//! Adjacency pattern expansion and the confirm-not-exists sweep.
//!
//! A "not found" claim requires exhausting a fixed pattern set: exact,
//! prefix, token decomposition, flex wildcards, and edit distance ≤ 2, in
//! that order. The expansion is enumerable and reproducible so replaying the
//! same input preserves the answer.

use crate::index::{SearchIndex, tokenize};
use serde::{Deserialize, Serialize};

/// Maximum edit distance of the fuzzy sweep.
pub const FUZZY_DISTANCE: usize = 2;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternMode {
    Exact,
    Prefix,
    Token,
    Flex,
    Fuzzy,
}

/// One executed sweep: which pattern ran and how many names it hit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PatternSweep {
    pub mode: PatternMode,
    pub pattern: String,
    pub hits: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotExistsReport {
    pub symbol_type: Option<String>,
    pub name: String,
    pub sweeps: Vec<PatternSweep>,
    /// True only when every sweep returned zero hits.
    pub can_claim_not_exists: bool,
}

/// The exhaustive pattern list for a name, in fixed order.
pub fn expansion_patterns(name: &str) -> Vec<(PatternMode, String)> {
    let mut patterns = vec![
        (PatternMode::Exact, name.to_string()),
        (PatternMode::Prefix, name.to_string()),
    ];
    let tokens = tokenize(name);
    for token in &tokens {
        patterns.push((PatternMode::Token, token.clone()));
    }
    for token in &tokens {
        patterns.push((PatternMode::Flex, format!("*{token}*")));
    }
    patterns.push((PatternMode::Flex, format!("*{name}*")));
    patterns.push((PatternMode::Fuzzy, name.to_string()));
    patterns
}

/// Run the exhaustive sweep. The claim is positive only if every pattern in
/// the expansion returned zero hits.
pub fn confirm_not_exists(
    index: &SearchIndex,
    symbol_type: Option<&str>,
    name: &str,
) -> NotExistsReport {
    let mut sweeps = Vec::new();
    for (mode, pattern) in expansion_patterns(name) {
        let hits = match mode {
            PatternMode::Exact => index.exact(symbol_type, &pattern).len(),
            PatternMode::Prefix => index.prefix(&pattern).len(),
            PatternMode::Token => index.token(&pattern).len(),
            PatternMode::Flex => index.flex(&pattern).len(),
            PatternMode::Fuzzy => index.fuzzy(&pattern, FUZZY_DISTANCE).len(),
        };
        sweeps.push(PatternSweep {
            mode,
            pattern,
            hits,
        });
    }
    let can_claim_not_exists = sweeps.iter().all(|s| s.hits == 0);
    NotExistsReport {
        symbol_type: symbol_type.map(str::to_string),
        name: name.to_string(),
        sweeps,
        can_claim_not_exists,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::index::SymbolEntry;

    fn entry(name: &str) -> SymbolEntry {
        SymbolEntry {
            symbol_type: "trait".to_string(),
            scope: "traits".to_string(),
            name: name.to_string(),
            version_id: 1,
            relpath: "common/traits/a.txt".to_string(),
            line: 1,
        }
    }

    #[test]
    fn truly_absent_name_can_be_claimed() {
        let index = SearchIndex::build(vec![entry("brave"), entry("craven")]);
        let report = confirm_not_exists(&index, Some("trait"), "zzqx_unrelated_glyph");
        assert!(report.can_claim_not_exists);
        assert!(report.sweeps.iter().all(|s| s.hits == 0));
    }

    #[test]
    fn near_miss_blocks_the_claim_via_fuzzy() {
        let index = SearchIndex::build(vec![entry("brave")]);
        // One substitution away: the fuzzy sweep must catch it.
        let report = confirm_not_exists(&index, Some("trait"), "brove");
        assert!(!report.can_claim_not_exists);
        let fuzzy = report
            .sweeps
            .iter()
            .find(|s| s.mode == PatternMode::Fuzzy)
            .unwrap();
        assert!(fuzzy.hits > 0);
    }

    #[test]
    fn shared_token_blocks_the_claim() {
        let index = SearchIndex::build(vec![entry("berserker_rage")]);
        let report = confirm_not_exists(&index, Some("trait"), "rage_of_winter");
        assert!(!report.can_claim_not_exists);
        let token = report
            .sweeps
            .iter()
            .find(|s| s.mode == PatternMode::Token && s.pattern == "rage")
            .unwrap();
        assert!(token.hits > 0);
    }

    #[test]
    fn expansion_order_is_fixed() {
        let patterns = expansion_patterns("war_events");
        let modes: Vec<_> = patterns.iter().map(|(m, _)| *m).collect();
        assert_eq!(
            modes,
            vec![
                PatternMode::Exact,
                PatternMode::Prefix,
                PatternMode::Token,
                PatternMode::Token,
                PatternMode::Flex,
                PatternMode::Flex,
                PatternMode::Flex,
                PatternMode::Fuzzy,
            ]
        );
        assert_eq!(patterns, expansion_patterns("war_events"));
    }

    #[test]
    fn replaying_identical_input_preserves_the_answer() {
        let index = SearchIndex::build(vec![entry("brave"), entry("berserker_rage")]);
        let a = confirm_not_exists(&index, None, "ghost_trait");
        let b = confirm_not_exists(&index, None, "ghost_trait");
        assert_eq!(a, b);
    }
}
