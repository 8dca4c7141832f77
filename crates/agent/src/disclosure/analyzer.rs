//! Relevance analysis: which registry blocks does a request touch?
//!
//! Scoring is plain token overlap: a request is split into lowercase word
//! tokens (maximal runs of alphanumerics and `_`) and each block scores
//! `matched tags / total tags`. The result is fully deterministic; the
//! [`RelevanceAnalyzer`] trait is the seam for a different strategy.

use osgate_core::block::Priority;
use osgate_core::registry::ContentRegistry;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BTreeSet, HashSet};

/// Words that flag emotional content in a request.
pub const EMOTIONAL_TRIGGERS: &[&str] = &[
    "happy",
    "sad",
    "angry",
    "afraid",
    "worried",
    "excited",
    "frustrated",
    "confused",
    "feel",
    "feeling",
    "emotion",
];

/// Words that flag a request likely to need tool use.
pub const TOOL_TRIGGERS: &[&str] = &[
    "calculate",
    "compute",
    "search",
    "find",
    "create",
    "generate",
    "analyze",
    "process",
    "execute",
];

/// A block judged relevant to a request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    /// Fraction of the block's tags present in the request, in (0, 1]
    pub score: f64,
    pub priority: Priority,
    /// The tags that matched, sorted
    pub matched: Vec<String>,
}

/// Output of one analysis pass.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisResult {
    /// Ordered by score descending, then priority ascending, then name
    pub candidates: Vec<Candidate>,
    pub emotional_content_detected: bool,
    pub tool_usage_likely: bool,
}

impl AnalysisResult {
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.candidates.iter().map(|c| c.name.as_str())
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }
}

/// Ranks registry blocks against a request.
pub trait RelevanceAnalyzer: Send + Sync {
    /// Score every block not named in `excluding`. Never loads anything.
    fn analyze(
        &self,
        request: &str,
        registry: &ContentRegistry,
        excluding: &HashSet<String>,
    ) -> AnalysisResult;
}

/// Tag-overlap analyzer.
#[derive(Debug, Clone, Copy, Default)]
pub struct KeywordAnalyzer;

impl KeywordAnalyzer {
    pub fn new() -> Self {
        Self
    }
}

impl RelevanceAnalyzer for KeywordAnalyzer {
    fn analyze(
        &self,
        request: &str,
        registry: &ContentRegistry,
        excluding: &HashSet<String>,
    ) -> AnalysisResult {
        let tokens = tokenize(request);

        let mut candidates: Vec<Candidate> = registry
            .all()
            .iter()
            .filter(|block| !excluding.contains(&block.name))
            .filter_map(|block| {
                let matched: Vec<String> = block.tags.intersection(&tokens).cloned().collect();
                if matched.is_empty() {
                    return None;
                }
                Some(Candidate {
                    name: block.name.clone(),
                    score: matched.len() as f64 / block.tags.len() as f64,
                    priority: block.priority,
                    matched,
                })
            })
            .collect();

        candidates.sort_by(rank);

        AnalysisResult {
            candidates,
            emotional_content_detected: contains_any(&tokens, EMOTIONAL_TRIGGERS),
            tool_usage_likely: contains_any(&tokens, TOOL_TRIGGERS),
        }
    }
}

fn rank(a: &Candidate, b: &Candidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.priority.cmp(&b.priority))
        .then_with(|| a.name.cmp(&b.name))
}

fn contains_any(tokens: &BTreeSet<String>, vocabulary: &[&str]) -> bool {
    vocabulary.iter().any(|word| tokens.contains(*word))
}

/// Split `text` into its set of lowercase word tokens.
///
/// A word is a maximal run of alphanumeric characters or `_`.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|word| !word.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use osgate_core::block::ContentBlock;

    fn block(name: &str, priority: u32, cost: u64, tags: &[&str]) -> ContentBlock {
        ContentBlock::new(name, "", Priority(priority), tags.iter().copied()).with_cost(cost)
    }

    fn registry(blocks: Vec<ContentBlock>) -> ContentRegistry {
        ContentRegistry::from_blocks(blocks).unwrap()
    }

    #[test]
    fn tokenize_splits_on_non_word_characters() {
        let tokens = tokenize("Please EXECUTE this_command, now!! (x2)");
        let expected: BTreeSet<String> = ["please", "execute", "this_command", "now", "x2"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(tokens, expected);
        assert!(tokenize("  ...  ").is_empty());
    }

    #[test]
    fn tools_scenario_scores_full_match() {
        let registry = registry(vec![
            block("identity", 1, 50, &[]),
            block("tools", 4, 30, &["execute", "command"]),
        ]);
        let result = KeywordAnalyzer.analyze("please execute this command", &registry, &HashSet::new());

        assert_eq!(result.candidates.len(), 1);
        let tools = &result.candidates[0];
        assert_eq!(tools.name, "tools");
        assert_eq!(tools.score, 1.0);
        assert_eq!(tools.matched, vec!["command", "execute"]);
        assert!(result.tool_usage_likely);
        assert!(!result.emotional_content_detected);
    }

    #[test]
    fn ordering_is_score_then_priority_then_name() {
        let registry = registry(vec![
            block("half", 2, 1, &["alpha", "beta"]),
            block("zeta", 3, 1, &["alpha"]),
            block("apex", 3, 1, &["alpha"]),
            block("early", 2, 1, &["alpha"]),
            block("third", 1, 1, &["alpha", "x", "y"]),
        ]);
        let result = KeywordAnalyzer.analyze("alpha", &registry, &HashSet::new());
        let names: Vec<_> = result.names().collect();
        assert_eq!(names, vec!["early", "apex", "zeta", "half", "third"]);
        assert_eq!(result.candidates[3].score, 0.5);
    }

    #[test]
    fn excluded_blocks_are_skipped() {
        let registry = registry(vec![
            block("soul", 3, 1, &["values"]),
            block("skill", 6, 1, &["values", "learn"]),
        ]);
        let excluding: HashSet<String> = ["soul".to_string()].into();
        let result = KeywordAnalyzer.analyze("values", &registry, &excluding);
        let names: Vec<_> = result.names().collect();
        assert_eq!(names, vec!["skill"]);
    }

    #[test]
    fn empty_tags_never_match() {
        let registry = registry(vec![block("identity", 1, 1, &[])]);
        let result = KeywordAnalyzer.analyze("identity who what", &registry, &HashSet::new());
        assert!(result.is_empty());
    }

    #[test]
    fn tags_match_case_insensitively() {
        let registry = registry(vec![block("heartbeat", 5, 1, &["Emotion", "MOOD"])]);
        let result = KeywordAnalyzer.analyze("my mood today", &registry, &HashSet::new());
        assert_eq!(result.candidates[0].score, 0.5);
    }

    #[test]
    fn signals_are_independent() {
        let registry = registry(vec![]);
        let emotional = KeywordAnalyzer.analyze("I feel so frustrated", &registry, &HashSet::new());
        assert!(emotional.emotional_content_detected);
        assert!(!emotional.tool_usage_likely);

        let both = KeywordAnalyzer.analyze("I'm worried; can you search for it?", &registry, &HashSet::new());
        assert!(both.emotional_content_detected);
        assert!(both.tool_usage_likely);

        let neither = KeywordAnalyzer.analyze("searching feelings", &registry, &HashSet::new());
        assert!(!neither.emotional_content_detected);
        assert!(!neither.tool_usage_likely);
    }

    #[test]
    fn vocabularies_are_disjoint() {
        for word in EMOTIONAL_TRIGGERS {
            assert!(!TOOL_TRIGGERS.contains(word), "{word} is in both vocabularies");
        }
    }

    #[test]
    fn analysis_is_repeatable() {
        let registry = registry(vec![
            block("a", 2, 1, &["x", "y"]),
            block("b", 2, 1, &["y", "z"]),
            block("c", 4, 1, &["x"]),
        ]);
        let first = KeywordAnalyzer.analyze("x y z", &registry, &HashSet::new());
        for _ in 0..10 {
            assert_eq!(KeywordAnalyzer.analyze("x y z", &registry, &HashSet::new()), first);
        }
    }
}
