//! Turn planner: analyze a request and commit the resulting loads.
//!
//! One [`DisclosureSession`] per conversation. Each call to
//! [`prepare_turn`](DisclosureSession::prepare_turn) finishes all of its
//! cache mutation before returning, so the next prompt renders a settled
//! active set.

use crate::disclosure::analyzer::{AnalysisResult, KeywordAnalyzer, RelevanceAnalyzer};
use crate::disclosure::cache::{CacheStatus, DisclosureCache, LoadOutcome};
use osgate_core::registry::ContentRegistry;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

/// Blocks the planner pulls in on coarse request signals.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SupplementBlocks {
    /// Loaded when emotional content is detected
    pub emotional: String,
    /// Loaded when tool usage looks likely
    pub tools: String,
}

impl Default for SupplementBlocks {
    fn default() -> Self {
        Self {
            emotional: "heartbeat".into(),
            tools: "tools".into(),
        }
    }
}

/// A load the cache refused during a turn.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RejectedLoad {
    pub name: String,
    pub reason: String,
}

/// What one turn of planning did.
#[derive(Debug, Clone, Serialize)]
pub struct TurnReport {
    pub turn: u64,
    pub analysis: AnalysisResult,
    /// Blocks activated this turn, in load order
    pub loaded: Vec<String>,
    /// Blocks evicted this turn to make room
    pub evicted: Vec<String>,
    pub rejected: Vec<RejectedLoad>,
    pub status: CacheStatus,
}

/// A conversation's disclosure state: its cache plus the analyzer feeding it.
pub struct DisclosureSession {
    cache: DisclosureCache,
    analyzer: Box<dyn RelevanceAnalyzer>,
    max_loads_per_turn: usize,
    supplements: SupplementBlocks,
    turn: u64,
}

impl std::fmt::Debug for DisclosureSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DisclosureSession")
            .field("cache", &self.cache)
            .field("max_loads_per_turn", &self.max_loads_per_turn)
            .field("supplements", &self.supplements)
            .field("turn", &self.turn)
            .finish()
    }
}

impl DisclosureSession {
    pub fn new(registry: Arc<ContentRegistry>, budget: u64) -> Self {
        Self {
            cache: DisclosureCache::new(registry, budget),
            analyzer: Box::new(KeywordAnalyzer),
            max_loads_per_turn: 2,
            supplements: SupplementBlocks::default(),
            turn: 0,
        }
    }

    /// How many top candidates are loaded per turn.
    pub fn with_max_loads_per_turn(mut self, max: usize) -> Self {
        self.max_loads_per_turn = max;
        self
    }

    pub fn with_supplement_blocks(mut self, supplements: SupplementBlocks) -> Self {
        self.supplements = supplements;
        self
    }

    pub fn with_analyzer(mut self, analyzer: Box<dyn RelevanceAnalyzer>) -> Self {
        self.analyzer = analyzer;
        self
    }

    pub fn cache(&self) -> &DisclosureCache {
        &self.cache
    }

    pub fn cache_mut(&mut self) -> &mut DisclosureCache {
        &mut self.cache
    }

    pub fn turn(&self) -> u64 {
        self.turn
    }

    /// Reset the cache and the turn counter.
    pub fn reset(&mut self) {
        self.cache.reset();
        self.turn = 0;
    }

    /// Analyze `request` against inactive blocks and load what it calls for.
    pub fn prepare_turn(&mut self, request: &str) -> TurnReport {
        self.turn += 1;

        let excluding: HashSet<String> = self.cache.status().active.into_iter().collect();
        let analysis = self
            .analyzer
            .analyze(request, self.cache.registry(), &excluding);

        let mut report = TurnReport {
            turn: self.turn,
            analysis: AnalysisResult::default(),
            loaded: Vec::new(),
            evicted: Vec::new(),
            rejected: Vec::new(),
            status: self.cache.status(),
        };

        let picks: Vec<String> = analysis
            .names()
            .take(self.max_loads_per_turn)
            .map(String::from)
            .collect();
        for name in &picks {
            self.try_load(name, &mut report);
        }

        if analysis.emotional_content_detected {
            let name = self.supplements.emotional.clone();
            self.try_supplement(&name, &mut report);
        }
        if analysis.tool_usage_likely {
            let name = self.supplements.tools.clone();
            self.try_supplement(&name, &mut report);
        }

        debug!(
            turn = self.turn,
            candidates = analysis.candidates.len(),
            loaded = ?report.loaded,
            rejected = report.rejected.len(),
            "Turn prepared"
        );

        report.analysis = analysis;
        report.status = self.cache.status();
        report
    }

    /// Supplementary loads only apply to blocks that exist, are inactive
    /// and were not already refused this turn.
    fn try_supplement(&mut self, name: &str, report: &mut TurnReport) {
        if self.cache.registry().contains(name)
            && !self.cache.is_active(name)
            && !report.rejected.iter().any(|r| r.name == name)
        {
            self.try_load(name, report);
        }
    }

    fn try_load(&mut self, name: &str, report: &mut TurnReport) {
        let before: Vec<String> = self.cache.status().active;
        let result = self.cache.load(name, false);

        // Evictions stand whether or not the load succeeded.
        let evicted: Vec<String> = before
            .into_iter()
            .filter(|n| !self.cache.is_active(n))
            .collect();
        report.loaded.retain(|n| !evicted.contains(n));
        report.evicted.extend(evicted);

        match result {
            Ok(LoadOutcome::Loaded { .. }) => report.loaded.push(name.to_string()),
            Ok(LoadOutcome::AlreadyActive) => {}
            Err(e) => report.rejected.push(RejectedLoad {
                name: name.to_string(),
                reason: e.to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use osgate_core::block::{ContentBlock, Priority};

    fn block(name: &str, priority: u32, cost: u64, tags: &[&str]) -> ContentBlock {
        ContentBlock::new(name, format!("{name} body"), Priority(priority), tags.iter().copied()).with_cost(cost)
    }

    /// The standard six-block layout.
    fn registry() -> Arc<ContentRegistry> {
        Arc::new(
            ContentRegistry::from_blocks(vec![
                block("identity", 1, 100, &["name", "identity", "core", "who", "what"]),
                block("agent", 2, 200, &["behavior", "response", "interaction", "guidelines"]),
                block("soul", 3, 150, &["values", "ethics", "beliefs", "principles", "philosophy"]),
                block("tools", 4, 300, &["tool", "function", "capability", "can", "execute"]),
                block("heartbeat", 5, 120, &["emotion", "feel", "empathy", "mood", "emotional"]),
                block("skill", 6, 180, &["learn", "skill", "ability", "training"]),
            ])
            .unwrap(),
        )
    }

    #[test]
    fn loads_top_candidates() {
        let mut session = DisclosureSession::new(registry(), 8000);
        let report = session.prepare_turn("what are your values and ethics?");

        assert_eq!(report.turn, 1);
        assert_eq!(report.loaded, vec!["soul"]);
        assert!(report.rejected.is_empty());
        assert_eq!(report.status.active, vec!["identity", "soul"]);
        assert_eq!(report.status.used, 250);
    }

    #[test]
    fn only_top_n_candidates_are_loaded() {
        let mut session = DisclosureSession::new(registry(), 8000).with_max_loads_per_turn(1);
        let report = session.prepare_turn("values ethics skill learn behavior");
        // soul 2/5, skill 2/4, agent 1/4: skill ranks first.
        let names: Vec<_> = report.analysis.names().collect();
        assert_eq!(names, vec!["skill", "soul", "agent"]);
        assert_eq!(report.loaded, vec!["skill"]);
    }

    #[test]
    fn emotional_signal_pulls_in_heartbeat() {
        let mut session = DisclosureSession::new(registry(), 8000);
        let report = session.prepare_turn("I am so worried today");
        assert!(report.analysis.emotional_content_detected);
        assert_eq!(report.loaded, vec!["heartbeat"]);
    }

    #[test]
    fn tool_signal_pulls_in_tools_once() {
        let mut session = DisclosureSession::new(registry(), 8000);
        let report = session.prepare_turn("can you execute a search");
        // tools is already a candidate and loaded; the signal adds nothing.
        assert_eq!(report.loaded, vec!["tools"]);

        let report = session.prepare_turn("search again");
        assert!(report.loaded.is_empty());
        assert_eq!(session.turn(), 2);
    }

    #[test]
    fn active_blocks_are_excluded_from_analysis() {
        let mut session = DisclosureSession::new(registry(), 8000);
        session.prepare_turn("values");
        let report = session.prepare_turn("values");
        assert!(report.analysis.is_empty());
    }

    #[test]
    fn rejections_are_reported_not_raised() {
        let mut session = DisclosureSession::new(registry(), 250);
        let report = session.prepare_turn("execute the tool");
        assert!(report.loaded.is_empty());
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].name, "tools");
        assert!(report.rejected[0].reason.contains("tools"));
    }

    #[test]
    fn eviction_within_a_turn_is_visible() {
        let mut session = DisclosureSession::new(registry(), 450);
        session.prepare_turn("learn a skill");
        assert!(session.cache().is_active("skill"));

        // agent (prio 2) needs 200; skill (prio 6) is evicted to fit it.
        let report = session.prepare_turn("behavior guidelines");
        assert_eq!(report.loaded, vec!["agent"]);
        assert_eq!(report.evicted, vec!["skill"]);
        assert_eq!(report.status.active, vec!["identity", "agent"]);
    }

    #[test]
    fn custom_supplements_and_missing_blocks() {
        let supplements = SupplementBlocks {
            emotional: "soul".into(),
            tools: "nonexistent".into(),
        };
        let mut session = DisclosureSession::new(registry(), 8000).with_supplement_blocks(supplements);
        let report = session.prepare_turn("feeling confused, please compute");
        assert_eq!(report.loaded, vec!["soul"]);
        assert!(report.rejected.is_empty());
    }

    #[test]
    fn reset_clears_turns_and_loads() {
        let mut session = DisclosureSession::new(registry(), 8000);
        session.prepare_turn("values");
        session.reset();
        assert_eq!(session.turn(), 0);
        assert_eq!(session.cache().status().active, vec!["identity"]);
    }
}
