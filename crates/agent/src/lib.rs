//! The osgate agent: progressive disclosure plus the session loop.
//!
//! Each turn follows the same cycle:
//!
//! 1. **Analyze** the request against the content registry
//! 2. **Load** the most relevant blocks the budget admits
//! 3. **Render** the active blocks into the system prompt
//! 4. **Call** the model and parse its directive
//! 5. **Act**: load requested blocks, or run a command through the safety gate
//!
//! The loop continues until the model replies `FINISH:` or the iteration
//! limit is reached.

pub mod directive;
pub mod disclosure;
pub mod event;
pub mod loop_runner;

pub use directive::Directive;
pub use disclosure::{
    AnalysisResult, CacheEntry, CacheStatus, Candidate, DisclosureCache, DisclosureSession,
    KeywordAnalyzer, LoadOutcome, RejectedLoad, RelevanceAnalyzer, SupplementBlocks, TurnReport,
};
pub use event::SessionEvent;
pub use loop_runner::{AgentSession, SessionOutcome};
