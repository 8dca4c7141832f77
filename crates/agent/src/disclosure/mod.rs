//! Progressive disclosure: deciding which content blocks the model sees.
//!
//! - [`analyzer`]: ranks registry blocks against a request
//! - [`cache`]: admits and evicts blocks under a fixed budget
//! - [`planner`]: turns an analysis into committed loads, once per turn

pub mod analyzer;
pub mod cache;
pub mod planner;

pub use analyzer::{tokenize, AnalysisResult, Candidate, KeywordAnalyzer, RelevanceAnalyzer};
pub use cache::{CacheEntry, CacheStatus, DisclosureCache, LoadOutcome};
pub use planner::{DisclosureSession, RejectedLoad, SupplementBlocks, TurnReport};
