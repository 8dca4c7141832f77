//! Content blocks: the named, priced units of disclosable text.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Priority class of a content block.
///
/// Lower is more essential: rendered first, evicted last. Class `1` is the
/// reserved core class; blocks in it are loaded at construction and are
/// never evicted or unloaded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Priority(pub u32);

impl Priority {
    /// The reserved, never-evictable class.
    pub const CORE: Priority = Priority(1);

    /// Assigned to blocks that declare no priority of their own.
    pub const UNRANKED: Priority = Priority(999);

    pub fn is_core(self) -> bool {
        self == Self::CORE
    }
}

impl std::fmt::Display for Priority {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// An immutable content block owned by the registry.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContentBlock {
    /// Unique identifier
    pub name: String,

    /// The disclosed text payload
    pub body: String,

    /// Priority class
    pub priority: Priority,

    /// Estimated size in tokens
    pub cost: u64,

    /// Lowercase keywords matched against request tokens
    pub tags: BTreeSet<String>,

    /// Where the body came from (file path or `<memory>`), for diagnostics
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub origin: Option<String>,
}

impl ContentBlock {
    /// Build a block whose cost is estimated from the body.
    pub fn new(
        name: impl Into<String>,
        body: impl Into<String>,
        priority: Priority,
        tags: impl IntoIterator<Item = impl Into<String>>,
    ) -> Self {
        let body = body.into();
        let cost = estimate_tokens(&body);
        Self {
            name: name.into(),
            body,
            priority,
            cost,
            tags: normalize_tags(tags),
            origin: None,
        }
    }

    /// Override the estimated cost.
    pub fn with_cost(mut self, cost: u64) -> Self {
        self.cost = cost;
        self
    }

    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = Some(origin.into());
        self
    }

    pub fn is_core(&self) -> bool {
        self.priority.is_core()
    }
}

/// Estimate the token count for a string.
///
/// Heuristic: 1 token ≈ 4 characters, rounded down.
pub fn estimate_tokens(text: &str) -> u64 {
    (text.chars().count() / 4) as u64
}

fn normalize_tags(tags: impl IntoIterator<Item = impl Into<String>>) -> BTreeSet<String> {
    tags.into_iter()
        .map(|t| t.into().trim().to_lowercase())
        .filter(|t| !t.is_empty())
        .collect()
}
