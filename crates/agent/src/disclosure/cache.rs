//! Disclosure cache: budgeted admission and eviction over the registry.
//!
//! The cache owns one flag per registry block and the running cost of the
//! active set. All mutation goes through [`load`](DisclosureCache::load),
//! [`unload`](DisclosureCache::unload), [`make_room`](DisclosureCache::make_room)
//! and [`reset`](DisclosureCache::reset).
//!
//! # Priority
//!
//! Lower priority number = more essential = rendered first = evicted last.
//! Blocks in [`Priority::CORE`] are loaded at construction, unconditionally,
//! and nothing in this module ever deactivates them.
//!
//! # Invariants
//!
//! - `used` equals the sum of the active blocks' cost after every call
//! - every core block is active in every reachable state
//! - `used <= budget` after every call made without `force`, provided the
//!   core set itself fits

use osgate_core::block::{ContentBlock, Priority};
use osgate_core::error::CacheError;
use osgate_core::registry::ContentRegistry;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of a successful [`DisclosureCache::load`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadOutcome {
    /// The block was already active; nothing changed
    AlreadyActive,
    /// The block was activated, after evicting `evicted` (possibly none)
    Loaded { evicted: Vec<String> },
}

impl LoadOutcome {
    pub fn evicted(&self) -> &[String] {
        match self {
            LoadOutcome::AlreadyActive => &[],
            LoadOutcome::Loaded { evicted } => evicted,
        }
    }
}

/// Snapshot of budget usage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheStatus {
    pub used: u64,
    pub budget: u64,
    /// `used / budget`; 0.0 when the budget is zero
    pub utilization: f64,
    /// Active block names in render order
    pub active: Vec<String>,
}

impl CacheStatus {
    pub fn remaining(&self) -> u64 {
        self.budget.saturating_sub(self.used)
    }
}

/// One registry block as the cache sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub name: String,
    pub priority: Priority,
    pub cost: u64,
    pub active: bool,
}

/// The stateful admission/eviction engine for one session.
#[derive(Debug, Clone)]
pub struct DisclosureCache {
    registry: Arc<ContentRegistry>,
    budget: u64,
    used: u64,
    /// Indexed by registry position
    active: Vec<bool>,
}

impl DisclosureCache {
    /// Create a cache over `registry` with the core blocks loaded.
    pub fn new(registry: Arc<ContentRegistry>, budget: u64) -> Self {
        let active = vec![false; registry.len()];
        let mut cache = Self {
            registry,
            budget,
            used: 0,
            active,
        };
        cache.load_core();

        if cache.used > cache.budget {
            info!(
                used = cache.used,
                budget = cache.budget,
                "Core blocks alone exceed the budget"
            );
        }
        cache
    }

    fn load_core(&mut self) {
        for (i, block) in self.registry.all().iter().enumerate() {
            if block.is_core() && !self.active[i] {
                self.active[i] = true;
                self.used += block.cost;
            }
        }
    }

    pub fn registry(&self) -> &Arc<ContentRegistry> {
        &self.registry
    }

    pub fn budget(&self) -> u64 {
        self.budget
    }

    pub fn used(&self) -> u64 {
        self.used
    }

    pub fn remaining(&self) -> u64 {
        self.budget.saturating_sub(self.used)
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.registry
            .position(name)
            .is_some_and(|i| self.active[i])
    }

    /// Activate `name`, evicting lower-priority blocks if the budget requires it.
    ///
    /// With `force` the budget is not consulted at all. Evictions performed
    /// while trying to make room are kept even when the load then fails.
    pub fn load(&mut self, name: &str, force: bool) -> Result<LoadOutcome, CacheError> {
        let idx = self
            .registry
            .position(name)
            .ok_or_else(|| CacheError::UnknownContent(name.to_string()))?;

        if self.active[idx] {
            return Ok(LoadOutcome::AlreadyActive);
        }

        let cost = self.registry.all()[idx].cost;

        if force {
            self.activate(idx);
            if self.used > self.budget {
                info!(block = %name, used = self.used, budget = self.budget, "Forced load overcommits the budget");
            }
            return Ok(LoadOutcome::Loaded { evicted: Vec::new() });
        }

        if self.admits(cost) {
            self.activate(idx);
            return Ok(LoadOutcome::Loaded { evicted: Vec::new() });
        }

        let (_, evicted) = self.evict_for(cost);
        if self.admits(cost) {
            self.activate(idx);
            return Ok(LoadOutcome::Loaded { evicted });
        }

        info!(
            block = %name,
            cost,
            used = self.used,
            budget = self.budget,
            evicted = evicted.len(),
            "Load rejected: budget exceeded"
        );
        Err(CacheError::BudgetExceeded {
            name: name.to_string(),
            cost,
            used: self.used,
            budget: self.budget,
        })
    }

    /// Force-load every block in registry order.
    pub fn load_all(&mut self) {
        for i in 0..self.active.len() {
            if !self.active[i] {
                self.activate(i);
            }
        }
    }

    /// Deactivate `name`. Returns whether anything changed.
    ///
    /// Core blocks, unknown names and inactive blocks are silently ignored.
    pub fn unload(&mut self, name: &str) -> bool {
        let Some(idx) = self.registry.position(name) else {
            return false;
        };
        if self.registry.all()[idx].is_core() || !self.active[idx] {
            return false;
        }
        self.deactivate(idx);
        true
    }

    /// Evict non-core blocks, least essential first, until `target` more
    /// cost fits. Returns whether it does.
    pub fn make_room(&mut self, target: u64) -> bool {
        self.evict_for(target).0
    }

    /// Back to the construction-time state: core loaded, nothing else.
    pub fn reset(&mut self) {
        self.active.fill(false);
        self.used = 0;
        self.load_core();
        debug!(used = self.used, "Cache reset");
    }

    /// Active blocks as `(name, body)`, priority ascending then name.
    pub fn render(&self) -> Vec<(&str, &str)> {
        self.active_blocks()
            .map(|b| (b.name.as_str(), b.body.as_str()))
            .collect()
    }

    /// Active blocks in render order.
    pub fn active_blocks(&self) -> impl Iterator<Item = &ContentBlock> {
        // Registry order is already (priority, name).
        self.registry
            .all()
            .iter()
            .zip(&self.active)
            .filter_map(|(block, &active)| active.then_some(block))
    }

    pub fn status(&self) -> CacheStatus {
        let utilization = if self.budget == 0 {
            0.0
        } else {
            self.used as f64 / self.budget as f64
        };
        CacheStatus {
            used: self.used,
            budget: self.budget,
            utilization,
            active: self.active_blocks().map(|b| b.name.clone()).collect(),
        }
    }

    /// Every registry block with its activation flag, in registry order.
    pub fn entries(&self) -> Vec<CacheEntry> {
        self.registry
            .all()
            .iter()
            .zip(&self.active)
            .map(|(block, &active)| CacheEntry {
                name: block.name.clone(),
                priority: block.priority,
                cost: block.cost,
                active,
            })
            .collect()
    }

    /// A zero budget admits nothing beyond the core set.
    fn admits(&self, cost: u64) -> bool {
        self.budget > 0 && self.fits(cost)
    }

    fn fits(&self, target: u64) -> bool {
        self.used.saturating_add(target) <= self.budget
    }

    fn evict_for(&mut self, target: u64) -> (bool, Vec<String>) {
        let blocks = self.registry.all();
        let mut victims: Vec<usize> = (0..blocks.len())
            .filter(|&i| self.active[i] && !blocks[i].is_core())
            .collect();
        victims.sort_by(|&a, &b| {
            blocks[b]
                .priority
                .cmp(&blocks[a].priority)
                .then_with(|| blocks[a].name.cmp(&blocks[b].name))
        });

        let mut evicted = Vec::new();
        for i in victims {
            if self.fits(target) {
                break;
            }
            self.deactivate(i);
            evicted.push(self.registry.all()[i].name.clone());
        }

        if !evicted.is_empty() {
            info!(needed = target, evicted = ?evicted, used = self.used, "Evicted blocks to make room");
        }
        (self.fits(target), evicted)
    }

    fn activate(&mut self, idx: usize) {
        let block = &self.registry.all()[idx];
        self.active[idx] = true;
        self.used += block.cost;
        debug!(block = %block.name, cost = block.cost, used = self.used, "Block loaded");
    }

    fn deactivate(&mut self, idx: usize) {
        let block = &self.registry.all()[idx];
        self.active[idx] = false;
        self.used -= block.cost;
        debug!(block = %block.name, cost = block.cost, used = self.used, "Block unloaded");
    }
}
