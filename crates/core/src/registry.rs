//! Content registry: the immutable catalog of loadable blocks.
//!
//! Built once at startup and read-only afterwards. Sessions share it
//! behind an `Arc`; nothing here takes `&mut self` after construction,
//! which is what lets concurrent analyzers and caches read it unlocked.

use crate::block::{ContentBlock, Priority};
use crate::error::RegistryError;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// Declaration of one logical source the registry is built from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceSpec {
    /// Logical block name (e.g. "identity")
    pub name: String,

    /// File name relative to the context directory (e.g. "IDENTITY.md")
    pub file: String,

    /// Priority class
    pub priority: Priority,

    /// Relevance keywords
    #[serde(default)]
    pub tags: Vec<String>,

    /// Whether absence is a hard construction failure
    #[serde(default = "default_required")]
    pub required: bool,
}

fn default_required() -> bool {
    true
}

impl SourceSpec {
    pub fn new(name: impl Into<String>, file: impl Into<String>, priority: u32, tags: &[&str]) -> Self {
        Self {
            name: name.into(),
            file: file.into(),
            priority: Priority(priority),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            required: true,
        }
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

/// Raw text produced by a [`SourceLoader`].
#[derive(Debug, Clone)]
pub struct LoadedSource {
    pub body: String,
    pub origin: String,
}

/// Supplies raw text for a source spec.
///
/// `Ok(None)` means "not present"; the registry decides whether that is fatal.
pub trait SourceLoader {
    fn load(&self, spec: &SourceSpec) -> Result<Option<LoadedSource>, RegistryError>;

    /// Where the loader looked for `spec`, for error reporting.
    fn locate(&self, spec: &SourceSpec) -> PathBuf {
        PathBuf::from(&spec.file)
    }
}

/// In-memory loader keyed by source name.
#[derive(Debug, Clone, Default)]
pub struct MemorySource {
    bodies: HashMap<String, String>,
}

impl MemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, name: impl Into<String>, body: impl Into<String>) -> Self {
        self.bodies.insert(name.into(), body.into());
        self
    }
}

impl SourceLoader for MemorySource {
    fn load(&self, spec: &SourceSpec) -> Result<Option<LoadedSource>, RegistryError> {
        Ok(self.bodies.get(&spec.name).map(|body| LoadedSource {
            body: body.clone(),
            origin: "<memory>".into(),
        }))
    }
}

/// The immutable block catalog.
#[derive(Debug, Clone)]
pub struct ContentRegistry {
    /// Sorted by (priority ascending, name ascending)
    blocks: Vec<ContentBlock>,
    index: HashMap<String, usize>,
}

impl ContentRegistry {
    /// Build the registry from source specs.
    ///
    /// Every required spec must be supplied by `loader`; there is no
    /// partial registry. Optional specs that are absent are skipped.
    pub fn build(specs: &[SourceSpec], loader: &dyn SourceLoader) -> Result<Self, RegistryError> {
        let mut blocks = Vec::with_capacity(specs.len());

        for spec in specs {
            match loader.load(spec)? {
                Some(loaded) => {
                    blocks.push(
                        ContentBlock::new(&spec.name, loaded.body, spec.priority, spec.tags.iter().cloned())
                            .with_origin(loaded.origin),
                    );
                }
                None if spec.required => {
                    return Err(RegistryError::MissingSource {
                        name: spec.name.clone(),
                        path: loader.locate(spec),
                    });
                }
                None => {
                    debug!(source = %spec.name, "Optional source not present, skipping");
                }
            }
        }

        Self::from_blocks(blocks)
    }

    /// Build the registry from already-constructed blocks.
    pub fn from_blocks(blocks: impl IntoIterator<Item = ContentBlock>) -> Result<Self, RegistryError> {
        let mut blocks: Vec<ContentBlock> = blocks.into_iter().collect();
        blocks.sort_by(|a, b| a.priority.cmp(&b.priority).then_with(|| a.name.cmp(&b.name)));

        let mut index = HashMap::with_capacity(blocks.len());
        for (i, block) in blocks.iter().enumerate() {
            if index.insert(block.name.clone(), i).is_some() {
                return Err(RegistryError::DuplicateBlock(block.name.clone()));
            }
        }

        debug!(
            blocks = blocks.len(),
            total_cost = blocks.iter().map(|b| b.cost).sum::<u64>(),
            "Content registry built"
        );

        Ok(Self { blocks, index })
    }

    pub fn get(&self, name: &str) -> Option<&ContentBlock> {
        self.index.get(name).map(|&i| &self.blocks[i])
    }

    /// All blocks, ordered by priority class then name.
    pub fn all(&self) -> &[ContentBlock] {
        &self.blocks
    }

    /// Position of `name` in [`all`](Self::all).
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.blocks.iter().map(|b| b.name.as_str())
    }

    /// Blocks in the reserved core class.
    pub fn core(&self) -> impl Iterator<Item = &ContentBlock> {
        self.blocks.iter().filter(|b| b.is_core())
    }

    pub fn total_cost(&self) -> u64 {
        self.blocks.iter().map(|b| b.cost).sum()
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }
}
