//! # osgate core
//!
//! Domain types, traits, and error definitions for the osgate
//! progressive-disclosure agent gateway. This crate has no I/O beyond
//! reading context files; it defines the model the other crates build on.
//!
//! - [`ContentBlock`] / [`ContentRegistry`]: the immutable catalog of
//!   disclosable text, built once from a [`SourceLoader`]
//! - [`Provider`]: the seam to the inference server
//! - [`Error`]: the error taxonomy shared by every crate

pub mod block;
pub mod error;
pub mod message;
pub mod provider;
pub mod registry;
pub mod source;

// Re-export key types at crate root for ergonomics
pub use block::{estimate_tokens, ContentBlock, Priority};
pub use error::{CacheError, CommandError, Error, ProviderError, RegistryError, Result};
pub use message::{Conversation, ConversationId, Message, Role};
pub use provider::{Provider, ProviderRequest, ProviderResponse, Usage};
pub use registry::{ContentRegistry, LoadedSource, MemorySource, SourceLoader, SourceSpec};
pub use source::{discover_extensions, load_directory, split_frontmatter, DirectorySource, Frontmatter};
