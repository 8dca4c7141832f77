//! Markdown source loading from a context directory.
//!
//! Two entry points:
//!
//! 1. [`DirectorySource`]: a [`SourceLoader`] that resolves each configured
//!    [`SourceSpec`] to a file in the directory (exact name first, then a
//!    case-insensitive match, so `identity.md` satisfies `IDENTITY.md`).
//! 2. [`discover_extensions`]: scans the same directory for any other
//!    `*.md` file carrying a `---` frontmatter block and turns it into a
//!    block of its own (`name`, `priority`, `triggers`/`tags`).
//!
//! [`load_directory`] combines both into a finished registry.
//!
//! Frontmatter is a tiny YAML subset: `key: value` pairs plus inline
//! (`[a, b]`) or dashed lists. It is stripped from the body.

use crate::block::{ContentBlock, Priority};
use crate::error::RegistryError;
use crate::registry::{ContentRegistry, LoadedSource, SourceLoader, SourceSpec};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Loads sources from files in a single directory.
#[derive(Debug, Clone)]
pub struct DirectorySource {
    dir: PathBuf,
}

impl DirectorySource {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn resolve(&self, file: &str) -> Option<PathBuf> {
        let exact = self.dir.join(file);
        if exact.is_file() {
            return Some(exact);
        }

        let entries = std::fs::read_dir(&self.dir).ok()?;
        entries
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file())
            .find(|p| {
                p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.eq_ignore_ascii_case(file))
            })
    }
}

impl SourceLoader for DirectorySource {
    fn load(&self, spec: &SourceSpec) -> Result<Option<LoadedSource>, RegistryError> {
        let Some(path) = self.resolve(&spec.file) else {
            return Ok(None);
        };

        let content = std::fs::read_to_string(&path).map_err(|e| RegistryError::Read {
            path: path.clone(),
            reason: e.to_string(),
        })?;

        debug!(source = %spec.name, file = %path.display(), "Loaded context source");
        Ok(Some(LoadedSource {
            body: content,
            origin: path.display().to_string(),
        }))
    }

    fn locate(&self, spec: &SourceSpec) -> PathBuf {
        self.dir.join(&spec.file)
    }
}

/// Parsed frontmatter fields that matter for a content block.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Frontmatter {
    pub name: Option<String>,
    pub priority: Option<u32>,
    pub tags: Vec<String>,
}

/// Split `---` frontmatter from a markdown document.
///
/// Returns `(frontmatter, body)`; `None` if the document has no
/// well-formed frontmatter block.
pub fn split_frontmatter(content: &str) -> (Option<Frontmatter>, String) {
    let trimmed = content.trim_start();
    let Some(after_open) = trimmed.strip_prefix("---") else {
        return (None, content.to_string());
    };
    let after_open = after_open.strip_prefix('\n').unwrap_or(after_open);

    let Some(end) = after_open.find("\n---") else {
        return (None, content.to_string());
    };

    let yaml = &after_open[..end];
    let rest = &after_open[end + 4..];
    let body = rest.strip_prefix('\n').unwrap_or(rest);
    (Some(parse_frontmatter(yaml)), body.to_string())
}

fn parse_frontmatter(yaml: &str) -> Frontmatter {
    let mut fm = Frontmatter::default();
    let lines: Vec<&str> = yaml.lines().collect();
    let mut i = 0;

    while i < lines.len() {
        let line = lines[i].trim();
        i += 1;

        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let value = value.trim();

        match key.trim() {
            "name" => fm.name = Some(unquote(value)),
            "priority" => fm.priority = unquote(value).parse().ok(),
            "triggers" | "tags" | "keywords" => {
                fm.tags.extend(parse_list(value, &lines, &mut i));
            }
            _ => {}
        }
    }

    fm
}

fn parse_list(value: &str, lines: &[&str], i: &mut usize) -> Vec<String> {
    if let Some(inner) = value.strip_prefix('[') {
        let inner = inner.strip_suffix(']').unwrap_or(inner);
        return inner
            .split(',')
            .map(|s| unquote(s.trim()))
            .filter(|s| !s.is_empty())
            .collect();
    }
    if !value.is_empty() {
        return vec![unquote(value)];
    }

    let mut items = Vec::new();
    while *i < lines.len() {
        let Some(item) = lines[*i].trim().strip_prefix('-') else {
            break;
        };
        let item = unquote(item.trim());
        if !item.is_empty() {
            items.push(item);
        }
        *i += 1;
    }
    items
}

fn unquote(s: &str) -> String {
    let s = s.trim();
    if s.len() >= 2
        && ((s.starts_with('"') && s.ends_with('"')) || (s.starts_with('\'') && s.ends_with('\'')))
    {
        s[1..s.len() - 1].to_string()
    } else {
        s.to_string()
    }
}

/// Discover extra blocks in `dir`: every `*.md` file with frontmatter
/// whose file name is not in `claimed_files` and whose block name is not
/// in `claimed_names`.
///
/// Files without triggers fall back to their lowercase stem as the only
/// tag; files without a priority get [`Priority::UNRANKED`]. Discovered
/// blocks can never claim the core class.
pub fn discover_extensions(
    dir: &Path,
    claimed_files: &HashSet<String>,
    claimed_names: &HashSet<String>,
) -> Result<Vec<ContentBlock>, RegistryError> {
    let read_dir = match std::fs::read_dir(dir) {
        Ok(rd) => rd,
        Err(e) => {
            warn!(dir = %dir.display(), error = %e, "Failed to read context directory");
            return Ok(Vec::new());
        }
    };

    let mut paths: Vec<PathBuf> = read_dir
        .filter_map(|e| e.ok())
        .map(|e| e.path())
        .filter(|p| p.extension().and_then(|ext| ext.to_str()) == Some("md"))
        .collect();
    paths.sort();

    let claimed_files: HashSet<String> = claimed_files.iter().map(|f| f.to_lowercase()).collect();
    let mut seen: HashSet<String> = claimed_names.clone();
    let mut blocks = Vec::new();

    for path in paths {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            continue;
        };
        if claimed_files.contains(&file_name.to_lowercase()) {
            continue;
        }

        let content = std::fs::read_to_string(&path).map_err(|e| RegistryError::Read {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        let (Some(fm), body) = split_frontmatter(&content) else {
            debug!(file = %path.display(), "No frontmatter, not an extension");
            continue;
        };

        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("context")
            .to_lowercase();
        let name = fm.name.clone().unwrap_or_else(|| stem.clone());
        if !seen.insert(name.clone()) {
            warn!(block = %name, file = %path.display(), "Extension name already taken, skipping");
            continue;
        }

        // Only configured sources may rank at or above the core class.
        let priority = match fm.priority.map(Priority) {
            Some(p) if p.0 <= Priority::CORE.0 => {
                warn!(block = %name, priority = p.0, "Extensions cannot rank at or above core, demoting");
                Priority::UNRANKED
            }
            Some(p) => p,
            None => Priority::UNRANKED,
        };
        let tags = if fm.tags.is_empty() { vec![stem] } else { fm.tags };

        debug!(block = %name, priority = %priority, "Discovered extension block");
        blocks.push(
            ContentBlock::new(name, body.trim(), priority, tags).with_origin(path.display().to_string()),
        );
    }

    Ok(blocks)
}

/// Build a registry from `dir`: the configured `specs` first, then, when
/// `extensions` is set, any frontmatter files the specs do not claim.
pub fn load_directory(
    dir: &Path,
    specs: &[SourceSpec],
    extensions: bool,
) -> Result<ContentRegistry, RegistryError> {
    let loader = DirectorySource::new(dir);
    let registry = ContentRegistry::build(specs, &loader)?;
    if !extensions {
        return Ok(registry);
    }

    let claimed_files: HashSet<String> = specs.iter().map(|s| s.file.clone()).collect();
    let claimed_names: HashSet<String> = specs.iter().map(|s| s.name.clone()).collect();
    let extras = discover_extensions(dir, &claimed_files, &claimed_names)?;
    if extras.is_empty() {
        return Ok(registry);
    }

    debug!(count = extras.len(), "Adding extension blocks to registry");
    let mut blocks = registry.all().to_vec();
    blocks.extend(extras);
    ContentRegistry::from_blocks(blocks)
}
