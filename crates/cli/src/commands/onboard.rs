//! `osgate onboard`: first-time setup.
//!
//! Writes `~/.osgate/config.toml` and a starter file for every configured
//! source that does not exist yet. Existing files are never overwritten.

use crate::commands::Overrides;
use osgate_config::AppConfig;
use osgate_core::registry::SourceSpec;
use std::path::{Path, PathBuf};

/// Starter text for the default sources, keyed by block name.
fn starter(name: &str) -> &'static str {
    match name {
        "identity" => concat!(
            "# Identity\n\n",
            "You are osgate, an assistant that works on the user's computer through shell commands.\n",
            "You run one command at a time and read its output before deciding the next step.\n",
        ),
        "agent" => concat!(
            "# Behavior\n\n",
            "- Prefer read-only commands until you understand the situation\n",
            "- Explain what a command will do before running anything destructive\n",
            "- Keep answers short and concrete\n",
        ),
        "soul" => concat!(
            "# Values\n\n",
            "- Never harm the user's data or system\n",
            "- Be honest about what you do not know\n",
        ),
        "tools" => concat!(
            "# Tools\n\n",
            "Commands are run directly, not through a shell: no pipes, globs or redirection.\n",
            "Pass each argument as its own list element, e.g. [\"ls\", \"-la\", \"/tmp\"].\n",
        ),
        "heartbeat" => concat!(
            "# Tone\n\n",
            "When the user sounds stressed or frustrated, acknowledge it briefly and stay calm.\n",
        ),
        "skill" => concat!(
            "# Skills\n\n",
            "Record here any procedures the agent should learn for this machine.\n",
        ),
        _ => "# Context\n\nDescribe this context here.\n",
    }
}

/// Create a starter file for each source missing from `dir`.
///
/// Returns the paths written.
pub fn write_starters(dir: &Path, sources: &[SourceSpec]) -> std::io::Result<Vec<PathBuf>> {
    std::fs::create_dir_all(dir)?;
    let mut written = Vec::new();
    for source in sources {
        let path = dir.join(&source.file);
        if path.exists() {
            continue;
        }
        std::fs::write(&path, starter(&source.name))?;
        written.push(path);
    }
    Ok(written)
}

pub async fn run(overrides: &Overrides) -> Result<(), Box<dyn std::error::Error>> {
    let config_dir = AppConfig::config_dir();
    let config_path = config_dir.join("config.toml");

    println!("osgate: first-time setup");
    println!("========================\n");

    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir)?;
        println!("✅ Created config directory: {}", config_dir.display());
    } else {
        println!("  Config directory exists: {}", config_dir.display());
    }

    if config_path.exists() {
        println!("\n⚠️  Config already exists at: {}", config_path.display());
        println!("   Edit it manually or delete and re-run onboard.\n");
    } else {
        std::fs::write(&config_path, AppConfig::default_toml())?;
        println!("✅ Created config.toml at: {}", config_path.display());
    }

    let mut config = AppConfig::load_from(&config_path).map_err(|e| format!("Failed to load config: {e}"))?;
    if let Some(dir) = &overrides.context_dir {
        config.context.dir = dir.clone();
    }

    let written = write_starters(&config.context.dir, &config.context.sources)?;
    for path in &written {
        println!("✅ Created {}", path.display());
    }
    if written.is_empty() {
        println!("  Context files already present in {}", config.context.dir.display());
    }

    println!("\n📝 Next steps:");
    println!("   1. Start llama.cpp: llama-server -m <model.gguf> --port 8080");
    println!("   2. Edit the files in {} to shape the agent", config.context.dir.display());
    println!("   3. Run `osgate contexts` to see what each block costs");
    println!("   4. Run `osgate chat` or `osgate run \"<goal>\"`");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use osgate_config::default_sources;
    use osgate_core::source::load_directory;

    #[test]
    fn starters_build_a_valid_registry() {
        let dir = tempfile::tempdir().unwrap();
        let sources = default_sources();
        let written = write_starters(dir.path(), &sources).unwrap();
        assert_eq!(written.len(), sources.len());

        let registry = load_directory(dir.path(), &sources, false).unwrap();
        assert_eq!(registry.len(), 6);
        assert!(registry.get("identity").unwrap().is_core());
        assert!(registry.get("tools").unwrap().body.contains("not through a shell"));
    }

    #[test]
    fn existing_files_are_kept() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("IDENTITY.md"), "custom").unwrap();
        let written = write_starters(dir.path(), &default_sources()).unwrap();

        assert_eq!(written.len(), 5);
        assert_eq!(std::fs::read_to_string(dir.path().join("IDENTITY.md")).unwrap(), "custom");
    }
}
