//! `osgate contexts`: what the context directory holds and what it costs.

use crate::commands::{load_config, load_registry, Overrides};
use crate::render;
use osgate_agent::DisclosureCache;

pub async fn run(json: bool, overrides: &Overrides) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(overrides)?;
    let registry = load_registry(&config)?;

    if json {
        // Entries as a fresh session sees them: core active, the rest not
        let cache = DisclosureCache::new(registry, config.context.budget);
        println!("{}", serde_json::to_string_pretty(&cache.entries())?);
        return Ok(());
    }

    println!("  Directory: {}", config.context.dir.display());
    println!("  Budget:    {} tokens", config.context.budget);
    println!();
    render::print(&render::registry_listing(&registry));
    println!();
    render::print(&render::scenarios(&registry, config.context.budget));

    let over: Vec<&str> = registry
        .all()
        .iter()
        .filter(|b| b.cost > config.context.budget)
        .map(|b| b.name.as_str())
        .collect();
    if !over.is_empty() {
        println!();
        println!("  ⚠️  Larger than the whole budget, only loadable with --force: {}", over.join(", "));
    }
    Ok(())
}
