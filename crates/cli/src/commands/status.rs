//! `osgate status`: configuration and budget at a glance.

use crate::commands::{hint, load_config, load_registry, Overrides};
use crate::render;
use osgate_agent::DisclosureCache;
use osgate_config::AppConfig;
use osgate_security::SafetyGate;

pub async fn run(overrides: &Overrides) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(overrides)?;

    println!("osgate status");
    println!("=============");
    println!("  Config dir:   {}", AppConfig::config_dir().display());
    println!("  Endpoint:     {}", config.api_url);
    let provider = osgate_providers::build_from_config(&config);
    println!("  Reachable:    {}", render::endpoint_health(&provider.health_check().await));
    println!("  Model:        {}", config.model);
    println!("  Temperature:  {}", config.temperature);
    println!("  Context dir:  {}", config.context.dir.display());
    println!("  Extensions:   {}", if config.context.extensions { "enabled" } else { "disabled" });
    println!("  Budget:       {} tokens", config.context.budget);
    println!(
        "  Commands:     {} (timeout {}s)",
        if config.commands.enabled { "enabled" } else { "disabled" },
        config.commands.timeout_secs
    );
    let gate = SafetyGate::new().with_extra_patterns(&config.commands.extra_deny_patterns);
    println!("  Deny rules:   {}", gate.pattern_count());
    println!("  Max steps:    {}", config.session.max_iterations);

    match load_registry(&config) {
        Ok(registry) => {
            let cache = DisclosureCache::new(registry, config.context.budget);
            println!();
            println!(
                "  Core load:    {} tokens ({:.1}% of budget)",
                cache.used(),
                render::percent(cache.used(), cache.budget())
            );
            println!();
            render::print(&render::context_table(&cache.entries()));
        }
        Err(e) => {
            println!("\n  ⚠️  {e}");
            println!("     {}", hint(&e));
        }
    }

    let config_path = AppConfig::config_dir().join("config.toml");
    if config_path.exists() {
        println!("\n  ✅ Config file found");
    } else {
        println!("\n  ⚠️  No config file, run `osgate onboard` first");
    }

    Ok(())
}
