//! `osgate check`: ask the safety gate about a command without running it.

use crate::commands::{load_config, Overrides};
use crate::render;
use osgate_security::SafetyGate;

pub async fn run(command: &str, overrides: &Overrides) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(overrides)?;
    let gate = SafetyGate::new().with_extra_patterns(&config.commands.extra_deny_patterns);

    let verdict = gate.check(command);
    render::print(&render::verdict(command, &verdict));
    if !verdict.is_allowed() {
        std::process::exit(1);
    }
    Ok(())
}
