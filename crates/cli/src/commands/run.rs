//! `osgate run`: work on one goal until the model says `FINISH:`.

use crate::commands::{audit_logger, load_config, load_registry, Overrides};
use crate::render;
use osgate_agent::{AgentSession, SessionOutcome};
use osgate_security::AuditOutcome;

pub async fn run(goal: &str, overrides: &Overrides) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(overrides)?;
    let registry = load_registry(&config)?;
    let provider = osgate_providers::build_from_config(&config);
    let audit = audit_logger();

    let verbose = tracing::enabled!(tracing::Level::DEBUG);
    let mut session = AgentSession::from_config(&config, registry, provider, audit.clone()).with_observer(
        move |event| {
            if let Some(line) = render::event_line(event, verbose) {
                println!("{line}");
            }
        },
    );

    println!("  Goal: {goal}");
    if !config.commands.enabled {
        println!("  (command execution is disabled in config)");
    }
    println!();

    let outcome = session.run(goal).await?;

    println!();
    match outcome {
        SessionOutcome::Finished { answer, iterations } => {
            println!("  ✅ Finished after {iterations} step(s)");
            println!();
            for line in answer.lines() {
                println!("  {line}");
            }
        }
        SessionOutcome::IterationLimit { iterations } => {
            println!("  ⚠️  Stopped after {iterations} step(s) without an answer");
            println!("     Raise [session] max_iterations in the config to let it run longer.");
        }
    }

    let status = session.disclosure().cache().status();
    let denied = audit.count_outcome(AuditOutcome::Denied);
    println!();
    println!(
        "  Context: {} ({}/{} tokens)",
        status.active.join(", "),
        status.used,
        status.budget
    );
    if denied > 0 {
        println!("  Commands refused by the safety gate: {denied}");
    }

    Ok(())
}
