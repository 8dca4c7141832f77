//! `osgate chat`: interactive conversation.
//!
//! Free text goes through the turn planner and then to the model with the
//! current active set rendered into the system prompt. Lines starting with
//! `/` manage the cache directly.

use crate::commands::{audit_logger, hint, load_config, load_registry, Overrides};
use crate::render;
use osgate_agent::{AgentSession, DisclosureSession, LoadOutcome};
use std::io::Write;
use tokio::io::{AsyncBufReadExt, BufReader};

const HELP: &[&str] = &[
    "Commands:",
    "  /status                 Show budget and loaded contexts",
    "  /load <name> [--force]  Load a context (--force ignores the budget)",
    "  /unload <name>          Unload a context",
    "  /reset                  Forget the conversation and unload everything but core",
    "  /contexts               List all contexts",
    "  /verbose                Toggle analysis details",
    "  /help                   Show this help",
    "  /quit                   Exit",
];

/// One line of REPL input.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Status,
    Load { name: String, force: bool },
    Unload { name: String },
    Reset,
    Contexts,
    Verbose,
    Help,
    Quit,
    /// A slash command missing its argument
    Usage(&'static str),
    Unknown(String),
    /// Anything that is not a slash command
    Message(String),
}

impl ReplCommand {
    /// `None` for blank input.
    pub fn parse(input: &str) -> Option<Self> {
        let input = input.trim();
        if input.is_empty() {
            return None;
        }
        if !input.starts_with('/') {
            return Some(Self::Message(input.to_string()));
        }

        let mut parts = input.split_whitespace();
        let cmd = parts.next().unwrap_or_default().to_lowercase();
        let args: Vec<&str> = parts.collect();

        let command = match cmd.as_str() {
            "/quit" | "/exit" => Self::Quit,
            "/status" => Self::Status,
            "/load" => {
                let force = args.contains(&"--force");
                match args.iter().find(|a| !a.starts_with("--")) {
                    Some(name) => Self::Load {
                        name: name.to_string(),
                        force,
                    },
                    None => Self::Usage("/load <name> [--force]"),
                }
            }
            "/unload" => match args.first() {
                Some(name) => Self::Unload { name: name.to_string() },
                None => Self::Usage("/unload <name>"),
            },
            "/reset" => Self::Reset,
            "/contexts" => Self::Contexts,
            "/verbose" => Self::Verbose,
            "/help" => Self::Help,
            _ => Self::Unknown(cmd),
        };
        Some(command)
    }
}

/// Apply a cache command to `disclosure` and describe the result.
///
/// Returns `None` for commands that are not about the cache.
pub fn apply(disclosure: &mut DisclosureSession, command: &ReplCommand) -> Option<Vec<String>> {
    let lines = match command {
        ReplCommand::Status => {
            let cache = disclosure.cache();
            render::status_report(disclosure.turn(), &cache.status(), &cache.entries())
        }
        ReplCommand::Contexts => render::context_table(&disclosure.cache().entries()),
        ReplCommand::Load { name, force } => match disclosure.cache_mut().load(name, *force) {
            Ok(LoadOutcome::AlreadyActive) => vec![format!("Context '{name}' is already loaded.")],
            Ok(LoadOutcome::Loaded { evicted }) => {
                let mut lines = vec![format!("Context '{name}' loaded successfully.")];
                if !evicted.is_empty() {
                    lines.push(format!("[Context evicted: {}]", evicted.join(", ")));
                }
                lines
            }
            Err(e) => vec![format!("Failed to load context '{name}'."), format!("  {e}")],
        },
        ReplCommand::Unload { name } => {
            let cache = disclosure.cache_mut();
            match cache.registry().get(name).map(|block| block.is_core()) {
                None => vec![format!("Unknown context '{name}'.")],
                Some(true) => vec![format!("Cannot unload core context '{name}'.")],
                Some(false) if cache.unload(name) => vec![format!("Context '{name}' unloaded.")],
                Some(false) => vec![format!("Context '{name}' is not loaded.")],
            }
        }
        _ => return None,
    };
    Some(lines)
}

pub async fn run(overrides: &Overrides) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(overrides)?;
    let registry = load_registry(&config)?;
    let provider = osgate_providers::build_from_config(&config);
    let mut session = AgentSession::from_config(&config, registry, provider, audit_logger());

    let status = session.disclosure().cache().status();
    println!();
    println!("  ╔══════════════════════════════════════════════╗");
    println!("  ║          osgate: interactive mode            ║");
    println!("  ╚══════════════════════════════════════════════╝");
    println!();
    println!("  Endpoint:  {}", config.api_url);
    println!("  Model:     {}", config.model);
    println!("  Context:   {} ({} blocks)", config.context.dir.display(), session.disclosure().cache().registry().len());
    println!("  Budget:    {}/{} tokens in use", status.used, status.budget);
    println!();
    render::print(&HELP.iter().map(|l| format!("  {l}")).collect::<Vec<_>>());
    println!();

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut verbose = false;

    loop {
        print!("  You > ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            println!();
            break;
        };
        let Some(command) = ReplCommand::parse(&line) else {
            continue;
        };

        match command {
            ReplCommand::Quit => break,
            ReplCommand::Help => render::print(&HELP.iter().map(|l| l.to_string()).collect::<Vec<_>>()),
            ReplCommand::Verbose => {
                verbose = !verbose;
                println!("  Verbose mode {}", if verbose { "enabled" } else { "disabled" });
            }
            ReplCommand::Reset => {
                session.reset();
                println!("  Conversation and contexts reset (core kept).");
            }
            ReplCommand::Usage(usage) => println!("  Usage: {usage}"),
            ReplCommand::Unknown(cmd) => {
                println!("  Unknown command: {cmd}");
                println!("  Type /help for available commands.");
            }
            ReplCommand::Message(text) => match session.respond(&text).await {
                Ok((report, reply)) => {
                    render::print(&render::turn_summary(&report, verbose));
                    println!();
                    for line in reply.lines() {
                        println!("  Assistant > {line}");
                    }
                    println!();
                }
                Err(e) => {
                    eprintln!("  [Error] {e}");
                    eprintln!("  {}", hint(&e));
                }
            },
            cache_command => {
                if let Some(out) = apply(session.disclosure_mut(), &cache_command) {
                    render::print(&out);
                }
            }
        }
    }

    println!("  Goodbye!");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use osgate_core::block::{ContentBlock, Priority};
    use osgate_core::registry::ContentRegistry;
    use std::sync::Arc;

    fn session(budget: u64) -> DisclosureSession {
        let registry = ContentRegistry::from_blocks(vec![
            ContentBlock::new("identity", "", Priority(1), ["who"]).with_cost(100),
            ContentBlock::new("soul", "", Priority(3), ["values"]).with_cost(150),
            ContentBlock::new("skill", "", Priority(6), ["learn"]).with_cost(180),
        ])
        .unwrap();
        DisclosureSession::new(Arc::new(registry), budget)
    }

    #[test]
    fn parse_slash_commands() {
        assert_eq!(ReplCommand::parse("/status"), Some(ReplCommand::Status));
        assert_eq!(ReplCommand::parse("  /QUIT "), Some(ReplCommand::Quit));
        assert_eq!(ReplCommand::parse("/exit"), Some(ReplCommand::Quit));
        assert_eq!(
            ReplCommand::parse("/load soul"),
            Some(ReplCommand::Load {
                name: "soul".into(),
                force: false
            })
        );
        assert_eq!(
            ReplCommand::parse("/load --force skill"),
            Some(ReplCommand::Load {
                name: "skill".into(),
                force: true
            })
        );
        assert_eq!(
            ReplCommand::parse("/unload soul"),
            Some(ReplCommand::Unload { name: "soul".into() })
        );
        assert_eq!(ReplCommand::parse("/load"), Some(ReplCommand::Usage("/load <name> [--force]")));
        assert_eq!(ReplCommand::parse("/unload"), Some(ReplCommand::Usage("/unload <name>")));
        assert_eq!(ReplCommand::parse("/dance"), Some(ReplCommand::Unknown("/dance".into())));
    }

    #[test]
    fn parse_messages_and_blanks() {
        assert_eq!(ReplCommand::parse("   "), None);
        assert_eq!(
            ReplCommand::parse(" what are your values? "),
            Some(ReplCommand::Message("what are your values?".into()))
        );
    }

    #[test]
    fn load_and_unload_through_the_console() {
        let mut disclosure = session(8000);

        let out = apply(&mut disclosure, &ReplCommand::parse("/load soul").unwrap()).unwrap();
        assert_eq!(out, vec!["Context 'soul' loaded successfully."]);
        assert!(disclosure.cache().is_active("soul"));

        let out = apply(&mut disclosure, &ReplCommand::parse("/load soul").unwrap()).unwrap();
        assert_eq!(out, vec!["Context 'soul' is already loaded."]);

        let out = apply(&mut disclosure, &ReplCommand::parse("/unload soul").unwrap()).unwrap();
        assert_eq!(out, vec!["Context 'soul' unloaded."]);

        let out = apply(&mut disclosure, &ReplCommand::parse("/unload soul").unwrap()).unwrap();
        assert_eq!(out, vec!["Context 'soul' is not loaded."]);
    }

    #[test]
    fn core_cannot_be_unloaded() {
        let mut disclosure = session(8000);
        let out = apply(&mut disclosure, &ReplCommand::parse("/unload identity").unwrap()).unwrap();
        assert_eq!(out, vec!["Cannot unload core context 'identity'."]);
        assert!(disclosure.cache().is_active("identity"));
    }

    #[test]
    fn budget_failures_and_forced_loads() {
        let mut disclosure = session(200);

        let out = apply(&mut disclosure, &ReplCommand::parse("/load skill").unwrap()).unwrap();
        assert_eq!(out[0], "Failed to load context 'skill'.");
        assert!(out[1].contains("Not enough budget"));

        let out = apply(&mut disclosure, &ReplCommand::parse("/load skill --force").unwrap()).unwrap();
        assert_eq!(out, vec!["Context 'skill' loaded successfully."]);
        assert_eq!(disclosure.cache().used(), 280);
    }

    #[test]
    fn load_reports_evictions() {
        let mut disclosure = session(300);
        apply(&mut disclosure, &ReplCommand::parse("/load skill").unwrap());
        let out = apply(&mut disclosure, &ReplCommand::parse("/load soul").unwrap()).unwrap();
        assert_eq!(out, vec!["Context 'soul' loaded successfully.", "[Context evicted: skill]"]);
    }

    #[test]
    fn unknown_context_is_reported() {
        let mut disclosure = session(8000);
        let out = apply(&mut disclosure, &ReplCommand::parse("/load nope").unwrap()).unwrap();
        assert!(out[1].contains("Unknown content block: nope"));
        let out = apply(&mut disclosure, &ReplCommand::parse("/unload nope").unwrap()).unwrap();
        assert_eq!(out, vec!["Unknown context 'nope'."]);
    }

    #[test]
    fn non_cache_commands_are_left_to_the_loop() {
        let mut disclosure = session(8000);
        assert!(apply(&mut disclosure, &ReplCommand::Quit).is_none());
        assert!(apply(&mut disclosure, &ReplCommand::Message("hi".into())).is_none());
        let table = apply(&mut disclosure, &ReplCommand::Contexts).unwrap();
        assert_eq!(table.len(), 5);
    }
}
