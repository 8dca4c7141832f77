//! osgate CLI: the main entry point.
//!
//! Commands:
//! - `onboard`   Write a default config and starter context files
//! - `chat`      Interactive conversation with progressive context loading
//! - `run`       Work on a goal, executing the model's commands
//! - `contexts`  List context blocks and loading scenarios
//! - `status`    Show configuration and budget
//! - `check`     Ask the safety gate about a command

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;
mod render;

#[derive(Parser)]
#[command(
    name = "osgate",
    about = "osgate: a progressive-disclosure gateway between a local LLM and your shell",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Override the context directory
    #[arg(long, global = true)]
    context_dir: Option<PathBuf>,

    /// Override the token budget
    #[arg(long, global = true)]
    budget: Option<u64>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config and starter context files
    Onboard,

    /// Chat interactively; context loads as the conversation needs it
    Chat,

    /// Work on a goal until the model finishes
    Run {
        /// What the agent should do
        goal: String,
    },

    /// List context blocks and progressive loading scenarios
    Contexts {
        /// Print the block table as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show configuration and budget
    Status,

    /// Check a command against the safety gate
    Check {
        /// The command, as it would be run
        #[arg(required = true, trailing_var_arg = true, allow_hyphen_values = true)]
        command: Vec<String>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Logs go to stderr; stdout belongs to the console
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let overrides = commands::Overrides {
        context_dir: cli.context_dir,
        budget: cli.budget,
    };

    let result = match cli.command {
        Commands::Onboard => commands::onboard::run(&overrides).await,
        Commands::Chat => commands::chat::run(&overrides).await,
        Commands::Run { goal } => commands::run::run(&goal, &overrides).await,
        Commands::Contexts { json } => commands::contexts::run(json, &overrides).await,
        Commands::Status => commands::status::run(&overrides).await,
        Commands::Check { command } => commands::check::run(&command.join(" "), &overrides).await,
    };

    if let Some(err) = result.as_ref().err().and_then(|e| e.downcast_ref::<osgate_core::error::Error>()) {
        eprintln!("  {}", commands::hint(err));
    }
    result
}
