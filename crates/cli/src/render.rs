//! Console rendering.
//!
//! Everything here turns engine state into lines of text and prints
//! nothing itself, so the layouts can be tested without a terminal.

use osgate_agent::{CacheEntry, CacheStatus, SessionEvent, TurnReport};
use osgate_core::error::ProviderError;
use osgate_core::registry::ContentRegistry;
use osgate_security::GateVerdict;

const RULE: usize = 60;

/// The progressive loading scenarios reported by `osgate contexts`.
pub const SCENARIOS: &[(&str, &[&str])] = &[
    ("Minimal (identity only)", &["identity"]),
    ("Basic operations", &["identity", "agent"]),
    ("File/system tasks", &["identity", "agent", "tools"]),
    ("Complex tasks", &["identity", "agent", "tools", "skill"]),
];

/// `used` as a percentage of `budget`; a zero budget reads as 0%.
pub fn percent(used: u64, budget: u64) -> f64 {
    if budget == 0 {
        0.0
    } else {
        used as f64 / budget as f64 * 100.0
    }
}

fn rule(c: char) -> String {
    c.to_string().repeat(RULE)
}

fn join_or_none(names: &[String]) -> String {
    if names.is_empty() {
        "None".into()
    } else {
        names.join(", ")
    }
}

/// The `/status` report.
pub fn status_report(turn: u64, status: &CacheStatus, entries: &[CacheEntry]) -> Vec<String> {
    let mut lines = vec![
        rule('='),
        "SYSTEM STATUS".into(),
        rule('='),
        String::new(),
        "Conversation:".into(),
        format!("  Turn count: {turn}"),
        String::new(),
        "Token Budget:".into(),
        format!("  Used: {}/{}", status.used, status.budget),
        format!("  Utilization: {:.1}%", status.utilization * 100.0),
        format!("  Remaining: {}", status.remaining()),
        String::new(),
        "Loaded Contexts:".into(),
    ];
    for entry in entries.iter().filter(|e| e.active) {
        lines.push(format!("  {}: {} tokens (priority: {})", entry.name, entry.cost, entry.priority));
    }

    lines.push(String::new());
    lines.push("Available Contexts:".into());
    for entry in entries.iter().filter(|e| !e.active) {
        lines.push(format!("  {}: {} tokens (priority: {})", entry.name, entry.cost, entry.priority));
    }
    lines.push(rule('='));
    lines
}

/// The `/contexts` table, priority order.
pub fn context_table(entries: &[CacheEntry]) -> Vec<String> {
    let mut lines = vec![
        format!("{:<15} {:<10} {:<10} {}", "Name", "Priority", "Tokens", "Status"),
        rule('-'),
    ];
    for entry in entries {
        let state = if entry.active { "LOADED" } else { "Available" };
        lines.push(format!(
            "{:<15} {:<10} {:<10} {}",
            entry.name, entry.priority.0, entry.cost, state
        ));
    }
    lines
}

/// What a chat turn did to the cache. `verbose` adds the analysis.
pub fn turn_summary(report: &TurnReport, verbose: bool) -> Vec<String> {
    let mut lines = Vec::new();

    if verbose {
        let analysis = &report.analysis;
        let relevant: Vec<String> = analysis.names().map(String::from).collect();
        lines.push(rule('='));
        lines.push(format!("PROCESSING DETAILS (turn {})", report.turn));
        lines.push(rule('='));
        lines.push(format!("  Relevant contexts: {}", join_or_none(&relevant)));
        for candidate in &analysis.candidates {
            lines.push(format!(
                "    {}: {:.2} (matched: {})",
                candidate.name,
                candidate.score,
                candidate.matched.join(", ")
            ));
        }
        if analysis.emotional_content_detected {
            lines.push("  Emotional content detected".into());
        }
        if analysis.tool_usage_likely {
            lines.push("  Tool usage indicated".into());
        }
        lines.push(format!("  Loaded: {}", report.status.active.join(", ")));
        lines.push(format!("  Budget remaining: {} tokens", report.status.remaining()));
        lines.push(rule('='));
    }

    if !report.loaded.is_empty() {
        lines.push(format!("[Context loaded: {}]", report.loaded.join(", ")));
    }
    if !report.evicted.is_empty() {
        lines.push(format!("[Context evicted: {}]", report.evicted.join(", ")));
    }
    for rejected in &report.rejected {
        lines.push(format!("[Could not load {}: {}]", rejected.name, rejected.reason));
    }
    lines.push(format!(
        "[Token usage: {}/{} ({:.1}%)]",
        report.status.used,
        report.status.budget,
        report.status.utilization * 100.0
    ));
    lines
}

/// One progress line for `osgate run`, or `None` for events it stays quiet about.
pub fn event_line(event: &SessionEvent, verbose: bool) -> Option<String> {
    match event {
        SessionEvent::Thinking { iteration } => Some(format!("  ... thinking (step {iteration})")),
        SessionEvent::Reply { content } if verbose => Some(
            content
                .lines()
                .map(|line| format!("  Assistant > {line}"))
                .collect::<Vec<_>>()
                .join("\n"),
        ),
        SessionEvent::Reply { .. } => None,
        SessionEvent::ContextsLoaded { names } => Some(format!("  [Context loaded: {}]", names.join(", "))),
        SessionEvent::ContextsEvicted { names } => Some(format!("  [Context evicted: {}]", names.join(", "))),
        SessionEvent::CommandStarted { command } => Some(format!("  $ {command}")),
        SessionEvent::CommandFinished { output, .. } => {
            let lines = output.stdout.lines().count();
            Some(format!("  [exit {}] {lines} line(s) of output", output.exit_code))
        }
        SessionEvent::CommandRejected { command, reason } => Some(format!("  [refused] {command}: {reason}")),
        SessionEvent::Finished { .. } => None,
    }
}

/// Per-block listing for `osgate contexts`.
pub fn registry_listing(registry: &ContentRegistry) -> Vec<String> {
    let mut lines = vec![rule('='), "  Context Blocks".into(), rule('=')];
    for block in registry.all() {
        lines.push(String::new());
        let marker = if block.is_core() { " (core)" } else { "" };
        lines.push(format!("{}{marker}", block.name.to_uppercase()));
        lines.push(format!("  Tokens: ~{}", block.cost));
        lines.push(format!("  Priority: {}", block.priority));
        let tags: Vec<&str> = block.tags.iter().map(String::as_str).collect();
        lines.push(format!("  Tags: {}", if tags.is_empty() { "-".into() } else { tags.join(", ") }));
        if let Some(origin) = &block.origin {
            lines.push(format!("  Source: {origin}"));
        }
    }
    lines.push(String::new());
    lines.push(rule('='));
    lines.push(format!("Total Tokens: ~{}", registry.total_cost()));
    lines.push(format!("Contexts: {}", registry.len()));
    lines.push(rule('='));
    lines
}

/// Token cost of each loading scenario against `budget`.
pub fn scenarios(registry: &ContentRegistry, budget: u64) -> Vec<String> {
    let mut lines = vec![rule('='), "Progressive Loading Scenarios:".into(), rule('=')];
    for (description, names) in SCENARIOS {
        let tokens: u64 = names
            .iter()
            .filter_map(|name| registry.get(name))
            .map(|block| block.cost)
            .sum();
        let missing: Vec<&str> = names.iter().copied().filter(|n| !registry.contains(n)).collect();

        lines.push(String::new());
        lines.push(format!("{description}:"));
        let mut contexts = format!("  Contexts: {}", names.join(", "));
        if !missing.is_empty() {
            contexts.push_str(&format!(" (missing: {})", missing.join(", ")));
        }
        lines.push(contexts);
        lines.push(format!("  Tokens: {tokens} ({:.1}% of budget)", percent(tokens, budget)));
        lines.push(format!(
            "  Remaining: {} tokens for conversation",
            budget.saturating_sub(tokens)
        ));
    }
    lines
}

/// The verdict for `osgate check`.
pub fn verdict(command: &str, verdict: &GateVerdict) -> Vec<String> {
    match verdict {
        GateVerdict::Allowed => vec![format!("✅ Allowed: {command}")],
        GateVerdict::Denied { reason } => vec![format!("⛔ Denied: {command}"), format!("   Reason: {reason}")],
    }
}

/// One word on whether the inference endpoint answered, with the cause when not.
pub fn endpoint_health(health: &Result<bool, ProviderError>) -> String {
    match health {
        Ok(true) => "reachable".into(),
        Ok(false) => "answering, but the model listing failed".into(),
        Err(e) => format!("unreachable ({e})"),
    }
}

pub fn print(lines: &[String]) {
    for line in lines {
        println!("{line}");
    }
}
