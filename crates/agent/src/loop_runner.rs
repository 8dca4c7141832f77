//! The session loop: drive the model toward a goal one directive at a time.
//!
//! Each iteration rebuilds the system prompt from the active blocks, calls
//! the provider, and acts on the directive in the reply. Everything the
//! gateway does in response (blocks loaded, command output, denials, parse
//! errors) goes back to the model as a user message so the conversation can
//! continue. Only a provider failure ends the session early.

use crate::directive::{Directive, NUDGE};
use crate::disclosure::cache::LoadOutcome;
use crate::disclosure::planner::{DisclosureSession, TurnReport};
use crate::event::SessionEvent;
use osgate_config::AppConfig;
use osgate_core::error::{CommandError, Error};
use osgate_core::message::{Conversation, Message};
use osgate_core::provider::{Provider, ProviderRequest};
use osgate_core::registry::ContentRegistry;
use osgate_security::{AuditLogger, GateVerdict, SafetyGate};
use osgate_tools::{CommandRunner, ShellExecutor};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

const BASE_PROMPT: &str = "You are an OS Agent. You have access to the user's computer.
To run a command, you MUST use the following format:
RUN_COMMAND: [\"command\", \"arg1\", \"arg2\"]

After a command runs, I will give you the output. You should:
1. Analyze the output.
2. If you need more info, run another command.
3. If you have the answer, explain it to the user and start with 'FINISH:'.

If you need additional context to complete the task, you can request it by saying:
REQUEST_CONTEXT: [\"context_name1\", \"context_name2\"]";

const CHAT_PROMPT: &str = "You are an OS Agent talking with the user about their computer.
Nothing you write is executed in this conversation. When a command would help,
show it and explain what it does so the user can run it themselves.";

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SessionOutcome {
    /// The model replied with `FINISH:`
    Finished { answer: String, iterations: u32 },
    /// `max_iterations` provider calls without a `FINISH:`
    IterationLimit { iterations: u32 },
}

type Observer = Arc<dyn Fn(&SessionEvent) + Send + Sync>;

/// One conversation with the model: disclosure state, history, and the
/// collaborators that act on directives.
pub struct AgentSession {
    provider: Arc<dyn Provider>,
    disclosure: DisclosureSession,
    gate: SafetyGate,
    runner: Arc<dyn CommandRunner>,
    conversation: Conversation,
    model: String,
    temperature: f32,
    max_tokens: Option<u32>,
    max_iterations: u32,
    commands_enabled: bool,
    observer: Option<Observer>,
}

impl std::fmt::Debug for AgentSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentSession")
            .field("provider", &self.provider.name())
            .field("disclosure", &self.disclosure)
            .field("model", &self.model)
            .field("messages", &self.conversation.messages.len())
            .field("max_iterations", &self.max_iterations)
            .field("commands_enabled", &self.commands_enabled)
            .finish()
    }
}

impl AgentSession {
    pub fn new(
        provider: Arc<dyn Provider>,
        disclosure: DisclosureSession,
        gate: SafetyGate,
        runner: Arc<dyn CommandRunner>,
    ) -> Self {
        Self {
            provider,
            disclosure,
            gate,
            runner,
            conversation: Conversation::new(),
            model: "local".into(),
            temperature: 0.1,
            max_tokens: None,
            max_iterations: 20,
            commands_enabled: true,
            observer: None,
        }
    }

    /// Wire a session from configuration: budget, deny list, command
    /// timeout, and model settings all come from `config`.
    pub fn from_config(
        config: &AppConfig,
        registry: Arc<ContentRegistry>,
        provider: Arc<dyn Provider>,
        audit: Arc<AuditLogger>,
    ) -> Self {
        let disclosure = DisclosureSession::new(registry, config.context.budget)
            .with_max_loads_per_turn(config.context.max_loads_per_turn);
        let gate = SafetyGate::new()
            .with_extra_patterns(&config.commands.extra_deny_patterns)
            .with_audit(audit.clone());
        let runner = ShellExecutor::new(Duration::from_secs(config.commands.timeout_secs)).with_audit(audit);

        let mut session = Self::new(provider, disclosure, gate, Arc::new(runner))
            .with_model(&config.model)
            .with_temperature(config.temperature)
            .with_max_iterations(config.session.max_iterations)
            .with_commands_enabled(config.commands.enabled);
        session.max_tokens = config.max_tokens;
        session
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = temperature;
        self
    }

    /// Set the default max tokens per LLM response.
    pub fn with_max_tokens(mut self, max: u32) -> Self {
        self.max_tokens = Some(max);
        self
    }

    /// Set the maximum number of provider calls per goal.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// When disabled, `RUN_COMMAND` directives are refused without
    /// consulting the gate.
    pub fn with_commands_enabled(mut self, enabled: bool) -> Self {
        self.commands_enabled = enabled;
        self
    }

    pub fn with_observer(mut self, observer: impl Fn(&SessionEvent) + Send + Sync + 'static) -> Self {
        self.observer = Some(Arc::new(observer));
        self
    }

    pub fn disclosure(&self) -> &DisclosureSession {
        &self.disclosure
    }

    pub fn disclosure_mut(&mut self) -> &mut DisclosureSession {
        &mut self.disclosure
    }

    pub fn conversation(&self) -> &Conversation {
        &self.conversation
    }

    /// Forget the history and return the cache to its initial state.
    pub fn reset(&mut self) {
        self.conversation = Conversation::new();
        self.disclosure.reset();
    }

    /// The command protocol, the available block names, then every active
    /// block in priority order.
    pub fn system_prompt(&self) -> String {
        self.prompt_with(BASE_PROMPT)
    }

    /// [`system_prompt`](Self::system_prompt) for conversation only: no
    /// directive protocol, since chat replies are never acted on.
    pub fn chat_prompt(&self) -> String {
        self.prompt_with(CHAT_PROMPT)
    }

    fn prompt_with(&self, base: &str) -> String {
        let cache = self.disclosure.cache();
        let available: Vec<&str> = cache.registry().names().collect();

        let mut prompt = format!("{base}\nAvailable contexts: {}", available.join(", "));
        prompt.push_str("\n\n");
        for (name, body) in cache.render() {
            prompt.push_str(&format!("=== {} ===\n{}\n\n", name.to_uppercase(), body));
        }
        prompt
    }

    /// Work on `goal` until the model finishes or the iteration limit hits.
    pub async fn run(&mut self, goal: &str) -> Result<SessionOutcome, Error> {
        info!(
            conversation_id = %self.conversation.id,
            max_iterations = self.max_iterations,
            "Starting session"
        );

        let report = self.disclosure.prepare_turn(goal);
        self.emit_turn(&report);
        self.conversation.push(Message::user(goal));

        for iteration in 1..=self.max_iterations {
            let system = self.system_prompt();
            let reply = self.complete(iteration, system).await?;

            let feedback = match Directive::parse(&reply) {
                Directive::Finish { answer } => {
                    info!(iterations = iteration, "Session finished");
                    self.emit(SessionEvent::Finished {
                        answer: answer.clone(),
                        iterations: iteration,
                    });
                    return Ok(SessionOutcome::Finished {
                        answer,
                        iterations: iteration,
                    });
                }
                Directive::RequestContext { names } => self.load_requested(&names),
                Directive::RunCommand { argv } => self.execute(&argv).await,
                Directive::Malformed { marker, reason } => {
                    debug!(%marker, %reason, "Malformed directive");
                    format!("Error: Could not parse {marker} directive. {reason}")
                }
                Directive::None => NUDGE.to_string(),
            };

            self.conversation.push(Message::user(feedback));
        }

        warn!(iterations = self.max_iterations, "Max iterations reached without FINISH");
        Ok(SessionOutcome::IterationLimit {
            iterations: self.max_iterations,
        })
    }

    /// One conversational exchange: plan loads for `message`, then return
    /// the model's reply without acting on directives.
    pub async fn respond(&mut self, message: &str) -> Result<(TurnReport, String), Error> {
        let report = self.disclosure.prepare_turn(message);
        self.emit_turn(&report);
        self.conversation.push(Message::user(message));
        let system = self.chat_prompt();
        let reply = self.complete(1, system).await?;
        Ok((report, reply))
    }

    async fn complete(&mut self, iteration: u32, system: String) -> Result<String, Error> {
        self.emit(SessionEvent::Thinking { iteration });
        debug!(
            conversation_id = %self.conversation.id,
            iteration,
            used = self.disclosure.cache().used(),
            "Session iteration"
        );

        let request = ProviderRequest {
            model: self.model.clone(),
            system,
            messages: self.conversation.messages.clone(),
            temperature: self.temperature,
            max_tokens: self.max_tokens,
        };

        let response = self.provider.complete(request).await.map_err(|e| {
            warn!(provider = %self.provider.name(), error = %e, "Inference unavailable");
            Error::from(e)
        })?;

        let reply = response.message.content.clone();
        self.conversation.push(response.message);
        self.emit(SessionEvent::Reply { content: reply.clone() });
        Ok(reply)
    }

    fn load_requested(&mut self, names: &[String]) -> String {
        let mut loaded = Vec::new();
        let mut evicted = Vec::new();
        let mut failures = Vec::new();

        for name in names {
            let before = self.disclosure.cache().status().active;
            let result = self.disclosure.cache_mut().load(name, false);

            // Evictions stand whether or not the load succeeded.
            let cache = self.disclosure.cache();
            let gone: Vec<String> = before.into_iter().filter(|n| !cache.is_active(n)).collect();
            loaded.retain(|n| !gone.contains(n));
            evicted.extend(gone);

            match result {
                Ok(LoadOutcome::Loaded { .. }) => loaded.push(name.clone()),
                Ok(LoadOutcome::AlreadyActive) => {}
                Err(e) => failures.push(e.to_string()),
            }
        }

        let mut message = if loaded.is_empty() {
            String::from("No additional contexts could be loaded.")
        } else {
            format!("Contexts loaded: {}", loaded.join(", "))
        };
        if !evicted.is_empty() {
            message.push_str(&format!("\nContexts evicted: {}", evicted.join(", ")));
            self.emit(SessionEvent::ContextsEvicted { names: evicted });
        }
        if !loaded.is_empty() {
            self.emit(SessionEvent::ContextsLoaded { names: loaded });
        }
        for failure in failures {
            message.push('\n');
            message.push_str(&failure);
        }
        message
    }

    async fn execute(&mut self, argv: &[String]) -> String {
        let command = argv.join(" ");

        if !self.commands_enabled {
            let reason = "command execution is disabled".to_string();
            self.emit(SessionEvent::CommandRejected {
                command,
                reason: reason.clone(),
            });
            return format!("Error: {reason}.");
        }

        if let GateVerdict::Denied { reason } = self.gate.check(&command) {
            self.emit(SessionEvent::CommandRejected {
                command: command.clone(),
                reason: reason.clone(),
            });
            return CommandError::Denied { command, reason }.to_string();
        }

        self.emit(SessionEvent::CommandStarted {
            command: command.clone(),
        });
        match self.runner.run(argv).await {
            Ok(output) => {
                let feedback = output.to_feedback();
                self.emit(SessionEvent::CommandFinished { command, output });
                feedback
            }
            Err(e) => {
                self.emit(SessionEvent::CommandRejected {
                    command,
                    reason: e.to_string(),
                });
                format!("Error: Could not run command. {e}")
            }
        }
    }

    fn emit_turn(&self, report: &TurnReport) {
        if !report.evicted.is_empty() {
            self.emit(SessionEvent::ContextsEvicted {
                names: report.evicted.clone(),
            });
        }
        if !report.loaded.is_empty() {
            self.emit(SessionEvent::ContextsLoaded {
                names: report.loaded.clone(),
            });
        }
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(observer) = &self.observer {
            observer(&event);
        }
    }
}
