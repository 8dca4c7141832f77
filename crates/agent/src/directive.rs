//! Directive parsing: what does an assistant reply ask the gateway to do?
//!
//! The model speaks a tiny text protocol:
//!
//! ```text
//! FINISH: <answer>                      reply starts with this: done
//! REQUEST_CONTEXT: ["soul", "tools"]    load blocks
//! RUN_COMMAND: ["ls", "-la"]            run a command (argv list)
//! ```
//!
//! The JSON list is read from the rest of the marker's line. `FINISH:` must
//! open the reply; the other markers may appear anywhere. A reply carrying
//! both `REQUEST_CONTEXT:` and `RUN_COMMAND:` is treated as a context request.

use serde::{Deserialize, Serialize};

pub const FINISH: &str = "FINISH:";
pub const REQUEST_CONTEXT: &str = "REQUEST_CONTEXT:";
pub const RUN_COMMAND: &str = "RUN_COMMAND:";

/// Sent back when a reply carries no directive.
pub const NUDGE: &str = "I didn't see a command or context request. If you are done, say FINISH:. \
Otherwise, provide a RUN_COMMAND or REQUEST_CONTEXT.";

/// A parsed assistant reply.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Directive {
    /// The task is complete; carries the text after the marker
    Finish { answer: String },
    /// Load these blocks
    RequestContext { names: Vec<String> },
    /// Run this argv list
    RunCommand { argv: Vec<String> },
    /// A marker was present but its list could not be read
    Malformed { marker: String, reason: String },
    /// No recognizable directive
    None,
}

impl Directive {
    pub fn parse(reply: &str) -> Self {
        let trimmed = reply.trim_start();
        if let Some(answer) = trimmed.strip_prefix(FINISH) {
            return Directive::Finish {
                answer: answer.trim().to_string(),
            };
        }

        if let Some(rest) = after_marker(reply, REQUEST_CONTEXT) {
            return match parse_list(rest) {
                Ok(names) => Directive::RequestContext { names },
                Err(reason) => Directive::Malformed {
                    marker: REQUEST_CONTEXT.into(),
                    reason,
                },
            };
        }

        if let Some(rest) = after_marker(reply, RUN_COMMAND) {
            return match parse_list(rest) {
                Ok(argv) if argv.is_empty() => Directive::Malformed {
                    marker: RUN_COMMAND.into(),
                    reason: "empty command list".into(),
                },
                Ok(argv) => Directive::RunCommand { argv },
                Err(reason) => Directive::Malformed {
                    marker: RUN_COMMAND.into(),
                    reason,
                },
            };
        }

        Directive::None
    }
}

/// The remainder of the line following the first occurrence of `marker`.
fn after_marker<'a>(reply: &'a str, marker: &str) -> Option<&'a str> {
    let start = reply.find(marker)? + marker.len();
    let rest = reply[start..].trim_start_matches([' ', '\t']);
    Some(rest.lines().next().unwrap_or("").trim())
}

fn parse_list(raw: &str) -> Result<Vec<String>, String> {
    if raw.is_empty() {
        return Err("expected a JSON list of strings, found nothing".into());
    }
    serde_json::from_str::<Vec<String>>(raw).map_err(|e| format!("expected a JSON list of strings: {e}"))
}
