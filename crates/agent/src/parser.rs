//! Output parser: model text in, [`PlanOutcome`] out.
//!
//! The model is instructed to answer with a single JSON object:
//!
//! ```json
//! {
//!   "Question": "the input question",
//!   "Thought": "what to do next and what can run concurrently",
//!   "FinalAnswer": "",
//!   "Actions": [
//!     {"Action": "Bocha", "ActionInput": "rust async runtimes"},
//!     {"Action": "q-weather", "ActionInput": "{\"longitude\":116.4,\"latitude\":39.9}"}
//!   ]
//! }
//! ```
//!
//! A non-empty `FinalAnswer` always wins over `Actions`. An object with
//! neither is rejected, never treated as a no-op.

use parallax_core::error::ParseError;
use parallax_core::step::{Action, Finish, PlanOutcome};
use serde::Deserialize;
use serde_json::value::RawValue;
use tracing::debug;

/// The key a final answer is returned under unless configured otherwise.
pub const DEFAULT_OUTPUT_KEY: &str = "output";

#[derive(Debug, Deserialize)]
struct TaskFlow {
    #[serde(rename = "Question", default)]
    question: Option<String>,
    #[serde(rename = "Thought", default)]
    thought: Option<String>,
    #[serde(rename = "FinalAnswer", default)]
    final_answer: Option<String>,
    #[serde(rename = "Actions", default)]
    actions: Option<Vec<Box<RawValue>>>,
}

#[derive(Debug, Deserialize)]
struct ActionItem {
    #[serde(rename = "Action")]
    action: String,
    #[serde(rename = "ActionInput", default)]
    action_input: serde_json::Value,
}

/// Parses the concurrent-action JSON format.
#[derive(Debug, Clone)]
pub struct OutputParser {
    output_key: String,
}

impl Default for OutputParser {
    fn default() -> Self {
        Self::new(DEFAULT_OUTPUT_KEY)
    }
}

impl OutputParser {
    pub fn new(output_key: impl Into<String>) -> Self {
        Self {
            output_key: output_key.into(),
        }
    }

    pub fn output_key(&self) -> &str {
        &self.output_key
    }

    /// Turn raw model output into exactly one of: actions, a finish, or an error.
    pub fn parse(&self, raw: &str) -> Result<PlanOutcome, ParseError> {
        let output = clean_output(raw);

        let task: TaskFlow =
            serde_json::from_str(&output).map_err(|e| ParseError::Malformed {
                reason: e.to_string(),
                output: output.clone(),
            })?;

        debug!(
            question = task.question.as_deref().unwrap_or_default(),
            thought = task.thought.as_deref().unwrap_or_default(),
            "Parsed agent output"
        );

        if let Some(answer) = task.final_answer.filter(|a| !a.is_empty()) {
            return Ok(PlanOutcome::Finish(Finish::with_output(
                &self.output_key,
                answer,
                output,
            )));
        }

        let fragments = task.actions.unwrap_or_default();
        if fragments.is_empty() {
            return Err(ParseError::Empty { output });
        }

        let mut actions = Vec::with_capacity(fragments.len());
        for fragment in fragments {
            let item: ActionItem =
                serde_json::from_str(fragment.get()).map_err(|e| ParseError::Malformed {
                    reason: format!("invalid action {}: {e}", fragment.get()),
                    output: output.clone(),
                })?;
            actions.push(
                Action::new(item.action, input_to_string(item.action_input))
                    .with_log(fragment.get()),
            );
        }

        Ok(PlanOutcome::Actions(actions))
    }
}

/// Strip code fences, a leading language tag and surrounding whitespace.
fn clean_output(raw: &str) -> String {
    let without_ticks = raw.replace('`', "");
    let trimmed = without_ticks.trim();
    let untagged = trimmed
        .strip_prefix("json")
        .or_else(|| trimmed.strip_prefix("JSON"))
        .unwrap_or(trimmed);
    untagged.trim().to_string()
}

/// Models sometimes send structured tool input as an object rather than a
/// JSON-encoded string; tools always receive a string.
fn input_to_string(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}
