//! Plan and step value objects.
//!
//! These flow around the loop: the planner produces a [`PlanOutcome`], the
//! dispatcher turns each [`Action`] into a [`StepRecord`], and the executor
//! feeds the records back to the planner on the next iteration.

use serde::{Deserialize, Serialize};

/// The map an executor returns to its caller.
pub type ReturnValues = serde_json::Map<String, serde_json::Value>;

/// A proposed tool invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Action {
    /// Tool name as written by the model (lookup is case-insensitive)
    pub tool: String,

    /// Raw string input for the tool
    pub tool_input: String,

    /// The literal fragment of model output that proposed this action
    #[serde(default)]
    pub log: String,
}

impl Action {
    pub fn new(tool: impl Into<String>, tool_input: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            tool_input: tool_input.into(),
            log: String::new(),
        }
    }

    /// Attach the model output fragment this action was parsed from.
    pub fn with_log(mut self, log: impl Into<String>) -> Self {
        self.log = log.into();
        self
    }
}

/// One executed action and what came back.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepRecord {
    pub action: Action,
    pub observation: String,
}

impl StepRecord {
    pub fn new(action: Action, observation: impl Into<String>) -> Self {
        Self {
            action,
            observation: observation.into(),
        }
    }

    /// A step with no action, used to feed an error back to the model.
    pub fn observation_only(observation: impl Into<String>) -> Self {
        Self {
            action: Action::default(),
            observation: observation.into(),
        }
    }
}

/// The agent's terminal answer.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Finish {
    pub return_values: ReturnValues,
    pub log: String,
}

impl Finish {
    /// A finish carrying a single value under `key`.
    pub fn with_output(key: &str, value: impl Into<String>, log: impl Into<String>) -> Self {
        let mut return_values = ReturnValues::new();
        return_values.insert(key.to_string(), serde_json::Value::String(value.into()));
        Self {
            return_values,
            log: log.into(),
        }
    }
}

/// What one planning step decided.
#[derive(Debug, Clone, PartialEq)]
pub enum PlanOutcome {
    /// Run these actions concurrently, then plan again.
    Actions(Vec<Action>),
    /// Stop with this answer.
    Finish(Finish),
}

impl PlanOutcome {
    pub fn is_finish(&self) -> bool {
        matches!(self, PlanOutcome::Finish(_))
    }
}
