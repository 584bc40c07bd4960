//! Run events: decoupled observation of a run in progress.
//!
//! The [`EventBus`] is a [`CallbackHandler`] that turns every callback into
//! an [`AgentEvent`] and broadcasts it. Subscribers (a UI, a logger, a test)
//! can follow a run without being wired into the executor.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::callback::CallbackHandler;
use crate::error::ToolError;
use crate::step::{Action, Finish};

/// All events a run can emit.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AgentEvent {
    /// The model proposed an action and it is about to be dispatched
    ActionProposed {
        tool: String,
        input: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool call started
    ToolStarted {
        tool: String,
        input: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool call returned an observation
    ToolEnded {
        tool: String,
        output: String,
        timestamp: DateTime<Utc>,
    },

    /// A tool call failed
    ToolFailed {
        tool: String,
        error_message: String,
        timestamp: DateTime<Utc>,
    },

    /// The run finished
    AgentFinished {
        return_values: serde_json::Map<String, serde_json::Value>,
        timestamp: DateTime<Utc>,
    },

    /// Streamed model output
    Chunk { content: String },
}

/// A broadcast-based event bus for run events.
///
/// Uses `tokio::sync::broadcast` for multi-consumer pub/sub.
pub struct EventBus {
    sender: broadcast::Sender<Arc<AgentEvent>>,
}

impl EventBus {
    /// Create a new event bus with the given capacity.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all subscribers.
    pub fn publish(&self, event: AgentEvent) {
        // Ignore send errors (no subscribers = that's fine)
        let _ = self.sender.send(Arc::new(event));
    }

    /// Subscribe to receive events.
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<AgentEvent>> {
        self.sender.subscribe()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(256)
    }
}

impl CallbackHandler for EventBus {
    fn on_agent_action(&self, action: &Action) {
        self.publish(AgentEvent::ActionProposed {
            tool: action.tool.clone(),
            input: action.tool_input.clone(),
            timestamp: Utc::now(),
        });
    }

    fn on_tool_start(&self, tool: &str, input: &str) {
        self.publish(AgentEvent::ToolStarted {
            tool: tool.to_string(),
            input: input.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn on_tool_end(&self, tool: &str, output: &str) {
        self.publish(AgentEvent::ToolEnded {
            tool: tool.to_string(),
            output: output.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn on_tool_error(&self, tool: &str, error: &ToolError) {
        self.publish(AgentEvent::ToolFailed {
            tool: tool.to_string(),
            error_message: error.to_string(),
            timestamp: Utc::now(),
        });
    }

    fn on_agent_finish(&self, finish: &Finish) {
        self.publish(AgentEvent::AgentFinished {
            return_values: finish.return_values.clone(),
            timestamp: Utc::now(),
        });
    }

    fn on_stream_chunk(&self, chunk: &str) {
        self.publish(AgentEvent::Chunk {
            content: chunk.to_string(),
        });
    }
}
