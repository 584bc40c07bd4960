//! Callback hooks for observing a run.
//!
//! Handlers are invoked synchronously from the agent loop and from tool
//! workers, so they must be cheap and must not block. Every method has a
//! no-op default; implement only what you need.

use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::error::ToolError;
use crate::step::{Action, Finish};

pub trait CallbackHandler: Send + Sync {
    /// The dispatcher is about to run `action`.
    fn on_agent_action(&self, _action: &Action) {}

    /// A tool worker started.
    fn on_tool_start(&self, _tool: &str, _input: &str) {}

    /// A tool worker finished successfully.
    fn on_tool_end(&self, _tool: &str, _output: &str) {}

    /// A tool worker failed.
    fn on_tool_error(&self, _tool: &str, _error: &ToolError) {}

    /// The run finished, or gave up with a sentinel answer.
    fn on_agent_finish(&self, _finish: &Finish) {}

    /// A chunk of streamed model output arrived.
    fn on_stream_chunk(&self, _chunk: &str) {}
}

/// Fans every callback out to several handlers, in order.
#[derive(Clone, Default)]
pub struct Callbacks {
    handlers: Vec<Arc<dyn CallbackHandler>>,
}

impl Callbacks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, handler: Arc<dyn CallbackHandler>) -> Self {
        self.handlers.push(handler);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl CallbackHandler for Callbacks {
    fn on_agent_action(&self, action: &Action) {
        self.handlers.iter().for_each(|h| h.on_agent_action(action));
    }

    fn on_tool_start(&self, tool: &str, input: &str) {
        self.handlers.iter().for_each(|h| h.on_tool_start(tool, input));
    }

    fn on_tool_end(&self, tool: &str, output: &str) {
        self.handlers.iter().for_each(|h| h.on_tool_end(tool, output));
    }

    fn on_tool_error(&self, tool: &str, error: &ToolError) {
        self.handlers.iter().for_each(|h| h.on_tool_error(tool, error));
    }

    fn on_agent_finish(&self, finish: &Finish) {
        self.handlers.iter().for_each(|h| h.on_agent_finish(finish));
    }

    fn on_stream_chunk(&self, chunk: &str) {
        self.handlers.iter().for_each(|h| h.on_stream_chunk(chunk));
    }
}

/// Logs every callback through `tracing`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingHandler;

impl CallbackHandler for TracingHandler {
    fn on_agent_action(&self, action: &Action) {
        info!(tool = %action.tool, input = %action.tool_input, "Agent action");
    }

    fn on_tool_start(&self, tool: &str, input: &str) {
        debug!(tool, input, "Tool started");
    }

    fn on_tool_end(&self, tool: &str, output: &str) {
        debug!(tool, output_len = output.len(), "Tool finished");
    }

    fn on_tool_error(&self, tool: &str, error: &ToolError) {
        warn!(tool, error = %error, "Tool failed");
    }

    fn on_agent_finish(&self, finish: &Finish) {
        info!(keys = ?finish.return_values.keys().collect::<Vec<_>>(), "Agent finished");
    }
}
