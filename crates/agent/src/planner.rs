//! The concurrent-action planner.
//!
//! One model call per iteration: render the prompt with the caller's inputs,
//! the step history and today's date, stop the model before it can invent an
//! observation, and parse what comes back.

use async_trait::async_trait;
use chrono::Local;
use parallax_core::agent::Agent;
use parallax_core::callback::CallbackHandler;
use parallax_core::error::{Error, ProviderError, Result};
use parallax_core::provider::{CompletionRequest, LanguageModel};
use parallax_core::step::{PlanOutcome, StepRecord};
use parallax_core::tool::ToolRegistry;
use parallax_core::RunCancellationToken;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::parser::OutputParser;
use crate::prompt::{self, PromptTemplate, SCRATCHPAD_VAR, TODAY_VAR};
use crate::scratchpad;

/// Stop sequences that end generation where a tool observation would begin.
pub const OBSERVATION_STOP: [&str; 2] = ["\nObservation:", "\n\tObservation:"];

/// Plans by asking the model for a JSON object of concurrent actions.
pub struct ConcurrentAgent {
    model: Arc<dyn LanguageModel>,
    tools: Arc<ToolRegistry>,
    prompt: PromptTemplate,
    parser: OutputParser,
    callbacks: Option<Arc<dyn CallbackHandler>>,
}

impl ConcurrentAgent {
    /// Create a planner with the default concurrent prompt for `tools`.
    pub fn new(model: Arc<dyn LanguageModel>, tools: ToolRegistry) -> Self {
        let prompt = prompt::concurrent_prompt(&tools);
        Self {
            model,
            tools: Arc::new(tools),
            prompt,
            parser: OutputParser::default(),
            callbacks: None,
        }
    }

    /// Replace the prompt.
    pub fn with_prompt(mut self, prompt: PromptTemplate) -> Self {
        self.prompt = prompt;
        self
    }

    /// Return the final answer under `key` instead of `output`.
    pub fn with_output_key(mut self, key: impl Into<String>) -> Self {
        self.parser = OutputParser::new(key);
        self
    }

    /// Stream model output and forward every chunk to `handler`.
    pub fn with_callbacks(mut self, handler: Arc<dyn CallbackHandler>) -> Self {
        self.callbacks = Some(handler);
        self
    }

    pub fn prompt(&self) -> &PromptTemplate {
        &self.prompt
    }

    /// Build the variable set for one model call.
    fn variables(
        &self,
        steps: &[StepRecord],
        inputs: &HashMap<String, String>,
    ) -> HashMap<String, String> {
        let mut values = inputs.clone();
        values.insert(SCRATCHPAD_VAR.to_string(), scratchpad::render(steps));
        values.insert(TODAY_VAR.to_string(), today());
        values
    }

    async fn generate(&self, request: CompletionRequest) -> std::result::Result<String, ProviderError> {
        let Some(callbacks) = &self.callbacks else {
            return Ok(self.model.complete(request).await?.text);
        };

        let mut rx = self.model.stream(request).await?;
        let mut text = String::new();
        while let Some(chunk) = rx.recv().await {
            let chunk = chunk?;
            if let Some(content) = chunk.content.as_deref()
                && !content.is_empty()
            {
                callbacks.on_stream_chunk(content);
                text.push_str(content);
            }
            if chunk.done {
                break;
            }
        }
        Ok(text)
    }
}

#[async_trait]
impl Agent for ConcurrentAgent {
    async fn plan(
        &self,
        steps: &[StepRecord],
        inputs: &HashMap<String, String>,
        cancel: &RunCancellationToken,
    ) -> Result<PlanOutcome> {
        let prompt = self.prompt.render(&self.variables(steps, inputs))?;
        let request = CompletionRequest::new(prompt).with_stop(OBSERVATION_STOP);

        debug!(model = self.model.name(), history = steps.len(), "Requesting plan");

        let output = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(Error::Cancelled),
            output = self.generate(request) => output?,
        };

        trace!(%output, "Model output");
        Ok(self.parser.parse(&output)?)
    }

    fn input_keys(&self) -> Vec<String> {
        self.prompt
            .input_variables()
            .iter()
            .filter(|v| v.as_str() != SCRATCHPAD_VAR && v.as_str() != TODAY_VAR)
            .cloned()
            .collect()
    }

    fn output_keys(&self) -> Vec<String> {
        vec![self.parser.output_key().to_string()]
    }

    fn tools(&self) -> Arc<ToolRegistry> {
        self.tools.clone()
    }
}

/// Today's local date, e.g. "January 02, 2026". Computed on every call.
pub fn today() -> String {
    Local::now().format("%B %d, %Y").to_string()
}
