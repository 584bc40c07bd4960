//! The concurrent agent loop: the heart of Parallax.
//!
//! The agent follows a **Plan → Act → Observe** cycle:
//!
//! 1. **Plan**: render the prompt (input + step history + today's date) and
//!    ask the model for a JSON plan
//! 2. **Parse**: the plan is either a final answer or a list of actions
//! 3. **Act**: every action of the plan runs concurrently, one task each
//! 4. **Observe**: the results become step records that feed the next plan
//!
//! The loop continues until the model gives a final answer, a tool fails,
//! or the iteration budget is spent.
//!
//! ```no_run
//! # use std::sync::Arc;
//! # use parallax_core::{LanguageModel, RunCancellationToken, ToolRegistry};
//! # async fn demo(model: Arc<dyn LanguageModel>, tools: ToolRegistry) -> parallax_core::Result<()> {
//! use parallax_agent::{ConcurrentAgent, Executor};
//!
//! let agent = ConcurrentAgent::new(model, tools);
//! let executor = Executor::new(Arc::new(agent), 5);
//! let answer = executor
//!     .run("What's the weather in Beijing?", &RunCancellationToken::new())
//!     .await?;
//! # Ok(())
//! # }
//! ```

pub mod dispatcher;
pub mod executor;
pub mod parser;
pub mod planner;
pub mod prompt;
pub mod scratchpad;

#[cfg(test)]
pub(crate) mod test_helpers;

pub use dispatcher::dispatch;
pub use executor::{Executor, INTERMEDIATE_STEPS_KEY, NOT_FINISHED_OUTPUT, ParserErrorHandler};
pub use parser::{DEFAULT_OUTPUT_KEY, OutputParser};
pub use planner::{ConcurrentAgent, OBSERVATION_STOP};
pub use prompt::{PromptSection, PromptTemplate, concurrent_prompt, concurrent_prompt_with};
