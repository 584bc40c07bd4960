//! # Parallax Core
//!
//! Domain types, traits, and error definitions for the Parallax agent runtime.
//! It depends on no HTTP or model SDK: it defines the domain model that the
//! agent loop, the model backend, and the tools implement against.
//!
//! ## Design Philosophy
//!
//! Every collaborator of the agent loop is a trait here:
//! - [`LanguageModel`] turns a rendered prompt into text
//! - [`Tool`] turns a string input into a string observation
//! - [`CallbackHandler`] observes a run
//! - [`Agent`] plans the next step from the step history
//!
//! Implementations live in their respective crates, which keeps the
//! dependency graph pointing inward and makes every seam mockable.

pub mod agent;
pub mod callback;
pub mod error;
pub mod event;
pub mod provider;
pub mod step;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use agent::Agent;
pub use callback::{CallbackHandler, Callbacks, TracingHandler};
pub use error::{Error, ParseError, PromptError, ProviderError, Result, ToolError};
pub use event::{AgentEvent, EventBus};
pub use provider::{Completion, CompletionRequest, LanguageModel, StreamChunk, Usage};
pub use step::{Action, Finish, PlanOutcome, ReturnValues, StepRecord};
pub use tool::{Tool, ToolRegistry};

/// Cancellation signal threaded through a run, its model calls and its tools.
pub type RunCancellationToken = tokio_util::sync::CancellationToken;
