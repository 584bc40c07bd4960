//! Error types for the Parallax domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each bounded context has its own error type; [`Error`] aggregates them
//! into the taxonomy the executor reports to its caller.

use crate::step::ReturnValues;
use thiserror::Error;

/// The top-level error type for all Parallax operations.
#[derive(Debug, Error)]
pub enum Error {
    // --- Model backend errors ---
    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    // --- Tool errors ---
    #[error("Tool '{tool_name}' failed: {source}")]
    ToolFailed {
        tool_name: String,
        #[source]
        source: ToolError,
    },

    // --- Model output errors (recoverable when a parser error handler is set) ---
    #[error(transparent)]
    Parse(#[from] ParseError),

    // --- Prompt rendering errors ---
    #[error("Prompt error: {0}")]
    Prompt(#[from] PromptError),

    // --- Input contract violations ---
    #[error("Input value for '{key}' is not a string")]
    InputNotString { key: String },

    #[error("Missing input value for '{key}'")]
    MissingInput { key: String },

    #[error("run needs exactly one input and one output key, agent has {inputs} and {outputs}")]
    SingleKeyRequired { inputs: usize, outputs: usize },

    // --- Loop outcomes ---
    #[error("Agent returned neither actions nor a final answer")]
    AgentNoReturn,

    /// The iteration budget ran out. Carries whatever return map the
    /// executor could assemble from the steps taken so far.
    #[error("Agent not finished before max iterations")]
    NotFinished { return_values: ReturnValues },

    #[error("Run cancelled")]
    Cancelled,

    // --- Serialization ---
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // --- Generic ---
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Whether the executor may feed this error back to the model as an
    /// observation instead of aborting the run.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Error::Parse(_))
    }

    /// Whether the run stopped because the caller asked it to.
    pub fn is_cancelled(&self) -> bool {
        matches!(self, Error::Cancelled)
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Bounded context errors ---

#[derive(Debug, Clone, Error)]
pub enum ProviderError {
    #[error("API request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Stream interrupted: {0}")]
    StreamInterrupted(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    #[error("Network error: {0}")]
    Network(String),
}

#[derive(Debug, Clone, Error)]
pub enum ToolError {
    #[error("Missing API key: {0}")]
    MissingApiKey(String),

    #[error("Invalid tool input: {0}")]
    InvalidInput(String),

    #[error("Request failed: {0}")]
    Request(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Tool execution failed: {0}")]
    ExecutionFailed(String),

    #[error("Tool call cancelled")]
    Cancelled,
}

/// The model's output could not be turned into a plan.
///
/// Both variants keep the cleaned model output so the error text can be fed
/// back to the model verbatim.
#[derive(Debug, Clone, Error)]
pub enum ParseError {
    #[error("unable to parse agent output: {reason}: {output}")]
    Malformed { reason: String, output: String },

    #[error("unable to parse agent output: neither a final answer nor an action: {output}")]
    Empty { output: String },
}

impl ParseError {
    /// The model output that failed to parse.
    pub fn output(&self) -> &str {
        match self {
            ParseError::Malformed { output, .. } | ParseError::Empty { output } => output,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PromptError {
    #[error("missing value for template variable '{0}'")]
    MissingVariable(String),

    #[error("template must reference '{0}'")]
    MissingPlaceholder(String),
}
