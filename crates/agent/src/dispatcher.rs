//! Concurrent action dispatch.
//!
//! Every action of one iteration runs on its own task in a [`JoinSet`].
//! Results are collected as they complete; the first tool failure cancels
//! the iteration's child token, aborts the remaining workers and is returned
//! at once.

use parallax_core::callback::CallbackHandler;
use parallax_core::error::{Error, Result, ToolError};
use parallax_core::step::{Action, StepRecord};
use parallax_core::tool::ToolRegistry;
use parallax_core::RunCancellationToken;
use std::sync::Arc;
use tokio::task::JoinSet;
use tracing::{debug, error, warn};

/// Run `actions` concurrently against `registry`.
///
/// On success the records come back in completion order, which is not the
/// order the actions were proposed in.
pub async fn dispatch(
    actions: Vec<Action>,
    registry: Arc<ToolRegistry>,
    callbacks: Option<Arc<dyn CallbackHandler>>,
    cancel: &RunCancellationToken,
) -> Result<Vec<StepRecord>> {
    let scope = cancel.child_token();
    let mut workers = JoinSet::new();
    let expected = actions.len();

    for action in actions {
        if let Some(cb) = &callbacks {
            cb.on_agent_action(&action);
        }
        debug!(tool = %action.tool, input = %action.tool_input, "Dispatching action");
        workers.spawn(run_action(
            action,
            registry.clone(),
            callbacks.clone(),
            scope.clone(),
        ));
    }

    let mut records = Vec::with_capacity(expected);
    loop {
        let joined = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                workers.abort_all();
                return Err(Error::Cancelled);
            }
            joined = workers.join_next() => joined,
        };

        let Some(joined) = joined else { break };
        let outcome = match joined {
            Ok(outcome) => outcome,
            Err(join_err) => {
                error!(error = %join_err, "Tool worker panicked");
                Err(Error::Internal(format!("tool worker failed: {join_err}")))
            }
        };

        match outcome {
            Ok(record) => records.push(record),
            Err(e) => {
                scope.cancel();
                workers.abort_all();
                return Err(e);
            }
        }
    }

    Ok(records)
}

/// One worker: look the tool up, call it, and turn the result into a record.
async fn run_action(
    action: Action,
    registry: Arc<ToolRegistry>,
    callbacks: Option<Arc<dyn CallbackHandler>>,
    scope: RunCancellationToken,
) -> Result<StepRecord> {
    let Some(tool) = registry.get(&action.tool) else {
        warn!(tool = %action.tool, "Model proposed an unknown tool");
        let observation = format!("{} is not a valid tool, try another one.", action.tool);
        return Ok(StepRecord::new(action, observation));
    };

    if let Some(cb) = &callbacks {
        cb.on_tool_start(tool.name(), &action.tool_input);
    }

    let result = tokio::select! {
        biased;
        _ = scope.cancelled() => Err(ToolError::Cancelled),
        result = tool.call(&action.tool_input, &scope) => result,
    };

    match result {
        Ok(observation) => {
            if let Some(cb) = &callbacks {
                cb.on_tool_end(tool.name(), &observation);
            }
            Ok(StepRecord::new(action, observation))
        }
        Err(ToolError::Cancelled) if scope.is_cancelled() => Err(Error::Cancelled),
        Err(source) => {
            if let Some(cb) = &callbacks {
                cb.on_tool_error(tool.name(), &source);
            }
            Err(Error::ToolFailed {
                tool_name: action.tool,
                source,
            })
        }
    }
}
