//! The iteration controller.
//!
//! Drives plan → dispatch until the agent finishes, a fatal error occurs or
//! the iteration budget runs out. Iterations are strictly sequential; only
//! the actions within one iteration run concurrently.

use parallax_core::agent::Agent;
use parallax_core::callback::CallbackHandler;
use parallax_core::error::{Error, Result};
use parallax_core::step::{Finish, PlanOutcome, ReturnValues, StepRecord};
use parallax_core::RunCancellationToken;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;

use crate::dispatcher::dispatch;
use crate::parser::DEFAULT_OUTPUT_KEY;

/// Key the step trace is returned under when intermediate steps are requested.
pub const INTERMEDIATE_STEPS_KEY: &str = "intermediate_steps";

/// Output reported when the iteration budget runs out.
pub const NOT_FINISHED_OUTPUT: &str = "agent not finished before max iterations";

type ErrorFormatter = Arc<dyn Fn(&str) -> String + Send + Sync>;

/// Feeds parse failures back to the model instead of aborting the run.
#[derive(Clone, Default)]
pub struct ParserErrorHandler {
    formatter: Option<ErrorFormatter>,
}

impl ParserErrorHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewrite the error text before it becomes an observation.
    pub fn with_formatter(formatter: impl Fn(&str) -> String + Send + Sync + 'static) -> Self {
        Self {
            formatter: Some(Arc::new(formatter)),
        }
    }

    fn observation(&self, error: &str) -> String {
        match &self.formatter {
            Some(format) => format(error),
            None => error.to_string(),
        }
    }
}

impl std::fmt::Debug for ParserErrorHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ParserErrorHandler")
            .field("formatter", &self.formatter.is_some())
            .finish()
    }
}

/// Runs an [`Agent`] to completion.
pub struct Executor {
    agent: Arc<dyn Agent>,
    max_iterations: usize,
    return_intermediate_steps: bool,
    parser_error_handler: Option<ParserErrorHandler>,
    callbacks: Option<Arc<dyn CallbackHandler>>,
}

impl Executor {
    /// Create an executor that gives up after `max_iterations` plans.
    pub fn new(agent: Arc<dyn Agent>, max_iterations: usize) -> Self {
        Self {
            agent,
            max_iterations,
            return_intermediate_steps: false,
            parser_error_handler: None,
            callbacks: None,
        }
    }

    /// Include the step trace under [`INTERMEDIATE_STEPS_KEY`].
    pub fn with_intermediate_steps(mut self, enabled: bool) -> Self {
        self.return_intermediate_steps = enabled;
        self
    }

    /// Recover from unparsable model output.
    pub fn with_parser_error_handler(mut self, handler: ParserErrorHandler) -> Self {
        self.parser_error_handler = Some(handler);
        self
    }

    pub fn with_callbacks(mut self, handler: Arc<dyn CallbackHandler>) -> Self {
        self.callbacks = Some(handler);
        self
    }

    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    pub fn input_keys(&self) -> Vec<String> {
        self.agent.input_keys()
    }

    pub fn output_keys(&self) -> Vec<String> {
        let mut keys = self.agent.output_keys();
        if self.return_intermediate_steps {
            keys.push(INTERMEDIATE_STEPS_KEY.to_string());
        }
        keys
    }

    /// Run the loop with named inputs.
    ///
    /// Every input value must be a string, and every key the agent declares
    /// must be present. Both are checked before the model is called.
    pub async fn call(
        &self,
        inputs: &HashMap<String, Value>,
        cancel: &RunCancellationToken,
    ) -> Result<ReturnValues> {
        let inputs = string_inputs(inputs)?;
        for key in self.agent.input_keys() {
            if !inputs.contains_key(&key) {
                return Err(Error::MissingInput { key });
            }
        }

        let run_id = Uuid::new_v4();
        let span = info_span!("agent_run", %run_id);
        self.run_loop(inputs, cancel).instrument(span).await
    }

    /// Single-input, single-output convenience over [`call`](Self::call).
    pub async fn run(&self, input: &str, cancel: &RunCancellationToken) -> Result<String> {
        let input_keys = self.agent.input_keys();
        let output_keys = self.agent.output_keys();
        let ([input_key], [output_key]) = (input_keys.as_slice(), output_keys.as_slice()) else {
            return Err(Error::SingleKeyRequired {
                inputs: input_keys.len(),
                outputs: output_keys.len(),
            });
        };

        let inputs = HashMap::from([(input_key.clone(), Value::String(input.to_string()))]);
        let mut values = self.call(&inputs, cancel).await?;
        match values.remove(output_key) {
            Some(Value::String(answer)) => Ok(answer),
            Some(other) => Ok(other.to_string()),
            None => Err(Error::AgentNoReturn),
        }
    }

    async fn run_loop(
        &self,
        inputs: HashMap<String, String>,
        cancel: &RunCancellationToken,
    ) -> Result<ReturnValues> {
        let tools = self.agent.tools();
        let mut steps: Vec<StepRecord> = Vec::new();

        info!(
            max_iterations = self.max_iterations,
            tools = tools.len(),
            "Starting agent run"
        );

        for iteration in 1..=self.max_iterations {
            if cancel.is_cancelled() {
                return Err(Error::Cancelled);
            }
            debug!(iteration, steps = steps.len(), "Agent loop iteration");

            let outcome = match self.agent.plan(&steps, &inputs, cancel).await {
                Ok(outcome) => outcome,
                Err(Error::Parse(e)) if self.parser_error_handler.is_some() => {
                    warn!(iteration, error = %e, "Feeding parse failure back to the model");
                    let observation = self
                        .parser_error_handler
                        .as_ref()
                        .map(|h| h.observation(&e.to_string()))
                        .unwrap_or_default();
                    steps.push(StepRecord::observation_only(observation));
                    continue;
                }
                Err(e) => return Err(e),
            };

            let actions = match outcome {
                PlanOutcome::Finish(finish) => {
                    info!(iteration, steps = steps.len(), "Agent finished");
                    return self.finish(finish, steps);
                }
                PlanOutcome::Actions(actions) if actions.is_empty() => {
                    return Err(Error::AgentNoReturn);
                }
                PlanOutcome::Actions(actions) => actions,
            };

            debug!(iteration, actions = actions.len(), "Dispatching actions");
            let records = dispatch(actions, tools.clone(), self.callbacks.clone(), cancel).await?;
            steps.extend(records);
        }

        warn!(
            max_iterations = self.max_iterations,
            steps = steps.len(),
            "Agent not finished before max iterations"
        );
        let output_key = self
            .agent
            .output_keys()
            .into_iter()
            .next()
            .unwrap_or_else(|| DEFAULT_OUTPUT_KEY.to_string());
        let sentinel = Finish::with_output(&output_key, NOT_FINISHED_OUTPUT, "");
        let return_values = self.finish(sentinel, steps)?;
        Err(Error::NotFinished { return_values })
    }

    /// Notify and assemble the return map.
    fn finish(&self, finish: Finish, steps: Vec<StepRecord>) -> Result<ReturnValues> {
        if let Some(cb) = &self.callbacks {
            cb.on_agent_finish(&finish);
        }

        let mut values = finish.return_values;
        if self.return_intermediate_steps {
            values.insert(
                INTERMEDIATE_STEPS_KEY.to_string(),
                serde_json::to_value(steps)?,
            );
        }
        Ok(values)
    }
}

fn string_inputs(inputs: &HashMap<String, Value>) -> Result<HashMap<String, String>> {
    inputs
        .iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key.clone(), s.clone())),
            _ => Err(Error::InputNotString { key: key.clone() }),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::planner::ConcurrentAgent;
    use crate::test_helpers::*;
    use parallax_core::tool::{Tool, ToolRegistry};
    use std::sync::Mutex;
    use std::time::Duration;

    fn tools() -> ToolRegistry {
        ToolRegistry::from_tools([
            Arc::new(StubTool::new("SEARCH", "found")) as Arc<dyn Tool>,
            Arc::new(StubTool::new("WEATHER", "sunny")) as Arc<dyn Tool>,
        ])
    }

    fn executor(model: Arc<SequentialMockModel>, max_iterations: usize) -> Executor {
        Executor::new(Arc::new(ConcurrentAgent::new(model, tools())), max_iterations)
    }

    fn question(q: &str) -> HashMap<String, Value> {
        HashMap::from([("input".to_string(), Value::String(q.to_string()))])
    }

    #[tokio::test]
    async fn two_actions_then_finish() {
        let model = Arc::new(SequentialMockModel::new([
            actions_json(&[("SEARCH", "rust"), ("WEATHER", "beijing")]),
            answer_json("answer"),
        ]));
        let exec = executor(model.clone(), 3).with_intermediate_steps(true);

        let values = exec
            .call(&question("news and weather"), &RunCancellationToken::new())
            .await
            .unwrap();

        assert_eq!(values["output"], "answer");
        let steps: Vec<StepRecord> =
            serde_json::from_value(values[INTERMEDIATE_STEPS_KEY].clone()).unwrap();
        assert_eq!(steps.len(), 2);
        assert_eq!(model.call_count(), 2);
        // The second prompt carries both observations.
        let second = &model.requests()[1].prompt;
        assert!(second.contains("Observation: found: rust"));
        assert!(second.contains("Observation: sunny: beijing"));
    }

    #[tokio::test]
    async fn finish_without_steps_returns_only_the_output() {
        let model = Arc::new(SequentialMockModel::new([answer_json("answer")]));
        let values = executor(model, 3)
            .call(&question("q"), &RunCancellationToken::new())
            .await
            .unwrap();
        assert_eq!(values.len(), 1);
        assert_eq!(values["output"], "answer");
    }

    #[tokio::test]
    async fn exhausting_the_budget_reports_not_finished_with_partial_map() {
        let model = Arc::new(SequentialMockModel::new([
            actions_json(&[("SEARCH", "1")]),
            actions_json(&[("SEARCH", "2")]),
            actions_json(&[("SEARCH", "3")]),
        ]));
        let exec = executor(model.clone(), 3).with_intermediate_steps(true);

        let err = exec
            .call(&question("q"), &RunCancellationToken::new())
            .await
            .unwrap_err();

        match err {
            Error::NotFinished { return_values } => {
                assert_eq!(return_values["output"], NOT_FINISHED_OUTPUT);
                assert_eq!(return_values[INTERMEDIATE_STEPS_KEY].as_array().unwrap().len(), 3);
            }
            other => panic!("expected NotFinished, got {other:?}"),
        }
        assert_eq!(model.call_count(), 3);
    }

    #[tokio::test]
    async fn zero_budget_never_calls_the_model() {
        let model = Arc::new(SequentialMockModel::new(Vec::<String>::new()));
        let err = executor(model.clone(), 0)
            .call(&question("q"), &RunCancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFinished { .. }));
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn parse_failure_without_handler_is_fatal() {
        let model = Arc::new(SequentialMockModel::new(["certainly! here is my plan"]));
        let err = executor(model, 3)
            .call(&question("q"), &RunCancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }

    #[tokio::test]
    async fn parse_failure_with_handler_becomes_an_observation() {
        let model = Arc::new(SequentialMockModel::new([
            "certainly! here is my plan".to_string(),
            answer_json("recovered"),
        ]));
        let exec = executor(model.clone(), 3)
            .with_parser_error_handler(ParserErrorHandler::new())
            .with_intermediate_steps(true);

        let values = exec
            .call(&question("q"), &RunCancellationToken::new())
            .await
            .unwrap();

        assert_eq!(values["output"], "recovered");
        let steps: Vec<StepRecord> =
            serde_json::from_value(values[INTERMEDIATE_STEPS_KEY].clone()).unwrap();
        assert_eq!(steps.len(), 1);
        assert_eq!(steps[0].action.tool, "");
        assert!(steps[0].observation.contains("certainly! here is my plan"));
        assert!(model.requests()[1].prompt.contains("Observation: unable to parse agent output"));
    }

    #[tokio::test]
    async fn recovered_parse_failures_count_as_iterations() {
        let model = Arc::new(SequentialMockModel::new(["nope", "still nope"]));
        let exec = executor(model.clone(), 2)
            .with_parser_error_handler(ParserErrorHandler::with_formatter(|_| "Reply in JSON.".into()));

        let err = exec
            .call(&question("q"), &RunCancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::NotFinished { .. }));
        assert_eq!(model.call_count(), 2);
        assert!(model.requests()[1].prompt.contains("Observation: Reply in JSON."));
    }

    #[tokio::test]
    async fn tool_failure_is_fatal_and_names_the_tool() {
        let registry = ToolRegistry::from_tools([Arc::new(FailingTool::new("SEARCH")) as Arc<dyn Tool>]);
        let model = Arc::new(SequentialMockModel::new([actions_json(&[("search", "x")])]));
        let exec = Executor::new(Arc::new(ConcurrentAgent::new(model, registry)), 3);

        let err = exec
            .call(&question("q"), &RunCancellationToken::new())
            .await
            .unwrap_err();
        match err {
            Error::ToolFailed { tool_name, .. } => assert_eq!(tool_name, "search"),
            other => panic!("expected ToolFailed, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn unknown_tool_lets_the_model_try_again() {
        let model = Arc::new(SequentialMockModel::new([
            actions_json(&[("CALCULATOR", "1+1")]),
            answer_json("2"),
        ]));
        let values = executor(model.clone(), 3)
            .call(&question("q"), &RunCancellationToken::new())
            .await
            .unwrap();
        assert_eq!(values["output"], "2");
        assert!(
            model.requests()[1]
                .prompt
                .contains("CALCULATOR is not a valid tool, try another one.")
        );
    }

    #[tokio::test]
    async fn non_string_input_fails_before_the_model_is_called() {
        let model = Arc::new(SequentialMockModel::new(Vec::<String>::new()));
        let inputs = HashMap::from([("input".to_string(), serde_json::json!(42))]);
        let err = executor(model.clone(), 3)
            .call(&inputs, &RunCancellationToken::new())
            .await
            .unwrap_err();
        match err {
            Error::InputNotString { key } => assert_eq!(key, "input"),
            other => panic!("expected InputNotString, got {other:?}"),
        }
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn missing_input_is_reported() {
        let model = Arc::new(SequentialMockModel::new(Vec::<String>::new()));
        let err = executor(model.clone(), 3)
            .call(&HashMap::new(), &RunCancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, Error::MissingInput { key } if key == "input"));
        assert_eq!(model.call_count(), 0);
    }

    #[tokio::test]
    async fn run_returns_the_answer_text() {
        let model = Arc::new(SequentialMockModel::new([answer_json("42")]));
        let answer = executor(model, 3)
            .run("meaning of life", &RunCancellationToken::new())
            .await
            .unwrap();
        assert_eq!(answer, "42");
    }

    #[test]
    fn keys_follow_the_agent() {
        let model = Arc::new(SequentialMockModel::new(Vec::<String>::new()));
        let exec = executor(model, 3).with_intermediate_steps(true);
        assert_eq!(exec.input_keys(), vec!["input".to_string()]);
        assert_eq!(
            exec.output_keys(),
            vec!["output".to_string(), INTERMEDIATE_STEPS_KEY.to_string()]
        );
    }

    #[tokio::test]
    async fn cancellation_during_the_model_call_surfaces_cancelled() {
        let agent = ConcurrentAgent::new(Arc::new(HangingModel), tools());
        let exec = Executor::new(Arc::new(agent), 3);
        let cancel = RunCancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = exec.call(&question("q"), &cancel).await.unwrap_err();
        assert!(err.is_cancelled());
    }

    #[derive(Default)]
    struct FinishRecorder {
        outputs: Mutex<Vec<Value>>,
    }

    impl CallbackHandler for FinishRecorder {
        fn on_agent_finish(&self, finish: &Finish) {
            self.outputs
                .lock()
                .unwrap()
                .push(finish.return_values["output"].clone());
        }
    }

    #[tokio::test]
    async fn finish_callback_sees_the_sentinel_when_the_budget_runs_out() {
        let model = Arc::new(SequentialMockModel::new([actions_json(&[("SEARCH", "1")])]));
        let recorder = Arc::new(FinishRecorder::default());
        let exec = executor(model, 1).with_callbacks(recorder.clone());

        let _ = exec.call(&question("q"), &RunCancellationToken::new()).await;
        assert_eq!(
            *recorder.outputs.lock().unwrap(),
            vec![Value::String(NOT_FINISHED_OUTPUT.into())]
        );
    }
}
