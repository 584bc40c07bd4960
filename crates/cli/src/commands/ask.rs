//! `parallax ask`: answer one question with the concurrent agent.

use std::collections::HashMap;
use std::io::Write;
use std::sync::Arc;

use parallax_agent::{ConcurrentAgent, Executor, INTERMEDIATE_STEPS_KEY, ParserErrorHandler};
use parallax_config::AppConfig;
use parallax_core::step::{Action, ReturnValues};
use parallax_core::{CallbackHandler, Callbacks, Error, RunCancellationToken, ToolError, TracingHandler};
use tracing::info;

pub struct AskArgs {
    pub question: String,
    pub max_iterations: Option<usize>,
    pub show_steps: bool,
    pub quiet: bool,
}

pub async fn run(args: AskArgs) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::load().map_err(|e| format!("Failed to load config: {e}"))?;

    let model = Arc::new(super::model::build(&config.model)?);
    let registry = parallax_tools::registry_from_config(&config.tools);
    if registry.is_empty() {
        eprintln!("  warning: no tools are enabled, the agent can only answer from memory");
    }

    let mut callbacks = Callbacks::new().with(Arc::new(TracingHandler));
    if !args.quiet {
        callbacks = callbacks.with(Arc::new(ProgressPrinter));
    }
    let callbacks: Arc<dyn CallbackHandler> = Arc::new(callbacks);

    let max_iterations = args.max_iterations.unwrap_or(config.agent.max_iterations);
    info!(model = %config.model.name, tools = %registry.names(), max_iterations, "Starting run");

    let agent = ConcurrentAgent::new(model, registry).with_callbacks(callbacks.clone());

    let mut executor = Executor::new(Arc::new(agent), max_iterations)
        .with_intermediate_steps(args.show_steps || config.agent.return_intermediate_steps)
        .with_callbacks(callbacks);
    if config.agent.handle_parsing_errors {
        executor = executor.with_parser_error_handler(ParserErrorHandler::new());
    }

    let cancel = RunCancellationToken::new();
    let on_ctrl_c = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_ctrl_c.cancel();
        }
    });

    let inputs = HashMap::from([("input".to_string(), serde_json::Value::String(args.question))]);

    match executor.call(&inputs, &cancel).await {
        Ok(values) => {
            print_answer(&values, args.show_steps);
            Ok(())
        }
        Err(Error::NotFinished { return_values }) => {
            print_answer(&return_values, args.show_steps);
            Err(format!("No final answer after {max_iterations} iterations").into())
        }
        Err(Error::Cancelled) => Err("Interrupted".into()),
        Err(e) => Err(e.into()),
    }
}

fn print_answer(values: &ReturnValues, show_steps: bool) {
    eprintln!();
    if show_steps && let Some(steps) = values.get(INTERMEDIATE_STEPS_KEY).and_then(|s| s.as_array()) {
        eprintln!("  Steps:");
        for (i, step) in steps.iter().enumerate() {
            let action = &step["action"];
            eprintln!(
                "  {}. {}({})",
                i + 1,
                action["tool"].as_str().unwrap_or("-"),
                action["tool_input"].as_str().unwrap_or("")
            );
            eprintln!("     -> {}", preview(step["observation"].as_str().unwrap_or(""), 200));
        }
        eprintln!();
    }

    for (key, value) in values {
        if key == INTERMEDIATE_STEPS_KEY {
            continue;
        }
        match value.as_str() {
            Some(text) => println!("{text}"),
            None => println!("{value}"),
        }
    }
}

fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars).collect();
    format!("{cut}...")
}

/// Echoes the model's streamed reasoning and each tool call to stderr.
struct ProgressPrinter;

impl CallbackHandler for ProgressPrinter {
    fn on_stream_chunk(&self, chunk: &str) {
        let mut err = std::io::stderr();
        let _ = write!(err, "{chunk}");
        let _ = err.flush();
    }

    fn on_agent_action(&self, action: &Action) {
        eprintln!("\n  > {}({})", action.tool, action.tool_input);
    }

    fn on_tool_end(&self, tool: &str, output: &str) {
        eprintln!("  < {tool}: {}", preview(output, 120));
    }

    fn on_tool_error(&self, tool: &str, error: &ToolError) {
        eprintln!("  ! {tool}: {error}");
    }
}
