//! Shared test helpers for loop tests.

use async_trait::async_trait;
use parallax_core::error::{ProviderError, ToolError};
use parallax_core::provider::{Completion, CompletionRequest, LanguageModel, StreamChunk, Usage};
use parallax_core::tool::Tool;
use parallax_core::RunCancellationToken;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// A mock model that returns a sequence of scripted responses.
///
/// Each call to `complete` returns the next response in the queue and
/// records the request it was given.
/// Panics if more calls are made than responses provided.
pub struct SequentialMockModel {
    responses: Vec<String>,
    requests: Mutex<Vec<CompletionRequest>>,
    chunk_size: Option<usize>,
}

impl SequentialMockModel {
    pub fn new<S: Into<String>>(responses: impl IntoIterator<Item = S>) -> Self {
        Self {
            responses: responses.into_iter().map(Into::into).collect(),
            requests: Mutex::new(Vec::new()),
            chunk_size: None,
        }
    }

    /// Stream responses in pieces of `size` characters.
    pub fn streaming(mut self, size: usize) -> Self {
        self.chunk_size = Some(size);
        self
    }

    pub fn call_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next(&self, request: CompletionRequest) -> String {
        let mut requests = self.requests.lock().unwrap();
        let idx = requests.len();
        requests.push(request);
        match self.responses.get(idx) {
            Some(text) => text.clone(),
            None => panic!(
                "SequentialMockModel: no more responses (call #{}, have {})",
                idx,
                self.responses.len()
            ),
        }
    }
}

#[async_trait]
impl LanguageModel for SequentialMockModel {
    fn name(&self) -> &str {
        "sequential_mock"
    }

    async fn complete(&self, request: CompletionRequest) -> Result<Completion, ProviderError> {
        Ok(Completion {
            text: self.next(request),
            usage: Some(Usage {
                prompt_tokens: 10,
                completion_tokens: 5,
                total_tokens: 15,
            }),
            model: "mock-model".into(),
        })
    }

    async fn stream(
        &self,
        request: CompletionRequest,
    ) -> Result<tokio::sync::mpsc::Receiver<Result<StreamChunk, ProviderError>>, ProviderError>
    {
        let text = self.next(request);
        let size = self.chunk_size.unwrap_or(usize::MAX).max(1);
        let chars: Vec<char> = text.chars().collect();
        let (tx, rx) = tokio::sync::mpsc::channel(chars.len() / size + 2);
        for piece in chars.chunks(size) {
            let _ = tx
                .send(Ok(StreamChunk {
                    content: Some(piece.iter().collect()),
                    done: false,
                    usage: None,
                }))
                .await;
        }
        let _ = tx
            .send(Ok(StreamChunk {
                content: None,
                done: true,
                usage: None,
            }))
            .await;
        Ok(rx)
    }
}

/// A model whose call never returns.
pub struct HangingModel;

#[async_trait]
impl LanguageModel for HangingModel {
    fn name(&self) -> &str {
        "hanging"
    }

    async fn complete(&self, _request: CompletionRequest) -> Result<Completion, ProviderError> {
        std::future::pending().await
    }
}

/// A tool that answers with a fixed prefix plus its input, after an optional delay.
pub struct StubTool {
    name: String,
    reply: String,
    delay: Duration,
    calls: AtomicUsize,
}

impl StubTool {
    pub fn new(name: &str, reply: &str) -> Self {
        Self {
            name: name.into(),
            reply: reply.into(),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Tool for StubTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Answers with a canned reply"
    }

    async fn call(&self, input: &str, _cancel: &RunCancellationToken) -> Result<String, ToolError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(format!("{}: {}", self.reply, input))
    }
}

/// A tool that always fails, after an optional delay.
pub struct FailingTool {
    name: String,
    delay: Duration,
}

impl FailingTool {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn delayed(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }
}

#[async_trait]
impl Tool for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        "Always fails"
    }

    async fn call(&self, _input: &str, _cancel: &RunCancellationToken) -> Result<String, ToolError> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Err(ToolError::Api {
            status: 500,
            message: "upstream exploded".into(),
        })
    }
}

/// A tool that waits for cancellation and keeps the token it was handed.
#[derive(Default)]
pub struct CancelAwareTool {
    seen: Mutex<Option<RunCancellationToken>>,
}

impl CancelAwareTool {
    /// Whether the token this tool was called with has been cancelled.
    pub fn saw_cancel(&self) -> bool {
        self.seen
            .lock()
            .unwrap()
            .as_ref()
            .is_some_and(|t| t.is_cancelled())
    }
}

#[async_trait]
impl Tool for CancelAwareTool {
    fn name(&self) -> &str {
        "sleeper"
    }

    fn description(&self) -> &str {
        "Sleeps until cancelled"
    }

    async fn call(&self, _input: &str, cancel: &RunCancellationToken) -> Result<String, ToolError> {
        *self.seen.lock().unwrap() = Some(cancel.clone());
        cancel.cancelled().await;
        Err(ToolError::Cancelled)
    }
}

/// Model output proposing `actions` as `(tool, input)` pairs.
pub fn actions_json(actions: &[(&str, &str)]) -> String {
    let items: Vec<serde_json::Value> = actions
        .iter()
        .map(|(tool, input)| serde_json::json!({"Action": tool, "ActionInput": input}))
        .collect();
    serde_json::json!({
        "Question": "q",
        "Thought": "t",
        "FinalAnswer": "",
        "Actions": items,
    })
    .to_string()
}

/// Model output giving a final answer.
pub fn answer_json(answer: &str) -> String {
    serde_json::json!({
        "Question": "q",
        "Thought": "done",
        "FinalAnswer": answer,
        "Actions": [],
    })
    .to_string()
}
