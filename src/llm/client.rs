//! LlmClient trait and a scripted mock implementation

use std::collections::VecDeque;
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::error::TransportError;
use crate::llm::types::{CompletionRequest, CompletionResponse, Usage};

/// Stateless LLM client - each call is independent
#[async_trait]
pub trait LlmClient: Send + Sync {
    /// Single completion request, including any transport-level retries
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, TransportError>;

    /// Model or deployment the client talks to
    fn model(&self) -> &str;

    /// Whether the client has what it needs to make calls
    fn is_ready(&self) -> bool {
        true
    }
}

/// Mock client that replays a script of results in order.
///
/// Once the script runs out the mock keeps returning `fallback`, or an
/// `InvalidResponse` error when no fallback is set.
pub struct MockLlmClient {
    script: Mutex<VecDeque<Result<CompletionResponse, TransportError>>>,
    fallback: Option<CompletionResponse>,
    requests: Mutex<Vec<CompletionRequest>>,
    calls: AtomicUsize,
}

impl MockLlmClient {
    /// Mock that returns the given responses in order
    pub fn new(responses: Vec<CompletionResponse>) -> Self {
        Self::with_results(responses.into_iter().map(Ok).collect())
    }

    /// Mock that returns the given results (successes or errors) in order
    pub fn with_results(results: Vec<Result<CompletionResponse, TransportError>>) -> Self {
        Self {
            script: Mutex::new(results.into()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
            calls: AtomicUsize::new(0),
        }
    }

    /// Mock that always answers with the same text
    pub fn always(content: impl Into<String>, usage: Usage) -> Self {
        Self::new(Vec::new()).with_fallback(CompletionResponse::new(content, usage))
    }

    pub fn with_fallback(mut self, response: CompletionResponse) -> Self {
        self.fallback = Some(response);
        self
    }

    /// Number of completed `complete` calls
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Every request received so far
    pub fn requests(&self) -> Vec<CompletionRequest> {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

#[async_trait]
impl LlmClient for MockLlmClient {
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);

        let next = self.script.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        match next {
            Some(result) => result,
            None => self
                .fallback
                .clone()
                .ok_or_else(|| TransportError::InvalidResponse("mock script exhausted".to_string())),
        }
    }

    fn model(&self) -> &str {
        "mock-model"
    }
}
