//! The external analysis call.

use std::sync::Arc;

use async_trait::async_trait;

use crate::domain::{AnalysisOutcome, CallRecord};
use crate::error::TransportError;
use crate::llm::{CompletionRequest, LlmClient};
use crate::prompt::AnalysisPrompt;

/// Turns one call transcript into a (possibly malformed) analysis document.
///
/// Implementations handle their own transport retries; an error returned here
/// is final for the record.
#[async_trait]
pub trait AnalysisClient: Send + Sync {
    async fn analyze(&self, record: &CallRecord) -> Result<AnalysisOutcome, TransportError>;
}

/// AnalysisClient backed by a chat-completion LLM
pub struct LlmAnalysisClient<L: LlmClient> {
    llm: Arc<L>,
    prompt: AnalysisPrompt,
    max_tokens: Option<u32>,
}

impl<L: LlmClient> LlmAnalysisClient<L> {
    pub fn new(llm: Arc<L>, prompt: AnalysisPrompt) -> Self {
        Self {
            llm,
            prompt,
            max_tokens: None,
        }
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// System instruction, task prompt, then the transcript as the user turn
    fn build_request(&self, record: &CallRecord) -> CompletionRequest {
        let mut request = CompletionRequest::new()
            .with_system_message(&self.prompt.system_instruction)
            .with_system_message(&self.prompt.task_prompt)
            .with_user_message(&record.transcribed_text);
        request.max_tokens = self.max_tokens;
        request
    }
}

#[async_trait]
impl<L: LlmClient> AnalysisClient for LlmAnalysisClient<L> {
    async fn analyze(&self, record: &CallRecord) -> Result<AnalysisOutcome, TransportError> {
        let response = self.llm.complete(self.build_request(record)).await?;
        let tokens_used = response.usage.total();

        tracing::info!(
            record = record.file_name(),
            model = self.llm.model(),
            tokens_used,
            "Analysis call completed"
        );

        Ok(AnalysisOutcome::new(response.content, tokens_used))
    }
}
