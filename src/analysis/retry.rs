//! Retry-until-valid loop around the analysis call.
//!
//! The model is asked again, with an identical request, whenever its output
//! is not a JSON object. Transport failures are never retried here: the
//! transport already did its own retries, so they end the record at once.

use std::sync::Arc;
use std::time::Duration;

use crate::analysis::client::AnalysisClient;
use crate::analysis::validity::is_valid;
use crate::domain::{AnalysisOutcome, CallRecord};
use crate::error::AnalysisError;

/// Predicate deciding whether an analysis output is usable
pub type ValidityFn = Arc<dyn Fn(&str) -> bool + Send + Sync>;

/// How many times to ask for valid output, and how long to wait in between.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. 0 is treated as 1.
    pub max_attempts: u32,
    /// Pause between validity attempts
    pub backoff: Option<Duration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff: None,
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = Some(backoff);
        self
    }

    /// Attempts actually made; a record is always attempted at least once
    pub fn effective_attempts(&self) -> u32 {
        self.max_attempts.max(1)
    }
}

/// Calls an AnalysisClient until its output passes the validity check.
pub struct RetryingAnalyzer<C: AnalysisClient> {
    client: Arc<C>,
    policy: RetryPolicy,
    checker: ValidityFn,
}

impl<C: AnalysisClient> RetryingAnalyzer<C> {
    pub fn new(client: Arc<C>, policy: RetryPolicy) -> Self {
        Self {
            client,
            policy,
            checker: Arc::new(is_valid),
        }
    }

    /// Replace the JSON-object check with a custom predicate
    pub fn with_checker(mut self, checker: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        self.checker = Arc::new(checker);
        self
    }

    /// Return the first valid outcome within the retry budget.
    pub async fn get_valid_analysis(&self, record: &CallRecord) -> Result<AnalysisOutcome, AnalysisError> {
        let max_attempts = self.policy.effective_attempts();
        let mut attempt = 1;

        loop {
            tracing::info!(record = record.file_name(), attempt, max_attempts, "Analyzing");

            let outcome = self.client.analyze(record).await?;

            if (self.checker)(&outcome.raw_text) {
                return Ok(outcome);
            }

            if attempt >= max_attempts {
                tracing::error!(
                    record = record.file_name(),
                    attempts = attempt,
                    "Could not get valid JSON from analysis"
                );
                return Err(AnalysisError::ValidationExhausted {
                    attempts: attempt,
                    last_output: outcome.raw_text,
                });
            }

            tracing::warn!(record = record.file_name(), attempt, "Analysis output is not valid JSON, retrying");
            attempt += 1;

            if let Some(backoff) = self.policy.backoff {
                tokio::time::sleep(backoff).await;
            }
        }
    }
}
