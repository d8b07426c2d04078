//! Per-record state and batch-level results.

use chrono::{DateTime, Utc};

use crate::domain::AnalyzedArtifact;
use crate::error::RecordFailureCause;

/// Lifecycle of a single record inside a batch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    /// Queued, not yet picked up by a worker
    Pending,
    /// A worker is analyzing it
    Running,
    /// Artifact produced
    Succeeded,
    /// Permanently failed
    Failed,
}

impl RecordStatus {
    /// Returns true if the record will not change state again
    pub fn is_terminal(&self) -> bool {
        matches!(self, RecordStatus::Succeeded | RecordStatus::Failed)
    }

    /// Whether `next` is a legal transition from this state
    pub fn can_transition_to(&self, next: RecordStatus) -> bool {
        matches!(
            (self, next),
            (RecordStatus::Pending, RecordStatus::Running)
                | (RecordStatus::Pending, RecordStatus::Failed)
                | (RecordStatus::Running, RecordStatus::Succeeded)
                | (RecordStatus::Running, RecordStatus::Failed)
        )
    }
}

/// A record that ended in the failed state.
#[derive(Debug)]
pub struct RecordFailure {
    /// Position of the record in the submitted batch
    pub index: usize,
    pub source_path: String,
    pub cause: RecordFailureCause,
}

impl std::fmt::Display for RecordFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{} {}: {}", self.index, self.source_path, self.cause)
    }
}

/// Everything a batch produced.
#[derive(Debug)]
pub struct BatchResult {
    /// One artifact per succeeded record, in completion order
    pub artifacts: Vec<AnalyzedArtifact>,
    pub failures: Vec<RecordFailure>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl BatchResult {
    /// Number of records the batch accounted for
    pub fn total(&self) -> usize {
        self.artifacts.len() + self.failures.len()
    }

    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    /// Sum of tokens used by the successful analyses
    pub fn tokens_used(&self) -> u64 {
        self.artifacts.iter().map(|a| a.tokens_used).sum()
    }

    pub fn elapsed(&self) -> chrono::Duration {
        self.finished_at - self.started_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::AnalysisError;

    fn artifact(tokens: u64) -> AnalyzedArtifact {
        AnalyzedArtifact {
            destination_path: "analyzed/a.json".to_string(),
            payload: "{}".to_string(),
            source_path: "calls/a.json".to_string(),
            tokens_used: tokens,
        }
    }

    #[test]
    fn test_status_terminal() {
        assert!(!RecordStatus::Pending.is_terminal());
        assert!(!RecordStatus::Running.is_terminal());
        assert!(RecordStatus::Succeeded.is_terminal());
        assert!(RecordStatus::Failed.is_terminal());
    }

    #[test]
    fn test_status_transitions() {
        assert!(RecordStatus::Pending.can_transition_to(RecordStatus::Running));
        assert!(RecordStatus::Pending.can_transition_to(RecordStatus::Failed));
        assert!(RecordStatus::Running.can_transition_to(RecordStatus::Succeeded));
        assert!(RecordStatus::Running.can_transition_to(RecordStatus::Failed));

        assert!(!RecordStatus::Pending.can_transition_to(RecordStatus::Succeeded));
        assert!(!RecordStatus::Succeeded.can_transition_to(RecordStatus::Failed));
        assert!(!RecordStatus::Failed.can_transition_to(RecordStatus::Running));
        assert!(!RecordStatus::Running.can_transition_to(RecordStatus::Running));
    }

    #[test]
    fn test_batch_result_accounting() {
        let now = Utc::now();
        let result = BatchResult {
            artifacts: vec![artifact(10), artifact(32)],
            failures: vec![RecordFailure {
                index: 2,
                source_path: "calls/c.json".to_string(),
                cause: AnalysisError::ValidationExhausted {
                    attempts: 3,
                    last_output: "nope".to_string(),
                }
                .into(),
            }],
            started_at: now,
            finished_at: now,
        };

        assert_eq!(result.total(), 3);
        assert_eq!(result.tokens_used(), 42);
        assert!(!result.is_success());
        assert_eq!(
            result.failures[0].to_string(),
            "#2 calls/c.json: No valid JSON after 3 attempt(s)"
        );
    }
}
