//! Single-writer status table fed by worker events.

use chrono::{DateTime, Utc};

use crate::domain::{AnalyzedArtifact, BatchResult, RecordFailure, RecordStatus};
use crate::error::RecordFailureCause;

/// Message from a worker to the collector
#[derive(Debug)]
pub(crate) enum WorkerEvent {
    Started(usize),
    Finished(usize, Result<AnalyzedArtifact, RecordFailureCause>),
}

/// Tracks every record of one batch. Only the coordinator task touches it.
pub(crate) struct StatusTable {
    sources: Vec<String>,
    statuses: Vec<RecordStatus>,
    artifacts: Vec<AnalyzedArtifact>,
    failures: Vec<RecordFailure>,
}

impl StatusTable {
    pub(crate) fn new(sources: Vec<String>) -> Self {
        let statuses = vec![RecordStatus::Pending; sources.len()];
        Self {
            sources,
            statuses,
            artifacts: Vec::new(),
            failures: Vec::new(),
        }
    }

    pub(crate) fn apply(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::Started(index) => {
                self.transition(index, RecordStatus::Running);
            }
            WorkerEvent::Finished(index, Ok(artifact)) => {
                if self.transition(index, RecordStatus::Succeeded) {
                    tracing::info!(record = %self.sources[index], destination = %artifact.destination_path, "Record analyzed");
                    self.artifacts.push(artifact);
                }
            }
            WorkerEvent::Finished(index, Err(cause)) => {
                if self.transition(index, RecordStatus::Failed) {
                    self.fail(index, cause);
                }
            }
        }
    }

    /// Close out the batch: anything not terminal by now is failed.
    pub(crate) fn finish(mut self, cancelled: bool, started_at: DateTime<Utc>) -> BatchResult {
        for index in 0..self.statuses.len() {
            let cause = match self.statuses[index] {
                RecordStatus::Pending if cancelled => RecordFailureCause::Cancelled { attempted: false },
                RecordStatus::Pending => {
                    RecordFailureCause::Panicked("worker exited before the record was picked up".to_string())
                }
                RecordStatus::Running if cancelled => RecordFailureCause::Cancelled { attempted: true },
                RecordStatus::Running => {
                    RecordFailureCause::Panicked("worker exited while processing the record".to_string())
                }
                RecordStatus::Succeeded | RecordStatus::Failed => continue,
            };
            self.statuses[index] = RecordStatus::Failed;
            self.fail(index, cause);
        }

        BatchResult {
            artifacts: self.artifacts,
            failures: self.failures,
            started_at,
            finished_at: Utc::now(),
        }
    }

    fn fail(&mut self, index: usize, cause: RecordFailureCause) {
        tracing::error!(record = %self.sources[index], error = %cause, "Record failed");
        self.failures.push(RecordFailure {
            index,
            source_path: self.sources[index].clone(),
            cause,
        });
    }

    fn transition(&mut self, index: usize, next: RecordStatus) -> bool {
        let Some(current) = self.statuses.get(index).copied() else {
            tracing::warn!(index, "Event for unknown record ignored");
            return false;
        };

        if !current.can_transition_to(next) {
            tracing::warn!(index, from = ?current, to = ?next, "Illegal record transition ignored");
            return false;
        }

        self.statuses[index] = next;
        true
    }

    #[cfg(test)]
    pub(crate) fn status(&self, index: usize) -> RecordStatus {
        self.statuses[index]
    }
}
