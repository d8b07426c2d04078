//! BatchCoordinator - fan a batch of records out over a fixed pool of workers
//! and fan the outcomes back in.
//!
//! Workers pull records from a shared queue, run the retry-until-valid
//! analysis and the assembler, and report every step over a channel. The
//! coordinator is the only reader of that channel and the only writer of the
//! status table, so aggregation needs no further locking. The call returns
//! only after every worker has been joined.
//!
//! A failed record never stops the others: all records run to a terminal
//! state and failures are reported together at the end, alongside the
//! artifacts that did get produced.

use std::collections::VecDeque;
use std::panic::AssertUnwindSafe;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::Utc;
use futures::FutureExt;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::analysis::{AnalysisClient, ResultAssembler, RetryingAnalyzer};
use crate::batch::status::{StatusTable, WorkerEvent};
use crate::domain::{AnalyzedArtifact, BatchResult, CallRecord};
use crate::error::{BatchError, RecordFailureCause};

type WorkQueue = Arc<Mutex<VecDeque<(usize, CallRecord)>>>;

/// Batch-level settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatchConfig {
    /// Size of the worker pool. Bounds concurrent calls to the analysis
    /// service; tune it against the service's rate limit.
    pub max_workers: usize,
    /// Cancel whatever is still running after this long
    pub deadline: Option<Duration>,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            max_workers: 20,
            deadline: None,
        }
    }
}

impl BatchConfig {
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    /// Workers to spawn for a batch of `records` records
    pub fn pool_size(&self, records: usize) -> usize {
        self.max_workers.max(1).min(records)
    }
}

/// Runs a batch of records through analysis and assembly.
pub struct BatchCoordinator<C: AnalysisClient + 'static> {
    analyzer: Arc<RetryingAnalyzer<C>>,
    assembler: Arc<ResultAssembler>,
    config: BatchConfig,
}

impl<C: AnalysisClient + 'static> BatchCoordinator<C> {
    pub fn new(analyzer: RetryingAnalyzer<C>, assembler: ResultAssembler, config: BatchConfig) -> Self {
        Self {
            analyzer: Arc::new(analyzer),
            assembler: Arc::new(assembler),
            config,
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Analyze every record; fail with `BatchFailed` if any record failed.
    pub async fn run_batch(&self, records: Vec<CallRecord>) -> Result<BatchResult, BatchError> {
        self.run_batch_with_cancel(records, CancellationToken::new()).await
    }

    /// Like `run_batch`, but stops cooperatively once `cancel` fires.
    ///
    /// Records that had not been picked up fail as never attempted; records
    /// in flight are abandoned and fail as attempted.
    pub async fn run_batch_with_cancel(
        &self,
        records: Vec<CallRecord>,
        cancel: CancellationToken,
    ) -> Result<BatchResult, BatchError> {
        let started_at = Utc::now();
        let total = records.len();
        let pool_size = self.config.pool_size(total);
        let token = cancel.child_token();

        tracing::info!(records = total, workers = pool_size, "Starting batch analysis");

        let sources = records.iter().map(|r| r.source_path.clone()).collect();
        let queue: WorkQueue = Arc::new(Mutex::new(records.into_iter().enumerate().collect()));
        let (events_tx, mut events_rx) = mpsc::unbounded_channel();

        let mut workers = JoinSet::new();
        for worker_id in 0..pool_size {
            workers.spawn(run_worker(
                worker_id,
                queue.clone(),
                self.analyzer.clone(),
                self.assembler.clone(),
                events_tx.clone(),
                token.clone(),
            ));
        }
        drop(events_tx);

        // The deadline lives inside this future, so dropping the batch drops it too
        let deadline = self.config.deadline;
        let timer = async move {
            match deadline {
                Some(after) => tokio::time::sleep(after).await,
                None => std::future::pending::<()>().await,
            }
        };
        tokio::pin!(timer);
        let mut timer_armed = deadline.is_some();

        // Channel closes once every worker has dropped its sender
        let mut table = StatusTable::new(sources);
        loop {
            tokio::select! {
                event = events_rx.recv() => match event {
                    Some(event) => table.apply(event),
                    None => break,
                },
                _ = &mut timer, if timer_armed => {
                    timer_armed = false;
                    tracing::warn!(
                        deadline_ms = deadline.map(|d| d.as_millis() as u64).unwrap_or_default(),
                        "Batch deadline reached, cancelling"
                    );
                    token.cancel();
                }
            }
        }

        while let Some(joined) = workers.join_next().await {
            if let Err(e) = joined {
                tracing::error!(error = %e, "Worker task ended abnormally");
            }
        }

        let result = table.finish(token.is_cancelled(), started_at);

        tracing::info!(
            succeeded = result.artifacts.len(),
            failed = result.failures.len(),
            tokens_used = result.tokens_used(),
            elapsed_ms = result.elapsed().num_milliseconds(),
            "Batch analysis finished"
        );

        if result.is_success() {
            Ok(result)
        } else {
            Err(BatchError::BatchFailed { partial: result })
        }
    }
}

async fn run_worker<C: AnalysisClient + 'static>(
    worker_id: usize,
    queue: WorkQueue,
    analyzer: Arc<RetryingAnalyzer<C>>,
    assembler: Arc<ResultAssembler>,
    events: mpsc::UnboundedSender<WorkerEvent>,
    cancel: CancellationToken,
) {
    loop {
        if cancel.is_cancelled() {
            tracing::debug!(worker_id, "Worker stopping, batch cancelled");
            break;
        }

        let next = queue.lock().unwrap_or_else(|e| e.into_inner()).pop_front();
        let Some((index, record)) = next else {
            break;
        };

        // Cancelled between the check above and the pop
        if cancel.is_cancelled() {
            let _ = events.send(WorkerEvent::Finished(
                index,
                Err(RecordFailureCause::Cancelled { attempted: false }),
            ));
            break;
        }

        if events.send(WorkerEvent::Started(index)).is_err() {
            break;
        }

        let unit = AssertUnwindSafe(process_record(&analyzer, &assembler, &record)).catch_unwind();
        // A unit that finished on the same wake-up as the cancel keeps its result
        let result = tokio::select! {
            biased;
            caught = unit => caught.unwrap_or_else(|panic| Err(RecordFailureCause::Panicked(panic_message(panic)))),
            _ = cancel.cancelled() => Err(RecordFailureCause::Cancelled { attempted: true }),
        };

        if events.send(WorkerEvent::Finished(index, result)).is_err() {
            break;
        }
    }
}

/// One unit of work: valid analysis, then assembly
async fn process_record<C: AnalysisClient>(
    analyzer: &RetryingAnalyzer<C>,
    assembler: &ResultAssembler,
    record: &CallRecord,
) -> Result<AnalyzedArtifact, RecordFailureCause> {
    let outcome = analyzer.get_valid_analysis(record).await?;
    Ok(assembler.assemble(&outcome, record)?)
}

fn panic_message(panic: Box<dyn std::any::Any + Send>) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
