use async_trait::async_trait;
use chrono::{DateTime, Utc};
use crate::core::{Batch, BatchReport, OptimizationTask};
use crate::processing::BatchOptimizer;
use crate::utils::OptimizerResult;

/// What the queue did with an enqueued task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Enqueued {
    Accepted,
    /// An identical batch is still pending or running
    Duplicate,
}

/// The only queue capability the pipeline depends on.
///
/// Enqueue is one-way: the scheduler promises to run the task eventually
/// (at least once) and nothing flows back to the caller.
#[async_trait]
pub trait TaskScheduler: Send + Sync {
    async fn enqueue(&self, task: OptimizationTask) -> OptimizerResult<Enqueued>;
}

/// Work a pool worker performs for one decoded task.
///
/// Runs on the blocking pool. A panic counts as a failed attempt and the
/// task is retried.
pub trait BatchRunner: Send + Sync + 'static {
    fn run_batch(&self, batch: &Batch, now: DateTime<Utc>) -> BatchReport;
}

impl BatchRunner for BatchOptimizer {
    fn run_batch(&self, batch: &Batch, now: DateTime<Utc>) -> BatchReport {
        self.optimize_batch(batch, now)
    }
}
