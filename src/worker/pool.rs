//! In-process task queue backed by a bounded pool of tokio workers.
//!
//! Tasks arrive as serialized payloads over an unbounded channel. A
//! dispatcher hands each one to a worker once a semaphore permit is free;
//! the worker runs the batch on the blocking pool so image decoding never
//! stalls the async runtime. Nothing is reported back to the producer.

use std::collections::HashSet;
use std::sync::Arc;
use async_trait::async_trait;
use chrono::Utc;
use serde::Serialize;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, error, info, warn};

use crate::core::{BatchReport, OptimizationTask, PipelineConfig, DEFAULT_MAX_ATTEMPTS, DEFAULT_WORKERS};
use crate::processing::BatchOptimizer;
use crate::utils::{validate_config, OptimizerError, OptimizerResult};

use super::scheduler::{BatchRunner, Enqueued, TaskScheduler};

/// Queue tuning knobs.
#[derive(Debug, Clone, Copy)]
pub struct PoolOptions {
    pub worker_count: usize,
    pub max_attempts: u32,
    pub unique_tasks: bool,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            worker_count: DEFAULT_WORKERS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            unique_tasks: true,
        }
    }
}

impl From<&PipelineConfig> for PoolOptions {
    fn from(config: &PipelineConfig) -> Self {
        Self {
            worker_count: config.worker_count,
            max_attempts: config.max_attempts,
            unique_tasks: config.unique_tasks,
        }
    }
}

/// Totals across every task the pool ran.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PoolStats {
    pub tasks_completed: usize,
    /// Tasks that kept failing until `max_attempts` ran out
    pub tasks_abandoned: usize,
    /// Payloads that could not be decoded
    pub tasks_dropped: usize,
    pub files_optimized: usize,
    pub files_skipped: usize,
    pub files_failed: usize,
}

impl PoolStats {
    fn record(&mut self, report: &BatchReport) {
        self.tasks_completed += 1;
        self.files_optimized += report.optimized();
        self.files_skipped += report.skipped();
        self.files_failed += report.failed();
    }
}

struct Envelope {
    unique_key: String,
    payload: String,
}

#[derive(Clone)]
struct Shared {
    runner: Arc<dyn BatchRunner>,
    /// Keys of tasks queued or running, when uniqueness is on
    pending: Arc<Mutex<HashSet<String>>>,
    stats: Arc<Mutex<PoolStats>>,
    max_attempts: u32,
    unique_tasks: bool,
}

impl Shared {
    async fn run(&self, envelope: Envelope) {
        match OptimizationTask::from_payload(&envelope.payload) {
            Ok(task) => self.execute(task).await,
            Err(e) => {
                warn!("Dropping undecodable task payload: {}", e);
                self.stats.lock().await.tasks_dropped += 1;
            }
        }
        self.release(&envelope.unique_key).await;
    }

    async fn execute(&self, task: OptimizationTask) {
        let batch_index = task.batch_index;
        let batch = Arc::new(task.batch);

        for attempt in 1..=self.max_attempts {
            let runner = Arc::clone(&self.runner);
            let batch = Arc::clone(&batch);
            // Recency is judged when the task runs, not when it was queued.
            let now = Utc::now();

            match tokio::task::spawn_blocking(move || runner.run_batch(&batch, now)).await {
                Ok(report) => {
                    debug!(
                        "Batch {} done on attempt {}: {} optimized, {} skipped, {} failed",
                        batch_index,
                        attempt,
                        report.optimized(),
                        report.skipped(),
                        report.failed()
                    );
                    self.stats.lock().await.record(&report);
                    return;
                }
                Err(e) if attempt < self.max_attempts => {
                    warn!("Batch {} attempt {}/{} failed: {}", batch_index, attempt, self.max_attempts, e);
                }
                Err(e) => {
                    error!("Abandoning batch {} after {} attempts: {}", batch_index, attempt, e);
                    self.stats.lock().await.tasks_abandoned += 1;
                }
            }
        }
    }

    async fn release(&self, key: &str) {
        if self.unique_tasks {
            self.pending.lock().await.remove(key);
        }
    }
}

pub struct WorkerPool {
    sender: mpsc::UnboundedSender<Envelope>,
    shared: Shared,
    dispatcher: JoinHandle<()>,
}

impl WorkerPool {
    /// Starts the dispatcher. Must be called from within a tokio runtime.
    pub fn new(runner: impl BatchRunner, options: PoolOptions) -> Self {
        let worker_count = options.worker_count.max(1);
        let shared = Shared {
            runner: Arc::new(runner),
            pending: Arc::new(Mutex::new(HashSet::new())),
            stats: Arc::new(Mutex::new(PoolStats::default())),
            max_attempts: options.max_attempts.max(1),
            unique_tasks: options.unique_tasks,
        };

        let (sender, receiver) = mpsc::unbounded_channel();
        let semaphore = Arc::new(Semaphore::new(worker_count));
        let dispatcher = tokio::spawn(dispatch_loop(receiver, semaphore, shared.clone()));

        debug!("Worker pool started with {} workers", worker_count);
        Self {
            sender,
            shared,
            dispatcher,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> OptimizerResult<Self> {
        validate_config(config)?;
        Ok(Self::new(BatchOptimizer::from_config(config)?, PoolOptions::from(config)))
    }

    /// Closes the queue, waits for queued and running tasks to finish and
    /// returns the totals.
    pub async fn shutdown(self) -> PoolStats {
        let Self { sender, shared, dispatcher } = self;
        drop(sender);

        if let Err(e) = dispatcher.await {
            error!("Task dispatcher stopped abnormally: {}", e);
        }

        let stats = *shared.stats.lock().await;
        info!(
            "Worker pool drained: {} tasks, {} optimized, {} skipped, {} failed, {} abandoned",
            stats.tasks_completed,
            stats.files_optimized,
            stats.files_skipped,
            stats.files_failed,
            stats.tasks_abandoned
        );
        stats
    }
}

#[async_trait]
impl TaskScheduler for WorkerPool {
    async fn enqueue(&self, task: OptimizationTask) -> OptimizerResult<Enqueued> {
        let unique_key = task.unique_key();
        let payload = task.to_payload()?;

        if self.shared.unique_tasks && !self.shared.pending.lock().await.insert(unique_key.clone()) {
            return Ok(Enqueued::Duplicate);
        }

        if self.sender.send(Envelope { unique_key: unique_key.clone(), payload }).is_err() {
            self.shared.release(&unique_key).await;
            return Err(OptimizerError::queue("Task queue is closed"));
        }
        Ok(Enqueued::Accepted)
    }
}

async fn dispatch_loop(
    mut receiver: mpsc::UnboundedReceiver<Envelope>,
    semaphore: Arc<Semaphore>,
    shared: Shared,
) {
    let mut running = JoinSet::new();

    while let Some(envelope) = receiver.recv().await {
        let permit = match Arc::clone(&semaphore).acquire_owned().await {
            Ok(permit) => permit,
            Err(e) => {
                error!("Worker semaphore closed: {}", e);
                break;
            }
        };

        let shared = shared.clone();
        running.spawn(async move {
            let _permit = permit;
            shared.run(envelope).await;
        });

        while let Some(finished) = running.try_join_next() {
            if let Err(e) = finished {
                error!("Worker task failed: {}", e);
            }
        }
    }

    while let Some(finished) = running.join_next().await {
        if let Err(e) = finished {
            error!("Worker task failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;
    use std::sync::atomic::{AtomicU32, Ordering};
    use chrono::DateTime;
    use crate::core::{Batch, OptimizationSettings};

    /// Panics on its first `failures` runs, then reports an empty batch.
    struct FlakyRunner {
        failures: u32,
        calls: Arc<AtomicU32>,
    }

    impl BatchRunner for FlakyRunner {
        fn run_batch(&self, _batch: &Batch, _now: DateTime<Utc>) -> BatchReport {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if call <= self.failures {
                panic!("run {call} blew up");
            }
            BatchReport { outcomes: Vec::new() }
        }
    }

    fn optimizer() -> BatchOptimizer {
        BatchOptimizer::new(OptimizationSettings::default(), PipelineConfig::default().recency_window())
    }

    fn write_image(path: &Path) {
        image::RgbImage::new(20, 10).save(path).unwrap();
    }

    fn task(index: usize, paths: &[&Path]) -> OptimizationTask {
        OptimizationTask::new(
            index,
            Batch::new(paths.iter().map(|p| p.to_string_lossy().into_owned()).collect()),
        )
    }

    #[tokio::test]
    async fn runs_every_enqueued_task_before_shutdown_returns() {
        let dir = tempfile::tempdir().unwrap();
        let paths: Vec<_> = (0..6).map(|i| dir.path().join(format!("{i}.png"))).collect();
        paths.iter().for_each(|p| write_image(p));

        let pool = WorkerPool::new(optimizer(), PoolOptions { worker_count: 2, ..Default::default() });
        for (i, pair) in paths.chunks(2).enumerate() {
            let refs: Vec<&Path> = pair.iter().map(|p| p.as_path()).collect();
            assert_eq!(pool.enqueue(task(i, &refs)).await.unwrap(), Enqueued::Accepted);
        }
        let stats = pool.shutdown().await;

        assert_eq!(stats.tasks_completed, 3);
        assert_eq!(stats.files_optimized, 6);
        for path in &paths {
            let image = image::open(path).unwrap();
            assert_eq!((image.width(), image.height()), (14, 7));
        }
    }

    #[tokio::test]
    async fn identical_pending_batch_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        write_image(&path);

        let pool = WorkerPool::new(optimizer(), PoolOptions::default());
        let first = pool.enqueue(task(0, &[&path])).await.unwrap();
        let second = pool.enqueue(task(1, &[&path])).await.unwrap();
        let stats = pool.shutdown().await;

        assert_eq!((first, second), (Enqueued::Accepted, Enqueued::Duplicate));
        assert_eq!(stats.tasks_completed, 1);
        let image = image::open(&path).unwrap();
        assert_eq!(image.width(), 14);
    }

    #[tokio::test]
    async fn duplicates_are_allowed_when_uniqueness_is_off() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.png");
        write_image(&path);

        let pool = WorkerPool::new(
            optimizer(),
            PoolOptions { worker_count: 1, unique_tasks: false, ..Default::default() },
        );
        assert_eq!(pool.enqueue(task(0, &[&path])).await.unwrap(), Enqueued::Accepted);
        assert_eq!(pool.enqueue(task(1, &[&path])).await.unwrap(), Enqueued::Accepted);
        let stats = pool.shutdown().await;

        // Each run shrinks again: 20 -> 14 -> 10.
        assert_eq!(stats.tasks_completed, 2);
        assert_eq!(image::open(&path).unwrap().width(), 10);
    }

    #[tokio::test]
    async fn undecodable_payload_is_dropped_and_released() {
        let pool = WorkerPool::new(optimizer(), PoolOptions::default());
        pool.shared.pending.lock().await.insert("k".to_string());
        pool.sender
            .send(Envelope { unique_key: "k".to_string(), payload: "{oops".to_string() })
            .unwrap_or_else(|_| panic!("queue closed"));
        let shared = pool.shared.clone();

        let stats = pool.shutdown().await;

        assert_eq!(stats.tasks_dropped, 1);
        assert_eq!(stats.tasks_completed, 0);
        assert!(shared.pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn panicking_attempt_is_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let runner = FlakyRunner { failures: 1, calls: Arc::clone(&calls) };
        let pool = WorkerPool::new(runner, PoolOptions { max_attempts: 3, ..Default::default() });

        pool.enqueue(task(0, &[Path::new("/srv/a.jpg")])).await.unwrap();
        let stats = pool.shutdown().await;

        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!((stats.tasks_completed, stats.tasks_abandoned), (1, 0));
    }

    #[tokio::test]
    async fn task_is_abandoned_after_max_attempts_and_released() {
        let calls = Arc::new(AtomicU32::new(0));
        let runner = FlakyRunner { failures: u32::MAX, calls: Arc::clone(&calls) };
        let pool = WorkerPool::new(runner, PoolOptions { max_attempts: 3, ..Default::default() });
        let shared = pool.shared.clone();

        pool.enqueue(task(0, &[Path::new("/srv/a.jpg")])).await.unwrap();
        let stats = pool.shutdown().await;

        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!((stats.tasks_completed, stats.tasks_abandoned), (0, 1));
        assert!(shared.pending.lock().await.is_empty());
    }

    #[tokio::test]
    async fn from_config_validates_first() {
        let config = PipelineConfig { worker_count: 0, ..PipelineConfig::default() };
        assert!(WorkerPool::from_config(&config).is_err());
    }
}
