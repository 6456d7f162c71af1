// Module declarations in dependency order
pub mod core;
pub mod utils;
pub mod processing;
pub mod worker;

// Public exports for external consumers
pub use crate::core::{Batch, BatchReport, FileOutcome, OptimizationResult, OptimizationSettings, OptimizationTask, PipelineConfig};
pub use crate::processing::{AuditLog, BatchOptimizer, DispatchSummary, ImageDiscovery};
pub use crate::utils::{OptimizerError, OptimizerResult};
pub use crate::worker::{BatchRunner, Enqueued, PoolOptions, PoolStats, TaskScheduler, WorkerPool};
