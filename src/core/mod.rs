//! Core pipeline types.
//!
//! - [`PipelineConfig`]: static configuration for discovery and the queue
//! - [`Batch`] / [`OptimizationTask`]: the unit of queued work
//! - [`OptimizationSettings`]: how eligible images are recompressed
//! - [`BatchReport`]: per-file outcomes of one executed task

mod config;
mod task;
mod types;

pub use config::{
    PipelineConfig, DEFAULT_BATCH_CAPACITY, DEFAULT_MAX_ATTEMPTS, DEFAULT_RECENCY_WINDOW_SECS,
    DEFAULT_WORKERS,
};
pub use task::{Batch, OptimizationTask};
pub use types::{
    BatchReport, FileOutcome, OptimizationResult, OptimizationSettings, DEFAULT_QUALITY,
    DEFAULT_SCALE_PERCENT,
};
