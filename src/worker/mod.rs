//! Task queue: the [`TaskScheduler`] seam and the in-process [`WorkerPool`].

mod pool;
mod scheduler;

pub use pool::{PoolOptions, PoolStats, WorkerPool};
pub use scheduler::{BatchRunner, Enqueued, TaskScheduler};
