//! Pipeline configuration.

use std::path::{Path, PathBuf};
use chrono::TimeDelta;
use serde::{Deserialize, Serialize};
use crate::core::OptimizationSettings;
use crate::utils::{OptimizerError, OptimizerResult};

pub const DEFAULT_BATCH_CAPACITY: usize = 25;
/// 23h57m: a day minus a few minutes, so a file rewritten by yesterday's
/// run is not picked up again by today's.
pub const DEFAULT_RECENCY_WINDOW_SECS: u64 = 23 * 3600 + 57 * 60;
pub const DEFAULT_WORKERS: usize = 4;
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Anything longer is clamped so `now - window` cannot overflow.
const MAX_RECENCY_WINDOW_SECS: u64 = 100 * 365 * 86_400;

/// Static configuration for one discovery run and the queue behind it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct PipelineConfig {
    /// Root of the public storage tree
    pub storage_root: PathBuf,
    /// Maximum number of paths per queued batch
    pub batch_capacity: usize,
    /// Walk subdirectories (the top-level-only scan is the legacy behaviour)
    pub recursive: bool,
    /// Files modified within this many seconds of task start are rewritten
    pub recency_window_secs: u64,
    /// Concurrent batch tasks in the in-process queue
    pub worker_count: usize,
    /// Executions per task before it is abandoned
    pub max_attempts: u32,
    /// Refuse to queue a batch identical to one still pending
    pub unique_tasks: bool,
    /// Optional JSON-lines record of every rewritten file
    pub audit_log: Option<PathBuf>,
    pub settings: OptimizationSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            storage_root: PathBuf::from("storage/app/public"),
            batch_capacity: DEFAULT_BATCH_CAPACITY,
            recursive: true,
            recency_window_secs: DEFAULT_RECENCY_WINDOW_SECS,
            worker_count: DEFAULT_WORKERS,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            unique_tasks: true,
            audit_log: None,
            settings: OptimizationSettings::default(),
        }
    }
}

impl PipelineConfig {
    /// Loads a JSON config file. Missing fields take their defaults.
    pub fn from_file(path: impl AsRef<Path>) -> OptimizerResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            OptimizerError::io(format!("Cannot read config {}: {}", path.display(), e))
        })?;
        serde_json::from_str(&raw).map_err(|e| {
            OptimizerError::settings(format!("Invalid config {}: {}", path.display(), e))
        })
    }

    pub fn recency_window(&self) -> TimeDelta {
        TimeDelta::seconds(self.recency_window_secs.min(MAX_RECENCY_WINDOW_SECS) as i64)
    }
}
