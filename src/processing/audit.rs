//! Append-only JSON-lines record of rewritten files.
//!
//! Optimization overwrites originals with no backup; this log is the only
//! trace of what a file looked like before.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use crate::core::OptimizationResult;
use crate::utils::{OptimizerError, OptimizerResult};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditRecord {
    pub path: String,
    pub original_size: u64,
    pub optimized_size: u64,
    pub original_width: u32,
    pub original_height: u32,
    pub width: u32,
    pub height: u32,
    pub optimized_at: DateTime<Utc>,
}

impl AuditRecord {
    pub fn new(result: &OptimizationResult, optimized_at: DateTime<Utc>) -> Self {
        Self {
            path: result.path.clone(),
            original_size: result.original_size,
            optimized_size: result.optimized_size,
            original_width: result.original_width,
            original_height: result.original_height,
            width: result.width,
            height: result.height,
            optimized_at,
        }
    }
}

/// Shared handle to the audit file. Clones append to the same file.
#[derive(Debug, Clone)]
pub struct AuditLog {
    path: PathBuf,
    file: Arc<Mutex<File>>,
}

impl AuditLog {
    pub fn open(path: impl AsRef<Path>) -> OptimizerResult<Self> {
        let path = path.as_ref().to_path_buf();
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|e| OptimizerError::io(format!(
                "Cannot open audit log {}: {}", path.display(), e
            )))?;
        Ok(Self { path, file: Arc::new(Mutex::new(file)) })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Writes one record as a single line.
    pub fn append(&self, record: &AuditRecord) -> OptimizerResult<()> {
        let mut line = serde_json::to_string(record)?;
        line.push('\n');
        let mut file = self
            .file
            .lock()
            .map_err(|_| OptimizerError::io("Audit log lock poisoned"))?;
        file.write_all(line.as_bytes())?;
        Ok(())
    }

    /// Reads every record back, skipping lines that do not parse.
    pub fn read_records(path: impl AsRef<Path>) -> OptimizerResult<Vec<AuditRecord>> {
        let raw = std::fs::read_to_string(path)?;
        Ok(raw
            .lines()
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect())
    }
}
