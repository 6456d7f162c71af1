//! Batch and queued task definitions.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use crate::utils::OptimizerResult;

/// An ordered group of image paths processed together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Batch {
    paths: Vec<String>,
}

impl Batch {
    pub fn new(paths: Vec<String>) -> Self {
        Self { paths }
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }

    pub fn into_paths(self) -> Vec<String> {
        self.paths
    }
}

/// Unit of work handed to the task queue.
///
/// Owns its batch outright; the queue only ever sees the serialized payload,
/// so nothing about the filesystem at enqueue time leaks into execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationTask {
    /// Position of the batch within its discovery run
    pub batch_index: usize,
    pub batch: Batch,
}

impl OptimizationTask {
    pub fn new(batch_index: usize, batch: Batch) -> Self {
        Self { batch_index, batch }
    }

    /// Content key used to keep identical batches from queueing twice.
    pub fn unique_key(&self) -> String {
        let mut hasher = Sha256::new();
        for path in self.batch.paths() {
            hasher.update(path.as_bytes());
            hasher.update([0u8]);
        }
        hasher
            .finalize()
            .iter()
            .map(|b| format!("{b:02x}"))
            .collect()
    }

    pub fn to_payload(&self) -> OptimizerResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_payload(payload: &str) -> OptimizerResult<Self> {
        Ok(serde_json::from_str(payload)?)
    }
}
