//! Core types for optimization settings and per-file results.

use serde::{Deserialize, Serialize};
use crate::utils::ImageFormat;

/// Default re-encode quality on the 0-100 JPEG scale.
pub const DEFAULT_QUALITY: u8 = 45;
/// Default output size as a percentage of each source dimension.
pub const DEFAULT_SCALE_PERCENT: u32 = 70;

/// How an eligible image is recompressed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct OptimizationSettings {
    /// Encoder quality (1-100). PNG maps it onto a compression level.
    pub quality: u8,
    /// Target size of both dimensions, as a percentage of the original
    pub scale_percent: u32,
}

impl Default for OptimizationSettings {
    fn default() -> Self {
        Self {
            quality: DEFAULT_QUALITY,
            scale_percent: DEFAULT_SCALE_PERCENT,
        }
    }
}

/// Result of optimizing one file in place.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizationResult {
    pub path: String,
    pub format: ImageFormat,
    pub original_width: u32,
    pub original_height: u32,
    pub width: u32,
    pub height: u32,
    /// Size on disk before the rewrite
    pub original_size: u64,
    /// Size on disk after the rewrite
    pub optimized_size: u64,
    /// Bytes saved (can be negative if file grew)
    pub saved_bytes: i64,
    /// Compression ratio as a percentage
    pub compression_ratio: f64,
}

impl OptimizationResult {
    pub(crate) fn compression_stats(original_size: u64, optimized_size: u64) -> (i64, f64) {
        let saved_bytes = original_size as i64 - optimized_size as i64;
        let compression_ratio = if original_size > 0 {
            saved_bytes as f64 / original_size as f64 * 100.0
        } else {
            0.0
        };
        (saved_bytes, compression_ratio)
    }
}

/// What happened to one path of a batch.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum FileOutcome {
    Optimized(OptimizationResult),
    /// Last modified before the recency threshold
    Skipped { path: String },
    Failed { path: String, error: String },
}

impl FileOutcome {
    pub fn path(&self) -> &str {
        match self {
            Self::Optimized(result) => &result.path,
            Self::Skipped { path } | Self::Failed { path, .. } => path,
        }
    }
}

/// Per-batch summary, one outcome per path in batch order.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchReport {
    pub outcomes: Vec<FileOutcome>,
}

impl BatchReport {
    pub fn optimized(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Optimized(_)))
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Skipped { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Failed { .. }))
    }

    /// (path, error message) for every failed file
    pub fn failures(&self) -> Vec<(&str, &str)> {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                FileOutcome::Failed { path, error } => Some((path.as_str(), error.as_str())),
                _ => None,
            })
            .collect()
    }

    pub fn saved_bytes(&self) -> i64 {
        self.outcomes
            .iter()
            .filter_map(|o| match o {
                FileOutcome::Optimized(r) => Some(r.saved_bytes),
                _ => None,
            })
            .sum()
    }

    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(o)).count()
    }
}
