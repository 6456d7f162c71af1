//! Batch image optimizer: the consumer side of the pipeline.
//!
//! Given one batch, every file modified after `now - recency_window` is
//! decoded, shrunk, re-encoded in its own format and written back over the
//! original. Older files are left alone. A file that fails is recorded in
//! the [`BatchReport`] and the batch moves on to the next path.

use std::io::Cursor;
use std::panic::{self, AssertUnwindSafe};
use std::path::Path;
use chrono::{DateTime, TimeDelta, Utc};
use image::ImageReader;
use tracing::{debug, info, warn};

use crate::core::{Batch, BatchReport, FileOutcome, OptimizationResult, OptimizationSettings, PipelineConfig};
use crate::utils::{modified_at, validate_settings, write_atomic, ImageFormat, OptimizerError, OptimizerResult};

use super::audit::{AuditLog, AuditRecord};
use super::formats::encode_image;
use super::resize::apply_scale;

#[derive(Debug, Clone)]
pub struct BatchOptimizer {
    settings: OptimizationSettings,
    recency_window: TimeDelta,
    audit: Option<AuditLog>,
}

impl BatchOptimizer {
    pub fn new(settings: OptimizationSettings, recency_window: TimeDelta) -> Self {
        Self {
            settings,
            recency_window,
            audit: None,
        }
    }

    /// Builds an optimizer from validated configuration, opening the audit
    /// log when one is configured.
    pub fn from_config(config: &PipelineConfig) -> OptimizerResult<Self> {
        validate_settings(&config.settings)?;
        let optimizer = Self::new(config.settings, config.recency_window());
        match &config.audit_log {
            Some(path) => Ok(optimizer.with_audit_log(AuditLog::open(path)?)),
            None => Ok(optimizer),
        }
    }

    pub fn with_audit_log(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    /// Oldest modification time that still counts as recent.
    pub fn threshold(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now - self.recency_window
    }

    /// Strictly newer than the threshold; a file modified exactly at the
    /// threshold is left alone.
    pub fn is_eligible(&self, modified: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        modified > self.threshold(now)
    }

    /// Runs one batch in order. Never fails as a whole.
    pub fn optimize_batch(&self, batch: &Batch, now: DateTime<Utc>) -> BatchReport {
        let threshold = self.threshold(now);
        debug!("Optimizing batch of {} files (threshold {})", batch.len(), threshold);

        let mut report = BatchReport {
            outcomes: Vec::with_capacity(batch.len()),
        };

        for path in batch.paths() {
            let outcome = match self.process_path(path, now) {
                Ok(Some(result)) => FileOutcome::Optimized(result),
                Ok(None) => {
                    debug!("Skipping {}: not modified since {}", path, threshold);
                    FileOutcome::Skipped { path: path.clone() }
                }
                Err(e) => {
                    warn!("Image optimization failed for {}: {}", path, e);
                    FileOutcome::Failed {
                        path: path.clone(),
                        error: e.to_string(),
                    }
                }
            };
            report.outcomes.push(outcome);
        }

        info!(
            "Batch finished: {} optimized, {} skipped, {} failed ({} bytes saved)",
            report.optimized(),
            report.skipped(),
            report.failed(),
            report.saved_bytes()
        );
        report
    }

    /// Eligibility check plus optimization, with panics from the codec
    /// contained to this one path.
    fn process_path(&self, path: &str, now: DateTime<Utc>) -> OptimizerResult<Option<OptimizationResult>> {
        let modified = modified_at(path)?;
        if !self.is_eligible(modified, now) {
            return Ok(None);
        }

        let result = panic::catch_unwind(AssertUnwindSafe(|| self.optimize_file(path)))
            .map_err(|_| OptimizerError::processing(format!("Decoder panicked on {path}")))??;

        if let Some(audit) = &self.audit {
            if let Err(e) = audit.append(&AuditRecord::new(&result, Utc::now())) {
                warn!("Failed to write audit record for {} to {}: {}", path, audit.path().display(), e);
            }
        }

        Ok(Some(result))
    }

    /// Decodes, shrinks and rewrites one file unconditionally.
    pub fn optimize_file(&self, path: impl AsRef<Path>) -> OptimizerResult<OptimizationResult> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .map_err(|e| OptimizerError::io(format!("Cannot read {}: {}", path.display(), e)))?;
        let original_size = bytes.len() as u64;

        let reader = ImageReader::new(Cursor::new(bytes.as_slice())).with_guessed_format()?;
        let detected = reader
            .format()
            .ok_or_else(|| OptimizerError::format(format!("Unrecognised image data in {}", path.display())))?;
        let format = ImageFormat::from_detected(detected)?;

        let image = reader.decode().map_err(|e| {
            OptimizerError::processing(format!("Failed to decode '{}': {}", path.display(), e))
        })?;
        let (original_width, original_height) = (image.width(), image.height());

        let scaled = apply_scale(&image, self.settings.scale_percent);
        let encoded = encode_image(&scaled, format, self.settings.quality)?;
        write_atomic(path, &encoded)?;

        let optimized_size = encoded.len() as u64;
        let (saved_bytes, compression_ratio) =
            OptimizationResult::compression_stats(original_size, optimized_size);

        debug!(
            "'{}' {}×{} → {}×{}, {} bytes saved ({:.1}%)",
            path.display(),
            original_width,
            original_height,
            scaled.width(),
            scaled.height(),
            saved_bytes,
            compression_ratio
        );

        Ok(OptimizationResult {
            path: path.to_string_lossy().into_owned(),
            format,
            original_width,
            original_height,
            width: scaled.width(),
            height: scaled.height(),
            original_size,
            optimized_size,
            saved_bytes,
            compression_ratio,
        })
    }
}
