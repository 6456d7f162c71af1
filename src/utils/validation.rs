use crate::core::{OptimizationSettings, PipelineConfig};
use crate::utils::{OptimizerError, OptimizerResult};

/// Validates a full pipeline configuration
pub fn validate_config(config: &PipelineConfig) -> OptimizerResult<()> {
    if config.batch_capacity == 0 {
        return Err(OptimizerError::settings("Batch capacity cannot be 0"));
    }

    if config.worker_count == 0 {
        return Err(OptimizerError::settings("Worker count cannot be 0"));
    }

    if config.max_attempts == 0 {
        return Err(OptimizerError::settings("Max attempts cannot be 0"));
    }

    if config.recency_window_secs == 0 {
        return Err(OptimizerError::settings("Recency window cannot be 0"));
    }

    validate_settings(&config.settings)
}

/// Validates image processing settings
pub fn validate_settings(settings: &OptimizationSettings) -> OptimizerResult<()> {
    if settings.quality == 0 || settings.quality > 100 {
        return Err(OptimizerError::settings(
            format!("Invalid quality value: {}. Must be between 1 and 100", settings.quality)
        ));
    }

    if settings.scale_percent == 0 || settings.scale_percent > 100 {
        return Err(OptimizerError::settings(
            format!("Invalid scale: {}%. Must be between 1 and 100", settings.scale_percent)
        ));
    }

    Ok(())
}
