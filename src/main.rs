// One-shot trigger for the image optimization pipeline.
//
// Meant to be run by cron (or any scheduler) about once a day: discovers every
// image under the storage root, queues the batches on an in-process worker
// pool and exits once the pool has drained.

use std::path::PathBuf;
use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use image_batch_optimizer::utils::validate_config;
use image_batch_optimizer::{ImageDiscovery, PipelineConfig, WorkerPool};

#[derive(Debug, Parser)]
#[command(name = "image-batch-optimizer", version, about = "Shrink and recompress recently modified storage images")]
struct Cli {
    /// JSON config file; flags below override its values
    #[arg(short, long, env = "IMAGE_OPTIMIZER_CONFIG")]
    config: Option<PathBuf>,

    /// Storage root to scan
    #[arg(long, env = "IMAGE_OPTIMIZER_ROOT")]
    root: Option<PathBuf>,

    /// Paths per queued batch
    #[arg(long, env = "IMAGE_OPTIMIZER_BATCH_CAPACITY")]
    batch_capacity: Option<usize>,

    /// Only scan the top level of the storage root
    #[arg(long)]
    top_level_only: bool,

    /// Concurrent batch workers
    #[arg(long, env = "IMAGE_OPTIMIZER_WORKERS")]
    workers: Option<usize>,

    /// Append a JSON line per rewritten file here
    #[arg(long, env = "IMAGE_OPTIMIZER_AUDIT_LOG")]
    audit_log: Option<PathBuf>,
}

impl Cli {
    fn into_config(self) -> Result<PipelineConfig> {
        let mut config = match &self.config {
            Some(path) => PipelineConfig::from_file(path)
                .with_context(|| format!("Failed to load config from {}", path.display()))?,
            None => PipelineConfig::default(),
        };

        if let Some(root) = self.root {
            config.storage_root = root;
        }
        if let Some(capacity) = self.batch_capacity {
            config.batch_capacity = capacity;
        }
        if self.top_level_only {
            config.recursive = false;
        }
        if let Some(workers) = self.workers {
            config.worker_count = workers;
        }
        if self.audit_log.is_some() {
            config.audit_log = self.audit_log;
        }

        validate_config(&config).context("Invalid configuration")?;
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(false)
        .with_thread_ids(false)
        .compact()
        .init();

    let config = Cli::parse().into_config()?;
    info!(
        "=== Image optimization run: {} (batch capacity {}, {}) ===",
        config.storage_root.display(),
        config.batch_capacity,
        if config.recursive { "recursive" } else { "top level only" }
    );

    let pool = WorkerPool::from_config(&config).context("Failed to start worker pool")?;
    let discovery = ImageDiscovery::from_config(&config)?;

    // Drain whatever made it into the queue even if dispatch stopped early.
    let dispatched = discovery.dispatch(&pool).await;
    let stats = pool.shutdown().await;
    let summary = dispatched.context("Failed to enqueue image batches")?;

    info!(
        "Run complete: {} images in {} batches, {} optimized, {} skipped, {} failed",
        summary.files_discovered,
        summary.batches_enqueued,
        stats.files_optimized,
        stats.files_skipped,
        stats.files_failed
    );
    Ok(())
}
