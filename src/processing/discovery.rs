//! Image discovery and batching: the producer side of the pipeline.
//!
//! Walks the storage root, collects every `jpg`/`jpeg`/`png` file and hands
//! them to the task queue in fixed-size batches. No recency filtering happens
//! here; that is deferred to the optimizer, which reads modification times
//! when the batch actually runs.

use std::path::PathBuf;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::core::{Batch, OptimizationTask, PipelineConfig};
use crate::utils::{is_supported_image, validate_config, OptimizerResult};
use crate::worker::{Enqueued, TaskScheduler};

/// Counts from one dispatch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DispatchSummary {
    pub files_discovered: usize,
    pub batches_enqueued: usize,
    /// Batches the queue refused because an identical one was pending
    pub duplicate_batches: usize,
}

#[derive(Debug, Clone)]
pub struct ImageDiscovery {
    root: PathBuf,
    recursive: bool,
    batch_capacity: usize,
}

impl ImageDiscovery {
    pub fn new(root: impl Into<PathBuf>, recursive: bool, batch_capacity: usize) -> Self {
        Self {
            root: root.into(),
            recursive,
            batch_capacity,
        }
    }

    pub fn from_config(config: &PipelineConfig) -> OptimizerResult<Self> {
        validate_config(config)?;
        Ok(Self::new(&config.storage_root, config.recursive, config.batch_capacity))
    }

    /// Absolute paths of every matching file, in walk order.
    ///
    /// Entries are sorted by file name within each directory, so the result
    /// is deterministic for a given tree. An unreadable root yields nothing.
    /// Symlinks to files are collected under their link path; symlinked
    /// directories are not descended into.
    pub fn discover(&self) -> Vec<String> {
        let root = match std::fs::canonicalize(&self.root) {
            Ok(root) => root,
            Err(e) => {
                warn!("Storage root {} is not readable: {}", self.root.display(), e);
                return Vec::new();
            }
        };

        let mut walker = WalkDir::new(&root).follow_links(false).sort_by_file_name();
        if !self.recursive {
            walker = walker.max_depth(1);
        }

        let mut files = Vec::new();
        for entry in walker {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    warn!("Skipping unreadable entry under {}: {}", root.display(), e);
                    continue;
                }
            };

            let is_file = entry.file_type().is_file()
                || (entry.file_type().is_symlink() && entry.path().is_file());
            if !is_file || !is_supported_image(entry.path()) {
                continue;
            }

            match entry.path().to_str() {
                Some(path) => files.push(path.to_string()),
                None => warn!("Skipping non UTF-8 path: {}", entry.path().display()),
            }
        }

        debug!("Discovered {} images under {}", files.len(), root.display());
        files
    }

    /// Discovers and partitions in one step.
    pub fn batches(&self) -> Vec<Batch> {
        partition(self.discover(), self.batch_capacity)
    }

    /// Enqueues one task per batch, in batch order.
    ///
    /// Finding nothing is not an error. A scheduler error stops the run;
    /// batches enqueued before it stay queued.
    pub async fn dispatch(&self, scheduler: &dyn TaskScheduler) -> OptimizerResult<DispatchSummary> {
        let batches = self.batches();
        let mut summary = DispatchSummary {
            files_discovered: batches.iter().map(Batch::len).sum(),
            ..DispatchSummary::default()
        };

        if batches.is_empty() {
            info!("No images found under {}, nothing to enqueue", self.root.display());
            return Ok(summary);
        }

        for (index, batch) in batches.into_iter().enumerate() {
            let size = batch.len();
            match scheduler.enqueue(OptimizationTask::new(index, batch)).await? {
                Enqueued::Accepted => {
                    debug!("Enqueued batch {} ({} files)", index, size);
                    summary.batches_enqueued += 1;
                }
                Enqueued::Duplicate => {
                    debug!("Batch {} is already pending, not enqueued again", index);
                    summary.duplicate_batches += 1;
                }
            }
        }

        info!(
            "Dispatched {} images in {} batches of up to {} ({} duplicates)",
            summary.files_discovered,
            summary.batches_enqueued,
            self.batch_capacity,
            summary.duplicate_batches
        );
        Ok(summary)
    }
}

/// Splits `paths` into consecutive batches of `capacity`; only the last may be short.
pub fn partition(paths: Vec<String>, capacity: usize) -> Vec<Batch> {
    paths
        .chunks(capacity.max(1))
        .map(|chunk| Batch::new(chunk.to_vec()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::path::Path;
    use std::sync::Mutex;
    use async_trait::async_trait;
    use crate::utils::OptimizerError;

    #[derive(Default)]
    struct RecordingScheduler {
        tasks: Mutex<Vec<OptimizationTask>>,
        reject_after: Option<usize>,
    }

    #[async_trait]
    impl TaskScheduler for RecordingScheduler {
        async fn enqueue(&self, task: OptimizationTask) -> OptimizerResult<Enqueued> {
            let mut tasks = self.tasks.lock().unwrap();
            if self.reject_after.is_some_and(|limit| tasks.len() >= limit) {
                return Err(OptimizerError::queue("queue closed"));
            }
            tasks.push(task);
            Ok(Enqueued::Accepted)
        }
    }

    fn touch(root: &Path, rel: &str) {
        let path = root.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, b"").unwrap();
    }

    fn relative(root: &Path, files: &[String]) -> Vec<String> {
        let root = fs::canonicalize(root).unwrap();
        files
            .iter()
            .map(|f| Path::new(f).strip_prefix(&root).unwrap().to_string_lossy().replace('\\', "/"))
            .collect()
    }

    #[test]
    fn partition_covers_every_path_once() {
        for n in 0..=60usize {
            for capacity in 1..=7usize {
                let paths: Vec<String> = (0..n).map(|i| format!("/s/{i}.jpg")).collect();
                let batches = partition(paths.clone(), capacity);

                assert_eq!(batches.len(), n.div_ceil(capacity), "n={n} c={capacity}");
                assert!(batches.iter().all(|b| b.len() <= capacity && !b.is_empty()));
                if let Some((last, full)) = batches.split_last() {
                    assert!(full.iter().all(|b| b.len() == capacity));
                    let remainder = if n % capacity == 0 { capacity } else { n % capacity };
                    assert_eq!(last.len(), remainder);
                }
                let flattened: Vec<String> = batches.into_iter().flat_map(Batch::into_paths).collect();
                assert_eq!(flattened, paths);
            }
        }
    }

    #[test]
    fn recursive_walk_finds_nested_images_in_name_order() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "b.png");
        touch(dir.path(), "a.jpg");
        touch(dir.path(), "sub/c.jpeg");
        touch(dir.path(), "sub/deeper/D.JPG");
        touch(dir.path(), "sub/notes.txt");
        touch(dir.path(), "sub/anim.gif");

        let files = ImageDiscovery::new(dir.path(), true, 25).discover();

        assert_eq!(
            relative(dir.path(), &files),
            vec!["a.jpg", "b.png", "sub/c.jpeg", "sub/deeper/D.JPG"]
        );
        assert!(files.iter().all(|f| Path::new(f).is_absolute()));
    }

    #[test]
    fn legacy_scan_stays_at_top_level() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.jpg");
        touch(dir.path(), "sub/b.png");

        let files = ImageDiscovery::new(dir.path(), false, 100).discover();

        assert_eq!(relative(dir.path(), &files), vec!["a.jpg"]);
    }

    #[test]
    fn directories_named_like_images_are_ignored() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("album.jpg")).unwrap();
        touch(dir.path(), "album.jpg/inner.png");

        let files = ImageDiscovery::new(dir.path(), true, 25).discover();

        assert_eq!(relative(dir.path(), &files), vec!["album.jpg/inner.png"]);
    }

    #[cfg(unix)]
    #[test]
    fn symlinked_files_are_collected_but_linked_directories_are_not_walked() {
        let dir = tempfile::tempdir().unwrap();
        let outside = tempfile::tempdir().unwrap();
        touch(outside.path(), "shared.jpg");
        touch(outside.path(), "album/inner.png");
        touch(dir.path(), "a.png");
        std::os::unix::fs::symlink(outside.path().join("shared.jpg"), dir.path().join("linked.jpg")).unwrap();
        std::os::unix::fs::symlink(outside.path().join("album"), dir.path().join("album")).unwrap();
        std::os::unix::fs::symlink(outside.path().join("gone.jpg"), dir.path().join("dangling.jpg")).unwrap();

        let files = ImageDiscovery::new(dir.path(), true, 25).discover();

        assert_eq!(relative(dir.path(), &files), vec!["a.png", "linked.jpg"]);
    }

    #[test]
    fn missing_root_discovers_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let discovery = ImageDiscovery::new(dir.path().join("nope"), true, 25);
        assert!(discovery.discover().is_empty());
        assert!(discovery.batches().is_empty());
    }

    #[test]
    fn zero_capacity_is_treated_as_one() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "a.jpg");
        touch(dir.path(), "b.jpg");
        assert_eq!(ImageDiscovery::new(dir.path(), true, 0).batches().len(), 2);
    }

    #[tokio::test]
    async fn dispatch_enqueues_one_task_per_batch_in_order() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..7 {
            touch(dir.path(), &format!("img{i}.jpg"));
        }
        let scheduler = RecordingScheduler::default();

        let summary = ImageDiscovery::new(dir.path(), true, 3)
            .dispatch(&scheduler)
            .await
            .unwrap();

        assert_eq!(
            summary,
            DispatchSummary { files_discovered: 7, batches_enqueued: 3, duplicate_batches: 0 }
        );
        let tasks = scheduler.tasks.lock().unwrap();
        let sizes: Vec<_> = tasks.iter().map(|t| t.batch.len()).collect();
        let indices: Vec<_> = tasks.iter().map(|t| t.batch_index).collect();
        assert_eq!(sizes, vec![3, 3, 1]);
        assert_eq!(indices, vec![0, 1, 2]);
    }

    #[tokio::test]
    async fn dispatch_with_nothing_found_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        touch(dir.path(), "readme.md");
        let scheduler = RecordingScheduler::default();

        let summary = ImageDiscovery::new(dir.path(), true, 25).dispatch(&scheduler).await.unwrap();

        assert_eq!(summary, DispatchSummary::default());
        assert!(scheduler.tasks.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn scheduler_errors_surface_after_partial_dispatch() {
        let dir = tempfile::tempdir().unwrap();
        for i in 0..5 {
            touch(dir.path(), &format!("{i}.png"));
        }
        let scheduler = RecordingScheduler { reject_after: Some(1), ..Default::default() };

        let result = ImageDiscovery::new(dir.path(), true, 2).dispatch(&scheduler).await;

        assert!(matches!(result, Err(OptimizerError::Queue(_))));
        assert_eq!(scheduler.tasks.lock().unwrap().len(), 1);
    }
}
