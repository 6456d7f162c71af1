use std::fs;
use std::io::Write;
use std::path::Path;
use chrono::{DateTime, Utc};
use tempfile::NamedTempFile;
use crate::utils::{OptimizerError, OptimizerResult, ValidationError};

/// Reads the current last-modified time of a regular file.
///
/// Missing paths and non-files come back as validation errors so a batch
/// report can tell "deleted since discovery" apart from decode failures.
pub fn modified_at(path: impl AsRef<Path>) -> OptimizerResult<DateTime<Utc>> {
    let path = path.as_ref();
    let metadata = match fs::metadata(path) {
        Ok(m) => m,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(ValidationError::path_not_found(path).into());
        }
        Err(e) => return Err(e.into()),
    };

    if !metadata.is_file() {
        return Err(ValidationError::not_a_file(path).into());
    }

    Ok(DateTime::<Utc>::from(metadata.modified()?))
}

/// Replaces `path` with `bytes` in one rename.
///
/// The bytes go to a temporary file in the same directory first, which then
/// takes over the original's permissions and is renamed over it. If anything
/// fails before the rename the original file is untouched. A symlink is
/// resolved first so the link stays and its target is replaced.
pub fn write_atomic(path: impl AsRef<Path>, bytes: &[u8]) -> OptimizerResult<()> {
    let path = &fs::canonicalize(path.as_ref())?;
    let parent = path
        .parent()
        .ok_or_else(|| OptimizerError::io(format!("No parent directory: {}", path.display())))?;

    let permissions = fs::metadata(path)?.permissions();

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(bytes)?;
    temp.as_file().sync_all()?;
    fs::set_permissions(temp.path(), permissions)?;

    temp.persist(path)
        .map_err(|e| OptimizerError::io(format!(
            "Failed to replace {}: {}", path.display(), e.error
        )))?;
    Ok(())
}
