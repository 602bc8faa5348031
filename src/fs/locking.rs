//! File locking for safe concurrent access to the markdown stores.
//!
//! Every mutation acquires an exclusive `fs2` advisory lock on a sibling
//! `<path>.lock` marker before reading, and holds it until the rewrite is
//! flushed. Advisory locks are cooperative - all writers must go through
//! [`FileLock`] for the serialization to be effective.
//!
//! The marker file is never deleted on release: unlinking it would race
//! with a contender that has already opened the old inode and would then
//! hold a lock nobody else can see. An empty leftover marker is harmless.

use anyhow::{Context, Result};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

/// RAII guard holding an exclusive lock scoped to a target file.
///
/// Acquisition may block indefinitely while another process holds the lock.
/// The lock is not reentrant; acquiring the same target twice from one
/// caller deadlocks and must be avoided by design (see `promote`, which
/// takes its two locks strictly in sequence).
pub struct FileLock {
    lock_file: File,
    lock_path: PathBuf,
}

impl FileLock {
    /// Acquire an exclusive lock guarding `target`.
    ///
    /// Creates parent directories and the `<target>.lock` marker as needed.
    pub fn acquire(target: &Path) -> Result<FileLock> {
        let lock_path = lock_path_for(target);
        if let Some(parent) = lock_path.parent() {
            fs::create_dir_all(parent).with_context(|| {
                format!("Failed to create lock directory: {}", parent.display())
            })?;
        }
        let lock_file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)
            .with_context(|| format!("Failed to open lock file: {}", lock_path.display()))?;
        lock_file
            .lock_exclusive()
            .with_context(|| format!("Failed to acquire exclusive lock: {}", lock_path.display()))?;
        Ok(FileLock {
            lock_file,
            lock_path,
        })
    }

    /// Path of the marker file backing this lock.
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // Release the lock but keep the marker file on disk.
        let _ = fs2::FileExt::unlock(&self.lock_file);
    }
}

/// Sibling marker path for a target: `LESSONS.md` -> `LESSONS.md.lock`.
fn lock_path_for(target: &Path) -> PathBuf {
    let mut name = target
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(".lock");
    target.with_file_name(name)
}
