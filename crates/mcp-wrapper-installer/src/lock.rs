use std::fs::{File, OpenOptions};
use std::path::{Path, PathBuf};

use fs4::fs_std::FileExt;
use mcp_wrapper_core::{Result, WrapperError};
use tracing::debug;

use crate::fs_utils::ensure_dir;

/// Advisory exclusive lock serializing fetch/extract/install across wrapper processes.
///
/// Acquisition blocks until a concurrent holder finishes; the lock is released on drop.
#[derive(Debug)]
pub struct InstallLock {
    file: File,
    path: PathBuf,
}

impl InstallLock {
    pub fn acquire(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .read(true)
            .write(true)
            .truncate(false)
            .open(path)
            .map_err(|err| {
                WrapperError::io(path, format!("failed to open lock file {}", path.display()), err)
            })?;

        debug!(lock = %path.display(), "waiting for install lock");
        FileExt::lock_exclusive(&file).map_err(|err| {
            WrapperError::io(path, format!("failed to acquire lock {}", path.display()), err)
        })?;
        debug!(lock = %path.display(), "install lock acquired");

        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }
}

impl Drop for InstallLock {
    fn drop(&mut self) {
        if let Err(err) = FileExt::unlock(&self.file) {
            debug!(lock = %self.path.display(), error = %err, "failed to release install lock");
        }
    }
}
